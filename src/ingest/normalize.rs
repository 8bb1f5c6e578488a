//! Canonical patent record and its validation gate
//!
//! Extraction output (or any JSON document, e.g. a record read back from the
//! index) is first gathered into a loosely typed [`PatentCandidate`].
//! [`Patent::validate`] is the only way to obtain a [`Patent`]: it checks every
//! field and either returns the typed record or an [`IntegrityError`] naming
//! every field that broke its contract.

use super::parser::ExtractedDocument;
use crate::types::{Mapping, PatentType};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Date layouts accepted in candidate fields (ISO first, then dump layout)
const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%Y%m%d"];

/// Semantic kind a field must satisfy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Date,
    MappingList,
    NonEmptyMappingList,
    PatentType,
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Text => "text",
            Self::Date => "date",
            Self::MappingList => "list of mappings",
            Self::NonEmptyMappingList => "non-empty list of mappings",
            Self::PatentType => "patent type",
        })
    }
}

/// One field that failed validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldViolation {
    pub field: &'static str,
    pub expected: FieldKind,
    /// Short rendering of the offending value
    pub found: String,
}

impl fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: expected {}, found {}", self.field, self.expected, self.found)
    }
}

/// Every violation found while validating one candidate
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{} invalid field(s): {}", .violations.len(), join_violations(.violations))]
pub struct IntegrityError {
    pub violations: Vec<FieldViolation>,
}

impl IntegrityError {
    /// Names of the violated fields, in check order
    pub fn fields(&self) -> Vec<&'static str> {
        self.violations.iter().map(|v| v.field).collect()
    }
}

fn join_violations(violations: &[FieldViolation]) -> String {
    violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Unvalidated patent fields
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatentCandidate {
    pub app_doc_id: Value,
    pub pub_doc_id: Value,
    pub patent_type: Value,
    pub date_produced: Value,
    pub date_published: Value,
    pub date_applied: Value,
    pub ipcr_list: Value,
    pub cpc_list: Value,
    pub inventors: Value,
    pub assignees: Value,
    pub invention_title: Value,
    #[serde(rename = "abstract")]
    pub abstract_text: Value,
}

impl From<ExtractedDocument> for PatentCandidate {
    fn from(doc: ExtractedDocument) -> Self {
        let date = |d: NaiveDate| Value::String(d.format("%Y-%m-%d").to_string());
        let list = |items: Vec<Mapping>| Value::Array(items.into_iter().map(Value::Object).collect());

        Self {
            app_doc_id: Value::String(doc.bibliographic.app_doc_id),
            pub_doc_id: Value::String(doc.bibliographic.pub_doc_id),
            patent_type: Value::String(doc.basics.patent_type.as_str().to_string()),
            date_produced: date(doc.basics.date_produced),
            date_published: date(doc.basics.date_published),
            date_applied: date(doc.bibliographic.date_applied),
            ipcr_list: list(doc.classifications.ipcr),
            cpc_list: list(doc.classifications.cpc),
            inventors: list(doc.parties.inventors),
            assignees: list(doc.parties.assignees),
            invention_title: Value::String(doc.bibliographic.invention_title),
            abstract_text: Value::String(doc.abstract_text),
        }
    }
}

/// A validated patent record, keyed by `app_doc_id`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patent {
    pub app_doc_id: String,
    pub pub_doc_id: String,
    pub patent_type: PatentType,
    pub date_produced: NaiveDate,
    pub date_published: NaiveDate,
    pub date_applied: NaiveDate,
    pub ipcr_list: Vec<Mapping>,
    pub cpc_list: Vec<Mapping>,
    pub inventors: Vec<Mapping>,
    pub assignees: Vec<Mapping>,
    pub invention_title: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
}

impl Patent {
    /// Validate a candidate, collecting every violation
    pub fn validate(candidate: PatentCandidate) -> Result<Patent, IntegrityError> {
        let mut check = Checker::default();

        let app_doc_id = check.key("app_doc_id", &candidate.app_doc_id);
        let pub_doc_id = check.text("pub_doc_id", &candidate.pub_doc_id);
        let patent_type = check.patent_type("patent_type", &candidate.patent_type);
        let date_produced = check.date("date_produced", &candidate.date_produced);
        let date_published = check.date("date_published", &candidate.date_published);
        let date_applied = check.date("date_applied", &candidate.date_applied);
        let ipcr_list = check.mapping_list("ipcr_list", candidate.ipcr_list);
        let cpc_list = check.mapping_list("cpc_list", candidate.cpc_list);
        let inventors = check.non_empty_mapping_list("inventors", candidate.inventors);
        let assignees = check.mapping_list("assignees", candidate.assignees);
        let invention_title = check.text("invention_title", &candidate.invention_title);
        let abstract_text = check.optional_text("abstract", &candidate.abstract_text);

        if !check.violations.is_empty() {
            return Err(IntegrityError {
                violations: check.violations,
            });
        }

        match (
            app_doc_id,
            pub_doc_id,
            patent_type,
            date_produced,
            date_published,
            date_applied,
            ipcr_list,
            cpc_list,
            inventors,
            assignees,
            invention_title,
            abstract_text,
        ) {
            (
                Some(app_doc_id),
                Some(pub_doc_id),
                Some(patent_type),
                Some(date_produced),
                Some(date_published),
                Some(date_applied),
                Some(ipcr_list),
                Some(cpc_list),
                Some(inventors),
                Some(assignees),
                Some(invention_title),
                Some(abstract_text),
            ) => Ok(Patent {
                app_doc_id,
                pub_doc_id,
                patent_type,
                date_produced,
                date_published,
                date_applied,
                ipcr_list,
                cpc_list,
                inventors,
                assignees,
                invention_title,
                abstract_text,
            }),
            // Every `None` above pushed a violation
            _ => Err(IntegrityError {
                violations: check.violations,
            }),
        }
    }

    /// Build and validate straight from extraction output
    pub fn from_extracted(doc: ExtractedDocument) -> Result<Patent, IntegrityError> {
        Self::validate(PatentCandidate::from(doc))
    }

    /// Full JSON document as written to the index
    pub fn to_document(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

#[derive(Default)]
struct Checker {
    violations: Vec<FieldViolation>,
}

impl Checker {
    fn fail(&mut self, field: &'static str, expected: FieldKind, value: &Value) {
        self.violations.push(FieldViolation {
            field,
            expected,
            found: describe(value),
        });
    }

    fn text(&mut self, field: &'static str, value: &Value) -> Option<String> {
        match value {
            Value::String(s) => Some(s.clone()),
            other => {
                self.fail(field, FieldKind::Text, other);
                None
            }
        }
    }

    /// The index key must also be non-blank
    fn key(&mut self, field: &'static str, value: &Value) -> Option<String> {
        match value {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            other => {
                self.fail(field, FieldKind::Text, other);
                None
            }
        }
    }

    fn optional_text(&mut self, field: &'static str, value: &Value) -> Option<String> {
        match value {
            Value::Null => Some(String::new()),
            other => self.text(field, other),
        }
    }

    fn date(&mut self, field: &'static str, value: &Value) -> Option<NaiveDate> {
        let parsed = value.as_str().and_then(|s| {
            DATE_FORMATS
                .iter()
                .find_map(|format| NaiveDate::parse_from_str(s.trim(), format).ok())
        });
        if parsed.is_none() {
            self.fail(field, FieldKind::Date, value);
        }
        parsed
    }

    fn patent_type(&mut self, field: &'static str, value: &Value) -> Option<PatentType> {
        let parsed = value.as_str().and_then(PatentType::from_discriminator);
        if parsed.is_none() {
            self.fail(field, FieldKind::PatentType, value);
        }
        parsed
    }

    fn mapping_list(&mut self, field: &'static str, value: Value) -> Option<Vec<Mapping>> {
        match value {
            Value::Null => Some(Vec::new()),
            Value::Array(items) if items.iter().all(Value::is_object) => Some(
                items
                    .into_iter()
                    .filter_map(|item| match item {
                        Value::Object(mapping) => Some(mapping),
                        _ => None,
                    })
                    .collect(),
            ),
            other => {
                self.fail(field, FieldKind::MappingList, &other);
                None
            }
        }
    }

    fn non_empty_mapping_list(&mut self, field: &'static str, value: Value) -> Option<Vec<Mapping>> {
        if matches!(&value, Value::Array(items) if !items.is_empty() && items.iter().all(Value::is_object))
        {
            return self.mapping_list(field, value);
        }
        self.fail(field, FieldKind::NonEmptyMappingList, &value);
        None
    }
}

/// Short, log-friendly description of a JSON value
fn describe(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => format!("boolean {}", b),
        Value::Number(n) => format!("number {}", n),
        Value::String(s) if s.chars().count() > 40 => {
            let head: String = s.chars().take(37).collect();
            format!("string \"{}...\"", head)
        }
        Value::String(s) => format!("string \"{}\"", s),
        Value::Array(items) => format!("array of {} item(s)", items.len()),
        Value::Object(_) => "object".to_string(),
    }
}
