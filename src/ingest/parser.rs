//! Field extraction from one framed patent document
//!
//! Grant and application documents share their layout except for the name of
//! the bibliographic block (`us-bibliographic-data-grant` vs
//! `us-bibliographic-data-application`). Extraction is split into named
//! records so every stage can be tested on its own:
//!
//! - [`DocumentBasics`]: root discriminator and publication dates
//! - [`BibliographicCore`]: identifiers, filing date, title
//! - [`Classifications`]: IPCR and CPC entries, empty when absent
//! - [`Parties`]: inventors (required) and assignees (empty when absent)
//! - the abstract's first paragraph, kept with its inline markup

use super::xml::XmlElement;
use crate::types::{Mapping, PatentType};
use chrono::NaiveDate;
use thiserror::Error;

/// Date layout used by the dumps
const DUMP_DATE_FORMAT: &str = "%Y%m%d";

/// Id of the paragraph that carries the abstract text
const ABSTRACT_PARAGRAPH_ID: &str = "p-0001";

/// Errors that make a fragment unusable
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("malformed XML: {0}")]
    Malformed(String),

    #[error("expected <{expected}> root, found <{found}>")]
    UnexpectedRoot { expected: String, found: String },

    #[error("missing root attribute `{0}`")]
    MissingAttribute(&'static str),

    #[error("document declares type `{found}` but `{declared}` was requested")]
    TypeMismatch { declared: PatentType, found: String },

    #[error("missing required element `{0}`")]
    MissingNode(String),

    #[error("invalid date `{value}` in `{field}`")]
    InvalidDate { field: &'static str, value: String },
}

/// Root-level facts about the document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentBasics {
    pub patent_type: PatentType,
    pub date_produced: NaiveDate,
    pub date_published: NaiveDate,
}

/// Required identifiers from the bibliographic block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BibliographicCore {
    pub pub_doc_id: String,
    pub app_doc_id: String,
    pub date_applied: NaiveDate,
    pub invention_title: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Classifications {
    pub ipcr: Vec<Mapping>,
    pub cpc: Vec<Mapping>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Parties {
    pub inventors: Vec<Mapping>,
    pub assignees: Vec<Mapping>,
}

/// Everything extracted from one fragment, before validation
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedDocument {
    pub basics: DocumentBasics,
    pub bibliographic: BibliographicCore,
    pub classifications: Classifications,
    pub parties: Parties,
    pub abstract_text: String,
}

/// Parse one fragment of the declared kind
pub fn extract_document(
    fragment: &str,
    patent_type: PatentType,
) -> Result<ExtractedDocument, ExtractionError> {
    let root = XmlElement::parse(fragment).map_err(ExtractionError::Malformed)?;

    if root.name != patent_type.root_tag() {
        return Err(ExtractionError::UnexpectedRoot {
            expected: patent_type.root_tag().to_string(),
            found: root.name,
        });
    }

    let basics = extract_basics(&root, patent_type)?;

    let bib = root
        .child(patent_type.bibliographic_tag())
        .ok_or_else(|| ExtractionError::MissingNode(patent_type.bibliographic_tag().to_string()))?;

    Ok(ExtractedDocument {
        basics,
        bibliographic: extract_bibliographic(bib)?,
        classifications: extract_classifications(bib),
        parties: extract_parties(bib)?,
        abstract_text: extract_abstract(&root),
    })
}

/// Type discriminator and publication dates from the root attributes
pub fn extract_basics(
    root: &XmlElement,
    declared: PatentType,
) -> Result<DocumentBasics, ExtractionError> {
    let discriminator = root.attr("id").ok_or(ExtractionError::MissingAttribute("id"))?;
    let patent_type = match PatentType::from_discriminator(discriminator) {
        Some(found) if found == declared => found,
        _ => {
            return Err(ExtractionError::TypeMismatch {
                declared,
                found: discriminator.to_string(),
            })
        }
    };

    let date_produced = parse_date(
        "date-produced",
        root.attr("date-produced")
            .ok_or(ExtractionError::MissingAttribute("date-produced"))?,
    )?;
    let date_published = parse_date(
        "date-publ",
        root.attr("date-publ")
            .ok_or(ExtractionError::MissingAttribute("date-publ"))?,
    )?;

    Ok(DocumentBasics {
        patent_type,
        date_produced,
        date_published,
    })
}

pub fn extract_bibliographic(bib: &XmlElement) -> Result<BibliographicCore, ExtractionError> {
    let publication = required(bib, "publication-reference")?;
    let application = required(bib, "application-reference")?;

    let pub_doc_id = required_text(publication, "doc-number", "publication-reference/doc-number")?;
    let app_doc_id = required_text(application, "doc-number", "application-reference/doc-number")?;
    let date_applied = parse_date(
        "application-reference/date",
        &required_text(application, "date", "application-reference/date")?,
    )?;
    let invention_title = required_text(bib, "invention-title", "invention-title")?;

    Ok(BibliographicCore {
        pub_doc_id,
        app_doc_id,
        date_applied,
        invention_title,
    })
}

pub fn extract_classifications(bib: &XmlElement) -> Classifications {
    Classifications {
        ipcr: container_entries(bib, "classifications-ipcr"),
        cpc: container_entries(bib, "classifications-cpc"),
    }
}

pub fn extract_parties(bib: &XmlElement) -> Result<Parties, ExtractionError> {
    let inventors = bib
        .find("us-parties")
        .and_then(|parties| parties.find("inventors"))
        .ok_or_else(|| ExtractionError::MissingNode("us-parties/inventors".to_string()))?;

    let inventors: Vec<Mapping> = inventors
        .elements()
        .filter(|e| e.name == "inventor")
        .map(XmlElement::to_mapping)
        .collect();
    if inventors.is_empty() {
        return Err(ExtractionError::MissingNode(
            "us-parties/inventors/inventor".to_string(),
        ));
    }

    Ok(Parties {
        inventors,
        assignees: container_entries(bib, "assignees"),
    })
}

/// First paragraph of the abstract, children serialized back to XML
pub fn extract_abstract(root: &XmlElement) -> String {
    let Some(section) = root.find("abstract") else {
        return String::new();
    };

    let is_first_paragraph =
        |e: &XmlElement| e.name == "p" && e.attr("id") == Some(ABSTRACT_PARAGRAPH_ID);
    section
        .find_where(&is_first_paragraph)
        .or_else(|| section.find("p"))
        .map(XmlElement::inner_xml)
        .unwrap_or_default()
}

/// Every element child of an optional container; empty when it is absent
fn container_entries(bib: &XmlElement, container: &str) -> Vec<Mapping> {
    bib.find(container)
        .map(|c| c.elements().map(XmlElement::to_mapping).collect())
        .unwrap_or_default()
}

fn required<'a>(parent: &'a XmlElement, name: &str) -> Result<&'a XmlElement, ExtractionError> {
    parent
        .find(name)
        .ok_or_else(|| ExtractionError::MissingNode(name.to_string()))
}

fn required_text(
    parent: &XmlElement,
    name: &str,
    path: &str,
) -> Result<String, ExtractionError> {
    let text = required(parent, name)
        .map_err(|_| ExtractionError::MissingNode(path.to_string()))?
        .text();
    let text = text.trim();
    if text.is_empty() {
        return Err(ExtractionError::MissingNode(path.to_string()));
    }
    Ok(text.to_string())
}

fn parse_date(field: &'static str, value: &str) -> Result<NaiveDate, ExtractionError> {
    NaiveDate::parse_from_str(value.trim(), DUMP_DATE_FORMAT).map_err(|_| {
        ExtractionError::InvalidDate {
            field,
            value: value.to_string(),
        }
    })
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::types::PatentType;

    /// Optional sections of a fixture document
    pub struct Sections {
        pub title: bool,
        pub inventors: bool,
        pub assignees: bool,
        pub classifications: bool,
        pub abstract_text: bool,
    }

    impl Default for Sections {
        fn default() -> Self {
            Self {
                title: true,
                inventors: true,
                assignees: true,
                classifications: true,
                abstract_text: true,
            }
        }
    }

    /// A document shaped like the weekly bulk dumps
    pub fn document(patent_type: PatentType, app_doc_id: &str, sections: Sections) -> String {
        let root = patent_type.root_tag();
        let bib = patent_type.bibliographic_tag();

        let classifications = if sections.classifications {
            r#"<classifications-ipcr>
<classification-ipcr><section>G</section><class>06</class><subclass>F</subclass><main-group>16</main-group></classification-ipcr>
<classification-ipcr><section>H</section><class>04</class><subclass>L</subclass><main-group>67</main-group></classification-ipcr>
</classifications-ipcr>
<classifications-cpc><main-cpc><classification-cpc><section>G</section><class>06</class></classification-cpc></main-cpc></classifications-cpc>"#
        } else {
            ""
        };
        let title = if sections.title {
            r#"<invention-title id="d2e53">Adaptive widget coupling</invention-title>"#
        } else {
            ""
        };
        let inventors = if sections.inventors {
            r#"<inventors>
<inventor sequence="001" designation="us-only"><addressbook><last-name>Okafor</last-name><first-name>Ada</first-name><address><city>Austin</city><state>TX</state><country>US</country></address></addressbook></inventor>
<inventor sequence="002" designation="us-only"><addressbook><last-name>Lindqvist</last-name><first-name>Per</first-name></addressbook></inventor>
</inventors>"#
        } else {
            ""
        };
        let assignees = if sections.assignees {
            r#"<assignees><assignee><addressbook><orgname>Widget Labs, Inc.</orgname><role>02</role></addressbook></assignee></assignees>"#
        } else {
            ""
        };
        let abstract_text = if sections.abstract_text {
            r#"<abstract id="abstract">
<p id="p-0001" num="0000">A coupling that adapts to <i>load</i> &amp; heat.</p>
</abstract>"#
        } else {
            ""
        };

        format!(
            r#"<{root} lang="EN" dtd-version="v4.7 2022-02-17" file="US{app_doc_id}-20240102.XML" status="PRODUCTION" id="{root}" country="US" date-produced="20231218" date-publ="20240102">
<{bib}>
<publication-reference><document-id><country>US</country><doc-number>P{app_doc_id}</doc-number><kind>B2</kind><date>20240102</date></document-id></publication-reference>
<application-reference appl-type="utility"><document-id><country>US</country><doc-number>{app_doc_id}</doc-number><date>20210315</date></document-id></application-reference>
{classifications}
{title}
<us-parties>
<us-applicants><us-applicant sequence="001" app-type="applicant"><addressbook><orgname>Widget Labs, Inc.</orgname></addressbook></us-applicant></us-applicants>
{inventors}
</us-parties>
{assignees}
</{bib}>
{abstract_text}
<description id="description"><p id="p-0002" num="0001">Body text.</p></description>
</{root}>"#
        )
    }
}
