//! Field mappings of the patent index

use serde_json::{json, Map, Value};

/// Storage type of one indexed field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldMapping {
    Text,
    Date,
    Object,
}

impl FieldMapping {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Date => "date",
            Self::Object => "object",
        }
    }
}

/// Field name to mapping, in declaration order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSchema {
    pub fields: Vec<(&'static str, FieldMapping)>,
}

impl IndexSchema {
    /// Mapping used for patent records
    pub fn patents() -> Self {
        use FieldMapping::*;
        Self {
            fields: vec![
                ("pub_doc_id", Text),
                ("app_doc_id", Text),
                ("patent_type", Text),
                ("abstract", Text),
                ("date_produced", Date),
                ("date_published", Date),
                ("date_applied", Date),
                ("ipcr_list", Object),
                ("cpc_list", Object),
                ("inventors", Object),
                ("assignees", Object),
            ],
        }
    }

    pub fn mapping_of(&self, field: &str) -> Option<FieldMapping> {
        self.fields
            .iter()
            .find(|(name, _)| *name == field)
            .map(|(_, mapping)| *mapping)
    }

    /// Elasticsearch `mappings` body
    pub fn to_mappings(&self) -> Value {
        let properties: Map<String, Value> = self
            .fields
            .iter()
            .map(|(name, mapping)| (name.to_string(), json!({ "type": mapping.as_str() })))
            .collect();
        json!({ "properties": properties })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patent_mappings() {
        let schema = IndexSchema::patents();
        assert_eq!(schema.mapping_of("date_applied"), Some(FieldMapping::Date));
        assert_eq!(schema.mapping_of("inventors"), Some(FieldMapping::Object));
        assert_eq!(schema.mapping_of("invention_title"), None);

        let body = schema.to_mappings();
        assert_eq!(body["properties"]["abstract"]["type"], "text");
        assert_eq!(body["properties"]["cpc_list"]["type"], "object");
    }
}
