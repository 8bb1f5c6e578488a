//! Core types shared across the ingestion pipeline and the index backends

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Structured rendering of one XML element (classification entry, party, ...)
pub type Mapping = serde_json::Map<String, serde_json::Value>;

/// Index key of a patent record (the application document number)
pub type AppDocId = String;

/// Kind of patent document.
///
/// The kind selects the XML schema used for extraction and the precedence
/// class used when an existing index record is about to be replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatentType {
    #[serde(alias = "us-patent-grant")]
    Grant,
    #[serde(alias = "us-patent-application")]
    Application,
}

impl PatentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Grant => "grant",
            Self::Application => "application",
        }
    }

    /// Root element name of a document of this kind
    pub fn root_tag(&self) -> &'static str {
        match self {
            Self::Grant => "us-patent-grant",
            Self::Application => "us-patent-application",
        }
    }

    /// Name of the bibliographic block nested directly under the root
    pub fn bibliographic_tag(&self) -> &'static str {
        match self {
            Self::Grant => "us-bibliographic-data-grant",
            Self::Application => "us-bibliographic-data-application",
        }
    }

    /// Parse either the short name (`grant`) or the root discriminator
    /// spelling (`us-patent-grant`).
    pub fn from_discriminator(value: &str) -> Option<Self> {
        match value.trim() {
            "grant" | "us-patent-grant" => Some(Self::Grant),
            "application" | "us-patent-application" => Some(Self::Application),
            _ => None,
        }
    }
}

impl fmt::Display for PatentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PatentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_discriminator(s).ok_or_else(|| format!("unknown patent type: {}", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discriminator_spellings() {
        assert_eq!(PatentType::from_discriminator("us-patent-grant"), Some(PatentType::Grant));
        assert_eq!(PatentType::from_discriminator("application"), Some(PatentType::Application));
        assert_eq!(PatentType::from_discriminator("us-patent-reissue"), None);
    }

    #[test]
    fn test_serde_accepts_legacy_spelling() {
        let legacy: PatentType = serde_json::from_str("\"us-patent-application\"").unwrap();
        assert_eq!(legacy, PatentType::Application);
        assert_eq!(serde_json::to_string(&PatentType::Grant).unwrap(), "\"grant\"");
    }

    #[test]
    fn test_tag_names() {
        assert_eq!(PatentType::Grant.root_tag(), "us-patent-grant");
        assert_eq!(
            PatentType::Application.bibliographic_tag(),
            "us-bibliographic-data-application"
        );
    }
}
