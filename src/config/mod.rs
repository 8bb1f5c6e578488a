//! Configuration for patdex

mod ingest;
mod logging;
mod store;

pub use ingest::IngestConfig;
pub use logging::{LogFormat, LogLevel, LoggingConfig};
pub use store::{ElasticsearchConfig, StoreBackend, StoreConfig};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Name of the file written by `patdex init`
pub const DEFAULT_CONFIG_FILE: &str = "patdex.toml";

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Index backend selection
    #[serde(default)]
    pub store: StoreConfig,
    /// Elasticsearch connection (used by the `elasticsearch` backend)
    #[serde(default)]
    pub elasticsearch: ElasticsearchConfig,
    /// Dump ingestion settings
    #[serde(default)]
    pub ingest: IngestConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file and validate it
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
        let config = Self::from_toml(&content)
            .with_context(|| format!("Invalid config file '{}'", path.display()))?;
        Ok(config)
    }

    /// Parse and validate TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).context("Failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` when it exists, defaults otherwise
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Validate all configuration fields.
    ///
    /// Every problem is collected and reported together.
    pub fn validate(&self) -> Result<()> {
        let mut errors: Vec<String> = Vec::new();

        if self.store.backend == StoreBackend::Sled && self.store.data_dir.as_os_str().is_empty() {
            errors.push("store.data_dir must not be empty".to_string());
        }

        if self.store.backend == StoreBackend::Elasticsearch {
            let es = &self.elasticsearch;
            if es.host.trim().is_empty() {
                errors.push("elasticsearch.host must not be empty".to_string());
            } else if !(es.host.starts_with("http://") || es.host.starts_with("https://")) {
                errors.push(format!(
                    "elasticsearch.host must start with http:// or https://, got '{}'",
                    es.host
                ));
            }
            if es.index.trim().is_empty() {
                errors.push("elasticsearch.index must not be empty".to_string());
            } else if es.index != es.index.to_lowercase() {
                errors.push(format!("elasticsearch.index must be lowercase, got '{}'", es.index));
            }
            if es.timeout_secs == 0 {
                errors.push("elasticsearch.timeout_secs must be positive".to_string());
            }
            if es.password.is_some() && es.username.is_none() {
                errors.push("elasticsearch.password is set without elasticsearch.username".to_string());
            }
        }

        if self.ingest.checkpoint_interval == 0 {
            errors.push("ingest.checkpoint_interval must be positive".to_string());
        }
        if self.ingest.retry_backoff_ms > 60_000 {
            errors.push("ingest.retry_backoff_ms must be <= 60000".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            anyhow::bail!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PatentType;
    use std::path::PathBuf;

    fn elasticsearch_config() -> Config {
        let mut cfg = Config::default();
        cfg.store.backend = StoreBackend::Elasticsearch;
        cfg
    }

    #[test]
    fn default_config_passes_validation() {
        assert!(Config::default().validate().is_ok());
        assert!(elasticsearch_config().validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_data_dir() {
        let mut cfg = Config::default();
        cfg.store.data_dir = PathBuf::new();
        let err = cfg.validate().unwrap_err().to_string();
        assert!(err.contains("data_dir"));
    }

    #[test]
    fn validate_rejects_host_without_scheme() {
        let mut cfg = elasticsearch_config();
        cfg.elasticsearch.host = "localhost:9200".to_string();
        let err = cfg.validate().unwrap_err().to_string();
        assert!(err.contains("http://"));
    }

    #[test]
    fn validate_ignores_elasticsearch_for_other_backends() {
        let mut cfg = Config::default();
        cfg.elasticsearch.host = String::new();
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn validate_rejects_zero_checkpoint_interval() {
        let mut cfg = Config::default();
        cfg.ingest.checkpoint_interval = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_collects_all_errors() {
        let mut cfg = elasticsearch_config();
        cfg.elasticsearch.index = "Patents".to_string();
        cfg.elasticsearch.timeout_secs = 0;
        cfg.ingest.checkpoint_interval = 0;

        let err = cfg.validate().unwrap_err().to_string();
        assert!(err.contains("lowercase"));
        assert!(err.contains("timeout_secs"));
        assert!(err.contains("checkpoint_interval"));
    }

    #[test]
    fn parse_partial_toml_uses_defaults() {
        let cfg = Config::from_toml(
            r#"
[store]
backend = "elasticsearch"

[elasticsearch]
host = "https://es.internal:9200"
index = "uspto"
verify_certs = false

[ingest]
grant_data_path = "/data/ipg240102.xml"
"#,
        )
        .unwrap();

        assert_eq!(cfg.store.backend, StoreBackend::Elasticsearch);
        assert_eq!(cfg.elasticsearch.index, "uspto");
        assert!(!cfg.elasticsearch.verify_certs);
        assert_eq!(cfg.elasticsearch.timeout_secs, 30);
        assert_eq!(
            cfg.ingest.data_path(PatentType::Grant),
            Some(&PathBuf::from("/data/ipg240102.xml"))
        );
        assert!(cfg.ingest.data_path(PatentType::Application).is_none());
        assert_eq!(cfg.ingest.checkpoint_interval, 1000);
        assert_eq!(cfg.logging.level, LogLevel::Info);
    }

    #[test]
    fn parse_rejects_unknown_backend() {
        assert!(Config::from_toml("[store]\nbackend = \"postgres\"\n").is_err());
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        std::fs::write(&path, "[logging]\nformat = \"json\"\n").unwrap();

        let cfg = Config::load(&path).unwrap();
        assert_eq!(cfg.logging.format, LogFormat::Json);

        let missing = Config::load_or_default(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(missing.store.backend, StoreBackend::Sled);
    }
}
