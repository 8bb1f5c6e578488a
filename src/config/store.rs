//! Index backend configuration

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Which index backend receives patent records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Sled,
    Elasticsearch,
    Memory,
}

impl fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Sled => "sled",
            Self::Elasticsearch => "elasticsearch",
            Self::Memory => "memory",
        })
    }
}

/// Index backend selection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_backend")]
    pub backend: StoreBackend,
    /// Directory of the embedded database
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

fn default_backend() -> StoreBackend {
    StoreBackend::Sled
}

fn default_data_dir() -> PathBuf {
    directories::ProjectDirs::from("", "", "patdex")
        .map(|d| d.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".patdex"))
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            data_dir: default_data_dir(),
        }
    }
}

/// Connection settings for the Elasticsearch backend
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ElasticsearchConfig {
    /// Base URL, e.g. `https://localhost:9200`
    pub host: String,
    pub index: String,
    /// Falls back to `ELASTIC_USERNAME`
    pub username: Option<String>,
    /// Falls back to `ELASTIC_PASSWORD`
    pub password: Option<String>,
    pub verify_certs: bool,
    pub timeout_secs: u64,
}

impl Default for ElasticsearchConfig {
    fn default() -> Self {
        Self {
            host: "https://localhost:9200".to_string(),
            index: "patents".to_string(),
            username: None,
            password: None,
            verify_certs: true,
            timeout_secs: 30,
        }
    }
}
