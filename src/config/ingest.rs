//! Dump ingestion configuration

use crate::types::PatentType;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Ingest settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Default dump for `--patent-type grant`
    pub grant_data_path: Option<PathBuf>,
    /// Default dump for `--patent-type application`
    pub application_data_path: Option<PathBuf>,
    /// Save a resume checkpoint every N fragments
    pub checkpoint_interval: usize,
    /// Re-read and re-decide this many times after a version conflict
    pub max_conflict_retries: u32,
    /// Retries for transient write failures
    pub max_write_retries: u32,
    /// First retry delay; doubles on each attempt
    pub retry_backoff_ms: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            grant_data_path: None,
            application_data_path: None,
            checkpoint_interval: 1000,
            max_conflict_retries: 3,
            max_write_retries: 3,
            retry_backoff_ms: 200,
        }
    }
}

impl IngestConfig {
    /// Configured dump path for a document kind
    pub fn data_path(&self, patent_type: PatentType) -> Option<&PathBuf> {
        match patent_type {
            PatentType::Grant => self.grant_data_path.as_ref(),
            PatentType::Application => self.application_data_path.as_ref(),
        }
    }
}
