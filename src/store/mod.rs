//! Patent index backends
//!
//! The ingest pipeline only needs four operations from the system of record:
//! create the index, read one record, conditionally replace one record, and
//! flush. [`PatentStore`] captures that contract; three backends implement it:
//!
//! - [`SledStore`]: embedded on-disk store (default)
//! - [`ElasticsearchStore`]: remote index over the REST API
//! - [`MemoryStore`]: in-process map for tests and dry runs
//!
//! Writes are optimistic: each record carries a [`RecordVersion`] and every
//! upsert states the version it expects to replace, so an interleaving writer
//! surfaces as [`StoreError::VersionConflict`] instead of a lost update.

mod elasticsearch;
mod memory;
mod schema;
mod sled_store;

pub use elasticsearch::ElasticsearchStore;
pub use memory::MemoryStore;
pub use schema::{FieldMapping, IndexSchema};
pub use sled_store::SledStore;

use crate::config::{Config, StoreBackend};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Optimistic-concurrency token of a stored record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordVersion {
    pub seq_no: u64,
    pub primary_term: u64,
}

impl RecordVersion {
    /// Version of a freshly created record
    pub fn initial() -> Self {
        Self {
            seq_no: 0,
            primary_term: 1,
        }
    }

    pub fn next(&self) -> Self {
        Self {
            seq_no: self.seq_no + 1,
            primary_term: self.primary_term,
        }
    }
}

/// A record as currently held by the index
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    pub id: String,
    pub version: RecordVersion,
    pub source: Value,
}

/// Precondition attached to a write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteCondition {
    /// Only create; fail if a record already exists
    Absent,
    /// Only replace the record at exactly this version
    Matches(RecordVersion),
}

/// Index backend errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// Worth retrying (connection reset, timeout, throttling, 5xx)
    #[error("transient store failure: {0}")]
    Transient(String),

    #[error("version conflict on `{0}`")]
    VersionConflict(String),

    /// The store refused the request outright
    #[error("rejected by store: {0}")]
    Rejected(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("database error: {0}")]
    Database(String),
}

impl StoreError {
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Transient(_))
    }
}

/// Minimal contract consumed from the system of record
pub trait PatentStore {
    /// Create the index if it does not exist yet
    fn create_index(&self, schema: &IndexSchema) -> Result<(), StoreError>;

    fn get(&self, id: &str) -> Result<Option<StoredRecord>, StoreError>;

    /// Replace the whole document stored under `id`, subject to `condition`
    fn upsert(
        &self,
        id: &str,
        document: &Value,
        condition: WriteCondition,
    ) -> Result<RecordVersion, StoreError>;

    /// Persist buffered writes
    fn flush(&self) -> Result<(), StoreError>;

    /// Human-readable backend description
    fn name(&self) -> String;
}

impl<S: PatentStore + ?Sized> PatentStore for Box<S> {
    fn create_index(&self, schema: &IndexSchema) -> Result<(), StoreError> {
        (**self).create_index(schema)
    }

    fn get(&self, id: &str) -> Result<Option<StoredRecord>, StoreError> {
        (**self).get(id)
    }

    fn upsert(
        &self,
        id: &str,
        document: &Value,
        condition: WriteCondition,
    ) -> Result<RecordVersion, StoreError> {
        (**self).upsert(id, document, condition)
    }

    fn flush(&self) -> Result<(), StoreError> {
        (**self).flush()
    }

    fn name(&self) -> String {
        (**self).name()
    }
}

/// Open the backend selected in the configuration
pub fn open_store(config: &Config) -> Result<Box<dyn PatentStore>, StoreError> {
    let store: Box<dyn PatentStore> = match config.store.backend {
        StoreBackend::Sled => Box::new(SledStore::open(&config.store.data_dir)?),
        StoreBackend::Elasticsearch => Box::new(ElasticsearchStore::new(&config.elasticsearch)?),
        StoreBackend::Memory => Box::new(MemoryStore::new()),
    };
    Ok(store)
}

/// Check a write precondition against the version currently stored
pub(crate) fn check_condition(
    id: &str,
    current: Option<RecordVersion>,
    condition: WriteCondition,
) -> Result<RecordVersion, StoreError> {
    match (condition, current) {
        (WriteCondition::Absent, None) => Ok(RecordVersion::initial()),
        (WriteCondition::Matches(expected), Some(actual)) if expected == actual => {
            Ok(actual.next())
        }
        _ => Err(StoreError::VersionConflict(id.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_condition_checks() {
        let v = RecordVersion::initial();

        assert_eq!(check_condition("a", None, WriteCondition::Absent).unwrap(), v);
        assert_eq!(
            check_condition("a", Some(v), WriteCondition::Matches(v)).unwrap(),
            v.next()
        );
        assert!(matches!(
            check_condition("a", Some(v), WriteCondition::Absent),
            Err(StoreError::VersionConflict(_))
        ));
        assert!(matches!(
            check_condition("a", None, WriteCondition::Matches(v)),
            Err(StoreError::VersionConflict(_))
        ));
        assert!(matches!(
            check_condition("a", Some(v.next()), WriteCondition::Matches(v)),
            Err(StoreError::VersionConflict(_))
        ));
    }
}
