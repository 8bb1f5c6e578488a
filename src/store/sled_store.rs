//! Embedded on-disk patent store
//!
//! Records live in the `patents` tree as JSON envelopes carrying the record
//! version next to the document. Conditional writes are a single
//! `compare_and_swap` against the exact bytes that were checked, so two
//! processes sharing the database cannot silently overwrite each other.

use super::{check_condition, IndexSchema, PatentStore, RecordVersion, StoreError, StoredRecord, WriteCondition};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::debug;

const DB_FILE: &str = "patents.sled";
const RECORDS_TREE: &str = "patents";
const META_TREE: &str = "meta";
const SCHEMA_KEY: &[u8] = b"schema";

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    version: RecordVersion,
    source: Value,
}

impl From<sled::Error> for StoreError {
    fn from(e: sled::Error) -> Self {
        match e {
            sled::Error::Io(io) => StoreError::Io(io),
            other => StoreError::Database(other.to_string()),
        }
    }
}

/// Patent store backed by a sled database
pub struct SledStore {
    path: PathBuf,
    db: sled::Db,
    records: sled::Tree,
    meta: sled::Tree,
}

impl SledStore {
    /// Open or create the database under `data_dir`
    pub fn open(data_dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let data_dir = data_dir.as_ref();
        std::fs::create_dir_all(data_dir)?;

        let path = data_dir.join(DB_FILE);
        let db = sled::open(&path)?;
        let records = db.open_tree(RECORDS_TREE)?;
        let meta = db.open_tree(META_TREE)?;

        Ok(Self {
            path,
            db,
            records,
            meta,
        })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Field names recorded by `create_index`, if it ran
    pub fn schema_fields(&self) -> Result<Option<Vec<(String, String)>>, StoreError> {
        match self.meta.get(SCHEMA_KEY)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn decode(bytes: &[u8]) -> Result<Envelope, StoreError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

impl PatentStore for SledStore {
    fn create_index(&self, schema: &IndexSchema) -> Result<(), StoreError> {
        let fields: Vec<(&str, &str)> = schema
            .fields
            .iter()
            .map(|(name, mapping)| (*name, mapping.as_str()))
            .collect();
        let bytes = serde_json::to_vec(&fields)?;

        // Existing schema wins
        if self
            .meta
            .compare_and_swap(SCHEMA_KEY, None as Option<&[u8]>, Some(bytes))?
            .is_err()
        {
            debug!("Index already exists at {}", self.path.display());
        }
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<StoredRecord>, StoreError> {
        match self.records.get(id.as_bytes())? {
            Some(bytes) => {
                let envelope = Self::decode(&bytes)?;
                Ok(Some(StoredRecord {
                    id: id.to_string(),
                    version: envelope.version,
                    source: envelope.source,
                }))
            }
            None => Ok(None),
        }
    }

    fn upsert(
        &self,
        id: &str,
        document: &Value,
        condition: WriteCondition,
    ) -> Result<RecordVersion, StoreError> {
        let current = self.records.get(id.as_bytes())?;
        let current_version = match current {
            Some(ref bytes) => Some(Self::decode(bytes)?.version),
            None => None,
        };
        let version = check_condition(id, current_version, condition)?;

        let envelope = Envelope {
            version,
            source: document.clone(),
        };
        let bytes = serde_json::to_vec(&envelope)?;

        // Someone else wrote between the read and the swap
        if self
            .records
            .compare_and_swap(id.as_bytes(), current, Some(bytes))?
            .is_err()
        {
            return Err(StoreError::VersionConflict(id.to_string()));
        }
        Ok(version)
    }

    fn flush(&self) -> Result<(), StoreError> {
        self.db.flush()?;
        Ok(())
    }

    fn name(&self) -> String {
        format!("sled ({})", self.path.display())
    }
}
