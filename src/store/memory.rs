//! In-process patent store

use super::{check_condition, IndexSchema, PatentStore, RecordVersion, StoreError, StoredRecord, WriteCondition};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;

/// Map-backed store; contents are lost on drop
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<String, (RecordVersion, Value)>>,
    schema: RwLock<Option<IndexSchema>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    pub fn has_index(&self) -> bool {
        self.schema.read().is_some()
    }
}

impl PatentStore for MemoryStore {
    fn create_index(&self, schema: &IndexSchema) -> Result<(), StoreError> {
        let mut current = self.schema.write();
        if current.is_none() {
            *current = Some(schema.clone());
        }
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<StoredRecord>, StoreError> {
        Ok(self.records.read().get(id).map(|(version, source)| StoredRecord {
            id: id.to_string(),
            version: *version,
            source: source.clone(),
        }))
    }

    fn upsert(
        &self,
        id: &str,
        document: &Value,
        condition: WriteCondition,
    ) -> Result<RecordVersion, StoreError> {
        let mut records = self.records.write();
        let current = records.get(id).map(|(version, _)| *version);
        let version = check_condition(id, current, condition)?;
        records.insert(id.to_string(), (version, document.clone()));
        Ok(version)
    }

    fn flush(&self) -> Result<(), StoreError> {
        Ok(())
    }

    fn name(&self) -> String {
        "memory".to_string()
    }
}
