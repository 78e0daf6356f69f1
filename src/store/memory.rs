use super::{classify_existing, InsertOutcome, RecordStore};
use crate::error::{Result, SignError};
use crate::signature::SignatureRecord;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Default)]
struct State {
    records: HashMap<String, SignatureRecord>,
    order: Vec<String>,
}

/// In-process record store. Lost on restart.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    state: RwLock<State>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.read().map(|s| s.records.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, State>> {
        self.state
            .read()
            .map_err(|_| SignError::Store("memory store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, State>> {
        self.state
            .write()
            .map_err(|_| SignError::Store("memory store lock poisoned".to_string()))
    }
}

impl RecordStore for MemoryRecordStore {
    fn get(&self, identifier: &str) -> Result<Option<SignatureRecord>> {
        Ok(self.read()?.records.get(identifier).cloned())
    }

    fn get_by_document_hash(&self, document_hash: &str) -> Result<Option<SignatureRecord>> {
        let state = self.read()?;
        Ok(state
            .order
            .iter()
            .filter_map(|id| state.records.get(id))
            .find(|r| r.document_hash == document_hash)
            .cloned())
    }

    fn insert_if_absent(&self, record: &SignatureRecord) -> Result<InsertOutcome> {
        let mut state = self.write()?;
        if let Some(existing) = state.records.get(&record.identifier) {
            return Ok(classify_existing(existing.clone(), record));
        }
        state.order.push(record.identifier.clone());
        state
            .records
            .insert(record.identifier.clone(), record.clone());
        Ok(InsertOutcome::Inserted)
    }
}
