//! Durable storage for signature records.
//!
//! Records are keyed by identifier and append-only. Implementations must
//! make [`RecordStore::insert_if_absent`] atomic, so two concurrent inserts
//! of the same identifier never produce two rows.

mod memory;
mod sqlite;

pub use memory::MemoryRecordStore;
pub use sqlite::SqliteRecordStore;

use crate::error::Result;
use crate::signature::SignatureRecord;

/// What happened on an insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The record was stored.
    Inserted,
    /// An identical record was already stored.
    AlreadyPresent,
    /// A record with different signed content holds the identifier.
    Conflict(Box<SignatureRecord>),
}

/// Keyed storage for signature records.
pub trait RecordStore: Send + Sync {
    /// Look up a record by identifier.
    fn get(&self, identifier: &str) -> Result<Option<SignatureRecord>>;

    /// The first stored record for a document hash.
    fn get_by_document_hash(&self, document_hash: &str) -> Result<Option<SignatureRecord>>;

    /// Store the record unless its identifier is already taken.
    fn insert_if_absent(&self, record: &SignatureRecord) -> Result<InsertOutcome>;
}

pub(crate) fn classify_existing(existing: SignatureRecord, record: &SignatureRecord) -> InsertOutcome {
    if existing.same_signed_content(record) {
        InsertOutcome::AlreadyPresent
    } else {
        InsertOutcome::Conflict(Box::new(existing))
    }
}
