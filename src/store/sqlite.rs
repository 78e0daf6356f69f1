use super::{classify_existing, InsertOutcome, RecordStore};
use crate::codec::{canonical_timestamp, parse_timestamp};
use crate::error::{Result, SignError};
use crate::signature::SignatureRecord;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const SELECT_COLUMNS: &str =
    "SELECT identifier, document_hash, signer_identity, signature, timestamp, summary \
     FROM signatures";

/// Record store backed by a SQLite database.
///
/// The primary key on `identifier` is the uniqueness guarantee: inserts use
/// `INSERT OR IGNORE`, and the losing side of a race reads back the winner.
#[derive(Debug)]
pub struct SqliteRecordStore {
    conn: Mutex<Connection>,
}

impl SqliteRecordStore {
    /// Open (and migrate) a database file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_connection(Connection::open(path)?)
    }

    /// A private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS signatures (
                identifier TEXT PRIMARY KEY,
                document_hash TEXT NOT NULL,
                signer_identity TEXT NOT NULL,
                signature TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                summary TEXT
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_signatures_document_hash ON signatures(document_hash)",
            [],
        )?;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| SignError::Store("sqlite connection lock poisoned".to_string()))
    }

    fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<SignatureRecord> {
        let timestamp: String = row.get(4)?;
        let timestamp = parse_timestamp(&timestamp)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e)))?;
        Ok(SignatureRecord {
            identifier: row.get(0)?,
            document_hash: row.get(1)?,
            signer_identity: row.get(2)?,
            signature: row.get(3)?,
            timestamp,
            summary: row.get(5)?,
        })
    }

    fn query_identifier(conn: &Connection, identifier: &str) -> rusqlite::Result<Option<SignatureRecord>> {
        conn.query_row(
            &format!("{} WHERE identifier = ?1", SELECT_COLUMNS),
            params![identifier],
            Self::row_to_record,
        )
        .optional()
    }
}

impl RecordStore for SqliteRecordStore {
    fn get(&self, identifier: &str) -> Result<Option<SignatureRecord>> {
        let conn = self.lock()?;
        Ok(Self::query_identifier(&conn, identifier)?)
    }

    fn get_by_document_hash(&self, document_hash: &str) -> Result<Option<SignatureRecord>> {
        let conn = self.lock()?;
        let record = conn
            .query_row(
                &format!("{} WHERE document_hash = ?1 ORDER BY rowid ASC LIMIT 1", SELECT_COLUMNS),
                params![document_hash],
                Self::row_to_record,
            )
            .optional()?;
        Ok(record)
    }

    fn insert_if_absent(&self, record: &SignatureRecord) -> Result<InsertOutcome> {
        let conn = self.lock()?;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO signatures \
             (identifier, document_hash, signer_identity, signature, timestamp, summary) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                record.identifier,
                record.document_hash,
                record.signer_identity,
                record.signature,
                canonical_timestamp(&record.timestamp),
                record.summary,
            ],
        )?;
        if inserted == 1 {
            return Ok(InsertOutcome::Inserted);
        }

        match Self::query_identifier(&conn, &record.identifier)? {
            Some(existing) => Ok(classify_existing(existing, record)),
            None => Err(SignError::Store(format!(
                "insert of {} was ignored but no row exists",
                record.identifier
            ))),
        }
    }
}
