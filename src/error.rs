//! Error types for the stamp-sign library.
//!
//! Only structural faults live here. Expected verification outcomes (a bad
//! signature, an unknown identifier, an unknown hash) are reported as values
//! by the verifier, and per-placement stamping problems are collected in the
//! stamp report instead of aborting the call.

use thiserror::Error;

/// The main error type for stamp-sign operations.
#[derive(Error, Debug)]
pub enum SignError {
    /// No key material is loaded for the requested operation.
    #[error("Key unavailable: {0}")]
    KeyUnavailable(&'static str),

    /// Invalid key format, encoding or size.
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Error from the RSA implementation while signing.
    #[error("RSA error: {0}")]
    Rsa(#[from] rsa::Error),

    /// Error reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Error with JSON serialization/deserialization.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Error with base64 encoding/decoding.
    #[error("Base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    /// The source document could not be parsed into pages.
    #[error("Unparsable document: {0}")]
    UnparsableDocument(String),

    /// Error while editing or writing the PDF object graph.
    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    /// The record store failed in a way unrelated to the stored data.
    #[error("Record store error: {0}")]
    Store(String),

    /// Error from the SQLite record store.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A different record is already stored under the same identifier.
    #[error("Identifier collision: {identifier} is already bound to a different record")]
    IdentifierCollision { identifier: String },

    /// Invalid record or input format.
    #[error("Invalid format: {0}")]
    InvalidFormat(String),
}

/// Result type alias for stamp-sign operations.
pub type Result<T> = std::result::Result<T, SignError>;
