//! SHA-256 content hashing for documents.
//!
//! This is the hash the ingestion side computes over the raw file bytes. It
//! is what gets signed and what an uploaded copy is compared against.

use crate::error::{Result, SignError};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// The size of a SHA-256 digest in bytes.
pub const HASH_SIZE: usize = 32;

/// A SHA-256 hash of document content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DocumentHash([u8; HASH_SIZE]);

impl DocumentHash {
    /// Create a hash from raw bytes.
    pub fn from_bytes(bytes: [u8; HASH_SIZE]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes of the hash.
    pub fn as_bytes(&self) -> &[u8; HASH_SIZE] {
        &self.0
    }

    /// Encode the hash as a lowercase hexadecimal string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Decode a hash from a hexadecimal string (either case).
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s.trim())
            .map_err(|e| SignError::InvalidFormat(format!("Invalid hash hex: {}", e)))?;
        if bytes.len() != HASH_SIZE {
            return Err(SignError::InvalidFormat(format!(
                "Invalid hash length: expected {}, got {}",
                HASH_SIZE,
                bytes.len()
            )));
        }
        let mut arr = [0u8; HASH_SIZE];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

impl fmt::Display for DocumentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Compute the SHA-256 hash of a byte slice.
pub fn hash_bytes(data: &[u8]) -> DocumentHash {
    DocumentHash(Sha256::digest(data).into())
}

/// Compute the SHA-256 hash of a file using streaming (memory efficient).
pub fn hash_file<P: AsRef<Path>>(path: P) -> Result<DocumentHash> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    hash_reader(&mut reader)
}

/// Compute the SHA-256 hash from any reader using streaming.
pub fn hash_reader<R: Read>(reader: &mut R) -> Result<DocumentHash> {
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];

    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(DocumentHash(hasher.finalize().into()))
}
