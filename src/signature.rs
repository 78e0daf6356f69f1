//! The persisted signature record and its JSON form.

use crate::codec::{build_payload, canonical_timestamp, decode_signature, derive_identifier};
use crate::error::Result;
use crate::hash::DocumentHash;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// The durable artifact of one signing event.
///
/// Records are created once and never mutated. `timestamp` is kept exactly
/// as it was signed; verification rebuilds the payload from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureRecord {
    /// Short identifier derived from the signature bytes.
    #[serde(alias = "sig_id")]
    pub identifier: String,

    /// Hex SHA-256 of the signed document bytes.
    #[serde(alias = "doc_hash")]
    pub document_hash: String,

    /// The attesting party, usually an email address.
    #[serde(alias = "signer_email")]
    pub signer_identity: String,

    /// RSA-PSS signature over the canonical payload (base64).
    pub signature: String,

    /// Signing instant, serialized in canonical payload form.
    #[serde(with = "timestamp_format")]
    pub timestamp: DateTime<Utc>,

    /// Informational annotation, not covered by the signature.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

impl SignatureRecord {
    /// Rebuild the canonical payload this record was signed over.
    pub fn payload(&self) -> String {
        build_payload(&self.document_hash, &self.signer_identity, &self.timestamp)
    }

    /// The raw signature bytes.
    pub fn signature_bytes(&self) -> Result<Vec<u8>> {
        decode_signature(&self.signature)
    }

    /// Whether `identifier` is what the stored signature bytes derive to.
    pub fn identifier_matches(&self) -> bool {
        self.signature_bytes()
            .map(|bytes| derive_identifier(&bytes) == self.identifier)
            .unwrap_or(false)
    }

    /// Whether `document_hash` is a lowercase hex SHA-256. Only then is the
    /// first payload delimiter guaranteed to end the hash.
    pub fn has_canonical_hash(&self) -> bool {
        DocumentHash::from_hex(&self.document_hash)
            .map(|hash| hash.to_hex() == self.document_hash)
            .unwrap_or(false)
    }

    /// Whether two records carry the same signed content. The summary is
    /// not signed and is ignored.
    pub fn same_signed_content(&self, other: &SignatureRecord) -> bool {
        self.identifier == other.identifier
            && self.document_hash == other.document_hash
            && self.signer_identity == other.signer_identity
            && self.signature == other.signature
            && canonical_timestamp(&self.timestamp) == canonical_timestamp(&other.timestamp)
    }

    /// Parse a record from a JSON string.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize the record to a JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Save the record to a JSON file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Load a record from a JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }
}

pub(crate) mod timestamp_format {
    use crate::codec::{canonical_timestamp, parse_timestamp};
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&canonical_timestamp(ts))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let s = String::deserialize(deserializer)?;
        parse_timestamp(&s).map_err(serde::de::Error::custom)
    }
}
