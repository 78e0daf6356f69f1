//! Signature verification.
//!
//! Verification outcomes are values, not errors: an unknown identifier, a
//! signature that does not verify and an unknown document hash all come
//! back as "invalid". Errors are reserved for faults such as a missing key
//! or a broken store.

use crate::audit::{AuditEvent, AuditSink, NoopAuditSink};
use crate::codec::SignatureCodec;
use crate::error::Result;
use crate::signature::SignatureRecord;
use crate::store::RecordStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Result of verifying a signature by identifier.
///
/// The record fields are only populated when `valid` is true, so stored
/// data that failed verification is never presented as fact.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationOutcome {
    pub valid: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signer_identity: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_hash: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

impl VerificationOutcome {
    /// A failed verification carrying no record data.
    pub fn invalid() -> Self {
        Self::default()
    }

    /// A successful verification of the given record.
    pub fn verified(record: SignatureRecord) -> Self {
        Self {
            valid: true,
            signer_identity: Some(record.signer_identity),
            timestamp: Some(record.timestamp),
            document_hash: Some(record.document_hash),
            summary: record.summary,
        }
    }
}

/// Result of checking an uploaded document's hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum UploadStatus {
    /// Some stored record signs exactly these bytes.
    Valid,
    /// Not provably authentic, including never-seen documents.
    Tampered,
}

impl UploadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadStatus::Valid => "VALID",
            UploadStatus::Tampered => "TAMPERED",
        }
    }
}

impl fmt::Display for UploadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Checks stored records and uploaded documents.
#[derive(Clone)]
pub struct VerificationService {
    codec: SignatureCodec,
    store: Arc<dyn RecordStore>,
    audit: Arc<dyn AuditSink>,
}

impl VerificationService {
    /// Create a verification service over a codec and a record store.
    pub fn new(codec: SignatureCodec, store: Arc<dyn RecordStore>) -> Self {
        Self {
            codec,
            store,
            audit: Arc::new(NoopAuditSink),
        }
    }

    /// Send audit events to the given sink.
    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    /// Look up a record and cryptographically check it.
    pub fn verify_by_id(&self, identifier: &str) -> Result<VerificationOutcome> {
        let outcome = match self.store.get(identifier)? {
            None => {
                tracing::debug!(identifier, "No record for identifier");
                VerificationOutcome::invalid()
            }
            Some(record) if !record.identifier_matches() || !record.has_canonical_hash() => {
                tracing::warn!(identifier, "Stored record is not self-consistent");
                VerificationOutcome::invalid()
            }
            Some(record) => {
                if self.codec.verify(&record.payload(), &record.signature)? {
                    VerificationOutcome::verified(record)
                } else {
                    tracing::warn!(identifier, "Stored signature does not verify");
                    VerificationOutcome::invalid()
                }
            }
        };

        self.audit.record(
            AuditEvent::VerifyId,
            &format!("Verified ID {}, Valid: {}", identifier, outcome.valid),
        );
        Ok(outcome)
    }

    /// Whether any stored record signs exactly this content hash.
    ///
    /// This does not check a particular signer or identifier.
    pub fn verify_by_upload(&self, document_hash: &str) -> Result<UploadStatus> {
        let status = match self.store.get_by_document_hash(document_hash)? {
            Some(_) => UploadStatus::Valid,
            None => UploadStatus::Tampered,
        };

        self.audit.record(
            AuditEvent::VerifyUpload,
            &format!("Verified upload, Result: {}", status),
        );
        Ok(status)
    }

    /// Whether an uploaded document is already signed.
    ///
    /// True when the exact hash is known, or when the document carries a
    /// stamped identifier (detected by the caller from its text) that is on
    /// record.
    pub fn is_signed(&self, document_hash: &str, detected_identifier: Option<&str>) -> Result<bool> {
        if self.store.get_by_document_hash(document_hash)?.is_some() {
            return Ok(true);
        }
        match detected_identifier {
            Some(identifier) => Ok(self.store.get(identifier)?.is_some()),
            None => Ok(false),
        }
    }
}
