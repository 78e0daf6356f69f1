//! Document signing.

use crate::audit::{AuditEvent, AuditSink, NoopAuditSink};
use crate::codec::{self, build_payload, derive_identifier, encode_signature, SignatureCodec};
use crate::error::{Result, SignError};
use crate::hash::DocumentHash;
use crate::signature::SignatureRecord;
use crate::store::{InsertOutcome, RecordStore};
use std::sync::Arc;

/// Produces signature records and optionally persists them.
#[derive(Clone)]
pub struct SigningService {
    codec: SignatureCodec,
    store: Arc<dyn RecordStore>,
    audit: Arc<dyn AuditSink>,
}

impl SigningService {
    /// Create a signing service over a codec and a record store.
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

    /// Sign a document hash on behalf of a signer.
    ///
    /// The current time is captured once and is what gets signed and
    /// stored. With `persist` false the record is only returned, so a
    /// caller can preview it and [`save`](Self::save) it later.
    pub fn sign(
        &self,
        document_hash: &str,
        signer_identity: &str,
        summary: Option<String>,
        persist: bool,
    ) -> Result<SignatureRecord> {
        match self.sign_inner(document_hash, signer_identity, summary, persist) {
            Ok(record) => {
                self.audit.record(
                    AuditEvent::Sign,
                    &format!("Signed hash {} for {}", document_hash, signer_identity),
                );
                Ok(record)
            }
            Err(e) => {
                self.audit.record(AuditEvent::SignError, &e.to_string());
                Err(e)
            }
        }
    }

    fn sign_inner(
        &self,
        document_hash: &str,
        signer_identity: &str,
        summary: Option<String>,
        persist: bool,
    ) -> Result<SignatureRecord> {
        // a hex hash never contains the delimiter, so the payload splits one way only
        let document_hash = DocumentHash::from_hex(document_hash)?.to_hex();
        let timestamp = codec::now();
        let payload = build_payload(&document_hash, signer_identity, &timestamp);
        let signature = self.codec.sign(&payload)?;

        let record = SignatureRecord {
            identifier: derive_identifier(&signature),
            document_hash: document_hash.clone(),
            signer_identity: signer_identity.to_string(),
            signature: encode_signature(&signature),
            timestamp,
            summary,
        };
        tracing::info!(
            identifier = %record.identifier,
            persist,
            "Signed document hash {} for {}",
            document_hash,
            signer_identity
        );

        if persist {
            self.persist(&record)?;
        }
        Ok(record)
    }

    /// Persist a previously previewed record.
    ///
    /// The record must verify under the deployment key and its identifier
    /// must match its signature bytes. Saving the same record twice is a
    /// no-op.
    pub fn save(&self, record: &SignatureRecord) -> Result<InsertOutcome> {
        if !record.has_canonical_hash() {
            return Err(SignError::InvalidFormat(format!(
                "document hash of record {} is not a lowercase hex SHA-256",
                record.identifier
            )));
        }
        if !record.identifier_matches() {
            return Err(SignError::InvalidFormat(format!(
                "identifier {} does not match the signature bytes",
                record.identifier
            )));
        }
        if !self.codec.verify(&record.payload(), &record.signature)? {
            return Err(SignError::InvalidFormat(format!(
                "signature of record {} does not verify",
                record.identifier
            )));
        }

        let outcome = self.persist(record)?;
        if outcome == InsertOutcome::Inserted {
            self.audit.record(
                AuditEvent::SaveSig,
                &format!("Saved signature {} to store", record.identifier),
            );
        }
        Ok(outcome)
    }

    fn persist(&self, record: &SignatureRecord) -> Result<InsertOutcome> {
        match self.store.insert_if_absent(record)? {
            InsertOutcome::Inserted => {
                tracing::debug!(identifier = %record.identifier, "Stored signature record");
                Ok(InsertOutcome::Inserted)
            }
            InsertOutcome::AlreadyPresent => {
                tracing::debug!(identifier = %record.identifier, "Signature record already stored");
                Ok(InsertOutcome::AlreadyPresent)
            }
            InsertOutcome::Conflict(existing) => {
                tracing::warn!(
                    identifier = %record.identifier,
                    existing_hash = %existing.document_hash,
                    new_hash = %record.document_hash,
                    "Identifier already bound to a different record"
                );
                Err(SignError::IdentifierCollision {
                    identifier: record.identifier.clone(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::MemoryAuditSink;
    use crate::keys::test_support::shared_keys;
    use crate::keys::KeyStore;
    use crate::store::MemoryRecordStore;

    const HASH: &str = "2c26b46b68ffc68ff99b453c1d30413413422d706483bfa0f98a5e886266e7ae";

    fn service() -> (SigningService, Arc<MemoryRecordStore>, Arc<MemoryAuditSink>) {
        let store = Arc::new(MemoryRecordStore::new());
        let audit = Arc::new(MemoryAuditSink::new());
        let service = SigningService::new(SignatureCodec::new(shared_keys()), store.clone())
            .with_audit(audit.clone());
        (service, store, audit)
    }

    #[test]
    fn test_sign_and_persist() {
        let (service, store, audit) = service();
        let record = service
            .sign(HASH, "test@example.com", Some("Lease".to_string()), true)
            .unwrap();

        assert_eq!(record.identifier.len(), 12);
        assert_eq!(record.document_hash, HASH);
        assert_eq!(record.summary.as_deref(), Some("Lease"));
        assert!(record.identifier_matches());
        assert_eq!(store.get(&record.identifier).unwrap(), Some(record));
        assert_eq!(audit.kinds(), vec![AuditEvent::Sign]);
    }

    #[test]
    fn test_preview_does_not_persist() {
        let (service, store, _) = service();
        let record = service.sign(HASH, "test@example.com", None, false).unwrap();

        assert!(store.is_empty());
        assert_eq!(store.get(&record.identifier).unwrap(), None);
    }

    #[test]
    fn test_save_previewed_record() {
        let (service, store, audit) = service();
        let record = service.sign(HASH, "test@example.com", None, false).unwrap();

        assert_eq!(service.save(&record).unwrap(), InsertOutcome::Inserted);
        assert_eq!(service.save(&record).unwrap(), InsertOutcome::AlreadyPresent);
        assert_eq!(store.len(), 1);
        assert_eq!(audit.kinds(), vec![AuditEvent::Sign, AuditEvent::SaveSig]);
    }

    #[test]
    fn test_save_rejects_forged_record() {
        let (service, store, _) = service();
        let mut record = service.sign(HASH, "test@example.com", None, false).unwrap();
        record.signer_identity = "mallory@example.com".to_string();

        assert!(matches!(service.save(&record), Err(SignError::InvalidFormat(_))));

        record.identifier = "123456789abc".to_string();
        assert!(matches!(service.save(&record), Err(SignError::InvalidFormat(_))));
        assert!(store.is_empty());
    }

    #[test]
    fn test_sign_requires_hex_hash() {
        let (service, store, audit) = service();
        let with_delimiter = format!("{}|x", HASH);

        for bad in ["abc", "", with_delimiter.as_str(), &HASH[..63]] {
            assert!(matches!(
                service.sign(bad, "test@example.com", None, true),
                Err(SignError::InvalidFormat(_))
            ));
        }
        assert!(store.is_empty());
        assert!(audit.kinds().iter().all(|k| *k == AuditEvent::SignError));

        // uppercase input is signed in canonical form
        let record = service
            .sign(&HASH.to_uppercase(), "test@example.com", None, false)
            .unwrap();
        assert_eq!(record.document_hash, HASH);
        assert!(service.save(&record).is_ok());
    }

    #[test]
    fn test_save_rejects_shifted_delimiter() {
        let (service, store, _) = service();
        // the signer identity carries a delimiter of its own
        let record = service
            .sign(HASH, "x|ceo@company.com", None, false)
            .unwrap();

        let mut shifted = record.clone();
        shifted.document_hash = format!("{}|x", HASH);
        shifted.signer_identity = "ceo@company.com".to_string();
        assert_eq!(shifted.payload(), record.payload());

        assert!(matches!(service.save(&shifted), Err(SignError::InvalidFormat(_))));
        assert!(store.is_empty());
        assert_eq!(service.save(&record).unwrap(), InsertOutcome::Inserted);
    }

    #[test]
    fn test_colliding_identifier_is_reported() {
        let (service, store, _) = service();
        let record = service.sign(HASH, "test@example.com", None, true).unwrap();

        let mut other = record.clone();
        other.document_hash = "00".repeat(32);
        assert!(matches!(
            service.persist(&other),
            Err(SignError::IdentifierCollision { .. })
        ));
        assert_eq!(store.get(&record.identifier).unwrap(), Some(record));
    }

    #[test]
    fn test_sign_without_key() {
        let store = Arc::new(MemoryRecordStore::new());
        let audit = Arc::new(MemoryAuditSink::new());
        let service = SigningService::new(SignatureCodec::new(Arc::new(KeyStore::empty())), store)
            .with_audit(audit.clone());

        assert!(matches!(
            service.sign(HASH, "test@example.com", None, true),
            Err(SignError::KeyUnavailable(_))
        ));
        assert_eq!(audit.kinds(), vec![AuditEvent::SignError]);
    }
}
