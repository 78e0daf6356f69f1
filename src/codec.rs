//! Canonical payload construction, signing and identifier derivation.
//!
//! The payload format is frozen: `documentHash|signerIdentity|timestamp`.
//! Every stored record is verified by rebuilding this exact string, so any
//! change here invalidates all existing signatures.

use crate::error::{Result, SignError};
use crate::keys::KeyStore;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, NaiveDateTime, SubsecRound, Utc};
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// Separator between payload fields.
pub const PAYLOAD_DELIMITER: char = '|';

/// Length of a derived signature identifier.
pub const IDENTIFIER_LEN: usize = 12;

/// Build the canonical payload that gets signed.
pub fn build_payload(
    document_hash: &str,
    signer_identity: &str,
    timestamp: &DateTime<Utc>,
) -> String {
    format!(
        "{}{}{}{}{}",
        document_hash,
        PAYLOAD_DELIMITER,
        signer_identity,
        PAYLOAD_DELIMITER,
        canonical_timestamp(timestamp)
    )
}

/// Render a timestamp the way it appears in the payload.
///
/// Naive UTC ISO-8601 with no offset. Microseconds are appended as six
/// digits only when non-zero; anything below a microsecond is dropped.
pub fn canonical_timestamp(timestamp: &DateTime<Utc>) -> String {
    let timestamp = timestamp.trunc_subsecs(6);
    if timestamp.timestamp_subsec_micros() == 0 {
        timestamp.format("%Y-%m-%dT%H:%M:%S").to_string()
    } else {
        timestamp.format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
    }
}

/// Parse a timestamp in canonical form. RFC 3339 input with an offset is
/// also accepted and converted to UTC. Digits below a microsecond are
/// dropped, as they are when the payload is built.
pub fn parse_timestamp(s: &str) -> std::result::Result<DateTime<Utc>, chrono::ParseError> {
    let parsed = match s.parse::<NaiveDateTime>() {
        Ok(naive) => naive.and_utc(),
        Err(_) => DateTime::parse_from_rfc3339(s)?.with_timezone(&Utc),
    };
    Ok(parsed.trunc_subsecs(6))
}

/// The current instant at the precision the payload can carry.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Derive the short, shareable identifier for a signature.
///
/// SHA-256 of the raw signature bytes, base58 (Bitcoin alphabet, no `0`,
/// `O`, `I` or `l`), first twelve characters.
pub fn derive_identifier(signature: &[u8]) -> String {
    let digest = Sha256::digest(signature);
    bs58::encode(digest)
        .into_string()
        .chars()
        .take(IDENTIFIER_LEN)
        .collect()
}

/// Encode raw signature bytes for storage.
pub fn encode_signature(signature: &[u8]) -> String {
    STANDARD.encode(signature)
}

/// Decode a stored signature.
pub fn decode_signature(signature: &str) -> Result<Vec<u8>> {
    Ok(STANDARD.decode(signature.trim())?)
}

/// Signs and verifies canonical payloads with the deployment key.
#[derive(Debug, Clone)]
pub struct SignatureCodec {
    keys: Arc<KeyStore>,
}

impl SignatureCodec {
    /// Create a codec over a loaded key store.
    pub fn new(keys: Arc<KeyStore>) -> Self {
        Self { keys }
    }

    /// The underlying key store.
    pub fn keys(&self) -> &KeyStore {
        &self.keys
    }

    /// Sign a payload, returning the raw signature bytes.
    pub fn sign(&self, payload: &str) -> Result<Vec<u8>> {
        self.keys.sign(payload.as_bytes())
    }

    /// Verify a payload against a stored (base64) signature.
    ///
    /// Fails closed: undecodable or wrong signatures give `Ok(false)`.
    /// Only a missing key is an error.
    pub fn verify(&self, payload: &str, signature: &str) -> Result<bool> {
        if !self.keys.can_verify() {
            return Err(SignError::KeyUnavailable("no public key loaded"));
        }
        match decode_signature(signature) {
            Ok(bytes) => self.keys.verify(payload.as_bytes(), &bytes),
            Err(e) => {
                tracing::debug!("Undecodable signature: {}", e);
                Ok(false)
            }
        }
    }
}
