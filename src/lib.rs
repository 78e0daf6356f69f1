//! # stamp-sign
//!
//! Sign documents, verify them later, and burn a visible stamp onto the
//! signed PDF.
//!
//! ## Features
//!
//! - **RSA-PSS signatures** (SHA-256, randomized salt) over a frozen payload
//!   of `documentHash|signer|timestamp`
//! - **Short identifiers**: twelve base58 characters derived from the
//!   signature bytes, easy to print and share
//! - **Fail-closed verification** by identifier or by uploaded content hash
//! - **Stamping**: boxed identifier marks or the signer's own image, drawn
//!   over existing page content, with normalized (0-1000) suggestion boxes
//!   mapped onto each page's real size
//! - **Record stores** in memory or SQLite
//!
//! ## Quick Start
//!
//! ### Sign and Verify
//!
//! ```rust
//! use std::sync::Arc;
//! use stamp_sign::{
//!     hash_bytes, KeyStore, MemoryRecordStore, SignatureCodec, SigningService, UploadStatus,
//!     VerificationService,
//! };
//!
//! let keys = Arc::new(KeyStore::generate(2048).unwrap());
//! let codec = SignatureCodec::new(keys);
//! let store = Arc::new(MemoryRecordStore::new());
//!
//! let signer = SigningService::new(codec.clone(), store.clone());
//! let verifier = VerificationService::new(codec, store);
//!
//! let hash = hash_bytes(b"Important document content").to_hex();
//! let record = signer
//!     .sign(&hash, "alice@example.com", Some("Lease".to_string()), true)
//!     .unwrap();
//!
//! let outcome = verifier.verify_by_id(&record.identifier).unwrap();
//! assert!(outcome.valid);
//! assert_eq!(verifier.verify_by_upload(&hash).unwrap(), UploadStatus::Valid);
//! ```
//!
//! ### Stamp a PDF
//!
//! ```rust,no_run
//! use stamp_sign::{PlacementInstruction, StampingEngine};
//!
//! let pdf = std::fs::read("contract.pdf").unwrap();
//! let placements = vec![
//!     PlacementInstruction::digital(1, 72.0, 72.0),
//!     PlacementInstruction::user_image(2, 300.0, 100.0),
//! ];
//!
//! let report = StampingEngine::new()
//!     .stamp(&pdf, "3xKq9WbZ2mNa", &placements, Some("data:image/png;base64,..."))
//!     .unwrap();
//! for skipped in &report.skipped {
//!     println!("placement {} skipped: {}", skipped.index, skipped.reason);
//! }
//! std::fs::write("contract.signed.pdf", report.document).unwrap();
//! ```
//!
//! ### Key Configuration
//!
//! ```rust,no_run
//! use stamp_sign::{KeyConfig, KeyStore};
//!
//! // PRIVATE_KEY, then PRIVATE_KEY_PATH, then ./private.pem
//! let keys = KeyStore::from_config(&KeyConfig::from_env()).unwrap();
//! if !keys.can_sign() {
//!     eprintln!("running verification-only");
//! }
//! ```

pub mod audit;
pub mod codec;
pub mod config;
pub mod error;
pub mod hash;
pub mod keys;
pub mod signature;
pub mod signer;
pub mod stamp;
pub mod store;
pub mod verifier;

// Re-export main types for convenience
pub use audit::{AuditEvent, AuditSink, MemoryAuditSink, NoopAuditSink, TracingAuditSink};
pub use codec::{build_payload, canonical_timestamp, derive_identifier, SignatureCodec};
pub use config::{KeyConfig, KeySource};
pub use error::{Result, SignError};
pub use hash::{hash_bytes, hash_file, hash_reader, DocumentHash};
pub use keys::KeyStore;
pub use signature::SignatureRecord;
pub use signer::SigningService;
pub use stamp::{
    NormalizedBox, NormalizedSuggestion, PlacementInstruction, PlacementKind, SkipReason,
    SkippedPlacement, StampReport, StampStyle, StampingEngine, SuggestedPlacement,
};
pub use store::{InsertOutcome, MemoryRecordStore, RecordStore, SqliteRecordStore};
pub use verifier::{UploadStatus, VerificationOutcome, VerificationService};
