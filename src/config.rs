//! Key material configuration.
//!
//! A deployment has exactly one signing keypair. Where it comes from is
//! decided once at startup, either from the environment or from a
//! deserialized configuration document.

use crate::error::Result;
use secrecy::SecretString;
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};

/// Environment variable holding the PEM-encoded private key itself.
pub const PRIVATE_KEY_ENV: &str = "PRIVATE_KEY";

/// Environment variable holding a path to a PEM-encoded private key.
pub const PRIVATE_KEY_PATH_ENV: &str = "PRIVATE_KEY_PATH";

/// Key file looked up in the working directory when nothing else is set.
pub const DEFAULT_KEY_FILE: &str = "private.pem";

/// Where the signing key is loaded from.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum KeySource {
    /// Inline PEM private key (PKCS#8 or PKCS#1).
    Pem(SecretString),
    /// Path to a PEM private key file.
    File(PathBuf),
    /// Inline PEM public key, for verification-only deployments.
    PublicPem(String),
    /// No key material; signing and verification report `KeyUnavailable`.
    #[default]
    None,
}

/// Key configuration for a deployment.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct KeyConfig {
    #[serde(default)]
    pub source: KeySource,
}

impl KeyConfig {
    /// Create a configuration for the given source.
    pub fn new(source: KeySource) -> Self {
        Self { source }
    }

    /// Resolve the key source from the process environment.
    ///
    /// Lookup order: `PRIVATE_KEY`, then `PRIVATE_KEY_PATH`, then
    /// `private.pem` in the working directory. If none is present the
    /// deployment runs without a key.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok(), Path::new(DEFAULT_KEY_FILE))
    }

    /// Parse a configuration from a JSON document.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    fn from_lookup<F>(lookup: F, default_file: &Path) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let source = if let Some(pem) = lookup(PRIVATE_KEY_ENV).filter(|v| !v.trim().is_empty()) {
            KeySource::Pem(SecretString::from(pem))
        } else if let Some(path) = lookup(PRIVATE_KEY_PATH_ENV).filter(|v| !v.trim().is_empty()) {
            KeySource::File(PathBuf::from(path))
        } else if default_file.is_file() {
            KeySource::File(default_file.to_path_buf())
        } else {
            tracing::warn!(
                "{} not found and {} not set; running without a signing key",
                DEFAULT_KEY_FILE,
                PRIVATE_KEY_ENV
            );
            KeySource::None
        };

        Self { source }
    }
}
