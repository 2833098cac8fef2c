//! Secure archive manifest
//!
//! Stored in plaintext under [`MANIFEST_ENTRY_NAME`]. It lists every logical
//! file with the entry its ciphertext lives under, and is read before any
//! decryption is attempted.
//!
//! Wire format (JSON):
//! ```text
//! {
//!   "encrypted": true,
//!   "algorithm": "AES-256-CBC",
//!   "files": [{"originalName", "encryptedName", "size", "type"}, ...],
//!   "createdAt": "<RFC 3339>",
//!   "kdfIterations": 100000            (optional, default 100000)
//! }
//! ```

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use zipseal_core::{ArchiveFile, SealError, SealResult};
use zipseal_crypto::kdf::{DEFAULT_ITERATIONS, MAX_ITERATIONS};
use zipseal_crypto::{Algorithm, KdfParams};

use crate::container::Entries;

/// Reserved entry name holding the manifest
pub const MANIFEST_ENTRY_NAME: &str = "__SECURE_METADATA__.json";

/// Suffix marking an entry as an encrypted payload
pub const STORED_SUFFIX: &str = ".encrypted";

/// Entry name a file's ciphertext is stored under.
pub fn stored_name(original_name: &str) -> String {
    format!("{original_name}{STORED_SUFFIX}")
}

/// One logical file in a secure archive
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    #[serde(rename = "originalName")]
    pub original_name: String,
    #[serde(rename = "encryptedName")]
    pub stored_name: String,
    /// Plaintext size in bytes
    pub size: u64,
    #[serde(rename = "type")]
    pub content_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    pub is_encrypted: bool,
    pub algorithm: Algorithm,
    pub entries: Vec<ManifestEntry>,
    pub created_at: DateTime<Utc>,
    pub kdf_iterations: u32,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ManifestDoc {
    encrypted: bool,
    algorithm: String,
    files: Vec<ManifestEntry>,
    created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    kdf_iterations: Option<u32>,
}

/// A manifest entry paired with its stored payload, if present.
#[derive(Debug, Clone, Copy)]
pub struct Resolved<'a> {
    pub entry: &'a ManifestEntry,
    pub payload: Option<&'a [u8]>,
}

impl Manifest {
    /// Describe `files` as they are about to be encrypted, stamped with the current time.
    pub fn build(files: &[ArchiveFile], algorithm: Algorithm, kdf: &KdfParams) -> Self {
        let entries = files
            .iter()
            .map(|f| ManifestEntry {
                original_name: f.name.clone(),
                stored_name: stored_name(&f.name),
                size: f.size(),
                content_type: f.content_type.clone(),
            })
            .collect();

        Self {
            is_encrypted: true,
            algorithm,
            entries,
            created_at: Utc::now(),
            kdf_iterations: kdf.iterations,
        }
    }

    pub fn kdf_params(&self) -> KdfParams {
        KdfParams {
            iterations: self.kdf_iterations,
        }
    }

    /// Total plaintext size of all listed files
    pub fn total_size(&self) -> u64 {
        self.entries.iter().map(|e| e.size).sum()
    }

    /// Serialize to pretty JSON bytes
    pub fn to_bytes(&self) -> SealResult<Vec<u8>> {
        let doc = ManifestDoc {
            encrypted: self.is_encrypted,
            algorithm: self.algorithm.tag().to_string(),
            files: self.entries.clone(),
            created_at: self.created_at,
            kdf_iterations: Some(self.kdf_iterations),
        };
        serde_json::to_vec_pretty(&doc)
            .map_err(|e| SealError::InvalidManifest(format!("serializing: {e}")))
    }

    /// Parse and validate manifest bytes.
    pub fn parse(data: &[u8]) -> SealResult<Self> {
        let doc: ManifestDoc =
            serde_json::from_slice(data).map_err(|e| SealError::InvalidManifest(e.to_string()))?;

        if !doc.encrypted {
            return Err(SealError::InvalidManifest(
                "manifest is not marked encrypted".into(),
            ));
        }
        let algorithm: Algorithm = doc.algorithm.parse()?;

        let kdf_iterations = doc.kdf_iterations.unwrap_or(DEFAULT_ITERATIONS);
        if kdf_iterations == 0 || kdf_iterations > MAX_ITERATIONS {
            return Err(SealError::InvalidManifest(format!(
                "kdfIterations must be 1-{MAX_ITERATIONS}, got {kdf_iterations}"
            )));
        }

        let mut originals = HashSet::new();
        for entry in &doc.files {
            if entry.original_name.is_empty() {
                return Err(SealError::InvalidManifest("entry with empty originalName".into()));
            }
            if entry.stored_name != stored_name(&entry.original_name) {
                return Err(SealError::InvalidManifest(format!(
                    "encryptedName {:?} does not match originalName {:?}",
                    entry.stored_name, entry.original_name
                )));
            }
            if !originals.insert(entry.original_name.as_str()) {
                return Err(SealError::InvalidManifest(format!(
                    "duplicate originalName {:?}",
                    entry.original_name
                )));
            }
        }

        Ok(Self {
            is_encrypted: doc.encrypted,
            algorithm,
            entries: doc.files,
            created_at: doc.created_at,
            kdf_iterations,
        })
    }

    /// Pair every entry with its payload in `entries`, in manifest order.
    pub fn resolve<'a>(&'a self, entries: &'a Entries) -> Vec<Resolved<'a>> {
        self.entries
            .iter()
            .map(|entry| Resolved {
                entry,
                payload: entries.get(&entry.stored_name),
            })
            .collect()
    }

    /// Entries whose payload is absent from `entries`.
    pub fn missing<'a>(&'a self, entries: &Entries) -> Vec<&'a ManifestEntry> {
        self.entries
            .iter()
            .filter(|e| !entries.contains(&e.stored_name))
            .collect()
    }
}
