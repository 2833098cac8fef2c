use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{SealError, SealResult};

/// Highest PBKDF2 iteration count accepted from config or from an archive
pub const MAX_KDF_ITERATIONS: u32 = 10_000_000;

/// Top-level configuration (loaded from zipseal.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SealConfig {
    pub archive: ArchiveConfig,
    pub crypto: CryptoConfig,
    pub limits: LimitsConfig,
    pub decode: DecodeConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    /// Deflate level, 0-9 (default: 6)
    pub compression_level: u32,
    /// Slice size for text/base64 conversion in bytes (default: 1024)
    pub chunk_size: usize,
    /// Encrypt/decrypt files on the rayon pool
    pub parallel: bool,
}

/// Password-based encryption settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CryptoConfig {
    /// PBKDF2-HMAC-SHA256 iterations for newly written archives (default: 100000)
    pub kdf_iterations: u32,
    /// Minimum password strength score, 0-5 (default: 3)
    pub min_password_score: u8,
    /// Minimum password length (default: 8)
    pub min_password_length: usize,
}

/// Size caps. These are policy, not format limits; 0 disables a cap.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Largest single input file in MiB (default: 1024)
    pub max_file_mb: u64,
    /// Largest total input in MiB (default: 4096)
    pub max_archive_mb: u64,
    /// Largest total uncompressed container content accepted on read, in MiB (default: 8192)
    pub max_unpacked_mb: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodeConfig {
    /// What to do when one entry is missing or fails to decrypt
    pub entry_policy: EntryPolicy,
}

/// Per-entry failure policy, shared by missing blobs and decrypt failures.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryPolicy {
    /// First failing entry aborts the whole decode
    #[default]
    Abort,
    /// Failing entries are reported as warnings and left out
    Skip,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level (default: warn)
    pub level: String,
    /// Log format: "json" or "text"
    pub format: String,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            compression_level: 6,
            chunk_size: 1024,
            parallel: true,
        }
    }
}

impl Default for CryptoConfig {
    fn default() -> Self {
        Self {
            kdf_iterations: 100_000,
            min_password_score: 3,
            min_password_length: 8,
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_file_mb: 1024,
            max_archive_mb: 4096,
            max_unpacked_mb: 8192,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "warn".into(),
            format: "text".into(),
        }
    }
}

impl LimitsConfig {
    pub fn max_file_bytes(&self) -> Option<u64> {
        mib(self.max_file_mb)
    }

    pub fn max_archive_bytes(&self) -> Option<u64> {
        mib(self.max_archive_mb)
    }

    pub fn max_unpacked_bytes(&self) -> Option<u64> {
        mib(self.max_unpacked_mb)
    }
}

fn mib(n: u64) -> Option<u64> {
    (n > 0).then(|| n.saturating_mul(1024 * 1024))
}

impl SealConfig {
    /// Load from a TOML file, falling back to defaults when it does not exist.
    pub fn load(path: &Path) -> SealResult<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml(&content)
            .map_err(|e| SealError::Config(format!("{}: {e}", path.display())))?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> SealResult<Self> {
        let config: SealConfig =
            toml::from_str(content).map_err(|e| SealError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> SealResult<()> {
        if self.archive.compression_level > 9 {
            return Err(SealError::Config(format!(
                "archive.compression_level must be 0-9, got {}",
                self.archive.compression_level
            )));
        }
        if self.archive.chunk_size == 0 {
            return Err(SealError::Config("archive.chunk_size must be at least 1".into()));
        }
        if self.crypto.kdf_iterations == 0 || self.crypto.kdf_iterations > MAX_KDF_ITERATIONS {
            return Err(SealError::Config(format!(
                "crypto.kdf_iterations must be 1-{MAX_KDF_ITERATIONS}, got {}",
                self.crypto.kdf_iterations
            )));
        }
        if self.crypto.min_password_score > 5 {
            return Err(SealError::Config(format!(
                "crypto.min_password_score must be 0-5, got {}",
                self.crypto.min_password_score
            )));
        }
        match self.log.format.as_str() {
            "json" | "text" => Ok(()),
            other => Err(SealError::Config(format!(
                "log.format must be \"json\" or \"text\", got {other:?}"
            ))),
        }
    }
}
