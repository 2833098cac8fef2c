//! Key derivation: PBKDF2-HMAC-SHA256 password → AES key + CBC IV

use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use zeroize::Zeroize;
use zipseal_core::{SealError, SealResult};

use crate::{BLOCK_SIZE, KEY_SIZE, SALT_SIZE};

/// Default PBKDF2 iteration count for new archives.
pub const DEFAULT_ITERATIONS: u32 = 100_000;

/// Derivations above this are refused; archives can name their own count.
pub use zipseal_core::config::MAX_KDF_ITERATIONS as MAX_ITERATIONS;

/// AES-256 key and CBC IV derived from a password.
///
/// Zeroized on drop to prevent secrets lingering in memory.
pub struct DerivedKey {
    key: [u8; KEY_SIZE],
    iv: [u8; BLOCK_SIZE],
}

impl DerivedKey {
    pub fn key(&self) -> &[u8; KEY_SIZE] {
        &self.key
    }

    pub fn iv(&self) -> &[u8; BLOCK_SIZE] {
        &self.iv
    }
}

impl Drop for DerivedKey {
    fn drop(&mut self) {
        self.key.zeroize();
        self.iv.zeroize();
    }
}

impl std::fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivedKey")
            .field("key", &"[REDACTED]")
            .field("iv", &"[REDACTED]")
            .finish()
    }
}

/// PBKDF2 parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    /// HMAC-SHA256 iterations (default: 100000)
    pub iterations: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_ITERATIONS,
        }
    }
}

/// Derive the AES-256 key and CBC IV for one file from a password and salt.
///
/// The salt is random per file and stored in the ciphertext envelope; it
/// does not need to be secret.
pub fn derive_key_iv(
    password: &SecretString,
    salt: &[u8; SALT_SIZE],
    params: &KdfParams,
) -> SealResult<DerivedKey> {
    if params.iterations == 0 || params.iterations > MAX_ITERATIONS {
        return Err(SealError::Config(format!(
            "PBKDF2 iterations must be 1-{MAX_ITERATIONS}, got {}",
            params.iterations
        )));
    }

    let mut okm = [0u8; KEY_SIZE + BLOCK_SIZE];
    pbkdf2::pbkdf2_hmac::<Sha256>(
        password.expose_secret().as_bytes(),
        salt,
        params.iterations,
        &mut okm,
    );

    let mut derived = DerivedKey {
        key: [0u8; KEY_SIZE],
        iv: [0u8; BLOCK_SIZE],
    };
    derived.key.copy_from_slice(&okm[..KEY_SIZE]);
    derived.iv.copy_from_slice(&okm[KEY_SIZE..]);
    okm.zeroize();

    Ok(derived)
}
