//! Per-file AES-256-CBC encryption with a password-derived key
//!
//! Stored payload format (printable ASCII):
//! ```text
//! base64( [8 bytes: "ZSEALv1\0"][16 bytes: PBKDF2 salt][N bytes: AES-256-CBC ciphertext] )
//! ```
//! The CBC plaintext is the base64 text of the original file bytes, padded
//! with PKCS7. Decryption therefore has two integrity checks: the padding,
//! and the decrypted text being valid base64. Neither can tell a wrong
//! password from corrupted data.

use std::fmt;
use std::str::FromStr;

use aes::Aes256;
use cbc::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};
use tracing::trace;
use zipseal_core::{SealError, SealResult};

use crate::kdf::{derive_key_iv, KdfParams};
use crate::text::{base64_decode, base64_encode_chunked};
use crate::{BLOCK_SIZE, DEFAULT_CHUNK_SIZE, SALT_SIZE};

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// Leading bytes of every envelope
pub const ENVELOPE_MAGIC: &[u8; 8] = b"ZSEALv1\0";

const HEADER_SIZE: usize = ENVELOPE_MAGIC.len() + SALT_SIZE;

/// Cipher configurations a manifest may name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Algorithm {
    #[default]
    Aes256Cbc,
}

impl Algorithm {
    pub fn tag(&self) -> &'static str {
        match self {
            Algorithm::Aes256Cbc => "AES-256-CBC",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for Algorithm {
    type Err = SealError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "AES-256-CBC" => Ok(Algorithm::Aes256Cbc),
            other => Err(SealError::UnsupportedAlgorithm(other.to_string())),
        }
    }
}

/// Encrypts and decrypts single file payloads.
#[derive(Debug, Clone, Copy)]
pub struct FileCipher {
    algorithm: Algorithm,
    params: KdfParams,
    chunk_size: usize,
}

impl Default for FileCipher {
    fn default() -> Self {
        Self::new(Algorithm::default(), KdfParams::default())
    }
}

impl FileCipher {
    pub fn new(algorithm: Algorithm, params: KdfParams) -> Self {
        Self {
            algorithm,
            params,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Slice size used for the base64 conversions (default: 1024).
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn params(&self) -> &KdfParams {
        &self.params
    }

    /// Encrypt `bytes` under `password`, returning the printable envelope.
    pub fn encrypt(&self, bytes: &[u8], password: &SecretString) -> SealResult<Vec<u8>> {
        if password.expose_secret().is_empty() {
            return Err(SealError::EmptyPassword);
        }

        let text = base64_encode_chunked(bytes, self.chunk_size);

        let mut salt = [0u8; SALT_SIZE];
        rand::thread_rng().fill_bytes(&mut salt);
        let derived = derive_key_iv(password, &salt, &self.params)?;

        let ciphertext = Aes256CbcEnc::new(derived.key().into(), derived.iv().into())
            .encrypt_padded_vec_mut::<Pkcs7>(text.as_bytes());

        let mut envelope = Vec::with_capacity(HEADER_SIZE + ciphertext.len());
        envelope.extend_from_slice(ENVELOPE_MAGIC);
        envelope.extend_from_slice(&salt);
        envelope.extend_from_slice(&ciphertext);

        let stored = base64_encode_chunked(&envelope, self.chunk_size).into_bytes();
        trace!(plain = bytes.len(), stored = stored.len(), "encrypted payload");
        Ok(stored)
    }

    /// Decrypt a payload produced by [`FileCipher::encrypt`].
    pub fn decrypt(&self, ciphertext: &[u8], password: &SecretString) -> SealResult<Vec<u8>> {
        if ciphertext.is_empty() {
            return Err(SealError::EmptyInput);
        }
        if password.expose_secret().is_empty() {
            return Err(SealError::EmptyPassword);
        }

        let envelope = std::str::from_utf8(ciphertext)
            .ok()
            .and_then(|text| base64_decode(text).ok())
            .ok_or(SealError::WrongPasswordOrCorrupt)?;

        if envelope.len() < HEADER_SIZE + BLOCK_SIZE
            || !envelope.starts_with(ENVELOPE_MAGIC)
            || (envelope.len() - HEADER_SIZE) % BLOCK_SIZE != 0
        {
            return Err(SealError::WrongPasswordOrCorrupt);
        }

        let mut salt = [0u8; SALT_SIZE];
        salt.copy_from_slice(&envelope[ENVELOPE_MAGIC.len()..HEADER_SIZE]);
        let derived = derive_key_iv(password, &salt, &self.params)?;

        let text = Aes256CbcDec::new(derived.key().into(), derived.iv().into())
            .decrypt_padded_vec_mut::<Pkcs7>(&envelope[HEADER_SIZE..])
            .map_err(|_| SealError::WrongPasswordOrCorrupt)?;

        let text = String::from_utf8(text).map_err(|_| SealError::WrongPasswordOrCorrupt)?;
        base64_decode(&text).map_err(|_| SealError::WrongPasswordOrCorrupt)
    }
}
