//! zipseal-crypto: password-based encryption for individual archive files
//!
//! Pipeline per file:
//! ```text
//! bytes → base64 text (chunked) → AES-256-CBC/PKCS7 → envelope → base64 text → stored bytes
//! ```
//!
//! Key derivation:
//! ```text
//! password + random 16-byte salt ──PBKDF2-HMAC-SHA256──► 48 bytes
//!   ├── bytes  0..32  AES-256 key
//!   └── bytes 32..48  CBC IV
//! ```
//!
//! The salt travels in the envelope, so every encryption of the same file
//! under the same password yields different ciphertext.

pub mod cipher;
pub mod kdf;
pub mod policy;
pub mod text;

pub use cipher::{Algorithm, FileCipher};
pub use kdf::{derive_key_iv, DerivedKey, KdfParams};
pub use policy::{password_score, PasswordPolicy, Strength};
pub use text::{base64_decode, base64_encode, base64_encode_chunked, bytes_to_text, text_to_bytes};

/// AES-256 key size in bytes
pub const KEY_SIZE: usize = 32;

/// AES block and CBC IV size in bytes
pub const BLOCK_SIZE: usize = 16;

/// PBKDF2 salt size in bytes
pub const SALT_SIZE: usize = 16;

/// Default slice size for text conversions
pub const DEFAULT_CHUNK_SIZE: usize = 1024;
