use std::fmt;

use thiserror::Error;

pub type SealResult<T> = Result<T, SealError>;

/// Stage of an archive operation an error was raised in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Encrypt,
    Pack,
    Unpack,
    Decrypt,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Encrypt => "encrypt",
            Phase::Pack => "pack",
            Phase::Unpack => "unpack",
            Phase::Decrypt => "decrypt",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
pub enum SealError {
    #[error("no files to archive")]
    EmptyFileList,

    #[error("password is empty")]
    EmptyPassword,

    #[error("passwords do not match")]
    PasswordMismatch,

    #[error("password too weak: strength {score}/5, at least {required} required")]
    WeakPassword { score: u8, required: u8 },

    #[error("{name}: {size} bytes exceeds the per-file limit of {limit} bytes")]
    OversizeFile { name: String, size: u64, limit: u64 },

    #[error("archive input totals {total} bytes, limit is {limit} bytes")]
    OversizeArchive { total: u64, limit: u64 },

    #[error("duplicate entry name: {0}")]
    DuplicateEntry(String),

    #[error("invalid entry name {0:?}")]
    InvalidEntryName(String),

    #[error("ciphertext is empty")]
    EmptyInput,

    #[error("decode error: {0}")]
    DecodeError(String),

    #[error("malformed container: {0}")]
    MalformedContainer(String),

    #[error("not a secure archive (no manifest entry); try opening it as a plain archive")]
    NotASecureArchive,

    #[error("archive is encrypted; a password is required to extract it")]
    SecureArchive,

    #[error("invalid manifest: {0}")]
    InvalidManifest(String),

    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("wrong password or corrupted data")]
    WrongPasswordOrCorrupt,

    #[error("encrypted entry {stored} for {original} is missing from the archive")]
    MissingEncryptedEntry { original: String, stored: String },

    #[error("{name} ({phase}): {source}")]
    Entry {
        name: String,
        phase: Phase,
        #[source]
        source: Box<SealError>,
    },

    #[error("operation cancelled")]
    Cancelled,

    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SealError {
    /// Attach the file name and phase an error belongs to.
    pub fn for_entry(self, name: impl Into<String>, phase: Phase) -> Self {
        SealError::Entry {
            name: name.into(),
            phase,
            source: Box::new(self),
        }
    }

    /// The underlying error with any `Entry` context removed.
    pub fn root(&self) -> &SealError {
        let mut err = self;
        while let SealError::Entry { source, .. } = err {
            err = source;
        }
        err
    }

    /// File name from the outermost `Entry` wrapper, if any.
    pub fn entry_name(&self) -> Option<&str> {
        match self {
            SealError::Entry { name, .. } => Some(name),
            SealError::OversizeFile { name, .. } => Some(name),
            SealError::MissingEncryptedEntry { original, .. } => Some(original),
            _ => None,
        }
    }
}
