use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{Phase, SealError, SealResult};

/// Fallback content type for names with no known extension.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// A named file held in memory: an archive input, or a file recovered from one.
#[derive(Clone, PartialEq, Eq)]
pub struct ArchiveFile {
    pub name: String,
    pub data: Vec<u8>,
    pub content_type: String,
}

impl ArchiveFile {
    pub fn new(name: impl Into<String>, data: Vec<u8>, content_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data,
            content_type: content_type.into(),
        }
    }

    /// Build a file whose content type is guessed from its name.
    pub fn guessed(name: impl Into<String>, data: Vec<u8>) -> Self {
        let name = name.into();
        let content_type = guess_content_type(&name);
        Self::new(name, data, content_type)
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

impl std::fmt::Debug for ArchiveFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveFile")
            .field("name", &self.name)
            .field("size", &self.data.len())
            .field("content_type", &self.content_type)
            .finish()
    }
}

/// Guess a MIME type from the file extension.
pub fn guess_content_type(name: &str) -> &'static str {
    let ext = match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => ext.to_ascii_lowercase(),
        _ => return DEFAULT_CONTENT_TYPE,
    };
    match ext.as_str() {
        "txt" | "log" => "text/plain",
        "md" => "text/markdown",
        "csv" => "text/csv",
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "js" | "mjs" => "text/javascript",
        "json" => "application/json",
        "xml" => "application/xml",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "gz" => "application/gzip",
        "tar" => "application/x-tar",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        _ => DEFAULT_CONTENT_TYPE,
    }
}

/// One progress tick, emitted after each file is processed.
#[derive(Debug, Clone, Copy)]
pub struct Progress<'a> {
    /// Files finished so far, including this one
    pub done: u64,
    pub total: u64,
    pub name: &'a str,
    pub phase: Phase,
}

/// Progress callback type
pub type ProgressFn = Box<dyn Fn(Progress<'_>) + Send + Sync>;

/// Cooperative cancellation flag, checked between files.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// `Err(Cancelled)` once `cancel` has been called.
    pub fn check(&self) -> SealResult<()> {
        if self.is_cancelled() {
            Err(SealError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Optional host hooks for a single encode/decode call.
#[derive(Clone, Copy, Default)]
pub struct Hooks<'a> {
    pub progress: Option<&'a ProgressFn>,
    pub cancel: Option<&'a CancelFlag>,
}

impl<'a> Hooks<'a> {
    pub fn with_progress(mut self, progress: &'a ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn with_cancel(mut self, cancel: &'a CancelFlag) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn check_cancelled(&self) -> SealResult<()> {
        match self.cancel {
            Some(flag) => flag.check(),
            None => Ok(()),
        }
    }
}
