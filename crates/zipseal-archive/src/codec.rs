//! Archive encode/decode orchestration
//!
//! Encoding validates the inputs, encrypts each file independently (in
//! parallel when enabled), writes the payloads under their stored names and
//! appends the manifest. Decoding reverses this, applying the configured
//! [`EntryPolicy`] to entries that are missing or fail to decrypt.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use rayon::prelude::*;
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info, warn};
use zipseal_core::config::{EntryPolicy, SealConfig};
use zipseal_core::{ArchiveFile, Hooks, Phase, Progress, ProgressFn, SealError, SealResult};
use zipseal_crypto::{Algorithm, FileCipher, KdfParams, DEFAULT_CHUNK_SIZE};

use crate::container::{self, ContainerWriter, Entries, DEFAULT_LEVEL};
use crate::manifest::{Manifest, Resolved, MANIFEST_ENTRY_NAME};

/// How `encode` writes file contents.
#[derive(Debug)]
pub enum Mode {
    /// Files stored as-is under their own names, no manifest
    Plain,
    /// Files encrypted under this password, with a manifest
    Encrypted(SecretString),
}

/// What kind of container `open` found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveKind {
    Plain,
    Secure(Manifest),
}

impl ArchiveKind {
    pub fn is_secure(&self) -> bool {
        matches!(self, ArchiveKind::Secure(_))
    }

    pub fn manifest(&self) -> Option<&Manifest> {
        match self {
            ArchiveKind::Secure(m) => Some(m),
            ArchiveKind::Plain => None,
        }
    }
}

/// A container whose entries have been read but not decrypted.
#[derive(Debug)]
pub struct OpenedArchive {
    pub kind: ArchiveKind,
    pub entries: Entries,
}

/// An entry that was skipped during a decode under [`EntryPolicy::Skip`].
#[derive(Debug)]
pub struct EntryWarning {
    pub original_name: String,
    pub stored_name: String,
    pub error: SealError,
}

impl EntryWarning {
    /// True when the stored payload was absent rather than undecryptable.
    pub fn is_missing(&self) -> bool {
        matches!(self.error, SealError::MissingEncryptedEntry { .. })
    }
}

/// Result of a successful secure decode.
#[derive(Debug)]
pub struct DecodedArchive {
    /// Recovered files, in manifest order
    pub files: Vec<ArchiveFile>,
    pub manifest: Manifest,
    /// Entries left out under [`EntryPolicy::Skip`]; always empty under `Abort`
    pub warnings: Vec<EntryWarning>,
}

/// Tunables for a codec instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecOptions {
    /// Deflate level 0-9 (0 = stored)
    pub compression_level: u32,
    /// Slice size for the base64 conversions
    pub chunk_size: usize,
    /// Encrypt/decrypt files on the rayon pool
    pub parallel: bool,
    /// Key derivation used when encoding; decoding reads it from the manifest
    pub kdf: KdfParams,
    pub entry_policy: EntryPolicy,
    pub max_file_bytes: Option<u64>,
    pub max_archive_bytes: Option<u64>,
    /// Cap on total uncompressed container content read by `open`
    pub max_unpacked_bytes: Option<u64>,
}

impl Default for CodecOptions {
    fn default() -> Self {
        Self {
            compression_level: DEFAULT_LEVEL,
            chunk_size: DEFAULT_CHUNK_SIZE,
            parallel: true,
            kdf: KdfParams::default(),
            entry_policy: EntryPolicy::default(),
            max_file_bytes: None,
            max_archive_bytes: None,
            max_unpacked_bytes: None,
        }
    }
}

impl CodecOptions {
    pub fn from_config(config: &SealConfig) -> Self {
        Self {
            compression_level: config.archive.compression_level,
            chunk_size: config.archive.chunk_size,
            parallel: config.archive.parallel,
            kdf: KdfParams {
                iterations: config.crypto.kdf_iterations,
            },
            entry_policy: config.decode.entry_policy,
            max_file_bytes: config.limits.max_file_bytes(),
            max_archive_bytes: config.limits.max_archive_bytes(),
            max_unpacked_bytes: config.limits.max_unpacked_bytes(),
        }
    }
}

/// Builds and reads plain and password-protected archives.
#[derive(Debug, Clone, Default)]
pub struct ArchiveCodec {
    options: CodecOptions,
}

impl ArchiveCodec {
    pub fn new(options: CodecOptions) -> Self {
        Self { options }
    }

    pub fn from_config(config: &SealConfig) -> Self {
        Self::new(CodecOptions::from_config(config))
    }

    pub fn options(&self) -> &CodecOptions {
        &self.options
    }

    /// Build an archive from `files`.
    ///
    /// In encrypted mode every file is sealed independently under the
    /// password and the manifest is written last. Fails before doing any
    /// work if the input list is empty, has duplicate or invalid names, or
    /// exceeds the configured size limits.
    pub fn encode(&self, files: &[ArchiveFile], mode: &Mode, hooks: Hooks<'_>) -> SealResult<Vec<u8>> {
        self.validate_inputs(files)?;

        let container = match mode {
            Mode::Plain => self.encode_plain(files, hooks)?,
            Mode::Encrypted(password) => self.encode_secure(files, password, hooks)?,
        };

        info!(
            files = files.len(),
            secure = matches!(mode, Mode::Encrypted(_)),
            bytes = container.len(),
            "archive encoded"
        );
        Ok(container)
    }

    fn validate_inputs(&self, files: &[ArchiveFile]) -> SealResult<()> {
        if files.is_empty() {
            return Err(SealError::EmptyFileList);
        }

        let mut names = HashSet::with_capacity(files.len());
        let mut total: u64 = 0;
        for file in files {
            if !is_valid_entry_name(&file.name) {
                return Err(SealError::InvalidEntryName(file.name.clone()));
            }
            if !names.insert(file.name.as_str()) {
                return Err(SealError::DuplicateEntry(file.name.clone()));
            }
            if let Some(limit) = self.options.max_file_bytes {
                if file.size() > limit {
                    return Err(SealError::OversizeFile {
                        name: file.name.clone(),
                        size: file.size(),
                        limit,
                    });
                }
            }
            total = total.saturating_add(file.size());
        }

        if let Some(limit) = self.options.max_archive_bytes {
            if total > limit {
                return Err(SealError::OversizeArchive { total, limit });
            }
        }
        Ok(())
    }

    fn encode_plain(&self, files: &[ArchiveFile], hooks: Hooks<'_>) -> SealResult<Vec<u8>> {
        let ticker = Ticker::new(files.len(), hooks.progress);
        let mut writer = ContainerWriter::new(self.options.compression_level);
        for file in files {
            hooks.check_cancelled()?;
            debug!(name = %file.name, size = file.size(), "storing plain entry");
            writer
                .add(&file.name, &file.data)
                .map_err(|e| e.for_entry(&file.name, Phase::Pack))?;
            ticker.tick(&file.name, Phase::Pack);
        }
        writer.finish()
    }

    fn encode_secure(
        &self,
        files: &[ArchiveFile],
        password: &SecretString,
        hooks: Hooks<'_>,
    ) -> SealResult<Vec<u8>> {
        if password.expose_secret().is_empty() {
            return Err(SealError::EmptyPassword);
        }

        let cipher = FileCipher::new(Algorithm::default(), self.options.kdf)
            .with_chunk_size(self.options.chunk_size);

        let payloads = self.map_files(
            files,
            hooks,
            Phase::Encrypt,
            |file| file.name.as_str(),
            |file| {
                debug!(name = %file.name, size = file.size(), "encrypting");
                cipher
                    .encrypt(&file.data, password)
                    .map_err(|e| e.for_entry(&file.name, Phase::Encrypt))
            },
        )?;

        let manifest = Manifest::build(files, cipher.algorithm(), cipher.params());
        let mut writer = ContainerWriter::new(self.options.compression_level);
        for (entry, payload) in manifest.entries.iter().zip(&payloads) {
            hooks.check_cancelled()?;
            writer
                .add(&entry.stored_name, payload)
                .map_err(|e| e.for_entry(&entry.original_name, Phase::Pack))?;
        }
        writer.add(MANIFEST_ENTRY_NAME, &manifest.to_bytes()?)?;
        writer.finish()
    }

    /// Read a container and classify it by the presence of the manifest entry.
    ///
    /// The manifest entry is removed from the returned entries.
    pub fn open(&self, container: &[u8]) -> SealResult<OpenedArchive> {
        if container.is_empty() {
            return Err(SealError::EmptyInput);
        }
        let mut entries = container::unpack(container, self.options.max_unpacked_bytes)?;

        let kind = match entries.remove(MANIFEST_ENTRY_NAME) {
            Some(doc) => ArchiveKind::Secure(Manifest::parse(&doc)?),
            None => ArchiveKind::Plain,
        };
        debug!(entries = entries.len(), secure = kind.is_secure(), "opened container");
        Ok(OpenedArchive { kind, entries })
    }

    /// The manifest of a secure archive, without decrypting anything.
    pub fn inspect(&self, container: &[u8]) -> SealResult<Manifest> {
        match self.open(container)?.kind {
            ArchiveKind::Secure(manifest) => Ok(manifest),
            ArchiveKind::Plain => Err(SealError::NotASecureArchive),
        }
    }

    /// Decrypt every file of a secure archive.
    pub fn decode(
        &self,
        container: &[u8],
        password: &SecretString,
        hooks: Hooks<'_>,
    ) -> SealResult<DecodedArchive> {
        self.decode_opened(self.open(container)?, password, hooks)
    }

    /// Decrypt an archive already read with [`ArchiveCodec::open`].
    pub fn decode_opened(
        &self,
        opened: OpenedArchive,
        password: &SecretString,
        hooks: Hooks<'_>,
    ) -> SealResult<DecodedArchive> {
        let OpenedArchive { kind, entries } = opened;
        let manifest = match kind {
            ArchiveKind::Secure(manifest) => manifest,
            ArchiveKind::Plain => return Err(SealError::NotASecureArchive),
        };
        if password.expose_secret().is_empty() {
            return Err(SealError::EmptyPassword);
        }

        let policy = self.options.entry_policy;
        if policy == EntryPolicy::Abort {
            if let Some(entry) = manifest.missing(&entries).first() {
                return Err(SealError::MissingEncryptedEntry {
                    original: entry.original_name.clone(),
                    stored: entry.stored_name.clone(),
                }
                .for_entry(&entry.original_name, Phase::Unpack));
            }
        }

        let cipher =
            FileCipher::new(manifest.algorithm, manifest.kdf_params()).with_chunk_size(self.options.chunk_size);

        let outcomes = self.map_files(
            manifest.resolve(&entries).as_slice(),
            hooks,
            Phase::Decrypt,
            |resolved| resolved.entry.original_name.as_str(),
            |resolved| match decrypt_entry(&cipher, resolved, password) {
                Ok(file) => Ok(Ok(file)),
                Err(error) if policy == EntryPolicy::Skip => {
                    warn!(name = %resolved.entry.original_name, %error, "skipping entry");
                    Ok(Err(EntryWarning {
                        original_name: resolved.entry.original_name.clone(),
                        stored_name: resolved.entry.stored_name.clone(),
                        error,
                    }))
                }
                Err(error) => {
                    let phase = entry_phase(&error);
                    Err(error.for_entry(&resolved.entry.original_name, phase))
                }
            },
        )?;

        let mut files = Vec::with_capacity(outcomes.len());
        let mut warnings = Vec::new();
        for outcome in outcomes {
            match outcome {
                Ok(file) => files.push(file),
                Err(warning) => warnings.push(warning),
            }
        }

        // Nothing recovered and at least one payload present but unreadable:
        // almost certainly the wrong password, so skipping is not a success.
        if files.is_empty() {
            if let Some(pos) = warnings.iter().position(|w| !w.is_missing()) {
                let warning = warnings.swap_remove(pos);
                return Err(warning.error.for_entry(warning.original_name, Phase::Decrypt));
            }
        }

        info!(
            files = files.len(),
            skipped = warnings.len(),
            bytes = files.iter().map(ArchiveFile::size).sum::<u64>(),
            "archive decoded"
        );
        Ok(DecodedArchive {
            files,
            manifest,
            warnings,
        })
    }

    /// Extract the entries of a plain archive as files.
    pub fn extract_plain(&self, container: &[u8], hooks: Hooks<'_>) -> SealResult<Vec<ArchiveFile>> {
        self.extract_opened(self.open(container)?, hooks)
    }

    /// Plain extraction of an archive already read with [`ArchiveCodec::open`].
    pub fn extract_opened(&self, opened: OpenedArchive, hooks: Hooks<'_>) -> SealResult<Vec<ArchiveFile>> {
        let OpenedArchive { kind, entries } = opened;
        if kind.is_secure() {
            return Err(SealError::SecureArchive);
        }

        let ticker = Ticker::new(entries.len(), hooks.progress);
        let mut files = Vec::with_capacity(entries.len());
        for entry in entries.into_vec() {
            hooks.check_cancelled()?;
            let file = ArchiveFile::guessed(entry.name, entry.data);
            ticker.tick(&file.name, Phase::Unpack);
            files.push(file);
        }
        Ok(files)
    }

    /// Run `work` over every item, on the rayon pool when parallelism is on.
    ///
    /// Cancellation is checked before each item. Progress ticks are
    /// serialized so `done` never goes backwards from the host's view. On
    /// failure the error of the lowest-indexed failing item is returned, in
    /// parallel mode too.
    fn map_files<I, T, N, F>(
        &self,
        items: &[I],
        hooks: Hooks<'_>,
        phase: Phase,
        name_of: N,
        work: F,
    ) -> SealResult<Vec<T>>
    where
        I: Sync,
        T: Send,
        N: Fn(&I) -> &str + Sync,
        F: Fn(&I) -> SealResult<T> + Sync,
    {
        let ticker = Ticker::new(items.len(), hooks.progress);
        let step = |item: &I| -> SealResult<T> {
            hooks.check_cancelled()?;
            let out = work(item)?;
            ticker.tick(name_of(item), phase);
            Ok(out)
        };

        if self.options.parallel && items.len() > 1 {
            // Items after a known failure are skipped; their placeholder
            // error always sorts after the real one.
            let first_failure = AtomicUsize::new(usize::MAX);
            let results: Vec<SealResult<T>> = items
                .par_iter()
                .enumerate()
                .map(|(i, item)| {
                    if i > first_failure.load(Ordering::Acquire) {
                        return Err(SealError::Cancelled);
                    }
                    let result = step(item);
                    if result.is_err() {
                        first_failure.fetch_min(i, Ordering::AcqRel);
                    }
                    result
                })
                .collect();
            results.into_iter().collect()
        } else {
            items.iter().map(step).collect()
        }
    }
}

fn decrypt_entry(cipher: &FileCipher, resolved: &Resolved<'_>, password: &SecretString) -> SealResult<ArchiveFile> {
    let entry = resolved.entry;
    let payload = resolved.payload.ok_or_else(|| SealError::MissingEncryptedEntry {
        original: entry.original_name.clone(),
        stored: entry.stored_name.clone(),
    })?;

    debug!(name = %entry.original_name, stored = payload.len(), "decrypting");
    let data = cipher.decrypt(payload, password)?;
    if data.len() as u64 != entry.size {
        debug!(
            name = %entry.original_name,
            expected = entry.size,
            actual = data.len(),
            "decrypted size does not match manifest"
        );
        return Err(SealError::WrongPasswordOrCorrupt);
    }
    Ok(ArchiveFile::new(
        entry.original_name.clone(),
        data,
        entry.content_type.clone(),
    ))
}

/// Names that read back as the same regular file entry. A trailing `/` would
/// come back as a directory and be dropped.
fn is_valid_entry_name(name: &str) -> bool {
    !name.is_empty() && name != MANIFEST_ENTRY_NAME && !name.contains('\0') && !name.ends_with('/')
}

fn entry_phase(error: &SealError) -> Phase {
    match error {
        SealError::MissingEncryptedEntry { .. } => Phase::Unpack,
        _ => Phase::Decrypt,
    }
}

/// Serialized progress counter shared across worker threads.
struct Ticker<'a> {
    done: Mutex<u64>,
    total: u64,
    progress: Option<&'a ProgressFn>,
}

impl<'a> Ticker<'a> {
    fn new(total: usize, progress: Option<&'a ProgressFn>) -> Self {
        Self {
            done: Mutex::new(0),
            total: total as u64,
            progress,
        }
    }

    fn tick(&self, name: &str, phase: Phase) {
        let Some(progress) = self.progress else {
            return;
        };
        let mut done = self.done.lock().unwrap_or_else(PoisonError::into_inner);
        *done += 1;
        progress(Progress {
            done: *done,
            total: self.total,
            name,
            phase,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use zipseal_core::CancelFlag;

    fn codec() -> ArchiveCodec {
        ArchiveCodec::new(CodecOptions {
            kdf: KdfParams { iterations: 10 },
            ..CodecOptions::default()
        })
    }

    fn password(s: &str) -> SecretString {
        SecretString::from(s.to_string())
    }

    fn sample_files() -> Vec<ArchiveFile> {
        vec![
            ArchiveFile::new("notes.txt", b"meeting at noon".to_vec(), "text/plain"),
            ArchiveFile::new("empty.bin", Vec::new(), "application/octet-stream"),
            ArchiveFile::guessed("photo.png", (0..=255u8).cycle().take(5000).collect()),
        ]
    }

    fn encrypted(pw: &str) -> Mode {
        Mode::Encrypted(password(pw))
    }

    #[test]
    fn secure_roundtrip_preserves_files_and_order() {
        let codec = codec();
        let files = sample_files();
        let archive = codec.encode(&files, &encrypted("Abcdef12"), Hooks::default()).unwrap();

        let decoded = codec.decode(&archive, &password("Abcdef12"), Hooks::default()).unwrap();
        assert_eq!(decoded.files, files);
        assert!(decoded.warnings.is_empty());
        assert_eq!(decoded.manifest.entries.len(), 3);
        assert_eq!(decoded.manifest.kdf_iterations, 10);
    }

    #[test]
    fn secure_container_layout() {
        let codec = codec();
        let archive = codec.encode(&sample_files(), &encrypted("pw"), Hooks::default()).unwrap();
        let entries = container::unpack(&archive, None).unwrap();
        assert_eq!(
            entries.names().collect::<Vec<_>>(),
            vec![
                "notes.txt.encrypted",
                "empty.bin.encrypted",
                "photo.png.encrypted",
                MANIFEST_ENTRY_NAME
            ]
        );
        let stored = entries.get("notes.txt.encrypted").unwrap();
        assert!(!stored.windows(7).any(|w| w == b"meeting"));
    }

    #[test]
    fn plain_roundtrip_and_kind_detection() {
        let codec = codec();
        let files = sample_files();
        let archive = codec.encode(&files, &Mode::Plain, Hooks::default()).unwrap();

        let opened = codec.open(&archive).unwrap();
        assert_eq!(opened.kind, ArchiveKind::Plain);
        assert_eq!(opened.entries.len(), 3);

        let extracted = codec.extract_plain(&archive, Hooks::default()).unwrap();
        assert_eq!(extracted.len(), 3);
        assert_eq!(extracted[0].data, files[0].data);
        assert_eq!(extracted[0].content_type, "text/plain");
        assert_eq!(extracted[2].content_type, "image/png");

        assert!(matches!(
            codec.decode(&archive, &password("x"), Hooks::default()),
            Err(SealError::NotASecureArchive)
        ));
        assert!(matches!(codec.inspect(&archive), Err(SealError::NotASecureArchive)));
    }

    #[test]
    fn extract_plain_refuses_secure_archive() {
        let codec = codec();
        let archive = codec.encode(&sample_files(), &encrypted("pw"), Hooks::default()).unwrap();
        assert!(matches!(
            codec.extract_plain(&archive, Hooks::default()),
            Err(SealError::SecureArchive)
        ));
        assert_eq!(codec.inspect(&archive).unwrap().entries.len(), 3);
    }

    #[test]
    fn encode_validates_inputs() {
        let codec = codec();
        assert!(matches!(
            codec.encode(&[], &encrypted("pw"), Hooks::default()),
            Err(SealError::EmptyFileList)
        ));

        let dup = vec![
            ArchiveFile::guessed("a.txt", b"1".to_vec()),
            ArchiveFile::guessed("a.txt", b"2".to_vec()),
        ];
        assert!(matches!(
            codec.encode(&dup, &Mode::Plain, Hooks::default()),
            Err(SealError::DuplicateEntry(n)) if n == "a.txt"
        ));

        for bad in ["", MANIFEST_ENTRY_NAME, "notes/", "a\0b"] {
            let files = vec![ArchiveFile::guessed(bad, b"payload".to_vec())];
            for mode in [Mode::Plain, encrypted("pw")] {
                assert!(
                    matches!(
                        codec.encode(&files, &mode, Hooks::default()),
                        Err(SealError::InvalidEntryName(n)) if n == bad
                    ),
                    "accepted {bad:?}"
                );
            }
        }

        // Nested names are regular files and round-trip.
        let nested = vec![ArchiveFile::guessed("notes/today.txt", b"payload".to_vec())];
        let archive = codec.encode(&nested, &Mode::Plain, Hooks::default()).unwrap();
        let extracted = codec.extract_plain(&archive, Hooks::default()).unwrap();
        assert_eq!(extracted, nested);

        assert!(matches!(
            codec.encode(&sample_files(), &encrypted(""), Hooks::default()),
            Err(SealError::EmptyPassword)
        ));
    }

    #[test]
    fn encode_enforces_size_limits() {
        let codec = ArchiveCodec::new(CodecOptions {
            max_file_bytes: Some(4000),
            max_archive_bytes: Some(4500),
            ..CodecOptions::default()
        });

        let big = vec![ArchiveFile::guessed("big.bin", vec![0u8; 4001])];
        assert!(matches!(
            codec.encode(&big, &Mode::Plain, Hooks::default()),
            Err(SealError::OversizeFile { size: 4001, limit: 4000, .. })
        ));

        let many = vec![
            ArchiveFile::guessed("a.bin", vec![0u8; 3000]),
            ArchiveFile::guessed("b.bin", vec![0u8; 3000]),
        ];
        assert!(matches!(
            codec.encode(&many, &Mode::Plain, Hooks::default()),
            Err(SealError::OversizeArchive { total: 6000, limit: 4500 })
        ));
    }

    #[test]
    fn wrong_password_fails_with_entry_context() {
        let codec = codec();
        let archive = codec.encode(&sample_files(), &encrypted("right"), Hooks::default()).unwrap();
        let err = codec.decode(&archive, &password("wrong"), Hooks::default()).unwrap_err();
        assert!(matches!(err.root(), SealError::WrongPasswordOrCorrupt));
        assert!(matches!(err, SealError::Entry { phase: Phase::Decrypt, .. }));
    }

    #[test]
    fn wrong_password_under_skip_still_fails() {
        let codec = ArchiveCodec::new(CodecOptions {
            kdf: KdfParams { iterations: 10 },
            entry_policy: EntryPolicy::Skip,
            ..CodecOptions::default()
        });
        let archive = codec.encode(&sample_files(), &encrypted("right"), Hooks::default()).unwrap();
        let err = codec.decode(&archive, &password("wrong"), Hooks::default()).unwrap_err();
        assert!(matches!(err.root(), SealError::WrongPasswordOrCorrupt));
    }

    #[test]
    fn abort_reports_first_failing_entry_in_order() {
        let files: Vec<_> = (0..8)
            .map(|i| ArchiveFile::guessed(format!("f{i}.txt"), vec![b'x'; 100 + i]))
            .collect();
        let broken = ["f2.txt.encrypted", "f6.txt.encrypted"];

        for parallel in [false, true] {
            let codec = ArchiveCodec::new(CodecOptions {
                kdf: KdfParams { iterations: 10 },
                parallel,
                ..CodecOptions::default()
            });
            let archive = codec.encode(&files, &encrypted("pw"), Hooks::default()).unwrap();
            let mut opened = codec.open(&archive).unwrap();
            for name in broken {
                opened.entries.remove(name);
                opened.entries.push(name, b"AAAA".to_vec()).unwrap();
            }
            let manifest = opened.kind.manifest().unwrap().to_bytes().unwrap();
            let tampered = container::pack(
                opened
                    .entries
                    .iter()
                    .map(|e| (e.name.as_str(), e.data.as_slice()))
                    .chain([(MANIFEST_ENTRY_NAME, manifest.as_slice())]),
                DEFAULT_LEVEL,
            )
            .unwrap();

            for _ in 0..5 {
                let err = codec.decode(&tampered, &password("pw"), Hooks::default()).unwrap_err();
                assert_eq!(err.entry_name(), Some("f2.txt"), "parallel = {parallel}");
                assert!(matches!(err.root(), SealError::WrongPasswordOrCorrupt));
            }
        }
    }

    #[test]
    fn decode_opened_matches_decode() {
        let codec = codec();
        let files = sample_files();
        let archive = codec.encode(&files, &encrypted("pw"), Hooks::default()).unwrap();
        let opened = codec.open(&archive).unwrap();
        assert!(opened.kind.is_secure());
        let decoded = codec.decode_opened(opened, &password("pw"), Hooks::default()).unwrap();
        assert_eq!(decoded.files, files);

        let plain = codec.encode(&files, &Mode::Plain, Hooks::default()).unwrap();
        let opened = codec.open(&plain).unwrap();
        assert!(matches!(
            codec.decode_opened(opened, &password("pw"), Hooks::default()),
            Err(SealError::NotASecureArchive)
        ));
        let opened = codec.open(&plain).unwrap();
        assert_eq!(codec.extract_opened(opened, Hooks::default()).unwrap().len(), 3);
    }

    #[test]
    fn sequential_and_parallel_agree() {
        let files = sample_files();
        for parallel in [false, true] {
            let codec = ArchiveCodec::new(CodecOptions {
                kdf: KdfParams { iterations: 10 },
                parallel,
                ..CodecOptions::default()
            });
            let archive = codec.encode(&files, &encrypted("pw"), Hooks::default()).unwrap();
            let decoded = codec.decode(&archive, &password("pw"), Hooks::default()).unwrap();
            assert_eq!(decoded.files, files);
        }
    }

    #[test]
    fn progress_counts_every_file_in_order() {
        let codec = codec();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let progress: ProgressFn = Box::new(move |p: Progress<'_>| {
            sink.lock().unwrap().push((p.done, p.total, p.phase));
        });

        codec
            .encode(&sample_files(), &encrypted("pw"), Hooks::default().with_progress(&progress))
            .unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 3);
        for (i, (done, total, phase)) in seen.iter().enumerate() {
            assert_eq!(*done, i as u64 + 1);
            assert_eq!(*total, 3);
            assert_eq!(*phase, Phase::Encrypt);
        }
    }

    #[test]
    fn cancelled_before_start_produces_nothing() {
        let codec = codec();
        let cancel = CancelFlag::new();
        cancel.cancel();
        let hooks = Hooks::default().with_cancel(&cancel);

        assert!(matches!(
            codec.encode(&sample_files(), &encrypted("pw"), hooks),
            Err(SealError::Cancelled)
        ));
        assert!(matches!(
            codec.encode(&sample_files(), &Mode::Plain, hooks),
            Err(SealError::Cancelled)
        ));
    }

    #[test]
    fn open_rejects_empty_and_garbage() {
        let codec = codec();
        assert!(matches!(codec.open(b""), Err(SealError::EmptyInput)));
        assert!(matches!(
            codec.open(b"definitely not a zip"),
            Err(SealError::MalformedContainer(_))
        ));
    }

    #[test]
    fn options_follow_config() {
        let mut config = SealConfig::default();
        config.archive.compression_level = 0;
        config.crypto.kdf_iterations = 42;
        config.decode.entry_policy = EntryPolicy::Skip;
        config.limits.max_file_mb = 0;

        let options = CodecOptions::from_config(&config);
        assert_eq!(options.compression_level, 0);
        assert_eq!(options.kdf.iterations, 42);
        assert_eq!(options.entry_policy, EntryPolicy::Skip);
        assert_eq!(options.max_file_bytes, None);
        assert_eq!(options.max_archive_bytes, Some(4096 * 1024 * 1024));
    }
}
