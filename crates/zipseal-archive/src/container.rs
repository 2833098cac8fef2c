//! ZIP container: named byte entries, deflated
//!
//! This is the only place that talks to the `zip` crate. Everything above it
//! sees an ordered list of unique `(name, bytes)` pairs.

use std::collections::{HashMap, HashSet};
use std::io::{Cursor, Read, Write};

use zip::write::SimpleFileOptions;
use zip::CompressionMethod;
use zipseal_core::{SealError, SealResult};

/// Default deflate level
pub const DEFAULT_LEVEL: u32 = 6;

/// Upper bound on the buffer reserved up front for one entry
const PREALLOC_LIMIT: u64 = 1 << 20;

/// One named entry
#[derive(Clone, PartialEq, Eq)]
pub struct ContainerEntry {
    pub name: String,
    pub data: Vec<u8>,
}

impl std::fmt::Debug for ContainerEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContainerEntry")
            .field("name", &self.name)
            .field("size", &self.data.len())
            .finish()
    }
}

/// Entries read from a container, in archive order, with lookup by name.
#[derive(Debug, Default)]
pub struct Entries {
    entries: Vec<ContainerEntry>,
    index: HashMap<String, usize>,
}

impl Entries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry; fails if the name is already present.
    pub fn push(&mut self, name: impl Into<String>, data: Vec<u8>) -> SealResult<()> {
        let name = name.into();
        if self.index.contains_key(&name) {
            return Err(SealError::DuplicateEntry(name));
        }
        self.index.insert(name.clone(), self.entries.len());
        self.entries.push(ContainerEntry { name, data });
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.index
            .get(name)
            .map(|&i| self.entries[i].data.as_slice())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Remove an entry by name, keeping the order of the rest.
    pub fn remove(&mut self, name: &str) -> Option<Vec<u8>> {
        let i = self.index.remove(name)?;
        let removed = self.entries.remove(i);
        for slot in self.index.values_mut() {
            if *slot > i {
                *slot -= 1;
            }
        }
        Some(removed.data)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ContainerEntry> {
        self.entries.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    /// Total uncompressed bytes across all entries
    pub fn total_size(&self) -> u64 {
        self.entries.iter().map(|e| e.data.len() as u64).sum()
    }

    pub fn into_vec(self) -> Vec<ContainerEntry> {
        self.entries
    }
}

/// Incremental ZIP writer over an in-memory buffer.
pub struct ContainerWriter {
    writer: zip::ZipWriter<Cursor<Vec<u8>>>,
    method: CompressionMethod,
    level: Option<i64>,
    seen: HashSet<String>,
}

impl ContainerWriter {
    /// `level` 0 stores entries uncompressed; 1-9 deflates at that level.
    pub fn new(level: u32) -> Self {
        let (method, level) = match level.min(9) {
            0 => (CompressionMethod::Stored, None),
            n => (CompressionMethod::Deflated, Some(i64::from(n))),
        };
        Self {
            writer: zip::ZipWriter::new(Cursor::new(Vec::new())),
            method,
            level,
            seen: HashSet::new(),
        }
    }

    pub fn add(&mut self, name: &str, data: &[u8]) -> SealResult<()> {
        if !self.seen.insert(name.to_string()) {
            return Err(SealError::DuplicateEntry(name.to_string()));
        }
        let options = SimpleFileOptions::default()
            .compression_method(self.method)
            .compression_level(self.level)
            .large_file(data.len() as u64 >= u64::from(u32::MAX));
        self.writer.start_file(name, options).map_err(pack_error)?;
        self.writer.write_all(data)?;
        Ok(())
    }

    pub fn finish(self) -> SealResult<Vec<u8>> {
        let cursor = self.writer.finish().map_err(pack_error)?;
        Ok(cursor.into_inner())
    }
}

/// Pack entries into a ZIP container in one call.
pub fn pack<'a, I>(entries: I, level: u32) -> SealResult<Vec<u8>>
where
    I: IntoIterator<Item = (&'a str, &'a [u8])>,
{
    let mut writer = ContainerWriter::new(level);
    for (name, data) in entries {
        writer.add(name, data)?;
    }
    writer.finish()
}

/// Unpack every file entry of a ZIP container.
///
/// Directory entries are skipped. `max_total` caps the sum of uncompressed
/// entry sizes; passing it is reported as a malformed container.
pub fn unpack(bytes: &[u8], max_total: Option<u64>) -> SealResult<Entries> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| SealError::MalformedContainer(e.to_string()))?;

    let limit = max_total.unwrap_or(u64::MAX);
    let mut total: u64 = 0;
    let mut entries = Entries::new();

    for i in 0..archive.len() {
        let file = archive
            .by_index(i)
            .map_err(|e| SealError::MalformedContainer(format!("entry {i}: {e}")))?;
        if file.is_dir() {
            continue;
        }
        let name = file.name().to_string();

        let remaining = limit.saturating_sub(total);
        if file.size() > remaining {
            return Err(SealError::MalformedContainer(format!(
                "uncompressed content exceeds the {limit}-byte limit at {name}"
            )));
        }

        // The header size is untrusted; only use it as a bounded hint.
        let declared = file.size();
        let mut data = Vec::with_capacity(declared.min(PREALLOC_LIMIT) as usize);
        file.take(remaining.saturating_add(1))
            .read_to_end(&mut data)
            .map_err(|e| SealError::MalformedContainer(format!("{name}: {e}")))?;
        total = total.saturating_add(data.len() as u64);
        if total > limit {
            return Err(SealError::MalformedContainer(format!(
                "uncompressed content exceeds the {limit}-byte limit at {name}"
            )));
        }
        if data.len() as u64 != declared {
            return Err(SealError::MalformedContainer(format!(
                "{name}: header declares {declared} bytes but entry holds {}",
                data.len()
            )));
        }

        entries.push(name, data).map_err(|e| match e {
            SealError::DuplicateEntry(name) => {
                SealError::MalformedContainer(format!("duplicate entry name: {name}"))
            }
            other => other,
        })?;
    }

    Ok(entries)
}

fn pack_error(e: zip::result::ZipError) -> SealError {
    SealError::Io(std::io::Error::new(std::io::ErrorKind::Other, e))
}
