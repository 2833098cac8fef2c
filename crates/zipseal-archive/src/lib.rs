//! zipseal-archive: secure archive container codec
//!
//! # Overview
//! - `container`: ZIP packing/unpacking of named byte entries
//! - `manifest`: the plaintext manifest describing each encrypted file
//! - `codec`: encode/decode orchestration, per-file encryption, entry policy

pub mod codec;
pub mod container;
pub mod manifest;

// Convenience re-exports for the most common operations
pub use codec::{
    ArchiveCodec, ArchiveKind, CodecOptions, DecodedArchive, EntryWarning, Mode, OpenedArchive,
};
pub use container::{pack, unpack, ContainerEntry, ContainerWriter, Entries};
pub use manifest::{stored_name, Manifest, ManifestEntry, MANIFEST_ENTRY_NAME, STORED_SUFFIX};
pub use zipseal_core::config::EntryPolicy;
