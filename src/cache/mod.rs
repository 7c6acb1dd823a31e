//! Per-path digest cache and its digest-keyed reverse lookup (§3.5, §4.4).
//!
//! A [`Cache`] lets the scanner skip re-hashing a file whose identity,
//! modification time, and size haven't changed since the last scan. The
//! accompanying [`ReverseLookupMap`] lets the reconciler's rename/copy
//! heuristics (and other acceleration features in collaborating
//! components) find a path by the digest of its content.

mod reverse_lookup;

pub use reverse_lookup::ReverseLookupMap;

use std::time::SystemTime;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::entry::Digest;
use crate::error::ValidationError;

/// Opaque per-host file identity (device + inode on POSIX). Two
/// [`CacheEntry`]s with the same `FileId` are assumed, together with a
/// matching size and modification time, to name the same file content.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileId {
    pub device: u64,
    pub inode: u64,
}

impl FileId {
    #[must_use]
    pub fn new(device: u64, inode: u64) -> Self {
        Self { device, inode }
    }

    #[cfg(unix)]
    #[must_use]
    pub fn from_metadata(metadata: &std::fs::Metadata) -> Self {
        use std::os::unix::fs::MetadataExt;
        Self { device: metadata.dev(), inode: metadata.ino() }
    }

    /// Best-effort identity on non-POSIX hosts: `std::fs::Metadata` carries
    /// no device/inode pair there, so every entry reports device `0`.
    /// `inode` is reused as a cheap, not-guaranteed-unique stand-in
    /// derived from the file's length and modification time, which is
    /// still enough to catch the common "this file didn't change" case
    /// the cache is an optimization for; a false cache hit only costs a
    /// re-hash on the next scan; see §4.4.
    #[cfg(not(unix))]
    #[must_use]
    pub fn from_metadata(metadata: &std::fs::Metadata) -> Self {
        use std::hash::{Hash, Hasher as _};
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        metadata.len().hash(&mut hasher);
        if let Ok(modified) = metadata.modified() {
            modified.hash(&mut hasher);
        }
        Self { device: 0, inode: hasher.finish() }
    }
}

/// A single cached file observation: `(mode, modification_time, size,
/// file_id, digest)` (§3.5).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub mode: u32,
    pub modification_time: SystemTime,
    pub size: u64,
    pub file_id: FileId,
    pub digest: Digest,
}

impl CacheEntry {
    #[must_use]
    pub fn new(mode: u32, modification_time: SystemTime, size: u64, file_id: FileId, digest: Digest) -> Self {
        Self { mode, modification_time, size, file_id, digest }
    }

    /// Whether `self` still describes `other`'s on-disk identity: same
    /// kind-masked mode, mtime, size, and file id. Does not compare
    /// digests — that's the point of the cache hit.
    #[must_use]
    pub fn matches_identity(&self, mode: u32, modification_time: SystemTime, size: u64, file_id: FileId) -> bool {
        self.mode == mode
            && self.modification_time == modification_time
            && self.size == size
            && self.file_id == file_id
    }
}

/// Per-path digest memo (§3.5). Keyed by root-relative path.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Cache {
    pub entries: IndexMap<String, CacheEntry>,
}

impl Cache {
    #[must_use]
    pub fn new() -> Self {
        Self { entries: IndexMap::new() }
    }

    #[must_use]
    pub fn get(&self, path: &str) -> Option<&CacheEntry> {
        self.entries.get(path)
    }

    pub fn insert(&mut self, path: impl Into<String>, entry: CacheEntry) {
        self.entries.insert(path.into(), entry);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Validates that every entry has a non-nil, temporally valid
    /// modification time. `SystemTime` in this implementation has no nil
    /// representation, so this is primarily a structural placeholder
    /// matching §3.5's invariant statement; it does reject times that
    /// cannot be compared against `UNIX_EPOCH`, which would indicate a
    /// corrupted deserialization.
    pub fn validate(&self) -> Result<(), ValidationError> {
        for (path, entry) in &self.entries {
            if entry.modification_time.duration_since(SystemTime::UNIX_EPOCH).is_err() {
                return Err(ValidationError::InvalidCacheEntry(path.clone()));
            }
        }
        Ok(())
    }

    /// Testing predicate: same paths, same entries.
    #[must_use]
    pub fn equal(&self, other: &Cache) -> bool {
        self.entries.len() == other.entries.len()
            && self.entries.iter().all(|(path, entry)| other.entries.get(path) == Some(entry))
    }

    /// Builds the digest-keyed reverse lookup map for this cache (§4.4).
    /// Fails if entries have mixed or unsupported digest widths. An
    /// empty cache yields an empty map of the 20-byte (SHA-1) variant by
    /// convention, since there is no width to infer.
    pub fn reverse_lookup_map(&self) -> Result<ReverseLookupMap, ValidationError> {
        reverse_lookup::build(&self.entries)
    }
}
