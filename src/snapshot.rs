//! [`Snapshot`]: scanner output bundling a root entry, filesystem
//! behavioral metadata, and aggregate counts (§3.7).

use serde::{Deserialize, Serialize};

use crate::entry::Entry;

/// Scanner output (§3.7).
///
/// The root [`Entry`] is wrapped in `Option<Box<_>>` rather than exposed
/// as a bare `Option<Entry>` so that a serializer distinguishing "field
/// absent" from "field present but the directory is empty" doesn't need
/// a bespoke envelope type: serde's own `Option` encoding already
/// preserves exactly that distinction for every format this crate
/// targets (§9 Open Question resolution, recorded in DESIGN.md).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Snapshot {
    pub root: Option<Box<Entry>>,
    /// Whether the scanned filesystem preserves POSIX executability bits
    /// (§4.9.1).
    pub preserves_executability: bool,
    /// Whether the scanned filesystem decomposes Unicode filenames
    /// (§4.9.1), e.g. HFS+'s NFD normalization.
    pub decomposes_unicode: bool,
    pub directory_count: u64,
    pub file_count: u64,
    pub symbolic_link_count: u64,
    pub total_file_size: u64,
}

impl Snapshot {
    #[must_use]
    pub fn new(
        root: Option<Entry>,
        preserves_executability: bool,
        decomposes_unicode: bool,
        directory_count: u64,
        file_count: u64,
        symbolic_link_count: u64,
        total_file_size: u64,
    ) -> Self {
        Self {
            root: root.map(Box::new),
            preserves_executability,
            decomposes_unicode,
            directory_count,
            file_count,
            symbolic_link_count,
            total_file_size,
        }
    }

    #[must_use]
    pub fn root(&self) -> Option<&Entry> {
        self.root.as_deref()
    }

    #[must_use]
    pub fn empty(preserves_executability: bool, decomposes_unicode: bool) -> Self {
        Self::new(None, preserves_executability, decomposes_unicode, 0, 0, 0, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nil_root_distinguished_from_empty_directory_in_json() {
        let nil = Snapshot::empty(true, false);
        let empty_dir = Snapshot::new(Some(Entry::empty_directory()), true, false, 1, 0, 0, 0);

        let nil_json = serde_json::to_value(&nil).unwrap();
        let empty_dir_json = serde_json::to_value(&empty_dir).unwrap();

        assert!(nil_json["root"].is_null());
        assert!(!empty_dir_json["root"].is_null());
        assert_ne!(nil_json, empty_dir_json);
    }

    #[test]
    fn round_trips_through_json() {
        let snap = Snapshot::new(
            Some(Entry::file(vec![1, 2, 3], true)),
            true,
            false,
            0,
            1,
            0,
            3,
        );
        let json = serde_json::to_string(&snap).unwrap();
        let back: Snapshot = serde_json::from_str(&json).unwrap();
        assert!(Entry::equal(snap.root(), back.root(), true));
        assert_eq!(back.file_count, 1);
    }
}
