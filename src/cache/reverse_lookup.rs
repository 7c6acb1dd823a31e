//! Digest-keyed reverse lookup over a [`super::Cache`] (§4.4, §6).
//!
//! Supported digest widths are 16 (MD5), 20 (SHA-1), and 32 (SHA-256)
//! bytes, matching the three hash functions `scan::hash` offers. A cache
//! containing entries of more than one width — or a width outside that
//! set — fails to build a map at all, rather than silently dropping
//! entries.

use std::collections::HashMap;

use indexmap::IndexMap;

use super::CacheEntry;
use crate::error::ValidationError;

/// Maps a content digest back to the path that produced it, for one of
/// the three supported digest widths.
#[derive(Clone, Debug, Default)]
pub enum ReverseLookupMap {
    #[default]
    Empty,
    Width16(HashMap<[u8; 16], String>),
    Width20(HashMap<[u8; 20], String>),
    Width32(HashMap<[u8; 32], String>),
}

impl ReverseLookupMap {
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Empty => 0,
            Self::Width16(m) => m.len(),
            Self::Width20(m) => m.len(),
            Self::Width32(m) => m.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Looks up the path recorded for `digest`, if any.
    #[must_use]
    pub fn lookup(&self, digest: &[u8]) -> Option<&str> {
        match self {
            Self::Empty => None,
            Self::Width16(m) => <&[u8; 16]>::try_from(digest).ok().and_then(|d| m.get(d)).map(String::as_str),
            Self::Width20(m) => <&[u8; 20]>::try_from(digest).ok().and_then(|d| m.get(d)).map(String::as_str),
            Self::Width32(m) => <&[u8; 32]>::try_from(digest).ok().and_then(|d| m.get(d)).map(String::as_str),
        }
    }
}

pub fn build(entries: &IndexMap<String, CacheEntry>) -> Result<ReverseLookupMap, ValidationError> {
    let Some(first) = entries.values().next() else {
        return Ok(ReverseLookupMap::Empty);
    };
    let width = first.digest.len();
    match width {
        16 => build_fixed::<16>(entries).map(ReverseLookupMap::Width16),
        20 => build_fixed::<20>(entries).map(ReverseLookupMap::Width20),
        32 => build_fixed::<32>(entries).map(ReverseLookupMap::Width32),
        found => Err(ValidationError::MixedOrUnsupportedDigestWidth { found }),
    }
}

fn build_fixed<const N: usize>(
    entries: &IndexMap<String, CacheEntry>,
) -> Result<HashMap<[u8; N], String>, ValidationError> {
    let mut map = HashMap::with_capacity(entries.len());
    for (path, entry) in entries {
        let bytes: [u8; N] = entry
            .digest
            .as_ref()
            .try_into()
            .map_err(|_| ValidationError::MixedOrUnsupportedDigestWidth { found: entry.digest.len() })?;
        map.insert(bytes, path.clone());
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use super::*;
    use crate::cache::{Cache, FileId};
    use crate::entry::Digest;

    fn cache_with(paths_and_digests: &[(&str, Vec<u8>)]) -> Cache {
        let mut cache = Cache::new();
        for (path, digest) in paths_and_digests {
            cache.insert(
                *path,
                crate::cache::CacheEntry::new(
                    0o644,
                    SystemTime::UNIX_EPOCH,
                    1,
                    FileId::new(1, 1),
                    Digest::from(digest.clone()),
                ),
            );
        }
        cache
    }

    #[test]
    fn empty_cache_yields_empty_map() {
        let map = Cache::new().reverse_lookup_map().unwrap();
        assert_eq!(map.len(), 0);
    }

    #[test]
    fn round_trips_each_entry_by_digest() {
        let cache = cache_with(&[("a", vec![1; 20]), ("b", vec![2; 20])]);
        let map = cache.reverse_lookup_map().unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map.lookup(&[1; 20]), Some("a"));
        assert_eq!(map.lookup(&[2; 20]), Some("b"));
    }

    #[test]
    fn mixed_widths_are_rejected() {
        let cache = cache_with(&[("a", vec![1; 20]), ("b", vec![2; 16])]);
        assert!(cache.reverse_lookup_map().is_err());
    }

    #[test]
    fn unsupported_width_is_rejected() {
        let cache = cache_with(&[("a", vec![1; 8])]);
        assert!(cache.reverse_lookup_map().is_err());
    }
}

#[cfg(test)]
mod property_tests {
    use std::time::SystemTime;

    use proptest::prelude::*;

    use super::*;
    use crate::cache::{Cache, FileId};
    use crate::entry::Digest;

    /// §8: for a cache with uniform 20-byte digests, the reverse lookup
    /// map has exactly as many entries as the cache, and each original
    /// digest resolves back to its path.
    fn uniform_cache() -> impl Strategy<Value = Cache> {
        proptest::collection::hash_map("[a-z]{1,8}", proptest::collection::vec(any::<u8>(), 20..=20), 0..6)
            .prop_map(|paths_and_digests| {
                let mut cache = Cache::new();
                for (path, digest) in paths_and_digests {
                    cache.insert(
                        path,
                        crate::cache::CacheEntry::new(0o644, SystemTime::UNIX_EPOCH, 1, FileId::new(1, 1), Digest::from(digest)),
                    );
                }
                cache
            })
    }

    proptest! {
        #[test]
        fn reverse_lookup_map_length_matches_entry_count(cache in uniform_cache()) {
            let map = cache.reverse_lookup_map().unwrap();
            prop_assert_eq!(map.len(), cache.entries.len());
        }

        #[test]
        fn every_entry_resolves_back_to_its_path(cache in uniform_cache()) {
            let map = cache.reverse_lookup_map().unwrap();
            for (path, entry) in &cache.entries {
                prop_assert_eq!(map.lookup(entry.digest.as_ref()), Some(path.as_str()));
            }
        }
    }
}
