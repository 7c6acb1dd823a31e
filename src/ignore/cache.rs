//! Memoisation of ignore decisions, keyed by `(path, is_directory)`
//! (§3.6). Losing this cache is a performance regression, never a
//! correctness one: every entry can always be recomputed from the
//! [`super::Matcher`].

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// `(path, is_directory) -> ignored` memo (§3.6).
///
/// Keyed by a single string rather than a `(String, bool)` tuple: a tuple
/// key would make this type unserializable to JSON (`serde_json` requires
/// map keys to serialize as strings), and the ambient serialization note
/// in SPEC_FULL §3 applies to every cache type a session manager might
/// persist alongside a `Cache`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct IgnoreCache {
    entries: IndexMap<String, bool>,
}

fn key(path: &str, is_directory: bool) -> String {
    let mut k = String::with_capacity(path.len() + 1);
    k.push(if is_directory { 'd' } else { 'f' });
    k.push_str(path);
    k
}

impl IgnoreCache {
    #[must_use]
    pub fn new() -> Self {
        Self { entries: IndexMap::new() }
    }

    #[must_use]
    pub fn get(&self, path: &str, is_directory: bool) -> Option<bool> {
        self.entries.get(&key(path, is_directory)).copied()
    }

    pub fn insert(&mut self, path: impl Into<String>, is_directory: bool, ignored: bool) {
        self.entries.insert(key(&path.into(), is_directory), ignored);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_by_path_and_kind() {
        let mut cache = IgnoreCache::new();
        cache.insert("a", true, false);
        cache.insert("a", false, true);
        assert_eq!(cache.get("a", true), Some(false));
        assert_eq!(cache.get("a", false), Some(true));
        assert_eq!(cache.get("b", true), None);
    }

    #[test]
    fn serializes_to_json_despite_composite_key() {
        let mut cache = IgnoreCache::new();
        cache.insert("a/b", true, false);
        let json = serde_json::to_string(&cache).unwrap();
        let back: IgnoreCache = serde_json::from_str(&json).unwrap();
        assert_eq!(back.get("a/b", true), Some(false));
    }
}
