//! Shared helpers for the mode-specific disagreement handlers (§4.7.3 –
//! §4.7.5): synchronizable projection, deletion classification, and the
//! "unsynchronizable content blocks propagation" check that recurs in
//! every mode.

use crate::change::Change;
use crate::diff::diff;
use crate::entry::Entry;

/// The synchronizable projection of a (possibly absent) side, per
/// §4.7.3: "operate on synchronizable projections ... This filtering
/// preserves the invariants and makes later decisions tractable."
#[must_use]
pub fn project(side: Option<&Entry>) -> Option<Entry> {
    side.and_then(Entry::synchronizable)
}

/// Whether every change in `changes` is a deletion (`new == None`).
/// Vacuously false for an empty list — callers check emptiness
/// separately, matching §4.7.3's "If both diffs contain only deletions"
/// phrasing, which presupposes at least one change exists.
#[must_use]
pub fn all_deletions(changes: &[Change]) -> bool {
    !changes.is_empty() && changes.iter().all(Change::is_deletion)
}

/// Whether `changes` contains at least one non-deletion change.
#[must_use]
pub fn has_non_deletion(changes: &[Change]) -> bool {
    changes.iter().any(|c| !c.is_deletion())
}

/// The subset of `changes` that are not deletions, cloned out in order.
#[must_use]
pub fn non_deletion(changes: &[Change]) -> Vec<Change> {
    changes.iter().filter(|c| !c.is_deletion()).cloned().collect()
}

/// The "unsynchronizable delta" at `path`: content present in the raw
/// side (`actual`) but dropped by its synchronizable projection
/// (`projection`). A non-empty result means Untracked/Problematic/
/// PhantomDirectory content sits where a propagated change would need to
/// land, and propagation must be blocked (§4.7.3, §4.7.4, §4.7.5).
#[must_use]
pub fn unsynchronizable_blockage(path: &str, projection: Option<&Entry>, actual: Option<&Entry>) -> Vec<Change> {
    diff_rooted(path, projection, actual)
}

/// `diff(base, target)`, with every returned change's path re-rooted
/// under `path`. `diff` always anchors its own recursion at `""`, so a
/// caller reconciling at a non-root `path` must reparent the result
/// before folding it into an [`Output`](super::Output) or
/// [`Conflict`](crate::change::Conflict) — otherwise nested
/// modify/delete collisions would misreport as changes at the tree
/// root.
#[must_use]
pub fn diff_rooted(path: &str, base: Option<&Entry>, target: Option<&Entry>) -> Vec<Change> {
    diff(base, target)
        .into_iter()
        .map(|mut c| {
            c.path = match (path.is_empty(), c.path.is_empty()) {
                (_, true) => path.to_owned(),
                (true, false) => c.path,
                (false, false) => crate::path::join(path, &c.path),
            };
            c
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::Change;
    use crate::entry::contents_from;

    fn file(bytes: &[u8]) -> Entry {
        Entry::file(bytes.to_vec(), false)
    }

    #[test]
    fn project_drops_untracked_root() {
        assert!(project(Some(&Entry::untracked())).is_none());
    }

    #[test]
    fn project_filters_nested_untracked() {
        let tree = Entry::directory(contents_from([("f", file(b"1")), ("u", Entry::untracked())]));
        let projected = project(Some(&tree)).unwrap();
        let Entry::Directory { contents } = projected else { panic!() };
        assert_eq!(contents.len(), 1);
    }

    #[test]
    fn all_deletions_requires_nonempty() {
        assert!(!all_deletions(&[]));
        assert!(all_deletions(&[Change::new("a", Some(file(b"1")), None)]));
        assert!(!all_deletions(&[Change::new("a", None, Some(file(b"1")))]));
    }

    #[test]
    fn blockage_is_empty_when_actual_matches_projection() {
        let tree = Entry::directory(contents_from([("f", file(b"1"))]));
        assert!(unsynchronizable_blockage("", Some(&tree), Some(&tree)).is_empty());
    }

    #[test]
    fn blockage_reports_untracked_addition() {
        let projected = Entry::empty_directory();
        let actual = Entry::directory(contents_from([("u", Entry::untracked())]));
        let blockage = unsynchronizable_blockage("", Some(&projected), Some(&actual));
        assert_eq!(blockage.len(), 1);
        assert_eq!(blockage[0].path, "u");
    }
}
