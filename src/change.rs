//! [`Change`], [`Conflict`], and [`Problem`] — the vocabulary [`crate::diff`],
//! [`crate::apply`], [`crate::reconcile`], and [`crate::transition`] all
//! speak (§3.2, §3.3, §3.4).

use serde::{Deserialize, Serialize};

use crate::entry::Entry;

/// Replace whatever is at `path` (expected, though not verified by
/// [`crate::apply::apply`], to equal `old`) with `new`.
///
/// A `new` of `None` denotes a deletion. A `new` whose kind differs from
/// `old`'s kind at `path == ""` denotes a root type change.
///
/// Per §9's Open Question, `old == new` is a legal — if unusual —
/// change: it is how unidirectional modes report a synthetic "nothing
/// changed on this side, but here's the full content for context" entry
/// in a [`Conflict`]. Validation never compares `old` to `new`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Change {
    pub path: String,
    pub old: Option<Entry>,
    pub new: Option<Entry>,
}

impl Change {
    #[must_use]
    pub fn new(path: impl Into<String>, old: Option<Entry>, new: Option<Entry>) -> Self {
        Self { path: path.into(), old, new }
    }

    /// A change at the synchronization root.
    #[must_use]
    pub fn root(old: Option<Entry>, new: Option<Entry>) -> Self {
        Self::new("", old, new)
    }

    #[must_use]
    pub fn is_root(&self) -> bool {
        self.path.is_empty()
    }

    /// A change whose `new` is `None`: a deletion.
    #[must_use]
    pub fn is_deletion(&self) -> bool {
        self.new.is_none()
    }
}

/// A mutually incompatible pair of change sets at some path (§3.3). Both
/// lists must be non-empty and individually valid.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Conflict {
    pub root: String,
    pub alpha_changes: Vec<Change>,
    pub beta_changes: Vec<Change>,
}

impl Conflict {
    #[must_use]
    pub fn new(root: impl Into<String>, alpha_changes: Vec<Change>, beta_changes: Vec<Change>) -> Self {
        Self { root: root.into(), alpha_changes, beta_changes }
    }

    /// Both change lists are non-empty, as required by §3.3.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.alpha_changes.is_empty() && !self.beta_changes.is_empty()
    }
}

/// A `(path, error_message)` pair surfaced during scanning or transition
/// (§3.4). `error` is always non-empty.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Problem {
    pub path: String,
    pub error: String,
}

impl Problem {
    #[must_use]
    pub fn new(path: impl Into<String>, error: impl Into<String>) -> Self {
        Self { path: path.into(), error: error.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_change_has_empty_path() {
        let c = Change::root(None, None);
        assert!(c.is_root());
    }

    #[test]
    fn deletion_has_no_new_entry() {
        let c = Change::new("a", Some(Entry::untracked()), None);
        assert!(c.is_deletion());
    }

    #[test]
    fn old_equal_to_new_is_a_legal_synthetic_change() {
        let e = Entry::untracked();
        let c = Change::new("a", Some(e.clone()), Some(e));
        assert!(!c.is_deletion());
    }

    #[test]
    fn conflict_requires_both_sides_nonempty() {
        let c = Conflict::new("a", vec![Change::root(None, None)], vec![]);
        assert!(!c.is_valid());
        let c = Conflict::new(
            "a",
            vec![Change::root(None, None)],
            vec![Change::root(None, None)],
        );
        assert!(c.is_valid());
    }
}
