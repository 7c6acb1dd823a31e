//! Three-way reconciliation of an ancestor snapshot against two
//! independently evolved sides (§4.7).
//!
//! [`reconcile`] is the single public entry point; everything else in
//! this module exists to implement its four [`Mode`]s (§4.7.1) via the
//! recursive algorithm of §4.7.2, dispatching disagreements to
//! [`bidirectional`] or [`oneway`].

mod bidirectional;
mod oneway;
mod util;

pub use util::project;

use crate::change::{Change, Conflict};
use crate::entry::{Contents, CopyMode, Entry};
use crate::path;

/// Which of the four §4.7.1 propagation policies to apply.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    /// Symmetric; both sides' non-trivial concurrent changes become
    /// conflicts.
    TwoWaySafe,
    /// Symmetric in deletion handling, but alpha wins any residual
    /// conflict.
    TwoWayResolved,
    /// Beta mirrors alpha; a non-deletion change made on beta is
    /// preserved and reported as a conflict.
    OneWaySafe,
    /// Beta is an exact mirror of alpha; non-removable beta content
    /// becomes a conflict.
    OneWayReplica,
}

/// The four change lists and the conflict list a reconciliation run
/// produces (§4.7.6).
#[derive(Clone, Debug, Default)]
pub struct Output {
    pub ancestor_changes: Vec<Change>,
    pub alpha_changes: Vec<Change>,
    pub beta_changes: Vec<Change>,
    pub conflicts: Vec<Conflict>,
}

/// Reconciles `ancestor`, `alpha`, and `beta` under `mode` (§4.7.6).
#[must_use]
pub fn reconcile(ancestor: Option<&Entry>, alpha: Option<&Entry>, beta: Option<&Entry>, mode: Mode) -> Output {
    let mut out = Output::default();
    reconcile_at("", ancestor, alpha, beta, mode, &mut out);
    out
}

fn reconcile_at(
    path: &str,
    ancestor: Option<&Entry>,
    alpha: Option<&Entry>,
    beta: Option<&Entry>,
    mode: Mode,
    out: &mut Output,
) {
    // Step 1: Problematic short-circuit (§4.7.2.1). The scan phase has
    // already reported this path; do nothing until it resolves itself.
    if matches!(alpha, Some(Entry::Problematic { .. })) || matches!(beta, Some(Entry::Problematic { .. })) {
        return;
    }

    // Step 2: both-trivial (§4.7.2.2).
    let alpha_trivial = matches!(alpha, None | Some(Entry::Untracked));
    let beta_trivial = matches!(beta, None | Some(Entry::Untracked));
    if alpha_trivial && beta_trivial {
        if ancestor.is_some() {
            out.ancestor_changes.push(Change::new(path, ancestor.cloned(), None));
        }
        return;
    }

    // Step 3: shallow agreement (§4.7.2.3).
    if Entry::equal(alpha, beta, false) {
        let recursion_ancestor = if Entry::equal(ancestor, alpha, false) {
            ancestor
        } else {
            let slim_new = alpha.map(|e| e.copy(CopyMode::Slim));
            out.ancestor_changes.push(Change::new(path, ancestor.cloned(), slim_new));
            None
        };
        recurse_children(path, recursion_ancestor, alpha, beta, mode, out);
        return;
    }

    // Step 4: disagreement (§4.7.2.4) — dispatch by mode.
    match mode {
        Mode::TwoWaySafe | Mode::TwoWayResolved => {
            bidirectional::handle(path, ancestor, alpha, beta, mode, out);
        }
        Mode::OneWaySafe => {
            oneway::handle_safe(path, ancestor, alpha, beta, out);
        }
        Mode::OneWayReplica => {
            oneway::handle_replica(path, ancestor, alpha, beta, out);
        }
    }
}

fn recurse_children(
    path: &str,
    ancestor: Option<&Entry>,
    alpha: Option<&Entry>,
    beta: Option<&Entry>,
    mode: Mode,
    out: &mut Output,
) {
    let empty = Contents::new();
    let ancestor_contents = ancestor.and_then(Entry::contents).unwrap_or(&empty);
    let alpha_contents = alpha.and_then(Entry::contents).unwrap_or(&empty);
    let beta_contents = beta.and_then(Entry::contents).unwrap_or(&empty);

    for name in union_names(ancestor_contents, alpha_contents, beta_contents) {
        let child_path = path::join(path, &name);
        let ancestor_child = ancestor_contents.get(&name).map(|e| e.as_ref());
        let alpha_child = alpha_contents.get(&name).map(|e| e.as_ref());
        let beta_child = beta_contents.get(&name).map(|e| e.as_ref());
        reconcile_at(&child_path, ancestor_child, alpha_child, beta_child, mode, out);
    }
}

fn union_names(a: &Contents, b: &Contents, c: &Contents) -> Vec<String> {
    let mut seen = std::collections::BTreeSet::new();
    for contents in [a, b, c] {
        for name in contents.keys() {
            seen.insert(name.clone());
        }
    }
    seen.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::contents_from;

    fn file(bytes: &[u8]) -> Entry {
        Entry::file(bytes.to_vec(), false)
    }

    /// Scenario 1: both-sides-same-deletion (§8).
    #[test]
    fn both_sides_same_deletion() {
        let ancestor = Entry::directory(contents_from([("a", file(b"D1"))]));
        let alpha = Entry::empty_directory();
        let beta = Entry::empty_directory();
        let out = reconcile(Some(&ancestor), Some(&alpha), Some(&beta), Mode::TwoWaySafe);
        assert_eq!(out.ancestor_changes.len(), 1);
        assert_eq!(out.ancestor_changes[0].path, "a");
        assert!(out.ancestor_changes[0].new.is_none());
        assert!(out.alpha_changes.is_empty());
        assert!(out.beta_changes.is_empty());
        assert!(out.conflicts.is_empty());
    }

    /// Scenario 2: classic propagation (§8).
    #[test]
    fn classic_propagation() {
        let ancestor = Entry::empty_directory();
        let alpha = Entry::directory(contents_from([("a", file(b"D1"))]));
        let beta = Entry::empty_directory();
        let out = reconcile(Some(&ancestor), Some(&alpha), Some(&beta), Mode::TwoWaySafe);
        assert_eq!(out.beta_changes.len(), 1);
        assert_eq!(out.beta_changes[0].path, "a");
        assert!(Entry::equal(out.beta_changes[0].new.as_ref(), Some(&file(b"D1")), true));
        assert!(out.ancestor_changes.is_empty());
        assert!(out.alpha_changes.is_empty());
        assert!(out.conflicts.is_empty());
    }

    /// Scenario 3: modify-delete conflict (§8).
    #[test]
    fn modify_delete_conflict_two_way_safe() {
        let ancestor = Entry::directory(contents_from([("a", file(b"D1"))]));
        let alpha = Entry::directory(contents_from([("a", file(b"D2"))]));
        let beta = Entry::empty_directory();
        let out = reconcile(Some(&ancestor), Some(&alpha), Some(&beta), Mode::TwoWaySafe);
        assert_eq!(out.conflicts.len(), 1);
        let conflict = &out.conflicts[0];
        assert_eq!(conflict.root, "a");
        assert_eq!(conflict.alpha_changes.len(), 1);
        assert_eq!(conflict.alpha_changes[0].path, "a");
        assert!(Entry::equal(conflict.alpha_changes[0].new.as_ref(), Some(&file(b"D2")), true));
        assert_eq!(conflict.beta_changes.len(), 1);
        assert_eq!(conflict.beta_changes[0].path, "a");
        assert!(conflict.beta_changes[0].new.is_none());
        assert!(out.alpha_changes.is_empty());
        assert!(out.beta_changes.is_empty());
    }

    /// Scenario 4: modify-delete resolved (§8).
    #[test]
    fn modify_delete_resolved() {
        let ancestor = Entry::directory(contents_from([("a", file(b"D1"))]));
        let alpha = Entry::directory(contents_from([("a", file(b"D2"))]));
        let beta = Entry::empty_directory();
        let out = reconcile(Some(&ancestor), Some(&alpha), Some(&beta), Mode::TwoWayResolved);
        assert!(out.conflicts.is_empty());
        assert!(out
            .beta_changes
            .iter()
            .any(|c| c.path == "a" && Entry::equal(c.new.as_ref(), Some(&file(b"D2")), true)));
    }

    #[test]
    fn identical_independent_creation_needs_no_propagation() {
        let alpha = Entry::directory(contents_from([("a", file(b"D1"))]));
        let beta = Entry::directory(contents_from([("a", file(b"D1"))]));
        let out = reconcile(None, Some(&alpha), Some(&beta), Mode::TwoWaySafe);
        assert!(out.alpha_changes.is_empty());
        assert!(out.beta_changes.is_empty());
        assert!(out.conflicts.is_empty());
        assert_eq!(out.ancestor_changes.len(), 1);
        assert_eq!(out.ancestor_changes[0].path, "");
    }

    #[test]
    fn root_type_change_mirrored_on_both_sides_does_not_recurse_into_stale_ancestor_children() {
        let ancestor = Entry::directory(contents_from([("x", file(b"1")), ("y", file(b"2"))]));
        let alpha = file(b"whole-file");
        let beta = file(b"whole-file");
        let out = reconcile(Some(&ancestor), Some(&alpha), Some(&beta), Mode::TwoWaySafe);
        assert!(out.conflicts.is_empty());
        assert!(out.alpha_changes.is_empty());
        assert!(out.beta_changes.is_empty());
        assert_eq!(out.ancestor_changes.len(), 1);
        assert_eq!(out.ancestor_changes[0].path, "");
    }

    #[test]
    fn untracked_content_blocks_propagation_with_conflict() {
        let ancestor = Entry::empty_directory();
        let alpha = Entry::directory(contents_from([("a", file(b"D1"))]));
        let beta = Entry::directory(contents_from([("u", Entry::untracked())]));
        let out = reconcile(Some(&ancestor), Some(&alpha), Some(&beta), Mode::TwoWaySafe);
        assert!(out.beta_changes.is_empty());
        assert_eq!(out.conflicts.len(), 1);
    }
}
