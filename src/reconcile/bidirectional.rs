//! Two-Way-Safe / Two-Way-Resolved disagreement handling (§4.7.3).
//!
//! Entered once §4.7.2 has established that alpha and beta disagree
//! shallowly at `path`, neither side is `Problematic`, and at least one
//! side is non-nil.
//!
//! The "both/one purely deletion" heuristics only make sense when the
//! ancestor at this exact path is itself a directory: they describe a
//! side removing a *subset* of a multi-child tree while the other side
//! works on the rest of it. When the ancestor is a leaf (file, symbolic
//! link, or absent), any divergence — even one where a side's lone
//! change happens to be a deletion — is a direct modify/delete collision
//! on a single object and must fall through to the generic conflict
//! handling below (§8 scenario 3/4 depend on this: a file modified on
//! one side and deleted on the other is a conflict in Two-Way-Safe, not
//! an automatic deletion-propagation).

use super::util::{all_deletions, diff_rooted, has_non_deletion, non_deletion, project, unsynchronizable_blockage};
use super::{Mode, Output};
use crate::change::{Change, Conflict};
use crate::entry::Entry;

pub fn handle(
    path: &str,
    ancestor: Option<&Entry>,
    alpha: Option<&Entry>,
    beta: Option<&Entry>,
    mode: Mode,
    out: &mut Output,
) {
    let alpha_projection = project(alpha);
    let beta_projection = project(beta);

    let alpha_diff = diff_rooted(path, ancestor, alpha_projection.as_ref());
    let beta_diff = diff_rooted(path, ancestor, beta_projection.as_ref());

    if beta_diff.is_empty() {
        propagate_or_conflict(path, alpha, beta, &alpha_diff, &beta_projection, true, out);
        return;
    }
    if alpha_diff.is_empty() {
        propagate_or_conflict(path, beta, alpha, &beta_diff, &alpha_projection, false, out);
        return;
    }

    let ancestor_is_directory = matches!(ancestor, Some(e) if e.is_directory_kind());

    if ancestor_is_directory {
        if all_deletions(&alpha_diff) && all_deletions(&beta_diff) {
            both_pure_deletions(path, alpha, beta, &alpha_projection, &beta_projection, out);
            return;
        }
        if all_deletions(&alpha_diff) && has_non_deletion(&beta_diff) {
            one_pure_deletion(path, alpha, beta, &alpha_projection, true, &beta_diff, out);
            return;
        }
        if all_deletions(&beta_diff) && has_non_deletion(&alpha_diff) {
            one_pure_deletion(path, beta, alpha, &beta_projection, false, &alpha_diff, out);
            return;
        }
    }

    // Both non-deletion (a directory with genuine concurrent edits on
    // both sides), or a direct single-object modify/delete collision
    // under a leaf ancestor — the latter reports the full, unfiltered
    // diffs rather than just their non-deletion subset.
    let (alpha_report, beta_report) = if ancestor_is_directory {
        (non_deletion(&alpha_diff), non_deletion(&beta_diff))
    } else {
        (alpha_diff.clone(), beta_diff.clone())
    };
    match mode {
        Mode::TwoWaySafe => {
            out.conflicts.push(Conflict::new(path, alpha_report, beta_report));
        }
        Mode::TwoWayResolved => {
            let blockage = unsynchronizable_blockage(path, beta_projection.as_ref(), beta);
            if blockage.is_empty() {
                out.beta_changes.push(Change::new(path, beta.cloned(), alpha.cloned()));
            } else {
                out.conflicts.push(Conflict::new(path, alpha_report, blockage));
            }
        }
        _ => unreachable!("bidirectional::handle is only called for two-way modes"),
    }
}

/// Handles the "classic three-way" branch: one side's diff (from
/// `ancestor`) is empty, so the other side's content (if unblocked by
/// unsynchronizable content) simply propagates across.
///
/// `mover_is_alpha` selects which side is the mover: when `true`,
/// `mover_diff` is `alpha_diff` (non-empty) and the stationary side is
/// beta; when `false` it's the mirror image.
fn propagate_or_conflict(
    path: &str,
    mover: Option<&Entry>,
    stationary: Option<&Entry>,
    mover_diff: &[Change],
    stationary_projection: &Option<Entry>,
    mover_is_alpha: bool,
    out: &mut Output,
) {
    if mover_diff.is_empty() {
        // Neither side actually changed anything synchronizable; §4.7.2
        // step 3 would already have handled true agreement, so this only
        // happens when the disagreement is entirely unsynchronizable
        // content on the mover side, which the caller should not reach.
        return;
    }
    let blockage = unsynchronizable_blockage(path, stationary_projection.as_ref(), stationary);
    if blockage.is_empty() {
        if mover_is_alpha {
            out.beta_changes.push(Change::new(path, stationary.cloned(), mover.cloned()));
        } else {
            out.alpha_changes.push(Change::new(path, stationary.cloned(), mover.cloned()));
        }
        return;
    }
    if mover_is_alpha {
        out.conflicts.push(Conflict::new(path, mover_diff.to_vec(), blockage));
    } else {
        out.conflicts.push(Conflict::new(path, blockage, mover_diff.to_vec()));
    }
}

fn both_pure_deletions(
    path: &str,
    alpha: Option<&Entry>,
    beta: Option<&Entry>,
    alpha_projection: &Option<Entry>,
    beta_projection: &Option<Entry>,
    out: &mut Output,
) {
    let alpha_trivial = matches!(alpha, None | Some(Entry::Untracked));
    let beta_trivial = matches!(beta, None | Some(Entry::Untracked));
    if alpha_trivial && !beta_trivial {
        let blockage = unsynchronizable_blockage(path, beta_projection.as_ref(), beta);
        if blockage.is_empty() {
            out.beta_changes.push(Change::new(path, beta.cloned(), None));
        } else {
            out.conflicts.push(Conflict::new(path, vec![Change::new(path, alpha.cloned(), None)], blockage));
        }
    } else if beta_trivial && !alpha_trivial {
        let blockage = unsynchronizable_blockage(path, alpha_projection.as_ref(), alpha);
        if blockage.is_empty() {
            out.alpha_changes.push(Change::new(path, alpha.cloned(), None));
        } else {
            out.conflicts.push(Conflict::new(path, blockage, vec![Change::new(path, beta.cloned(), None)]));
        }
    } else {
        // Neither side is a complete deletion: both independently deleted
        // a strict, non-identical subset of the ancestor's contents.
        // Resolution: alpha's remaining (smaller) state wins, mirroring
        // Two-Way-Resolved's general "alpha wins" tie-break (§9 Open
        // Question judgment call, recorded in DESIGN.md).
        let blockage = unsynchronizable_blockage(path, beta_projection.as_ref(), beta);
        if blockage.is_empty() {
            out.beta_changes.push(Change::new(path, beta.cloned(), alpha.cloned()));
        } else {
            out.conflicts.push(Conflict::new(path, vec![Change::new(path, alpha.cloned(), None)], blockage));
        }
    }
}

fn one_pure_deletion(
    path: &str,
    deleting_side_raw: Option<&Entry>,
    content_side_raw: Option<&Entry>,
    deleting_side_projection: &Option<Entry>,
    deletion_is_alpha: bool,
    content_diff: &[Change],
    out: &mut Output,
) {
    let blockage = unsynchronizable_blockage(path, deleting_side_projection.as_ref(), deleting_side_raw);
    if blockage.is_empty() {
        if deletion_is_alpha {
            out.alpha_changes.push(Change::new(path, deleting_side_raw.cloned(), content_side_raw.cloned()));
        } else {
            out.beta_changes.push(Change::new(path, deleting_side_raw.cloned(), content_side_raw.cloned()));
        }
    } else if deletion_is_alpha {
        out.conflicts.push(Conflict::new(path, blockage, content_diff.to_vec()));
    } else {
        out.conflicts.push(Conflict::new(path, content_diff.to_vec(), blockage));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::contents_from;
    use crate::reconcile::reconcile;

    fn file(bytes: &[u8]) -> Entry {
        Entry::file(bytes.to_vec(), false)
    }

    #[test]
    fn directory_subset_deletion_propagates_to_less_deleted_side() {
        let ancestor = Entry::directory(contents_from([("a", file(b"1")), ("b", file(b"2"))]));
        let alpha = Entry::untracked(); // alpha removed the whole thing
        let beta = Entry::directory(contents_from([("b", file(b"2"))])); // beta kept "b"
        let out = reconcile(Some(&ancestor), Some(&alpha), Some(&beta), Mode::TwoWaySafe);
        assert!(out.conflicts.is_empty());
        assert!(out.beta_changes.iter().any(|c| c.path == "" && c.new.is_none()));
    }

    #[test]
    fn directory_replaced_by_file_on_one_side_propagates_when_other_side_only_deleted() {
        let ancestor = Entry::directory(contents_from([("x", file(b"1")), ("y", file(b"2"))]));
        let alpha: Option<Entry> = None; // alpha deleted the directory outright
        let beta = file(b"replacement");
        let out = reconcile(Some(&ancestor), alpha.as_ref(), Some(&beta), Mode::TwoWaySafe);
        assert!(out.conflicts.is_empty());
        assert!(out.alpha_changes.iter().any(|c| c.path == "" && Entry::equal(c.new.as_ref(), Some(&beta), true)));
    }
}
