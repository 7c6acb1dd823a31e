//! One-Way-Safe / One-Way-Replica disagreement handling (§4.7.4, §4.7.5).

use super::util::{diff_rooted, has_non_deletion, project, unsynchronizable_blockage};
use super::Output;
use crate::change::{Change, Conflict};
use crate::entry::Entry;

/// §4.7.4: beta mirrors alpha, but a non-deletion change made directly
/// on beta is preserved and reported as a conflict rather than clobbered.
pub fn handle_safe(path: &str, ancestor: Option<&Entry>, alpha: Option<&Entry>, beta: Option<&Entry>, out: &mut Output) {
    let beta_projection = project(beta);
    let beta_diff = diff_rooted(path, ancestor, beta_projection.as_ref());

    if !has_non_deletion(&beta_diff) {
        propagate_alpha_to_beta(path, alpha, beta, out);
        return;
    }

    let alpha_trivial = matches!(alpha, None | Some(Entry::Untracked));
    let both_directories = matches!(ancestor, Some(e) if e.is_directory_kind()) && matches!(beta, Some(e) if e.is_directory_kind());
    if alpha_trivial && !both_directories {
        // Silently untrack beta's content here: clear the ancestor so the
        // same state is quiescent on the next cycle (§4.7.4).
        if ancestor.is_some() {
            out.ancestor_changes.push(Change::new(path, ancestor.cloned(), None));
        }
        return;
    }

    let beta_nd = crate::reconcile::util::non_deletion(&beta_diff);
    out.conflicts.push(Conflict::new(
        path,
        vec![Change::new(path, ancestor.cloned(), alpha.cloned())],
        beta_nd,
    ));
}

/// §4.7.5: beta is an exact mirror of alpha; any non-removable content on
/// beta becomes a conflict instead.
pub fn handle_replica(path: &str, ancestor: Option<&Entry>, alpha: Option<&Entry>, beta: Option<&Entry>, out: &mut Output) {
    propagate_alpha_to_beta_with_ancestor(path, ancestor, alpha, beta, out);
}

fn propagate_alpha_to_beta(path: &str, alpha: Option<&Entry>, beta: Option<&Entry>, out: &mut Output) {
    let alpha_projection = project(alpha);
    let beta_projection = project(beta);
    let beta_blockage = unsynchronizable_blockage(path, beta_projection.as_ref(), beta);
    if beta_blockage.is_empty() {
        out.beta_changes.push(Change::new(path, beta.cloned(), alpha_projection));
    } else {
        out.conflicts.push(Conflict::new(
            path,
            vec![Change::new(path, None, alpha.cloned())],
            beta_blockage,
        ));
    }
}

fn propagate_alpha_to_beta_with_ancestor(
    path: &str,
    ancestor: Option<&Entry>,
    alpha: Option<&Entry>,
    beta: Option<&Entry>,
    out: &mut Output,
) {
    let alpha_projection = project(alpha);
    let beta_projection = project(beta);
    let beta_blockage = unsynchronizable_blockage(path, beta_projection.as_ref(), beta);
    if beta_blockage.is_empty() {
        out.beta_changes.push(Change::new(path, beta.cloned(), alpha_projection));
    } else {
        out.conflicts.push(Conflict::new(
            path,
            vec![Change::new(path, ancestor.cloned(), alpha.cloned())],
            beta_blockage,
        ));
    }
}
