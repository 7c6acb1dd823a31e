//! Phantom directory reification (§4.8).
//!
//! Under [`crate::ignore::Dialect::Docker`] the scanner cannot decide, at
//! scan time, whether an ignored directory should vanish entirely or
//! stay around because some descendant of it is unignored — that
//! decision depends on what the *other* side and the ancestor look like,
//! which the scanner (a single-root walk) never sees. It instead leaves
//! an [`crate::entry::Entry::PhantomDirectory`] in place, and this pass
//! resolves every phantom into either a tracked `Directory` (it has
//! tracked content beneath it, or the ancestor already has a real
//! directory here) or an `Untracked` leaf (its contents are discarded).
//!
//! [`reify_phantom_directories`] must run before [`crate::reconcile::reconcile`]
//! whenever either side might contain a phantom; the reconciler's own
//! invariants (§4.7.2.4: "at most one side is a directory" etc.) assume
//! phantoms are already gone.

use std::sync::Arc;

use crate::entry::{Contents, Entry};

/// Per-side directory counts touched by reification, since collapsing or
/// promoting a phantom changes how many real directories a side has
/// (§4.8, §8 scenario 5).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DirectoryCounts {
    pub alpha: u64,
    pub beta: u64,
}

/// Output of a reification pass: the two resolved trees plus updated
/// directory counts.
#[derive(Clone, Debug)]
pub struct Reified {
    pub alpha: Option<Entry>,
    pub beta: Option<Entry>,
    pub directory_counts: DirectoryCounts,
}

/// Resolves every `PhantomDirectory` in `alpha` and `beta` against each
/// other and `ancestor` (§4.8).
///
/// This is a conjoined post-order walk: a phantom directory is resolved
/// only after every descendant phantom beneath it has already been
/// resolved, since "contained anything tracked below" must account for
/// a nested phantom that itself reified into a tracked directory.
#[must_use]
pub fn reify_phantom_directories(ancestor: Option<&Entry>, alpha: Option<&Entry>, beta: Option<&Entry>) -> Reified {
    let mut counts = DirectoryCounts::default();
    let alpha = reify_side(ancestor, alpha, &mut counts.alpha);
    let beta = reify_side(ancestor, beta, &mut counts.beta);
    Reified { alpha, beta, directory_counts: counts }
}

fn reify_side(ancestor: Option<&Entry>, side: Option<&Entry>, directory_count: &mut u64) -> Option<Entry> {
    let entry = side?;
    Some(reify_entry(ancestor, entry, directory_count))
}

fn reify_entry(ancestor: Option<&Entry>, entry: &Entry, directory_count: &mut u64) -> Entry {
    match entry {
        Entry::Directory { contents } => {
            *directory_count += 1;
            Entry::Directory { contents: reify_contents(ancestor, contents, directory_count) }
        }
        Entry::PhantomDirectory { contents } => {
            let reified_contents = reify_contents(ancestor, contents, directory_count);
            let has_tracked_content = reified_contents
                .values()
                .any(|child| !matches!(child.as_ref(), Entry::Untracked));
            let ancestor_is_directory = matches!(ancestor, Some(e) if e.is_directory_kind());
            if has_tracked_content || ancestor_is_directory {
                *directory_count += 1;
                Entry::Directory { contents: reified_contents }
            } else {
                Entry::Untracked
            }
        }
        other => other.clone(),
    }
}

/// §3.1 `DeepPreservingLeaves`: the directory spine is rebuilt (since a
/// `PhantomDirectory` child may reify into a different kind), but a
/// non-directory child can never itself contain a phantom, so it is
/// shared by `Arc` rather than walked and reallocated.
fn reify_contents(ancestor: Option<&Entry>, contents: &Contents, directory_count: &mut u64) -> Contents {
    let empty = Contents::new();
    let ancestor_contents = ancestor.and_then(Entry::contents).unwrap_or(&empty);
    let mut out = Contents::new();
    for (name, child) in contents {
        if !child.is_directory_kind() {
            out.insert(name.clone(), Arc::clone(child));
            continue;
        }
        let ancestor_child = ancestor_contents.get(name).map(Arc::as_ref);
        let reified = reify_entry(ancestor_child, child, directory_count);
        out.insert(name.clone(), Arc::new(reified));
    }
    out
}

/// Whether `entry`'s subtree contains any `PhantomDirectory`, for callers
/// deciding whether a reification pass is necessary at all (an optional
/// fast path; §4.8 always permits running reification unconditionally).
#[must_use]
pub fn contains_phantom(entry: &Entry) -> bool {
    let mut found = false;
    entry.walk("", crate::entry::Order::Pre, &mut |_, e| {
        if matches!(e, Entry::PhantomDirectory { .. }) {
            found = true;
        }
    });
    found
}
