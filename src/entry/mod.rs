//! The recursive content tree at the heart of the synchronization core.
//!
//! An [`Entry`] is a tagged node describing one filesystem object:
//! a directory, a file, a symbolic link, or one of three placeholder
//! kinds used to carry information the reconciler needs without polluting
//! the "real" kinds (`Untracked`, `Problematic`, `PhantomDirectory`).
//!
//! Entries are treated as immutable values once built. Directory children
//! are held behind `Arc` so the four copy strategies in [`copy`] can share
//! substructure instead of reallocating it.

mod copy;
mod validate;
mod walk;

pub use copy::CopyMode;
pub use walk::Order;

use std::collections::BTreeMap;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::change::Problem;
use crate::error::ValidationError;

/// Opaque file content digest. Non-empty for any [`Entry::File`].
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Digest(pub Vec<u8>);

impl Digest {
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<u8>> for Digest {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Digest {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// A directory's children, keyed by name. Order is not semantically
/// meaningful (§3.1: "entries unique by name; order irrelevant") but is
/// preserved for readability of serialized output and deterministic
/// iteration in tests.
pub type Contents = IndexMap<String, Arc<Entry>>;

/// A single node of the content tree (§3.1).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Entry {
    /// A directory with named children.
    Directory { contents: Contents },
    /// A regular file with non-empty content digest.
    File { digest: Digest, executable: bool },
    /// A symbolic link with a non-empty, opaque target string.
    SymbolicLink { target: String },
    /// Content deliberately excluded by an ignore rule or because its
    /// filesystem type is unsupported (e.g. a socket).
    Untracked,
    /// Content that should have synchronized but could not be scanned or
    /// transitioned, with a human-readable reason.
    Problematic { problem: String },
    /// A directory whose ignore status is pending reification under the
    /// docker ignore dialect (§4.8). Never seen by the reconciler.
    PhantomDirectory { contents: Contents },
}

impl Entry {
    #[must_use]
    pub fn directory(contents: Contents) -> Self {
        Self::Directory { contents }
    }

    #[must_use]
    pub fn empty_directory() -> Self {
        Self::Directory { contents: Contents::new() }
    }

    #[must_use]
    pub fn file(digest: impl Into<Digest>, executable: bool) -> Self {
        Self::File { digest: digest.into(), executable }
    }

    #[must_use]
    pub fn symbolic_link(target: impl Into<String>) -> Self {
        Self::SymbolicLink { target: target.into() }
    }

    #[must_use]
    pub fn untracked() -> Self {
        Self::Untracked
    }

    #[must_use]
    pub fn problematic(problem: impl Into<String>) -> Self {
        Self::Problematic { problem: problem.into() }
    }

    #[must_use]
    pub fn phantom_directory(contents: Contents) -> Self {
        Self::PhantomDirectory { contents }
    }

    #[must_use]
    pub fn is_directory_kind(&self) -> bool {
        matches!(self, Self::Directory { .. } | Self::PhantomDirectory { .. })
    }

    /// The content map of a `Directory` or `PhantomDirectory`, if any.
    #[must_use]
    pub fn contents(&self) -> Option<&Contents> {
        match self {
            Self::Directory { contents } | Self::PhantomDirectory { contents } => Some(contents),
            _ => None,
        }
    }

    /// A short, stable name for this entry's kind, used in error messages.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Directory { .. } => "directory",
            Self::File { .. } => "file",
            Self::SymbolicLink { .. } => "symbolic link",
            Self::Untracked => "untracked",
            Self::Problematic { .. } => "problematic",
            Self::PhantomDirectory { .. } => "phantom directory",
        }
    }

    /// Validates the structural invariants of §3.1. When `synchronizable`
    /// is true, `Untracked`, `Problematic`, and `PhantomDirectory` are
    /// rejected at every level of the subtree.
    pub fn ensure_valid(&self, synchronizable: bool) -> Result<(), ValidationError> {
        validate::ensure_valid(self, synchronizable)
    }

    /// Compares two (possibly absent) entries using the default problem
    /// comparator. See [`equal_with`] for the test-only wildcard variant.
    #[must_use]
    pub fn equal(a: Option<&Entry>, b: Option<&Entry>, deep: bool) -> bool {
        equal_with(a, b, deep, default_problem_eq)
    }

    /// Number of synchronizable nodes (`Directory`/`File`/`SymbolicLink`)
    /// in this subtree, including this entry if it is synchronizable.
    #[must_use]
    pub fn count(&self) -> u64 {
        let mut total = 0;
        self.count_into(&mut total);
        total
    }

    fn count_into(&self, total: &mut u64) {
        match self {
            Self::File { .. } | Self::SymbolicLink { .. } => *total += 1,
            Self::Directory { contents } => {
                *total += 1;
                for child in contents.values() {
                    child.count_into(total);
                }
            }
            Self::PhantomDirectory { contents } => {
                for child in contents.values() {
                    child.count_into(total);
                }
            }
            Self::Untracked | Self::Problematic { .. } => {}
        }
    }

    /// Depth-first traversal starting at `path`, visiting this entry and
    /// every descendant in pre- or post-order per `order`.
    pub fn walk(&self, path: &str, order: Order, visitor: &mut dyn FnMut(&str, &Entry)) {
        walk::walk(self, path, order, visitor);
    }

    /// Returns a new tree with all `Untracked`/`Problematic`/
    /// `PhantomDirectory` content removed, or `None` if the root itself is
    /// one of those kinds.
    #[must_use]
    pub fn synchronizable(&self) -> Option<Entry> {
        match self {
            Self::Untracked | Self::Problematic { .. } | Self::PhantomDirectory { .. } => None,
            Self::File { .. } | Self::SymbolicLink { .. } => Some(self.clone()),
            Self::Directory { contents } => {
                let mut filtered = Contents::new();
                for (name, child) in contents {
                    if let Some(kept) = child.synchronizable() {
                        filtered.insert(name.clone(), Arc::new(kept));
                    }
                }
                Some(Self::Directory { contents: filtered })
            }
        }
    }

    /// Harvests `{path, error}` pairs from every `Problematic` node in
    /// this subtree.
    #[must_use]
    pub fn problems(&self) -> Vec<Problem> {
        let mut out = Vec::new();
        self.walk("", Order::Pre, &mut |path, entry| {
            if let Self::Problematic { problem } = entry {
                out.push(Problem { path: path.to_owned(), error: problem.clone() });
            }
        });
        out
    }

    /// Copies this entry according to `mode` (§3.1).
    #[must_use]
    pub fn copy(&self, mode: CopyMode) -> Entry {
        copy::copy(self, mode)
    }
}

/// Test-only wildcard value for [`Entry::Problematic`]'s message: when used
/// as one side of [`equal_with`]'s comparator, any non-empty message on
/// the other side matches. Expressed as an explicit comparator parameter
/// rather than a global mutable flag (§9).
pub const WILDCARD_PROBLEM: &str = "<<any>>";

/// Default (non-wildcard) problem-message comparator: exact string
/// equality.
#[must_use]
pub fn default_problem_eq(a: &str, b: &str) -> bool {
    a == b
}

/// Problem-message comparator that treats [`WILDCARD_PROBLEM`] on either
/// side as matching any non-empty message. Intended for test code only.
#[must_use]
pub fn wildcard_problem_eq(a: &str, b: &str) -> bool {
    if a == WILDCARD_PROBLEM || b == WILDCARD_PROBLEM {
        !a.is_empty() && !b.is_empty()
    } else {
        a == b
    }
}

/// Compares two (possibly absent) entries for equality, with an
/// explicit, pluggable comparator for `Problematic` messages (§9).
#[must_use]
pub fn equal_with(
    a: Option<&Entry>,
    b: Option<&Entry>,
    deep: bool,
    problem_eq: fn(&str, &str) -> bool,
) -> bool {
    match (a, b) {
        (None, None) => true,
        (None, Some(_)) | (Some(_), None) => false,
        (Some(a), Some(b)) => entries_equal(a, b, deep, problem_eq),
    }
}

fn entries_equal(a: &Entry, b: &Entry, deep: bool, problem_eq: fn(&str, &str) -> bool) -> bool {
    match (a, b) {
        (Entry::Directory { contents: ca }, Entry::Directory { contents: cb })
        | (Entry::PhantomDirectory { contents: ca }, Entry::PhantomDirectory { contents: cb }) => {
            if !deep {
                return true;
            }
            if ca.len() != cb.len() {
                return false;
            }
            ca.iter().all(|(name, child)| {
                cb.get(name)
                    .is_some_and(|other| entries_equal(child, other, deep, problem_eq))
            })
        }
        (
            Entry::File { digest: da, executable: ea },
            Entry::File { digest: db, executable: eb },
        ) => da == db && ea == eb,
        (Entry::SymbolicLink { target: ta }, Entry::SymbolicLink { target: tb }) => ta == tb,
        (Entry::Untracked, Entry::Untracked) => true,
        (Entry::Problematic { problem: pa }, Entry::Problematic { problem: pb }) => {
            problem_eq(pa, pb)
        }
        _ => false,
    }
}

/// Builds an `IndexMap` of contents from `(name, entry)` pairs, wrapping
/// each value in an `Arc`. Convenience for tests and callers assembling
/// trees by hand.
#[must_use]
pub fn contents_from(pairs: impl IntoIterator<Item = (impl Into<String>, Entry)>) -> Contents {
    let mut contents = Contents::new();
    for (name, entry) in pairs {
        contents.insert(name.into(), Arc::new(entry));
    }
    contents
}

/// Sorted view of a content map's names, for deterministic iteration in
/// callers that need a stable order regardless of insertion history
/// (e.g. the scanner, which always produces sorted directories per
/// §4.9.4 "drop temporary-file names, normalize Unicode").
#[must_use]
pub fn sorted_names(contents: &Contents) -> BTreeMap<&str, &Arc<Entry>> {
    contents.iter().map(|(name, entry)| (name.as_str(), entry)).collect()
}
