//! Error types shared across the synchronization core.
//!
//! Each fallible surface gets its own small enum with a manual `Display`
//! and `std::error::Error` impl, rather than pulling in a derive macro
//! crate for what are a handful of variants apiece.

use std::fmt;

/// Errors raised synchronously by [`crate::entry::Entry::ensure_valid`] and
/// related structural checks (§7 "Validation").
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A content name was empty, `.`, `..`, or contained a `/`.
    InvalidName(String),
    /// A child entry was nil where a non-nil entry was required.
    NilChild(String),
    /// A `File` entry had an empty digest.
    EmptyDigest,
    /// A `SymbolicLink` entry had an empty target.
    EmptyTarget,
    /// A `Problematic` entry had an empty problem message.
    EmptyProblem,
    /// A synchronizable-only check rejected an Untracked, Problematic, or
    /// PhantomDirectory entry.
    Unsynchronizable(&'static str),
    /// A kind carried a field it is not allowed to carry (e.g. a
    /// directory with a digest).
    MisplacedField { kind: &'static str, field: &'static str },
    /// A path operation (`join`, `parent`, `base`) was called with
    /// arguments its contract forbids.
    InvalidPath(String),
    /// A `Cache` held entries of more than one digest width, or a width
    /// unsupported by [`crate::cache::ReverseLookupMap`] (only 16, 20, 32
    /// are supported).
    MixedOrUnsupportedDigestWidth { found: usize },
    /// A `Cache` entry's modification time or the entry itself was nil.
    InvalidCacheEntry(String),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidName(name) => write!(f, "invalid content name: {name:?}"),
            Self::NilChild(path) => write!(f, "nil child entry at {path:?}"),
            Self::EmptyDigest => write!(f, "file entry has an empty digest"),
            Self::EmptyTarget => write!(f, "symbolic link entry has an empty target"),
            Self::EmptyProblem => write!(f, "problematic entry has an empty problem message"),
            Self::Unsynchronizable(kind) => write!(f, "{kind} is not synchronizable"),
            Self::MisplacedField { kind, field } => {
                write!(f, "{kind} entry may not carry a {field}")
            }
            Self::InvalidPath(reason) => write!(f, "invalid path: {reason}"),
            Self::MixedOrUnsupportedDigestWidth { found } => {
                write!(f, "unsupported or mixed digest width: {found} bytes")
            }
            Self::InvalidCacheEntry(reason) => write!(f, "invalid cache entry: {reason}"),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Errors that abort a scan outright (§7 "Scan-fatal"). Everything else a
/// scan encounters becomes an in-tree `Problematic` entry instead.
#[derive(Debug)]
pub enum ScanError {
    /// The synchronization root could not be opened at all.
    RootUnreachable { path: String, source: std::io::Error },
    /// Recursion would have crossed a device boundary at the root itself
    /// (a non-root crossing is instead recorded as a `Problematic` child,
    /// per §4.9.1).
    RootCrossesFilesystemBoundary,
    /// Old cache entries did not correspond to the supplied baseline
    /// during accelerated-scan back-fill (§4.9.3).
    CacheBackfillInconsistent { path: String },
    /// The requested symbolic-link mode cannot be represented on this
    /// host (e.g. `posix-raw` on a platform without raw link support).
    UnsupportedSymbolicLinkMode,
    /// The scan was cancelled via its [`crate::Cancellation`] handle.
    Cancelled,
}

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RootUnreachable { path, source } => {
                write!(f, "unable to open synchronization root {path:?}: {source}")
            }
            Self::RootCrossesFilesystemBoundary => {
                write!(f, "scan crossed filesystem boundary")
            }
            Self::CacheBackfillInconsistent { path } => {
                write!(f, "old cache entries don't correspond to baseline at {path:?}")
            }
            Self::UnsupportedSymbolicLinkMode => {
                write!(f, "host cannot represent the requested symbolic link mode")
            }
            Self::Cancelled => write!(f, "scan cancelled"),
        }
    }
}

impl std::error::Error for ScanError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::RootUnreachable { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Error returned by [`crate::apply::apply`] when a change's path has no
/// resolvable parent in the working tree (§4.6, §8 boundary behavior).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyError {
    pub path: String,
}

impl fmt::Display for ApplyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unable to resolve parent path for {:?}", self.path)
    }
}

impl std::error::Error for ApplyError {}
