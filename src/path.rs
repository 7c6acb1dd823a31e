//! Fast operations on `/`-delimited, root-relative synchronization paths.
//!
//! These are plain `&str` operations, never [`std::path::Path`]: a
//! synchronization path is an abstract forward-slash-joined identifier,
//! not a host path, and is only converted to a host `PathBuf` at the
//! scan/transition filesystem boundary (see [`crate::scan`],
//! [`crate::transition`]).
//!
//! The empty string denotes the synchronization root.

use crate::error::ValidationError;

/// Joins `base` and `leaf` into a single path.
///
/// # Panics
///
/// Panics if `leaf` is empty.
#[must_use]
pub fn join(base: &str, leaf: &str) -> String {
    assert!(!leaf.is_empty(), "join: leaf must not be empty");
    if base.is_empty() {
        leaf.to_owned()
    } else {
        let mut out = String::with_capacity(base.len() + 1 + leaf.len());
        out.push_str(base);
        out.push('/');
        out.push_str(leaf);
        out
    }
}

/// Returns the parent of `path`: the substring before the last `/`, or
/// `""` if there is none.
///
/// # Panics
///
/// Panics if `path` is empty or begins with `/`.
#[must_use]
pub fn parent(path: &str) -> &str {
    assert!(!path.is_empty(), "parent: path must not be empty");
    assert!(!path.starts_with('/'), "parent: path must not be absolute: {path:?}");
    match path.rfind('/') {
        Some(idx) => &path[..idx],
        None => "",
    }
}

/// Returns the base (final component) of `path`.
///
/// Returns `""` for the root path `""`.
///
/// # Panics
///
/// Panics if the last character of a non-empty `path` is `/`.
#[must_use]
pub fn base(path: &str) -> &str {
    if path.is_empty() {
        return "";
    }
    assert!(!path.ends_with('/'), "base: path must not end in /: {path:?}");
    match path.rfind('/') {
        Some(idx) => &path[idx + 1..],
        None => path,
    }
}

/// Depth-first-search ordering of two paths.
///
/// Compares components lexically, front to back; when one path's
/// components are an exact prefix of the other's, the shorter path is
/// ordered first (it is the ancestor). The empty path sorts before every
/// other path.
#[must_use]
pub fn less(a: &str, b: &str) -> bool {
    if a == b {
        return false;
    }
    let mut a_parts = a.split('/');
    let mut b_parts = b.split('/');
    loop {
        match (a_parts.next(), b_parts.next()) {
            (None, None) => return false,
            (None, Some(_)) => return true,
            (Some(_), None) => return false,
            (Some(ac), Some(bc)) => {
                if ac == bc {
                    continue;
                }
                return ac < bc;
            }
        }
    }
}

/// Validates that `path` is a well-formed root-relative path: no leading
/// or trailing `/`, no empty components, no `.`/`..` components.
pub fn validate(path: &str) -> Result<(), ValidationError> {
    if path.is_empty() {
        return Ok(());
    }
    if path.starts_with('/') || path.ends_with('/') {
        return Err(ValidationError::InvalidPath(format!(
            "{path:?} must not begin or end with /"
        )));
    }
    for component in path.split('/') {
        if component.is_empty() || component == "." || component == ".." {
            return Err(ValidationError::InvalidPath(format!(
                "{path:?} contains an invalid component {component:?}"
            )));
        }
    }
    Ok(())
}
