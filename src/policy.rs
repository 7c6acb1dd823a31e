//! Policy enums shared between [`crate::scan`] and [`crate::transition`]
//! (§4.9.2, §4.9.4, §4.10.1, §4.10.4).
//!
//! These are pure configuration values with no behavior of their own;
//! they exist as a separate module only because both the scanner and the
//! transition engine need the exact same vocabulary for "how do
//! symbolic links round-trip" and "how are permission bits handled",
//! and duplicating the enum in each would invite the two copies to
//! drift.

/// How the scanner treats symbolic links it encounters, and how the
/// transition engine creates them (§4.9.4, §4.10.3 step 4).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SymbolicLinkMode {
    /// Normalize Windows backslashes to `/`, and reject (as
    /// `Problematic`) any target that could escape the synchronization
    /// root, contains a colon, is absolute, or exceeds
    /// [`PORTABLE_SYMLINK_TARGET_MAX_LEN`].
    Portable,
    /// Accept any non-empty target verbatim.
    PosixRaw,
    /// Don't follow the link at all; record it as `Untracked`.
    Ignore,
}

/// Maximum symbolic link target length accepted in [`SymbolicLinkMode::Portable`]
/// (§4.9.4 "does not exceed a fixed length").
pub const PORTABLE_SYMLINK_TARGET_MAX_LEN: usize = 1024;

/// How POSIX permission bits are scanned and applied (§4.10.4).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PermissionsMode {
    /// Only executability is meaningful. The scanner records just the
    /// executable bit; the transition engine derives full mode bits from
    /// `default_file_mode`/`default_directory_mode` plus
    /// [`mark_executable_for_readers`] rather than from any recorded
    /// mode.
    Portable,
    /// Full, user-specified mode bits are authoritative; the
    /// executable flag on a scanned `Entry::File` is not consulted by
    /// transition.
    Manual,
}

/// Sets the executable bit for every principal (user/group/other) that
/// already has the corresponding read bit (§4.10.4). This is how
/// [`PermissionsMode::Portable`] derives a mode from `default_file_mode`:
/// `markExecutableForReaders(0o644) == 0o755`.
#[must_use]
pub fn mark_executable_for_readers(mode: u32) -> u32 {
    let mut mode = mode;
    if mode & 0o400 != 0 {
        mode |= 0o100;
    }
    if mode & 0o040 != 0 {
        mode |= 0o010;
    }
    if mode & 0o004 != 0 {
        mode |= 0o001;
    }
    mode
}

/// Validates a symbolic link target under [`SymbolicLinkMode::Portable`]
/// (§4.9.4, §4.10.3 step 4): not empty, no colon, not absolute, within
/// [`PORTABLE_SYMLINK_TARGET_MAX_LEN`], and unable to climb above the
/// synchronization root via a run of `..` components deeper than the
/// target has otherwise descended.
pub fn validate_portable_symlink_target(target: &str) -> Result<(), String> {
    if target.is_empty() {
        return Err("symbolic link has an empty target".to_owned());
    }
    if target.contains(':') {
        return Err("symbolic link target contains a colon".to_owned());
    }
    if target.starts_with('/') {
        return Err("symbolic link target is absolute".to_owned());
    }
    if target.len() > PORTABLE_SYMLINK_TARGET_MAX_LEN {
        return Err("symbolic link target exceeds the maximum portable length".to_owned());
    }
    let mut depth: i64 = 0;
    for component in target.split('/') {
        match component {
            "" | "." => {}
            ".." => {
                depth -= 1;
                if depth < 0 {
                    return Err("symbolic link target escapes the synchronization root".to_owned());
                }
            }
            _ => depth += 1,
        }
    }
    Ok(())
}

/// Whether and how to (re-)probe a root's filesystem behavior (§4.9.1).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProbeMode {
    /// Consult the process-wide behavior cache, probing (and caching the
    /// result) on a miss.
    Probe,
    /// Skip probing entirely and assume the given behavior. Used by
    /// tests and by callers who already know their target filesystem
    /// (e.g. a synthetic in-memory root).
    Assume { preserves_executability: bool, decomposes_unicode: bool },
}
