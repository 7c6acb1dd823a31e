//! Applies a [`Change`] list to an on-disk tree (§4.10).
//!
//! [`transition`] is the single public entry point. It walks `changes` in
//! the order given (§5 "ancestor-replacement precedes
//! descendant-modification": callers are responsible for ordering the
//! list so that parents are created before children and removed after
//! them), resolving each change's parent directory, verifying any
//! recorded `Old` content against what's actually on disk, and then
//! either removing or creating content at that path. Transition is not
//! globally atomic (§4.10.6): each filesystem operation is as atomic as
//! its OS primitive, and a failure partway through leaves whatever
//! progress was already made.

use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::future::Future;

use async_trait::async_trait;

use crate::cache::Cache;
use crate::change::{Change, Problem};
use crate::entry::{Digest, Entry};
use crate::path;
use crate::policy::{self, PermissionsMode, SymbolicLinkMode};
use crate::Cancellation;

/// Supplies local file content for a staged file creation (§4.10.2).
///
/// Implementations typically stage content received over a transport
/// into a temporary location and hand back its path; [`transition`]
/// takes ownership of the returned file (setting its permissions and
/// renaming it into place), so the path must name a file the caller is
/// willing to have moved.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Returns the local path to a file whose content hashes to
    /// `digest`, for placement at `path`.
    async fn provide(&self, path: &str, digest: &Digest) -> Result<PathBuf, ProviderError>;
}

/// How a [`Provider::provide`] call failed (§4.10.2).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProviderError {
    /// No content is currently available for this digest. Surfaced to
    /// the caller via [`TransitionOutput::missing_files`] rather than a
    /// per-path [`Problem`]; the caller is expected to retry later with
    /// the content staged.
    NotFound,
    /// Content was supplied but failed some other check the provider
    /// performs itself (e.g. the staged file didn't hash to the
    /// requested digest). Escalated to a [`Problem`].
    VerificationFailed(String),
}

/// Host ownership to apply to newly created content, as `(uid, gid)`.
/// Applied best-effort after creation; a failure to `chown` is recorded
/// as a [`Problem`] but does not undo the creation itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ownership {
    pub uid: u32,
    pub gid: u32,
}

/// Bundles transition-time policy knobs (§4.10.1, §4.10.4), mirroring
/// [`crate::scan::ScanConfig`]'s grouping on the scan side.
#[derive(Clone, Copy, Debug)]
pub struct TransitionConfig {
    pub symbolic_link_mode: SymbolicLinkMode,
    pub permissions_mode: PermissionsMode,
    pub default_file_mode: u32,
    pub default_directory_mode: u32,
    pub ownership: Option<Ownership>,
}

/// [`transition`]'s return value (§4.10.1).
#[derive(Debug)]
pub struct TransitionOutput {
    /// Parallel to `changes`: the on-disk entry each change actually
    /// produced. On failure this is the change's own `old` (or `None`
    /// if it had none), since the prior content is what remains on
    /// disk.
    pub results: Vec<Option<Entry>>,
    pub problems: Vec<Problem>,
    /// Set if any file creation could not proceed because the provider
    /// had no content staged for it yet (§4.10.2).
    pub missing_files: bool,
}

/// Applies `changes` to the tree rooted at `root` in order (§4.10.1).
///
/// Never returns an error: every failure this function can encounter is
/// either a per-path [`Problem`] (with that change's prior content kept
/// as its result) or reflected in [`TransitionOutput::missing_files`].
/// A cancelled `ctx` causes the current and all subsequent changes to
/// report a "transition cancelled" `Problem` without touching disk
/// (§4.10.5); changes already applied before cancellation was observed
/// remain applied.
pub async fn transition<P: Provider>(
    ctx: &Cancellation,
    root: &Path,
    changes: &[Change],
    cache: Option<&Cache>,
    config: &TransitionConfig,
    provider: &P,
) -> TransitionOutput {
    if config.symbolic_link_mode == SymbolicLinkMode::PosixRaw && !cfg!(unix) {
        return TransitionOutput {
            results: changes.iter().map(|c| c.old.clone()).collect(),
            problems: vec![Problem::new("", "host cannot represent the requested symbolic link mode")],
            missing_files: false,
        };
    }

    let mut results = Vec::with_capacity(changes.len());
    let mut problems = Vec::new();
    let mut missing_files = false;

    for change in changes {
        let result = transition_one(ctx, root, change, cache, config, provider, &mut problems, &mut missing_files).await;
        results.push(result);
    }

    TransitionOutput { results, problems, missing_files }
}

async fn transition_one<P: Provider>(
    ctx: &Cancellation,
    root: &Path,
    change: &Change,
    cache: Option<&Cache>,
    config: &TransitionConfig,
    provider: &P,
    problems: &mut Vec<Problem>,
    missing_files: &mut bool,
) -> Option<Entry> {
    if ctx.is_cancelled() {
        problems.push(Problem::new(change.path.clone(), "transition cancelled"));
        return change.old.clone();
    }

    let host_path = if change.is_root() {
        root.to_path_buf()
    } else {
        match resolve_parent(root, &change.path).await {
            Ok(parent_path) => parent_path.join(path::base(&change.path)),
            Err(msg) => {
                problems.push(Problem::new(change.path.clone(), msg));
                return change.old.clone();
            }
        }
    };

    if let Some(old) = &change.old {
        if let Err(msg) = verify_old(cache, &change.path, config.permissions_mode, config.symbolic_link_mode, &host_path, old).await
        {
            problems.push(Problem::new(change.path.clone(), msg));
            return change.old.clone();
        }
    }

    match &change.new {
        None => match remove(&host_path, &change.path, cache, problems).await {
            Ok(()) => None,
            Err(msg) => {
                problems.push(Problem::new(change.path.clone(), msg));
                change.old.clone()
            }
        },
        Some(new_entry) => {
            let created = create_entry(ctx, host_path, change.path.clone(), new_entry, config, provider, problems, missing_files).await;
            created.or_else(|| change.old.clone())
        }
    }
}

/// Walks from `root` down to the directory containing `sync_path`,
/// requiring each on-disk directory component to exactly match the
/// expected casing (§4.10.3 step 1). A mismatch (including a missing
/// component) aborts just this change.
async fn resolve_parent(root: &Path, sync_path: &str) -> Result<PathBuf, String> {
    let parent = path::parent(sync_path);
    let mut current = root.to_path_buf();
    if parent.is_empty() {
        return Ok(current);
    }
    for component in parent.split('/') {
        current = find_exact_case(&current, component)
            .await
            .ok_or_else(|| format!("parent directory component {component:?} not found with matching casing"))?;
    }
    Ok(current)
}

async fn find_exact_case(dir: &Path, name: &str) -> Option<PathBuf> {
    let mut read_dir = tokio::fs::read_dir(dir).await.ok()?;
    while let Ok(Some(entry)) = read_dir.next_entry().await {
        if entry.file_name().to_str() == Some(name) {
            return Some(entry.path());
        }
    }
    None
}

/// Verifies `old` against what's actually at `host_path` before this
/// change is allowed to proceed (§4.10.3 step 2). Mode-bit comparison
/// tolerates drift in bits the active [`PermissionsMode`] doesn't
/// manage.
async fn verify_old(
    cache: Option<&Cache>,
    sync_path: &str,
    permissions_mode: PermissionsMode,
    symbolic_link_mode: SymbolicLinkMode,
    host_path: &Path,
    old: &Entry,
) -> Result<(), String> {
    use std::os::unix::fs::PermissionsExt;

    let metadata = tokio::fs::symlink_metadata(host_path)
        .await
        .map_err(|source| format!("unable to verify prior content: {source}"))?;

    match old {
        Entry::File { digest, .. } => {
            if !metadata.is_file() {
                return Err("expected a file, found something else".to_owned());
            }
            let current_mode = metadata.permissions().mode() & 0o7777;
            let modification_time = metadata
                .modified()
                .map_err(|source| format!("unable to read modification time: {source}"))?;
            let cache_entry = cache
                .and_then(|cache| cache.get(sync_path))
                .ok_or_else(|| "no cache entry available to verify prior content".to_owned())?;
            if !modes_match(cache_entry.mode, current_mode, permissions_mode) {
                return Err("permission bits changed concurrently".to_owned());
            }
            if cache_entry.modification_time != modification_time || cache_entry.size != metadata.len() {
                return Err("content changed concurrently".to_owned());
            }
            if &cache_entry.digest != digest {
                return Err("content changed concurrently".to_owned());
            }
            Ok(())
        }
        Entry::SymbolicLink { target } => {
            if !metadata.is_symlink() {
                return Err("expected a symbolic link, found something else".to_owned());
            }
            if symbolic_link_mode == SymbolicLinkMode::PosixRaw {
                return Ok(());
            }
            let current_target = tokio::fs::read_link(host_path)
                .await
                .map_err(|source| format!("unable to read symbolic link: {source}"))?;
            if current_target.to_string_lossy() != *target {
                return Err("symbolic link target changed concurrently".to_owned());
            }
            Ok(())
        }
        Entry::Directory { .. } | Entry::PhantomDirectory { .. } => {
            if !metadata.is_dir() {
                return Err("expected a directory, found something else".to_owned());
            }
            Ok(())
        }
        Entry::Untracked | Entry::Problematic { .. } => Ok(()),
    }
}

/// §4.10.4: in `Portable` mode the engine only manages the executable
/// bit, so other bits drifting doesn't count as concurrent
/// modification; in `Manual` mode the full mode is authoritative.
fn modes_match(recorded: u32, current: u32, permissions_mode: PermissionsMode) -> bool {
    match permissions_mode {
        PermissionsMode::Portable => (recorded & 0o111 == 0) == (current & 0o111 == 0),
        PermissionsMode::Manual => recorded == current,
    }
}

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Recursively removes whatever is at `host_path` (§4.10.3 step 3).
/// Each file encountered is re-checked against the cache before being
/// unlinked; a child that fails gets its own [`Problem`] and the
/// removal continues with its siblings rather than aborting the whole
/// subtree.
fn remove<'a>(
    host_path: &'a Path,
    sync_path: &'a str,
    cache: Option<&'a Cache>,
    problems: &'a mut Vec<Problem>,
) -> BoxFuture<'a, Result<(), String>> {
    Box::pin(async move {
        let metadata = tokio::fs::symlink_metadata(host_path)
            .await
            .map_err(|source| format!("unable to stat for removal: {source}"))?;

        if metadata.is_dir() {
            let mut read_dir = tokio::fs::read_dir(host_path)
                .await
                .map_err(|source| format!("unable to read directory for removal: {source}"))?;
            loop {
                let entry = match read_dir.next_entry().await {
                    Ok(Some(entry)) => entry,
                    Ok(None) => break,
                    Err(source) => {
                        problems.push(Problem::new(sync_path, format!("unable to read directory entry: {source}")));
                        break;
                    }
                };
                let Some(name) = entry.file_name().to_str().map(str::to_owned) else { continue };
                let child_sync_path = path::join(sync_path, &name);
                let child_host_path = entry.path();
                if let Err(msg) = remove(&child_host_path, &child_sync_path, cache, problems).await {
                    problems.push(Problem::new(child_sync_path, msg));
                }
            }
            tokio::fs::remove_dir(host_path)
                .await
                .map_err(|source| format!("unable to remove directory: {source}"))
        } else {
            if let Some(cache_entry) = cache.and_then(|cache| cache.get(sync_path)) {
                if cache_entry.size != metadata.len() {
                    return Err("content changed concurrently during removal".to_owned());
                }
            }
            tokio::fs::remove_file(host_path)
                .await
                .map_err(|source| format!("unable to remove: {source}"))
        }
    })
}

/// Recursively creates `entry` at `host_path` (§4.10.3 step 4). Returns
/// `None` (with a `Problem` or `missing_files` set, as appropriate) on
/// any failure, including a failed child within a directory creation
/// the parent of which still succeeded.
#[allow(clippy::too_many_arguments)]
fn create_entry<'a, P: Provider>(
    ctx: &'a Cancellation,
    host_path: PathBuf,
    sync_path: String,
    entry: &'a Entry,
    config: &'a TransitionConfig,
    provider: &'a P,
    problems: &'a mut Vec<Problem>,
    missing_files: &'a mut bool,
) -> BoxFuture<'a, Option<Entry>> {
    Box::pin(async move {
        match entry {
            Entry::File { digest, executable } => {
                let staged = match provider.provide(&sync_path, digest).await {
                    Ok(staged) => staged,
                    Err(ProviderError::NotFound) => {
                        *missing_files = true;
                        return None;
                    }
                    Err(ProviderError::VerificationFailed(msg)) => {
                        problems.push(Problem::new(sync_path, msg));
                        return None;
                    }
                };
                match place_file(&staged, &host_path, file_mode(config, *executable), config.ownership).await {
                    Ok(()) => Some(entry.clone()),
                    Err(msg) => {
                        problems.push(Problem::new(sync_path, msg));
                        None
                    }
                }
            }
            Entry::SymbolicLink { target } => match prepare_symlink_target(target, config.symbolic_link_mode) {
                Ok(target) => match tokio::fs::symlink(&target, &host_path).await {
                    Ok(()) => {
                        if let Err(msg) = apply_ownership(&host_path, config.ownership) {
                            problems.push(Problem::new(sync_path, msg));
                        }
                        Some(Entry::symbolic_link(target))
                    }
                    Err(source) => {
                        problems.push(Problem::new(sync_path, format!("unable to create symbolic link: {source}")));
                        None
                    }
                },
                Err(msg) => {
                    problems.push(Problem::new(sync_path, msg));
                    None
                }
            },
            Entry::Directory { contents } => {
                if let Err(source) = tokio::fs::create_dir(&host_path).await {
                    problems.push(Problem::new(sync_path, format!("unable to create directory: {source}")));
                    return None;
                }
                if let Err(source) =
                    tokio::fs::set_permissions(&host_path, std::fs::Permissions::from_mode(config.default_directory_mode)).await
                {
                    problems.push(Problem::new(sync_path.clone(), format!("unable to set directory permissions: {source}")));
                }
                if let Err(msg) = apply_ownership(&host_path, config.ownership) {
                    problems.push(Problem::new(sync_path.clone(), msg));
                }

                let mut created = crate::entry::Contents::new();
                for (name, child) in contents {
                    if ctx.is_cancelled() {
                        problems.push(Problem::new(path::join(&sync_path, name), "transition cancelled"));
                        continue;
                    }
                    let child_host_path = host_path.join(name);
                    let child_sync_path = path::join(&sync_path, name);
                    if let Some(created_child) =
                        create_entry(ctx, child_host_path, child_sync_path, child.as_ref(), config, provider, problems, missing_files)
                            .await
                    {
                        created.insert(name.clone(), std::sync::Arc::new(created_child));
                    }
                }
                Some(Entry::directory(created))
            }
            Entry::Untracked | Entry::Problematic { .. } | Entry::PhantomDirectory { .. } => {
                problems.push(Problem::new(
                    sync_path,
                    format!("cannot create unsynchronizable content of kind {}", entry.kind_name()),
                ));
                None
            }
        }
    })
}

fn file_mode(config: &TransitionConfig, executable: bool) -> u32 {
    match config.permissions_mode {
        PermissionsMode::Portable => {
            if executable {
                policy::mark_executable_for_readers(config.default_file_mode)
            } else {
                config.default_file_mode
            }
        }
        PermissionsMode::Manual => config.default_file_mode,
    }
}

fn prepare_symlink_target(target: &str, mode: SymbolicLinkMode) -> Result<String, String> {
    match mode {
        SymbolicLinkMode::Ignore => Err("symbolic link creation is disabled by the configured mode".to_owned()),
        SymbolicLinkMode::PosixRaw => {
            if target.is_empty() {
                Err("symbolic link has an empty target".to_owned())
            } else {
                Ok(target.to_owned())
            }
        }
        SymbolicLinkMode::Portable => policy::validate_portable_symlink_target(target).map(|()| target.to_owned()),
    }
}

async fn place_file(staged: &Path, host_path: &Path, mode: u32, ownership: Option<Ownership>) -> Result<(), String> {
    use std::os::unix::fs::PermissionsExt;

    tokio::fs::set_permissions(staged, std::fs::Permissions::from_mode(mode))
        .await
        .map_err(|source| format!("unable to set permissions on staged file: {source}"))?;
    tokio::fs::rename(staged, host_path)
        .await
        .map_err(|source| format!("unable to place staged file: {source}"))?;
    apply_ownership(host_path, ownership)
}

fn apply_ownership(host_path: &Path, ownership: Option<Ownership>) -> Result<(), String> {
    let Some(ownership) = ownership else { return Ok(()) };
    std::os::unix::fs::chown(host_path, Some(ownership.uid), Some(ownership.gid))
        .map_err(|source| format!("unable to set ownership: {source}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheEntry, FileId};
    use std::collections::HashMap;
    use std::os::unix::fs::PermissionsExt;
    use std::sync::Mutex;
    use std::time::SystemTime;

    /// Hands back whatever content was registered for a digest under a
    /// given path, by staging it into a fresh temp file on each call.
    struct StubProvider {
        content: Mutex<HashMap<String, Vec<u8>>>,
        staging: tempfile::TempDir,
    }

    impl StubProvider {
        fn new(pairs: impl IntoIterator<Item = (&'static str, &'static [u8])>) -> Self {
            let content = pairs.into_iter().map(|(k, v)| (k.to_owned(), v.to_vec())).collect();
            Self { content: Mutex::new(content), staging: tempfile::tempdir().unwrap() }
        }
    }

    #[async_trait]
    impl Provider for StubProvider {
        async fn provide(&self, path: &str, _digest: &Digest) -> Result<PathBuf, ProviderError> {
            let content = self.content.lock().unwrap();
            let Some(bytes) = content.get(path) else { return Err(ProviderError::NotFound) };
            let staged = self.staging.path().join(format!("stage-{}", path.replace('/', "_")));
            tokio::fs::write(&staged, bytes).await.unwrap();
            Ok(staged)
        }
    }

    fn config() -> TransitionConfig {
        TransitionConfig {
            symbolic_link_mode: SymbolicLinkMode::Portable,
            permissions_mode: PermissionsMode::Portable,
            default_file_mode: 0o644,
            default_directory_mode: 0o755,
            ownership: None,
        }
    }

    fn digest_of(bytes: &[u8]) -> Digest {
        use sha1::{Digest as _, Sha1};
        Digest::from(Sha1::digest(bytes).to_vec())
    }

    #[tokio::test]
    async fn creates_a_new_file_at_root() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = Cancellation::new();
        let provider = StubProvider::new([("a.txt", &b"hello"[..])]);
        let changes = vec![Change::new(
            "a.txt",
            None,
            Some(Entry::file(digest_of(b"hello"), false)),
        )];

        let out = transition(&ctx, dir.path(), &changes, None, &config(), &provider).await;

        assert!(out.problems.is_empty());
        assert!(!out.missing_files);
        assert_eq!(tokio::fs::read(dir.path().join("a.txt")).await.unwrap(), b"hello");
        assert!(matches!(out.results[0], Some(Entry::File { .. })));
    }

    #[tokio::test]
    async fn executable_bit_is_applied_in_portable_mode() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = Cancellation::new();
        let provider = StubProvider::new([("run.sh", &b"#!/bin/sh"[..])]);
        let changes = vec![Change::new(
            "run.sh",
            None,
            Some(Entry::file(digest_of(b"#!/bin/sh"), true)),
        )];

        transition(&ctx, dir.path(), &changes, None, &config(), &provider).await;

        let mode = tokio::fs::metadata(dir.path().join("run.sh")).await.unwrap().permissions().mode();
        assert_ne!(mode & 0o111, 0);
    }

    #[tokio::test]
    async fn creates_a_directory_tree() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = Cancellation::new();
        let provider = StubProvider::new([("sub/a.txt", &b"x"[..])]);
        let nested = Entry::directory(crate::entry::contents_from([(
            "a.txt",
            Entry::file(digest_of(b"x"), false),
        )]));
        let changes = vec![Change::new("sub", None, Some(nested))];

        let out = transition(&ctx, dir.path(), &changes, None, &config(), &provider).await;

        assert!(out.problems.is_empty());
        assert_eq!(tokio::fs::read(dir.path().join("sub/a.txt")).await.unwrap(), b"x");
    }

    #[tokio::test]
    async fn removes_a_file() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("gone.txt"), b"bye").await.unwrap();
        let ctx = Cancellation::new();
        let provider = StubProvider::new([]);
        let old = Entry::file(digest_of(b"bye"), false);
        let changes = vec![Change::new("gone.txt", Some(old), None)];

        let out = transition(&ctx, dir.path(), &changes, None, &config(), &provider).await;

        assert!(out.problems.is_empty());
        assert!(!dir.path().join("gone.txt").exists());
        assert!(out.results[0].is_none());
    }

    #[tokio::test]
    async fn missing_provider_content_sets_missing_files_flag() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = Cancellation::new();
        let provider = StubProvider::new([]);
        let changes = vec![Change::new(
            "a.txt",
            None,
            Some(Entry::file(digest_of(b"hello"), false)),
        )];

        let out = transition(&ctx, dir.path(), &changes, None, &config(), &provider).await;

        assert!(out.missing_files);
        assert!(!dir.path().join("a.txt").exists());
        assert!(out.results[0].is_none());
    }

    #[tokio::test]
    async fn concurrent_modification_is_reported_as_a_problem() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("a.txt"), b"new-content-on-disk").await.unwrap();
        let ctx = Cancellation::new();
        let provider = StubProvider::new([]);

        // `cache` intentionally does not describe the file now on disk.
        let mut cache = Cache::new();
        cache.insert(
            "a.txt",
            CacheEntry::new(0o644, SystemTime::UNIX_EPOCH, 3, FileId::new(1, 1), digest_of(b"old")),
        );

        let old = Entry::file(digest_of(b"old"), false);
        let changes = vec![Change::new("a.txt", Some(old.clone()), None)];

        let out = transition(&ctx, dir.path(), &changes, Some(&cache), &config(), &provider).await;

        assert_eq!(out.problems.len(), 1);
        assert!(dir.path().join("a.txt").exists());
        assert!(matches!(out.results[0], Some(Entry::File { .. })));
    }

    #[tokio::test]
    async fn already_cancelled_context_reports_problem_without_touching_disk() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = Cancellation::new();
        ctx.cancel();
        let provider = StubProvider::new([("a.txt", &b"hello"[..])]);
        let changes = vec![Change::new(
            "a.txt",
            None,
            Some(Entry::file(digest_of(b"hello"), false)),
        )];

        let out = transition(&ctx, dir.path(), &changes, None, &config(), &provider).await;

        assert_eq!(out.problems.len(), 1);
        assert_eq!(out.problems[0].error, "transition cancelled");
        assert!(!dir.path().join("a.txt").exists());
    }

    #[tokio::test]
    async fn missing_parent_directory_reports_problem() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = Cancellation::new();
        let provider = StubProvider::new([("missing/a.txt", &b"x"[..])]);
        let changes = vec![Change::new(
            "missing/a.txt",
            None,
            Some(Entry::file(digest_of(b"x"), false)),
        )];

        let out = transition(&ctx, dir.path(), &changes, None, &config(), &provider).await;

        assert_eq!(out.problems.len(), 1);
        assert!(out.results[0].is_none());
    }

    #[test]
    fn mark_executable_respects_portable_mode() {
        let mode = file_mode(&config(), true);
        assert_eq!(mode, 0o755);
        let mode = file_mode(&config(), false);
        assert_eq!(mode, 0o644);
    }
}
