//! Filesystem walk producing a content [`crate::entry::Entry`], with
//! behavioral probing, baseline acceleration, and cooperative
//! preemption (§4.9).
//!
//! [`scan`] is the single public entry point. Everything else in this
//! module is plumbing: [`behavior`] memoizes the per-device probe of
//! §4.9.1, [`hash`] supplies the pluggable digest algorithm, and the
//! private recursive walk implements §4.9.3's baseline-reuse
//! acceleration and §4.9.4's per-entry semantics.

pub mod behavior;
pub mod hash;

pub use hash::{Hasher, Md5Hasher, Sha1Hasher, Sha256Hasher};

use std::collections::HashSet;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use tracing::{debug, trace, warn};

use crate::cache::{Cache, FileId};
use crate::entry::{Contents, Entry, Order};
use crate::error::ScanError;
use crate::ignore::{Dialect, DockerMatch, IgnoreCache, Matcher};
use crate::path;
use crate::policy::{self, PermissionsMode, ProbeMode, SymbolicLinkMode};
use crate::snapshot::Snapshot;
use crate::Cancellation;

/// `32 KiB`: the scanner's digest read-buffer size (§4.9.4).
pub const SCANNER_COPY_BUFFER_SIZE: usize = 32 * 1024;
/// Preemption check cadence while hashing: once every this many buffer
/// reads (§4.9.5).
pub const SCANNER_COPY_PREEMPTION_INTERVAL: u32 = 1024;

/// Bundles the three scan-time policy knobs (§4.9.2) so [`scan`] doesn't
/// need a seven-plus-three-parameter signature.
#[derive(Clone, Copy, Debug)]
pub struct ScanConfig {
    pub probe_mode: ProbeMode,
    pub symbolic_link_mode: SymbolicLinkMode,
    pub permissions_mode: PermissionsMode,
}

/// [`scan`]'s return value (§4.9.2).
#[derive(Debug)]
pub struct ScanOutput {
    pub snapshot: Snapshot,
    pub cache: Cache,
    pub ignore_cache: IgnoreCache,
}

/// Scans `root` on disk, producing a [`Snapshot`] plus the caches needed
/// to accelerate the next scan (§4.9).
///
/// # Errors
///
/// Returns [`ScanError`] only for the scan-fatal conditions of §7: the
/// root itself is unreachable, the requested symbolic link mode can't be
/// represented on this host, accelerated-scan cache back-fill found no
/// corresponding old entry, or `ctx` was cancelled. Every other failure
/// (an inaccessible child, a malformed symbolic link, an unsupported
/// filesystem object) is recorded in the returned tree as a
/// `Problematic` or `Untracked` entry instead.
pub async fn scan<H: Hasher>(
    ctx: &Cancellation,
    root: &Path,
    baseline: Option<&Entry>,
    recheck_paths: &[String],
    cache: Option<&Cache>,
    ignores: &Matcher,
    ignore_cache: Option<&IgnoreCache>,
    config: &ScanConfig,
) -> Result<ScanOutput, ScanError> {
    ensure_symbolic_link_mode_supported(config.symbolic_link_mode)?;

    let root_metadata = match tokio::fs::symlink_metadata(root).await {
        Ok(metadata) => Some(metadata),
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => None,
        Err(source) => {
            warn!(path = %root.display(), %source, "synchronization root unreachable");
            return Err(ScanError::RootUnreachable { path: root.display().to_string(), source });
        }
    };

    let Some(root_metadata) = root_metadata else {
        let (preserves_executability, decomposes_unicode) = match config.probe_mode {
            ProbeMode::Assume { preserves_executability, decomposes_unicode } => {
                (preserves_executability, decomposes_unicode)
            }
            ProbeMode::Probe => (cfg!(unix), false),
        };
        debug!(path = %root.display(), "synchronization root absent");
        return Ok(ScanOutput {
            snapshot: Snapshot::empty(preserves_executability, decomposes_unicode),
            cache: Cache::new(),
            ignore_cache: IgnoreCache::new(),
        });
    };

    let root_device = FileId::from_metadata(&root_metadata).device;
    let (preserves_executability, decomposes_unicode) = resolve_behavior(root, root_device, config.probe_mode).await;

    let root_is_directory = root_metadata.is_dir();
    let baseline_kind_matches = baseline.is_some_and(|b| b.is_directory_kind() == root_is_directory);

    if baseline.is_some() && baseline_kind_matches && recheck_paths.is_empty() {
        trace!(path = %root.display(), "baseline reused unchanged, no recheck paths");
        let new_cache = cache.cloned().unwrap_or_default();
        let new_ignore_cache = ignore_cache.cloned().unwrap_or_default();
        let (directories, files, symbolic_links, total_file_size) = aggregate_counts(baseline, &new_cache);
        return Ok(ScanOutput {
            snapshot: Snapshot::new(
                baseline.cloned(),
                preserves_executability,
                decomposes_unicode,
                directories,
                files,
                symbolic_links,
                total_file_size,
            ),
            cache: new_cache,
            ignore_cache: new_ignore_cache,
        });
    }

    let accelerated = baseline.is_some() && baseline_kind_matches;
    let dirty = accelerated.then(|| dirty_paths(recheck_paths));
    let effective_baseline = if accelerated { baseline.cloned() } else { None };

    debug!(path = %root.display(), accelerated, recheck_count = recheck_paths.len(), "starting scan");

    let mut acc = Accumulator::default();
    let root_entry = scan_object::<H>(
        ctx,
        ignores,
        cache,
        ignore_cache,
        dirty.as_ref(),
        config.symbolic_link_mode,
        config.permissions_mode,
        decomposes_unicode,
        root_device,
        root.to_path_buf(),
        String::new(),
        effective_baseline,
        &mut acc,
    )
    .await?;

    backfill(&mut acc, cache, ignore_cache)?;

    let snapshot = Snapshot::new(
        Some(root_entry),
        preserves_executability,
        decomposes_unicode,
        acc.directories,
        acc.files,
        acc.symbolic_links,
        acc.total_file_size,
    );
    Ok(ScanOutput { snapshot, cache: acc.new_cache, ignore_cache: acc.new_ignore_cache })
}

fn ensure_symbolic_link_mode_supported(mode: SymbolicLinkMode) -> Result<(), ScanError> {
    if mode == SymbolicLinkMode::PosixRaw && !cfg!(unix) {
        return Err(ScanError::UnsupportedSymbolicLinkMode);
    }
    Ok(())
}

async fn resolve_behavior(root: &Path, device: u64, probe_mode: ProbeMode) -> (bool, bool) {
    match probe_mode {
        ProbeMode::Assume { preserves_executability, decomposes_unicode } => {
            (preserves_executability, decomposes_unicode)
        }
        ProbeMode::Probe => {
            if let Some(cached) = behavior::cached(device).await {
                return (cached.preserves_executability, cached.decomposes_unicode);
            }
            match behavior::probe(root).await {
                Ok(behavior) => {
                    behavior::record(device, behavior).await;
                    (behavior.preserves_executability, behavior.decomposes_unicode)
                }
                Err(source) => {
                    warn!(path = %root.display(), %source, "filesystem behavior probe failed, assuming host defaults");
                    (cfg!(unix), false)
                }
            }
        }
    }
}

/// §4.9.3: transitive closure of `recheck_paths` and all their parent
/// paths, including `""`. A path outside this set is assumed unchanged
/// since the baseline and may be reused by reference.
fn dirty_paths(recheck_paths: &[String]) -> HashSet<String> {
    let mut dirty = HashSet::new();
    dirty.insert(String::new());
    for recheck_path in recheck_paths {
        let mut current = recheck_path.clone();
        dirty.insert(current.clone());
        while !current.is_empty() {
            current = path::parent(&current).to_owned();
            dirty.insert(current.clone());
        }
    }
    dirty
}

#[derive(Default)]
struct Accumulator {
    new_cache: Cache,
    new_ignore_cache: IgnoreCache,
    backfill_roots: Vec<(String, Entry)>,
    directories: u64,
    files: u64,
    symbolic_links: u64,
    total_file_size: u64,
}

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

#[allow(clippy::too_many_arguments)]
fn scan_object<'a, H: Hasher>(
    ctx: &'a Cancellation,
    ignores: &'a Matcher,
    old_cache: Option<&'a Cache>,
    old_ignore_cache: Option<&'a IgnoreCache>,
    dirty: Option<&'a HashSet<String>>,
    symbolic_link_mode: SymbolicLinkMode,
    permissions_mode: PermissionsMode,
    decomposes_unicode: bool,
    root_device: u64,
    host_path: PathBuf,
    sync_path: String,
    baseline: Option<Entry>,
    acc: &'a mut Accumulator,
) -> BoxFuture<'a, Result<Entry, ScanError>> {
    Box::pin(async move {
        if ctx.is_cancelled() {
            return Err(ScanError::Cancelled);
        }

        let metadata = match tokio::fs::symlink_metadata(&host_path).await {
            Ok(metadata) => metadata,
            Err(source) => {
                return Ok(Entry::problematic(format!("unable to stat {:?}: {source}", sync_path)));
            }
        };
        let is_directory = metadata.is_dir();

        let docker_match = ignore_decision(ignores, old_ignore_cache, acc, &sync_path, is_directory);
        if docker_match.ignored && !docker_match.phantom {
            return Ok(Entry::untracked());
        }

        if is_directory {
            let file_id = FileId::from_metadata(&metadata);
            if file_id.device != root_device {
                return Ok(Entry::problematic("scan crossed filesystem boundary"));
            }
            return scan_directory::<H>(
                ctx,
                ignores,
                old_cache,
                old_ignore_cache,
                dirty,
                symbolic_link_mode,
                permissions_mode,
                decomposes_unicode,
                root_device,
                host_path,
                sync_path,
                baseline,
                docker_match.phantom,
                acc,
            )
            .await;
        }

        if metadata.is_file() {
            return scan_file::<H>(ctx, old_cache, permissions_mode, host_path, sync_path, metadata, acc).await;
        }

        if metadata.is_symlink() {
            return Ok(scan_symlink(&host_path, &sync_path, symbolic_link_mode, acc).await);
        }

        // Socket, FIFO, device, or some other host-specific object type
        // this model has no representation for (§3.1 "Untracked").
        Ok(Entry::untracked())
    })
}

fn ignore_decision(
    matcher: &Matcher,
    old_ignore_cache: Option<&IgnoreCache>,
    acc: &mut Accumulator,
    path: &str,
    is_directory: bool,
) -> DockerMatch {
    if let Some(cached) = old_ignore_cache.and_then(|c| c.get(path, is_directory)) {
        acc.new_ignore_cache.insert(path, is_directory, cached);
        let phantom = matches!(matcher.dialect(), Dialect::Docker) && cached && is_directory;
        return DockerMatch { ignored: cached, phantom };
    }
    let result = matcher.is_ignored_docker(path, is_directory);
    acc.new_ignore_cache.insert(path, is_directory, result.ignored);
    result
}

#[allow(clippy::too_many_arguments)]
async fn scan_directory<'a, H: Hasher>(
    ctx: &'a Cancellation,
    ignores: &'a Matcher,
    old_cache: Option<&'a Cache>,
    old_ignore_cache: Option<&'a IgnoreCache>,
    dirty: Option<&'a HashSet<String>>,
    symbolic_link_mode: SymbolicLinkMode,
    permissions_mode: PermissionsMode,
    decomposes_unicode: bool,
    root_device: u64,
    host_path: PathBuf,
    sync_path: String,
    baseline: Option<Entry>,
    phantom: bool,
    acc: &'a mut Accumulator,
) -> Result<Entry, ScanError> {
    let mut read_dir = match tokio::fs::read_dir(&host_path).await {
        Ok(read_dir) => read_dir,
        Err(source) => return Ok(Entry::problematic(format!("unable to read directory: {source}"))),
    };

    let baseline_contents: Option<Contents> = baseline.as_ref().and_then(Entry::contents).cloned();

    let mut contents = Contents::new();
    loop {
        if ctx.is_cancelled() {
            return Err(ScanError::Cancelled);
        }
        let entry = match read_dir.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(_) => break,
        };

        let raw_name = entry.file_name();
        let Some(raw_name) = raw_name.to_str() else { continue };
        if is_temporary_file_name(raw_name) {
            continue;
        }
        let name = normalize_name(raw_name, decomposes_unicode);
        let child_sync_path = path::join(&sync_path, &name);
        let child_host_path = host_path.join(&entry.file_name());
        let baseline_child_arc = baseline_contents.as_ref().and_then(|c| c.get(&name)).cloned();

        let reusable = dirty.is_some_and(|dirty| !dirty.contains(&child_sync_path))
            && baseline_child_arc.as_deref().is_some_and(|b| baseline_child_matches_disk(b, &entry));

        let child_entry_arc = if reusable {
            // `Arc::clone`, not a structural copy: the reused subtree keeps
            // its identity, which is what lets an unrelated sibling rescan
            // share storage with the baseline instead of reallocating it.
            let arc = baseline_child_arc.expect("checked by `reusable` above");
            acc.backfill_roots.push((child_sync_path.clone(), (*arc).clone()));
            arc
        } else {
            let baseline_child = baseline_child_arc.as_deref().cloned();
            let child_entry = scan_object::<H>(
                ctx,
                ignores,
                old_cache,
                old_ignore_cache,
                dirty,
                symbolic_link_mode,
                permissions_mode,
                decomposes_unicode,
                root_device,
                child_host_path,
                child_sync_path.clone(),
                baseline_child,
                acc,
            )
            .await?;
            std::sync::Arc::new(child_entry)
        };

        contents.insert(name, child_entry_arc);
    }

    acc.directories += 1;
    if phantom {
        Ok(Entry::phantom_directory(contents))
    } else {
        Ok(Entry::directory(contents))
    }
}

/// Cheap, non-recursive check used before committing to baseline reuse:
/// does the on-disk type of `entry` (from the parent directory listing,
/// no extra stat) match the baseline's recorded kind? Placeholder kinds
/// (`Untracked`/`Problematic`) carry no disk-kind commitment and are
/// always considered reusable when not dirty.
fn baseline_child_matches_disk(baseline: &Entry, disk_entry: &tokio::fs::DirEntry) -> bool {
    let Ok(file_type) = disk_entry.file_type() else { return false };
    match baseline {
        Entry::Directory { .. } | Entry::PhantomDirectory { .. } => file_type.is_dir(),
        Entry::File { .. } => file_type.is_file(),
        Entry::SymbolicLink { .. } => file_type.is_symlink(),
        Entry::Untracked | Entry::Problematic { .. } => true,
    }
}

async fn scan_file<H: Hasher>(
    ctx: &Cancellation,
    old_cache: Option<&Cache>,
    permissions_mode: PermissionsMode,
    host_path: PathBuf,
    sync_path: String,
    metadata: std::fs::Metadata,
    acc: &mut Accumulator,
) -> Result<Entry, ScanError> {
    use std::os::unix::fs::PermissionsExt;

    let mode = metadata.permissions().mode() & 0o7777;
    let size = metadata.len();
    let file_id = FileId::from_metadata(&metadata);
    let modification_time = match metadata.modified() {
        Ok(time) => time,
        Err(source) => return Ok(Entry::problematic(format!("unable to read modification time: {source}"))),
    };

    let cached_digest = old_cache
        .and_then(|cache| cache.get(&sync_path))
        .filter(|entry| entry.matches_identity(mode, modification_time, size, file_id))
        .map(|entry| entry.digest.clone());

    let digest = match cached_digest {
        Some(digest) => digest,
        None => match hash_file::<H>(ctx, &host_path, size).await? {
            Ok(digest) => digest,
            Err(problem) => return Ok(Entry::problematic(problem)),
        },
    };

    let cache_entry = crate::cache::CacheEntry::new(mode, modification_time, size, file_id, digest.clone());
    acc.new_cache.insert(sync_path, cache_entry);
    acc.files += 1;
    acc.total_file_size += size;

    let executable = match permissions_mode {
        PermissionsMode::Portable => mode & 0o100 != 0,
        PermissionsMode::Manual => false,
    };
    Ok(Entry::file(digest, executable))
}

/// Reads and hashes a file's content in [`SCANNER_COPY_BUFFER_SIZE`]
/// chunks, checking `ctx` for preemption every
/// [`SCANNER_COPY_PREEMPTION_INTERVAL`] reads (§4.9.4, §4.9.5).
///
/// The outer `Result` is cancellation (fatal, stops the whole scan); the
/// inner `Result` is a soft per-file problem (becomes `Problematic`).
async fn hash_file<H: Hasher>(
    ctx: &Cancellation,
    path: &Path,
    reported_size: u64,
) -> Result<Result<crate::entry::Digest, String>, ScanError> {
    use tokio::io::AsyncReadExt;

    let mut file = match tokio::fs::File::open(path).await {
        Ok(file) => file,
        Err(source) => return Ok(Err(format!("unable to open file: {source}"))),
    };

    let mut hasher = H::new();
    let mut buffer = vec![0u8; SCANNER_COPY_BUFFER_SIZE];
    let mut total_read: u64 = 0;
    let mut reads_since_check: u32 = 0;

    loop {
        let n = match file.read(&mut buffer).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(source) => return Ok(Err(format!("error reading file content: {source}"))),
        };
        hasher.write(&buffer[..n]);
        total_read += n as u64;

        reads_since_check += 1;
        if reads_since_check >= SCANNER_COPY_PREEMPTION_INTERVAL {
            reads_since_check = 0;
            if ctx.is_cancelled() {
                return Err(ScanError::Cancelled);
            }
        }
    }

    if total_read != reported_size {
        // §4.9.4: a byte-count mismatch is Problematic, not fatal.
        return Ok(Err(format!(
            "file size changed during hashing: expected {reported_size} bytes, read {total_read}"
        )));
    }
    Ok(Ok(hasher.finish()))
}

async fn scan_symlink(
    host_path: &Path,
    sync_path: &str,
    mode: SymbolicLinkMode,
    acc: &mut Accumulator,
) -> Entry {
    if mode == SymbolicLinkMode::Ignore {
        return Entry::untracked();
    }

    let target = match tokio::fs::read_link(host_path).await {
        Ok(target) => target,
        Err(source) => return Entry::problematic(format!("unable to read symbolic link {sync_path:?}: {source}")),
    };
    let target = target.to_string_lossy().into_owned();

    let validated = match mode {
        SymbolicLinkMode::PosixRaw => {
            if target.is_empty() {
                Err("symbolic link has an empty target".to_owned())
            } else {
                Ok(target)
            }
        }
        SymbolicLinkMode::Portable => {
            let normalized = target.replace('\\', "/");
            policy::validate_portable_symlink_target(&normalized).map(|()| normalized)
        }
        SymbolicLinkMode::Ignore => unreachable!("handled above"),
    };

    match validated {
        Ok(target) => {
            acc.symbolic_links += 1;
            Entry::symbolic_link(target)
        }
        Err(problem) => Entry::problematic(problem),
    }
}

fn is_temporary_file_name(name: &str) -> bool {
    name.starts_with(".nfs") || name.ends_with(".swp") || name.ends_with('~')
}

fn normalize_name(name: &str, decomposes_unicode: bool) -> String {
    if decomposes_unicode {
        use unicode_normalization::UnicodeNormalization;
        name.nfc().collect()
    } else {
        name.to_owned()
    }
}

fn aggregate_counts(root: Option<&Entry>, cache: &Cache) -> (u64, u64, u64, u64) {
    let mut directories = 0;
    let mut files = 0;
    let mut symbolic_links = 0;
    let mut total_file_size = 0;
    if let Some(root) = root {
        root.walk("", Order::Pre, &mut |path, entry| match entry {
            Entry::Directory { .. } => directories += 1,
            Entry::File { .. } => {
                files += 1;
                if let Some(entry) = cache.get(path) {
                    total_file_size += entry.size;
                }
            }
            Entry::SymbolicLink { .. } => symbolic_links += 1,
            _ => {}
        });
    }
    (directories, files, symbolic_links, total_file_size)
}

/// Copies cache and ignore-cache entries for every non-dirty subtree
/// reused by reference during the scan, and folds their directory/
/// file/symbolic-link counts into the aggregate (§4.9.3).
fn backfill(acc: &mut Accumulator, old_cache: Option<&Cache>, old_ignore_cache: Option<&IgnoreCache>) -> Result<(), ScanError> {
    let roots = std::mem::take(&mut acc.backfill_roots);
    for (root_path, root_entry) in roots {
        let mut missing: Option<String> = None;
        let directories = &mut acc.directories;
        let files = &mut acc.files;
        let symbolic_links = &mut acc.symbolic_links;
        let total_file_size = &mut acc.total_file_size;
        let new_cache = &mut acc.new_cache;
        let new_ignore_cache = &mut acc.new_ignore_cache;

        root_entry.walk(&root_path, Order::Pre, &mut |path, entry| {
            match entry {
                Entry::Directory { .. } => *directories += 1,
                Entry::File { .. } => {
                    *files += 1;
                    match old_cache.and_then(|cache| cache.get(path)) {
                        Some(cache_entry) => {
                            *total_file_size += cache_entry.size;
                            new_cache.insert(path, cache_entry.clone());
                        }
                        None => {
                            if missing.is_none() {
                                missing = Some(path.to_owned());
                            }
                        }
                    }
                }
                Entry::SymbolicLink { .. } => *symbolic_links += 1,
                _ => {}
            }
            for is_directory in [true, false] {
                if let Some(ignored) = old_ignore_cache.and_then(|cache| cache.get(path, is_directory)) {
                    new_ignore_cache.insert(path, is_directory, ignored);
                }
            }
        });

        if let Some(path) = missing {
            return Err(ScanError::CacheBackfillInconsistent { path });
        }
    }
    Ok(())
}
