//! Process-wide filesystem behavior probe cache (§4.9.1, §5, §9).
//!
//! Probing whether a filesystem preserves POSIX executability bits and
//! whether it decomposes Unicode filenames can require writing and
//! renaming temporary files, which would perturb a watched root if
//! repeated on every scan. The result is instead cached once per device
//! ID for the life of the process, behind a reader/writer lock since
//! probes on independent roots may race (§5).

use std::collections::HashMap;
use std::path::Path;
use std::sync::RwLock;

use tokio::sync::OnceCell;

/// Probed behavior of one filesystem, keyed by device ID.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Behavior {
    pub preserves_executability: bool,
    pub decomposes_unicode: bool,
}

static CACHE: OnceCell<RwLock<HashMap<u64, Behavior>>> = OnceCell::const_new();

async fn cache() -> &'static RwLock<HashMap<u64, Behavior>> {
    CACHE.get_or_init(|| async { RwLock::new(HashMap::new()) }).await
}

/// Returns the cached behavior for `device`, if any probe has already
/// run for it in this process.
pub async fn cached(device: u64) -> Option<Behavior> {
    cache().await.read().expect("behavior cache lock poisoned").get(&device).copied()
}

/// Records `behavior` for `device`, overwriting any prior entry. Called
/// once per device after a fresh probe.
pub async fn record(device: u64, behavior: Behavior) {
    cache().await.write().expect("behavior cache lock poisoned").insert(device, behavior);
}

/// Probes `root`'s behavior directly, without consulting or updating the
/// cache. Writes and removes a small temporary file and directory inside
/// `root` to observe how the host filesystem actually treats them.
///
/// Executability is probed by creating a file, marking it executable,
/// re-reading its mode, and checking the bit survived. Unicode
/// decomposition is probed by creating a file whose name is an
/// NFC-composed character and checking whether a directory listing
/// reports it back decomposed (NFD).
pub async fn probe(root: &Path) -> std::io::Result<Behavior> {
    let preserves_executability = probe_executability(root).await?;
    let decomposes_unicode = probe_unicode_decomposition(root).await?;
    Ok(Behavior { preserves_executability, decomposes_unicode })
}

async fn probe_executability(root: &Path) -> std::io::Result<bool> {
    use std::os::unix::fs::PermissionsExt;

    let probe_path = root.join(".sync-core-probe-exec");
    tokio::fs::write(&probe_path, b"").await?;
    let result = async {
        tokio::fs::set_permissions(&probe_path, std::fs::Permissions::from_mode(0o755)).await?;
        let metadata = tokio::fs::metadata(&probe_path).await?;
        std::io::Result::Ok(metadata.permissions().mode() & 0o111 != 0)
    }
    .await;
    let _ = tokio::fs::remove_file(&probe_path).await;
    result
}

async fn probe_unicode_decomposition(root: &Path) -> std::io::Result<bool> {
    // "\u{e9}" (U+00E9, LATIN SMALL LETTER E WITH ACUTE), NFC-composed.
    let composed = "sync-core-probe-\u{e9}";
    let probe_path = root.join(composed);
    tokio::fs::write(&probe_path, b"").await?;

    let mut decomposed_seen = false;
    let mut dir = tokio::fs::read_dir(root).await?;
    while let Some(entry) = dir.next_entry().await? {
        if let Some(name) = entry.file_name().to_str() {
            if name.starts_with("sync-core-probe-") && name != composed {
                decomposed_seen = true;
            }
        }
    }
    let _ = tokio::fs::remove_file(&probe_path).await;
    Ok(decomposed_seen)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn record_then_cached_round_trips() {
        record(u64::MAX - 1, Behavior { preserves_executability: true, decomposes_unicode: false }).await;
        let got = cached(u64::MAX - 1).await.unwrap();
        assert!(got.preserves_executability);
        assert!(!got.decomposes_unicode);
    }

    #[tokio::test]
    async fn unknown_device_is_uncached() {
        assert!(cached(u64::MAX).await.is_none());
    }

    #[tokio::test]
    async fn probe_executability_detects_preservation_on_tmpfs() {
        let dir = tempfile::tempdir().unwrap();
        let behavior = probe(dir.path()).await.unwrap();
        // Local tmp filesystems in CI/dev environments preserve exec bits.
        assert!(behavior.preserves_executability);
    }
}
