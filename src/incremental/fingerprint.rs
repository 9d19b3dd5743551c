//! File fingerprints: (size, mtime, content hash).
//!
//! A file is unchanged iff its fingerprint matches the cache. mtime alone is
//! never sufficient; the content hash is authoritative when mtimes differ.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::UNIX_EPOCH;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::utils::hash::{self, ContentHash};

/// Fingerprint of one source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fingerprint {
    pub size: u64,
    /// Modification time in nanoseconds since the epoch; 0 when unavailable.
    pub mtime_ns: u128,
    /// blake3 content hash (hex).
    pub hash: String,
}

impl Fingerprint {
    /// Compute the fingerprint of a file. Returns None when unreadable.
    pub fn compute(path: &Path) -> Option<Self> {
        let meta = std::fs::metadata(path).ok()?;
        let size = meta.len();
        let mtime_ns = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        let digest = cached_file_hash(path);
        if digest.is_empty() {
            return None;
        }
        Some(Self {
            size,
            mtime_ns,
            hash: digest.to_hex(),
        })
    }

    /// Cheap pre-check: same size and mtime means unchanged without hashing.
    pub fn matches_stat(&self, path: &Path) -> bool {
        let Ok(meta) = std::fs::metadata(path) else {
            return false;
        };
        if meta.len() != self.size {
            return false;
        }
        let mtime_ns = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        mtime_ns == self.mtime_ns && self.mtime_ns != 0
    }
}

/// Whether a file changed relative to a cached fingerprint.
///
/// Missing cache entry or unreadable file counts as changed.
pub fn is_changed(path: &Path, cached: Option<&Fingerprint>) -> bool {
    let Some(cached) = cached else {
        return true;
    };
    if cached.matches_stat(path) {
        return false;
    }
    // Stat differs: the content hash decides.
    let digest = hash::hash_file(path);
    if digest.is_empty() {
        return true;
    }
    digest.to_hex() != cached.hash
}

// =============================================================================
// Process-wide hash memo
// =============================================================================

/// Hash memo shared across a build; avoids re-hashing a file observed by
/// several subsystems (fingerprints, assets, classification).
static HASH_MEMO: LazyLock<DashMap<PathBuf, ContentHash>> = LazyLock::new(DashMap::new);

/// Hash with memoization keyed on the normalized path.
pub fn cached_file_hash(path: &Path) -> ContentHash {
    let key = crate::utils::normalize_path(path);
    if let Some(cached) = HASH_MEMO.get(&key) {
        return *cached;
    }
    let digest = hash::hash_file(path);
    if !digest.is_empty() {
        HASH_MEMO.insert(key, digest);
    }
    digest
}

/// Drop memoized hashes for the given paths (watcher reported them changed).
pub fn evict(paths: &[PathBuf]) {
    for path in paths {
        HASH_MEMO.remove(&crate::utils::normalize_path(path));
    }
}

/// Clear the whole memo (full rebuilds, tests).
pub fn clear_memo() {
    HASH_MEMO.clear();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn compute_and_match() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.md");
        fs::write(&path, "content").unwrap();

        let fp = Fingerprint::compute(&path).unwrap();
        assert_eq!(fp.size, 7);
        assert!(!is_changed(&path, Some(&fp)));
    }

    #[test]
    fn missing_cache_entry_is_changed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.md");
        fs::write(&path, "content").unwrap();
        assert!(is_changed(&path, None));
    }

    #[test]
    fn content_change_detected_even_with_same_size() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.md");
        fs::write(&path, "aaaa").unwrap();
        let fp = Fingerprint::compute(&path).unwrap();

        clear_memo();
        fs::write(&path, "bbbb").unwrap();
        // Force the stat fast-path to miss by zeroing the recorded mtime.
        let stale = Fingerprint {
            mtime_ns: 0,
            ..fp
        };
        assert!(is_changed(&path, Some(&stale)));
    }

    #[test]
    fn hash_is_authoritative_over_mtime() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.md");
        fs::write(&path, "same content").unwrap();
        let mut fp = Fingerprint::compute(&path).unwrap();

        // Touch: different mtime, same content. Must NOT count as changed.
        fp.mtime_ns = fp.mtime_ns.wrapping_add(1);
        clear_memo();
        assert!(!is_changed(&path, Some(&fp)));
    }

    #[test]
    fn unreadable_file_is_changed() {
        let fp = Fingerprint {
            size: 1,
            mtime_ns: 1,
            hash: "00".into(),
        };
        assert!(is_changed(Path::new("/nonexistent/x.md"), Some(&fp)));
    }
}
