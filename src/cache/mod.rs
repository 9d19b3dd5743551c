//! The persisted BuildCache: everything a warm rebuild needs.
//!
//! On-disk format: 4 magic bytes `BGLC`, a little-endian u32 version, then a
//! serde_json body keyed by store name (a partial reader can pick individual
//! stores). Version mismatch or any load failure yields an empty cache and
//! the next build is a full build.

pub mod coordinator;

pub use coordinator::{CacheCoordinator, InvalidationEvent, InvalidationReason};

use std::collections::BTreeMap;
use std::path::Path;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::content::TocEntry;
use crate::incremental::{Dependency, Fingerprint};
use crate::utils::atomic::write_atomic;

pub const CACHE_MAGIC: [u8; 4] = *b"BGLC";
pub const CACHE_VERSION: u32 = 1;

/// Cached markdown parse result for one page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedEntry {
    /// Parsed HTML with escape placeholders still in place.
    pub html: String,
    pub toc: Vec<TocEntry>,
    /// Outbound link destinations found in the body.
    pub links: Vec<String>,
    /// Literal-expression stash matching the placeholders in `html`.
    pub escapes: Vec<String>,
    /// Digest of the raw body at parse time.
    pub body_digest: String,
    /// Digest of the full metadata map at parse time.
    pub meta_digest: String,
    /// Digest over navigation-affecting keys, for nav_changed detection.
    pub nav_digest: String,
    /// Digest of the page's `cascade` map, for cascade-change detection.
    pub cascade_digest: String,
    pub parser_version: u32,
}

/// Cached render result for one page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderedEntry {
    /// Content hash of the written output file (hex).
    pub output_hash: String,
    /// Digest over the sources of every template the page used.
    pub template_digest: String,
    /// Digest over the page's dependency set.
    pub dep_digest: String,
}

/// Persisted across builds in `.bengal/cache/buildcache.bin`.
///
/// All maps are keyed by canonical source key (pages) or tree-relative path
/// (templates, data, assets).
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct BuildCache {
    pub config_hash: String,
    pub file_fingerprints: FxHashMap<String, Fingerprint>,
    pub parsed_content: FxHashMap<String, ParsedEntry>,
    pub rendered_output: FxHashMap<String, RenderedEntry>,
    /// Autodoc source path → digest.
    pub autodoc_sources: FxHashMap<String, String>,
    /// Data-dir-relative path → content hash.
    pub data_fingerprints: FxHashMap<String, String>,
    /// Asset key → content hash.
    pub asset_fingerprints: FxHashMap<String, String>,
    /// Forward dependency edges (reverse index derived on load).
    pub dependencies: FxHashMap<String, Vec<Dependency>>,
    /// taxonomy → term → member keys, for cascade detection.
    pub taxonomy_snapshot: BTreeMap<String, BTreeMap<String, Vec<String>>>,
    /// Prior output inventory: output-relative path → content hash.
    pub output_snapshot: FxHashMap<String, String>,
}

impl BuildCache {
    /// A cache that forces a full build.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Whether this cache carries no usable state.
    pub fn is_empty(&self) -> bool {
        self.file_fingerprints.is_empty() && self.rendered_output.is_empty()
    }

    /// Load the cache, atomically: any failure returns an empty cache plus a
    /// warning describing why.
    pub fn load(path: &Path) -> (Self, Option<String>) {
        let bytes = match std::fs::read(path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return (Self::empty(), None);
            }
            Err(e) => {
                return (Self::empty(), Some(format!("cache unreadable: {e}")));
            }
        };

        if bytes.len() < 8 || bytes[..4] != CACHE_MAGIC {
            return (Self::empty(), Some("cache has no valid header".to_string()));
        }
        let version = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        if version != CACHE_VERSION {
            return (
                Self::empty(),
                Some(format!(
                    "cache version {version} != expected {CACHE_VERSION}, starting fresh"
                )),
            );
        }

        match serde_json::from_slice(&bytes[8..]) {
            Ok(cache) => (cache, None),
            Err(e) => (Self::empty(), Some(format!("cache body corrupt: {e}"))),
        }
    }

    /// Persist the cache (header + JSON body, atomic write).
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let mut bytes = Vec::with_capacity(64 * 1024);
        bytes.extend_from_slice(&CACHE_MAGIC);
        bytes.extend_from_slice(&CACHE_VERSION.to_le_bytes());
        serde_json::to_writer(&mut bytes, self)?;
        write_atomic(path, &bytes)?;
        Ok(())
    }
}
