//! Output collection: thread-safe record of every file written in a build.

use std::path::Path;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::utils::hash::ContentHash;
use crate::utils::to_slash;

/// Kind of a written output file, used by the reload decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputKind {
    Html,
    Css,
    Js,
    Asset,
    Other,
}

impl OutputKind {
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match ext.as_str() {
            "html" | "htm" => Self::Html,
            "css" => Self::Css,
            "js" | "mjs" => Self::Js,
            "xml" | "json" | "txt" => Self::Other,
            _ => Self::Asset,
        }
    }
}

/// One file written during a build.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputRecord {
    /// Output-dir-relative slash path.
    pub path: String,
    pub kind: OutputKind,
    /// Content hash of the final bytes (hex).
    pub hash: String,
}

/// Thread-safe append-only recorder of written files.
///
/// Records in write order; consumers must not depend on that order beyond
/// using the final set.
#[derive(Debug, Default)]
pub struct OutputCollector {
    records: Mutex<Vec<OutputRecord>>,
}

impl OutputCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, rel_path: &Path, kind: OutputKind, hash: ContentHash) {
        self.records.lock().push(OutputRecord {
            path: to_slash(rel_path),
            kind,
            hash: hash.to_hex(),
        });
    }

    pub fn records(&self) -> Vec<OutputRecord> {
        self.records.lock().clone()
    }

    /// Final inventory: path → content hash. Later writes win.
    pub fn snapshot(&self) -> FxHashMap<String, String> {
        self.records
            .lock()
            .iter()
            .map(|r| (r.path.clone(), r.hash.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}
