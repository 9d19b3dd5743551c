//! Asset pipeline: scan, classify, copy/minify, fingerprint.

pub mod kind;
pub mod process;
pub mod scan;

pub use kind::AssetKind;

use std::path::PathBuf;

use crate::utils::hash::ContentHash;

/// A non-Markdown file to copy or transform.
#[derive(Debug, Clone)]
pub struct Asset {
    /// Absolute source path.
    pub source: PathBuf,
    /// Assets-relative slash key (`css/style.css`).
    pub key: String,
    pub kind: AssetKind,
    /// Output path relative to the output dir (fingerprinted when enabled).
    pub output_rel: PathBuf,
    pub hash: Option<ContentHash>,
    /// Filename carrying the content hash, when fingerprinting is enabled.
    pub fingerprinted_name: Option<String>,
}

impl Asset {
    pub fn new(source: PathBuf, key: String) -> Self {
        let kind = AssetKind::from_path(&source);
        let output_rel = PathBuf::from(&key);
        Self {
            source,
            key,
            kind,
            output_rel,
            hash: None,
            fingerprinted_name: None,
        }
    }

    /// Root-relative URL of the processed asset.
    pub fn url(&self) -> String {
        format!("/{}", crate::utils::to_slash(&self.output_rel))
    }
}
