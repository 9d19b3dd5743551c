//! Change classification: watcher paths → rebuild strategy inputs.
//!
//! Pure functions, no actor machinery, no side effects beyond reading the
//! changed files' frontmatter for nav detection.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::cache::BuildCache;
use crate::config::SiteConfig;
use crate::content::meta::{nav_digest, parse_frontmatter};
use crate::utils::path::relative_key;

/// Kind of filesystem event after debouncer dedup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Created,
    Modified,
    Removed,
}

impl ChangeKind {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Modified => "modified",
            Self::Removed => "removed",
        }
    }

    /// Create/delete/move as opposed to modified in place.
    pub const fn is_structural(self) -> bool {
        matches!(self, Self::Created | Self::Removed)
    }
}

/// Category of a changed path based on the config directories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileCategory {
    Content,
    Template,
    Data,
    Asset,
    Config,
    Output,
    Unknown,
}

/// Categorize a path. The path should already be normalized.
pub fn categorize_path(path: &Path, config: &SiteConfig) -> FileCategory {
    // Output first: hook-generated files must not feed back into builds.
    if path.starts_with(config.output_dir()) {
        return FileCategory::Output;
    }
    if path == config.config_path {
        return FileCategory::Config;
    }
    if path.starts_with(config.content_dir()) {
        return FileCategory::Content;
    }
    if path.starts_with(config.templates_dir()) {
        return FileCategory::Template;
    }
    if let Some(theme) = config.theme_templates_dir() {
        if path.starts_with(&theme) {
            return FileCategory::Template;
        }
    }
    if path.starts_with(config.data_dir()) {
        return FileCategory::Data;
    }
    if path.starts_with(config.assets_dir()) {
        return FileCategory::Asset;
    }
    for extra in &config.content.watch_paths {
        if path.starts_with(config.root_join(extra)) {
            return FileCategory::Data;
        }
    }
    FileCategory::Unknown
}

/// Result of classifying a batch of changed paths.
#[derive(Debug, Default)]
pub struct ChangeSet {
    /// Every path with its category and event kind (for logging/explain).
    pub classified: Vec<(PathBuf, FileCategory, ChangeKind)>,
    /// Config changed: full rebuild.
    pub config_changed: bool,
    /// A section-affecting create/delete (an `_index.*` file or a directory):
    /// full rebuild.
    pub section_structural: bool,
    pub content_changed: Vec<PathBuf>,
    /// Subset of content_changed whose navigation-affecting frontmatter keys
    /// differ from the cached digest.
    pub nav_changed: Vec<PathBuf>,
    pub template_changed: Vec<PathBuf>,
    pub data_changed: Vec<PathBuf>,
    pub asset_changed: Vec<PathBuf>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.classified.is_empty()
    }
}

/// Classify changed paths against the config tree and the warm cache.
pub fn classify_changes(
    changes: &[(PathBuf, ChangeKind)],
    config: &SiteConfig,
    cache: &BuildCache,
) -> ChangeSet {
    let mut set = ChangeSet::default();
    let content_dir = config.content_dir();

    for (path, kind) in changes {
        let category = categorize_path(path, config);
        set.classified.push((path.clone(), category, *kind));

        match category {
            FileCategory::Config => set.config_changed = true,
            FileCategory::Content => {
                if kind.is_structural() && affects_sections(path) {
                    set.section_structural = true;
                }
                if *kind != ChangeKind::Removed {
                    set.content_changed.push(path.clone());
                    if *kind == ChangeKind::Modified
                        && is_nav_changed(path, &content_dir, cache)
                    {
                        set.nav_changed.push(path.clone());
                    }
                }
            }
            FileCategory::Template => set.template_changed.push(path.clone()),
            FileCategory::Data => set.data_changed.push(path.clone()),
            FileCategory::Asset => set.asset_changed.push(path.clone()),
            FileCategory::Output | FileCategory::Unknown => {}
        }
    }
    set
}

/// Create/delete of `_index.*` or a directory changes the section tree.
fn affects_sections(path: &Path) -> bool {
    if path.extension().is_none() {
        return true; // directory event
    }
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(|stem| stem == "_index")
        .unwrap_or(false)
}

/// Compare the modified file's nav-affecting frontmatter against the cached
/// parsed-content digest.
fn is_nav_changed(path: &Path, content_dir: &Path, cache: &BuildCache) -> bool {
    let Some(key) = relative_key(content_dir, path) else {
        return false;
    };
    let Some(entry) = cache.parsed_content.get(&key) else {
        // No cached metadata to compare: treat as nav-affecting.
        return true;
    };
    let Ok(source) = std::fs::read_to_string(path) else {
        return false;
    };
    let fm = parse_frontmatter(&source);
    nav_digest(&fm.meta).to_hex() != entry.nav_digest
}
