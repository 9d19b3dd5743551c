//! BuildInput: an immutable record of everything that triggered a build.
//!
//! Serializable so the orchestrator can run in a subprocess
//! (`BENGAL_BUILD_EXECUTOR=subprocess`).

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::core::BuildMode;
use crate::incremental::classify::{ChangeKind, ChangeSet};

/// Explain-mode output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExplainMode {
    #[default]
    Off,
    Table,
    Json,
}

/// Everything that triggered one build invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildInput {
    pub mode: BuildMode,
    /// Hash of the resolved configuration at trigger time.
    pub config_hash: String,

    // Watcher hints; empty on cold start (the filter then scan-diffs).
    pub changed_sources: Vec<PathBuf>,
    pub nav_changed: Vec<PathBuf>,
    pub template_changed: Vec<PathBuf>,
    pub data_changed: Vec<PathBuf>,
    pub asset_changed: Vec<PathBuf>,
    pub config_changed: bool,
    /// Section-affecting create/delete observed by the watcher.
    pub structural_change: bool,
    /// Raw (path, event-kind) pairs from the watcher batch.
    pub event_kinds: Vec<(PathBuf, ChangeKind)>,

    // Flags.
    pub force: bool,
    /// CLI override; `None` defers to `build.incremental` in config.
    pub incremental: Option<bool>,
    pub dry_run: bool,
    pub explain: ExplainMode,
    pub strict: bool,
    pub parallel: Option<bool>,
    pub drafts: bool,
    pub output_override: Option<PathBuf>,
}

impl Default for BuildInput {
    fn default() -> Self {
        Self {
            mode: BuildMode::Production,
            config_hash: String::new(),
            changed_sources: Vec::new(),
            nav_changed: Vec::new(),
            template_changed: Vec::new(),
            data_changed: Vec::new(),
            asset_changed: Vec::new(),
            config_changed: false,
            structural_change: false,
            event_kinds: Vec::new(),
            force: false,
            incremental: None,
            dry_run: false,
            explain: ExplainMode::Off,
            strict: false,
            parallel: None,
            drafts: false,
            output_override: None,
        }
    }
}

impl BuildInput {
    pub fn new(mode: BuildMode, config_hash: String) -> Self {
        Self {
            mode,
            config_hash,
            ..Self::default()
        }
    }

    /// Build an input from a classified watcher batch (dev loop).
    pub fn from_changes(mode: BuildMode, config_hash: String, changes: &ChangeSet) -> Self {
        Self {
            mode,
            config_hash,
            changed_sources: changes.content_changed.clone(),
            nav_changed: changes.nav_changed.clone(),
            template_changed: changes.template_changed.clone(),
            data_changed: changes.data_changed.clone(),
            asset_changed: changes.asset_changed.clone(),
            config_changed: changes.config_changed,
            structural_change: changes.section_structural,
            event_kinds: changes
                .classified
                .iter()
                .map(|(path, _, kind)| (path.clone(), *kind))
                .collect(),
            ..Self::default()
        }
    }

    /// Whether the watcher supplied any hints (vs a cold start).
    pub fn has_hints(&self) -> bool {
        !self.event_kinds.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_for_subprocess_builds() {
        let mut input = BuildInput::new(BuildMode::Development, "hash".into());
        input.changed_sources.push(PathBuf::from("/site/content/a.md"));
        input
            .event_kinds
            .push((PathBuf::from("/site/content/a.md"), ChangeKind::Modified));

        let json = serde_json::to_string(&input).unwrap();
        let back: BuildInput = serde_json::from_str(&json).unwrap();
        assert_eq!(back.mode, BuildMode::Development);
        assert_eq!(back.changed_sources.len(), 1);
        assert_eq!(back.event_kinds[0].1, ChangeKind::Modified);
    }

    #[test]
    fn default_has_no_hints() {
        assert!(!BuildInput::default().has_hints());
    }
}
