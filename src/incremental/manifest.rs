//! The rebuild manifest: what was rebuilt, why, and what was skipped.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::filter::{BuildPlan, RebuildReason};

/// One per-page rebuild record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RebuildEntry {
    pub key: String,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trigger: Option<String>,
    pub duration_ms: u64,
}

/// Captured per build; exported as JSON in explain mode.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RebuildManifest {
    pub build_id: String,
    pub incremental: bool,
    pub entries: Vec<RebuildEntry>,
    pub skipped: Vec<String>,
    /// Invalidation events grouped by reason.
    pub invalidations: BTreeMap<String, usize>,
    /// Changed assets: (key, old fingerprint, new fingerprint).
    pub asset_changes: Vec<(String, Option<String>, String)>,
}

impl RebuildManifest {
    pub fn from_plan(build_id: String, plan: &BuildPlan) -> Self {
        Self {
            build_id,
            incremental: !plan.full,
            entries: plan
                .pages
                .iter()
                .map(|entry| RebuildEntry {
                    key: entry.key.clone(),
                    reason: entry.reason.label().to_string(),
                    trigger: entry.trigger.clone(),
                    duration_ms: 0,
                })
                .collect(),
            skipped: plan.skipped.clone(),
            invalidations: BTreeMap::new(),
            asset_changes: plan.asset_changes.clone(),
        }
    }

    pub fn record_duration(&mut self, key: &str, duration_ms: u64) {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.key == key) {
            entry.duration_ms = duration_ms;
        }
    }

    /// Reason → count, for the explain table.
    pub fn reason_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for entry in &self.entries {
            *counts.entry(entry.reason.clone()).or_insert(0) += 1;
        }
        counts
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }

    /// Human-readable explain table: reason → count → sample pages, asset
    /// fingerprint changes, and the skipped count.
    pub fn render_table(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "build {} ({})\n",
            self.build_id,
            if self.incremental { "incremental" } else { "full" }
        ));

        for (reason, count) in self.reason_counts() {
            let samples: Vec<&str> = self
                .entries
                .iter()
                .filter(|e| e.reason == reason)
                .take(3)
                .map(|e| e.key.as_str())
                .collect();
            out.push_str(&format!("  {reason:<28} {count:>5}  {}\n", samples.join(", ")));
        }

        for (key, old, new) in &self.asset_changes {
            let old = old.as_deref().map(|h| &h[..h.len().min(8)]).unwrap_or("none");
            out.push_str(&format!("  asset {key}: {old} -> {}\n", &new[..new.len().min(8)]));
        }

        out.push_str(&format!("  skipped: {} page(s)\n", self.skipped.len()));
        out
    }
}

/// Deterministic-enough build id: epoch nanos + pid, hex.
pub fn new_build_id() -> String {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    format!("{nanos:x}-{}", std::process::id())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::incremental::filter::PlanEntry;

    fn sample_plan() -> BuildPlan {
        BuildPlan {
            full: false,
            pages: vec![
                PlanEntry {
                    key: "a.md".into(),
                    reason: RebuildReason::ContentChanged,
                    trigger: None,
                },
                PlanEntry {
                    key: "b.md".into(),
                    reason: RebuildReason::TemplateChanged,
                    trigger: Some("page.html".into()),
                },
                PlanEntry {
                    key: "c.md".into(),
                    reason: RebuildReason::ContentChanged,
                    trigger: None,
                },
            ],
            assets: vec![],
            skipped: vec!["d.md".into()],
            asset_changes: vec![("css/style.css".into(), None, "abcdef1234567890".into())],
        }
    }

    #[test]
    fn manifest_from_plan() {
        let manifest = RebuildManifest::from_plan("test-1".into(), &sample_plan());
        assert!(manifest.incremental);
        assert_eq!(manifest.entries.len(), 3);
        assert_eq!(manifest.skipped.len(), 1);

        let counts = manifest.reason_counts();
        assert_eq!(counts.get("CONTENT_CHANGED"), Some(&2));
        assert_eq!(counts.get("TEMPLATE_CHANGED"), Some(&1));
    }

    #[test]
    fn duration_recorded() {
        let mut manifest = RebuildManifest::from_plan("test-2".into(), &sample_plan());
        manifest.record_duration("a.md", 42);
        assert_eq!(manifest.entries[0].duration_ms, 42);
    }

    #[test]
    fn json_roundtrip() {
        let manifest = RebuildManifest::from_plan("test-3".into(), &sample_plan());
        let json = manifest.to_json();
        let back: RebuildManifest = serde_json::from_str(&json).unwrap();
        assert_eq!(back.entries.len(), 3);
        assert_eq!(back.build_id, "test-3");
    }

    #[test]
    fn table_lists_reasons_and_skips() {
        let manifest = RebuildManifest::from_plan("test-4".into(), &sample_plan());
        let table = manifest.render_table();
        assert!(table.contains("CONTENT_CHANGED"));
        assert!(table.contains("a.md, c.md"));
        assert!(table.contains("skipped: 1 page(s)"));
        assert!(table.contains("asset css/style.css: none -> abcdef12"));
    }
}
