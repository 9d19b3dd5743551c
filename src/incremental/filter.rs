//! The provenance filter: decide exactly which pages and assets need
//! rebuilding, and why.
//!
//! Starting set = changed/nav-changed content paths (from the watcher, or a
//! cold-start fingerprint diff). The set is expanded by walking the reverse
//! dependency graph for templates, data files, and fingerprinted assets,
//! plus cascade, taxonomy, cross-version and adjacent-navigation effects.

use std::path::{Path, PathBuf};

use jwalk::WalkDir;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use super::fingerprint::{self, Fingerprint};
use super::graph::{DepKind, DependencyTracker};
use crate::build::input::BuildInput;
use crate::cache::BuildCache;
use crate::config::SiteConfig;
use crate::content::meta::{meta_digest, nav_digest};
use crate::content::taxonomy;
use crate::content::{PageId, Site};
use crate::utils::path::relative_key;

/// Why a page is included in the build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RebuildReason {
    ContentChanged,
    TemplateChanged,
    AssetFingerprintChanged,
    DataFileChanged,
    CascadeDependency,
    NavChanged,
    CrossVersionDependency,
    AdjacentNavChanged,
    Forced,
    OutputMissing,
    FullRebuild,
}

impl RebuildReason {
    pub const fn label(self) -> &'static str {
        match self {
            Self::ContentChanged => "CONTENT_CHANGED",
            Self::TemplateChanged => "TEMPLATE_CHANGED",
            Self::AssetFingerprintChanged => "ASSET_FINGERPRINT_CHANGED",
            Self::DataFileChanged => "DATA_FILE_CHANGED",
            Self::CascadeDependency => "CASCADE_DEPENDENCY",
            Self::NavChanged => "NAV_CHANGED",
            Self::CrossVersionDependency => "CROSS_VERSION_DEPENDENCY",
            Self::AdjacentNavChanged => "ADJACENT_NAV_CHANGED",
            Self::Forced => "FORCED",
            Self::OutputMissing => "OUTPUT_MISSING",
            Self::FullRebuild => "FULL_REBUILD",
        }
    }
}

/// One planned page rebuild.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanEntry {
    pub key: String,
    pub reason: RebuildReason,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trigger: Option<String>,
}

/// Output of the incremental filter.
#[derive(Debug, Default)]
pub struct BuildPlan {
    /// Full (non-incremental) build.
    pub full: bool,
    /// Pages to render, direct changes first (render priority).
    pub pages: Vec<PlanEntry>,
    /// Indices into `site.assets` to process.
    pub assets: Vec<usize>,
    /// Page keys skipped as unchanged.
    pub skipped: Vec<String>,
    /// Changed assets with old/new fingerprints, for explain output.
    pub asset_changes: Vec<(String, Option<String>, String)>,
}

impl BuildPlan {
    pub fn page_ids(&self, site: &Site) -> Vec<(PageId, RebuildReason)> {
        self.pages
            .iter()
            .filter_map(|entry| site.page_by_key(&entry.key).map(|id| (id, entry.reason)))
            .collect()
    }
}

/// Accumulates plan entries, first reason wins per page.
#[derive(Default)]
struct PlanBuilder {
    entries: Vec<PlanEntry>,
    seen: FxHashSet<String>,
}

impl PlanBuilder {
    fn add(&mut self, key: &str, reason: RebuildReason, trigger: Option<String>) {
        if self.seen.insert(key.to_string()) {
            self.entries.push(PlanEntry {
                key: key.to_string(),
                reason,
                trigger,
            });
        }
    }

    fn contains(&self, key: &str) -> bool {
        self.seen.contains(key)
    }
}

/// Compute the build plan.
pub fn compute_plan(
    site: &Site,
    cache: &BuildCache,
    tracker: &DependencyTracker,
    input: &BuildInput,
    config: &SiteConfig,
) -> BuildPlan {
    let incremental_enabled = match input.incremental {
        Some(flag) => flag,
        None => match config.build.incremental {
            crate::config::IncrementalMode::Never => false,
            crate::config::IncrementalMode::Always | crate::config::IncrementalMode::Auto => true,
        },
    };

    // Full-build short circuits.
    if input.force {
        return full_plan(site, RebuildReason::Forced);
    }
    if cache.is_empty() {
        // Cold start: every page is classified as content-changed.
        return full_plan(site, RebuildReason::ContentChanged);
    }
    if !incremental_enabled
        || input.config_changed
        || cache.config_hash != input.config_hash
    {
        return full_plan(site, RebuildReason::FullRebuild);
    }
    if input.structural_change || section_structure_changed(site, input) {
        return full_plan(site, RebuildReason::FullRebuild);
    }

    incremental_plan(site, cache, tracker, input, config)
}

fn full_plan(site: &Site, reason: RebuildReason) -> BuildPlan {
    let mut plan = BuildPlan {
        full: true,
        ..BuildPlan::default()
    };
    for id in site.page_ids() {
        plan.pages.push(PlanEntry {
            key: site.page(id).key.as_str().to_string(),
            reason,
            trigger: None,
        });
    }
    plan.assets = (0..site.assets.len()).collect();
    plan
}

/// Watcher can miss section changes made while the server was down: a create
/// or delete of `_index.*` shows up as a key set difference.
fn section_structure_changed(site: &Site, input: &BuildInput) -> bool {
    input
        .event_kinds
        .iter()
        .any(|(path, kind)| kind.is_structural() && is_index_path(path))
}

fn is_index_path(path: &Path) -> bool {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(|stem| stem == "_index")
        .unwrap_or(false)
}

#[allow(clippy::too_many_lines)]
fn incremental_plan(
    site: &Site,
    cache: &BuildCache,
    tracker: &DependencyTracker,
    input: &BuildInput,
    config: &SiteConfig,
) -> BuildPlan {
    let mut plan = PlanBuilder::default();
    let mut asset_indices: Vec<usize> = Vec::new();
    let mut asset_changes = Vec::new();

    // ------------------------------------------------------------------
    // 1. Direct content changes (fingerprint diff; watcher hints only
    //    affect ordering). Nav and cascade effects detected via digests.
    // ------------------------------------------------------------------
    let watcher_set: FxHashSet<PathBuf> = input.changed_sources.iter().cloned().collect();
    let mut direct: Vec<(PageId, RebuildReason)> = Vec::new();

    for id in site.page_ids() {
        let page = site.page(id);
        if page.generated {
            continue;
        }
        let key = page.key.as_str();
        let cached_fp = cache.file_fingerprints.get(key);
        if !fingerprint::is_changed(&page.source, cached_fp) {
            continue;
        }

        let nav = cache
            .parsed_content
            .get(key)
            .map(|entry| nav_digest(&page.meta).to_hex() != entry.nav_digest)
            .unwrap_or(true);
        let reason = if nav {
            RebuildReason::NavChanged
        } else {
            RebuildReason::ContentChanged
        };
        direct.push((id, reason));
    }

    // Watcher-changed pages first: render priority in dev mode.
    direct.sort_by_key(|(id, _)| {
        let page = site.page(*id);
        (!watcher_set.contains(&page.source), page.key.clone())
    });
    for (id, reason) in &direct {
        let page = site.page(*id);
        plan.add(page.key.as_str(), *reason, None);
    }

    // ------------------------------------------------------------------
    // 2. Cascade effects: changed index pages whose cascade map differs
    //    pull in every descendant page.
    // ------------------------------------------------------------------
    for (id, _) in &direct {
        let page = site.page(*id);
        let key = page.key.as_str();
        if !page.is_index_source() {
            continue;
        }
        let new_cascade = page
            .cascade()
            .map(|c| meta_digest(c).to_hex())
            .unwrap_or_default();
        let old_cascade = cache
            .parsed_content
            .get(key)
            .map(|entry| entry.cascade_digest.clone())
            .unwrap_or_default();
        if new_cascade == old_cascade {
            continue;
        }
        if let Some(section_id) = page.section {
            for descendant in site.regular_pages_recursive(section_id) {
                plan.add(
                    site.page(descendant).key.as_str(),
                    RebuildReason::CascadeDependency,
                    Some(key.to_string()),
                );
            }
        }
    }

    // ------------------------------------------------------------------
    // 3. Adjacent navigation: neighbors of nav-changed pages re-render
    //    the titles they embed.
    // ------------------------------------------------------------------
    for (id, reason) in &direct {
        if *reason != RebuildReason::NavChanged {
            continue;
        }
        let page = site.page(*id);
        let trigger = page.key.as_str().to_string();
        let neighbors = [
            page.prev,
            page.next,
            page.prev_in_section,
            page.next_in_section,
            page.section.and_then(|sid| site.section(sid).index_page),
        ];
        for neighbor in neighbors.into_iter().flatten() {
            plan.add(
                site.page(neighbor).key.as_str(),
                RebuildReason::AdjacentNavChanged,
                Some(trigger.clone()),
            );
        }
    }

    // ------------------------------------------------------------------
    // 4. Pages that read the changed page (listings, summaries) and
    //    cross-version siblings, via recorded dependency edges.
    // ------------------------------------------------------------------
    for (id, _) in &direct {
        let key = site.page(*id).key.as_str().to_string();
        for dependent in tracker.dependents_of(DepKind::Page, &key) {
            plan.add(&dependent, RebuildReason::ContentChanged, Some(key.clone()));
        }
        for dependent in tracker.dependents_of(DepKind::CrossVersion, &key) {
            plan.add(
                &dependent,
                RebuildReason::CrossVersionDependency,
                Some(key.clone()),
            );
        }
    }

    // ------------------------------------------------------------------
    // 5. Templates: fingerprint diff over the template tree, expansion
    //    through the reverse dependency graph.
    // ------------------------------------------------------------------
    for (name, path) in enumerate_templates(config) {
        let cache_key = format!("template:{name}");
        if !fingerprint::is_changed(&path, cache.file_fingerprints.get(&cache_key)) {
            continue;
        }
        for dependent in tracker.dependents_of(DepKind::Template, &name) {
            plan.add(
                &dependent,
                RebuildReason::TemplateChanged,
                Some(name.clone()),
            );
        }
    }

    // ------------------------------------------------------------------
    // 6. Data files: hash diff, expansion through the reverse graph.
    // ------------------------------------------------------------------
    for (rel, path) in enumerate_data_files(config) {
        let current = fingerprint::cached_file_hash(&path).to_hex();
        if cache.data_fingerprints.get(&rel).map(String::as_str) == Some(current.as_str()) {
            continue;
        }
        for dependent in tracker.dependents_of(DepKind::DataFile, &rel) {
            plan.add(
                &dependent,
                RebuildReason::DataFileChanged,
                Some(rel.clone()),
            );
        }
    }

    // ------------------------------------------------------------------
    // 7. Assets: hash diff; fingerprinted assets pull in embedding pages.
    // ------------------------------------------------------------------
    for (idx, asset) in site.assets.iter().enumerate() {
        let current = fingerprint::cached_file_hash(&asset.source).to_hex();
        let cached = cache.asset_fingerprints.get(&asset.key).cloned();
        let output_exists = asset_output_exists(cache, config, &asset.key);
        if cached.as_deref() == Some(current.as_str()) && output_exists {
            continue;
        }
        asset_indices.push(idx);
        if cached.as_deref() != Some(current.as_str()) {
            asset_changes.push((asset.key.clone(), cached.clone(), current.clone()));
            if config.assets.fingerprint {
                for dependent in tracker.dependents_of(DepKind::Asset, &asset.key) {
                    plan.add(
                        &dependent,
                        RebuildReason::AssetFingerprintChanged,
                        Some(asset.key.clone()),
                    );
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // 8. Taxonomy membership changes invalidate term pages.
    // ------------------------------------------------------------------
    for term_key in taxonomy::changed_terms(site, &cache.taxonomy_snapshot) {
        if site.page_by_key(&term_key).is_some() {
            plan.add(&term_key, RebuildReason::CascadeDependency, None);
        }
    }

    // ------------------------------------------------------------------
    // 9. Everything else: rendered-cache misses and missing outputs.
    // ------------------------------------------------------------------
    let output_dir = config.output_dir();
    let mut skipped = Vec::new();
    for id in site.page_ids() {
        let page = site.page(id);
        let key = page.key.as_str();
        if plan.contains(key) {
            continue;
        }
        if !cache.rendered_output.contains_key(key) {
            plan.add(key, RebuildReason::ContentChanged, None);
            continue;
        }
        if !output_dir.join(&page.output_rel).is_file() {
            plan.add(key, RebuildReason::OutputMissing, None);
            continue;
        }
        skipped.push(key.to_string());
    }

    BuildPlan {
        full: false,
        pages: plan.entries,
        assets: asset_indices,
        skipped,
        asset_changes,
    }
}

fn asset_output_exists(cache: &BuildCache, config: &SiteConfig, asset_key: &str) -> bool {
    // The previous output snapshot records the fingerprinted path; absence
    // of any record for this asset means it must be (re)written.
    cache
        .output_snapshot
        .keys()
        .any(|path| path_matches_asset(path, asset_key))
        && {
            let written = cache
                .output_snapshot
                .keys()
                .find(|path| path_matches_asset(path, asset_key))
                .cloned();
            written
                .map(|rel| config.output_dir().join(rel).is_file())
                .unwrap_or(false)
        }
}

/// Whether an output path corresponds to an asset key, fingerprint inserted
/// or not (`css/style.css` matches `css/style.3f2a1b4c.css`).
fn path_matches_asset(output_path: &str, asset_key: &str) -> bool {
    if output_path == asset_key {
        return true;
    }
    let (Some(out_dot), Some(key_dot)) = (output_path.rfind('.'), asset_key.rfind('.')) else {
        return output_path.starts_with(&format!("{asset_key}."));
    };
    let (key_stem, key_ext) = asset_key.split_at(key_dot);
    let out_ext = &output_path[out_dot..];
    out_ext == key_ext
        && output_path.starts_with(&format!("{key_stem}."))
        && output_path.len() > asset_key.len()
}

/// Template-dir-relative names of every template (project overrides theme).
pub fn enumerate_templates(config: &SiteConfig) -> Vec<(String, PathBuf)> {
    let mut out: FxHashMap<String, PathBuf> = FxHashMap::default();

    // Theme first so project templates shadow them.
    if let Some(theme_dir) = config.theme_templates_dir() {
        collect_templates(&theme_dir, &mut out);
    }
    collect_templates(&config.templates_dir(), &mut out);

    let mut list: Vec<_> = out.into_iter().collect();
    list.sort();
    list
}

fn collect_templates(dir: &Path, out: &mut FxHashMap<String, PathBuf>) {
    if !dir.is_dir() {
        return;
    }
    for entry in WalkDir::new(dir)
        .skip_hidden(true)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
    {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("html") {
            continue;
        }
        if let Some(rel) = relative_key(dir, &path) {
            out.insert(rel, path);
        }
    }
}

/// Data-dir-relative paths of every data file.
pub fn enumerate_data_files(config: &SiteConfig) -> Vec<(String, PathBuf)> {
    let dir = config.data_dir();
    if !dir.is_dir() {
        return Vec::new();
    }
    let mut out: Vec<_> = WalkDir::new(&dir)
        .skip_hidden(true)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter_map(|entry| {
            let path = entry.path();
            relative_key(&dir, &path).map(|rel| (rel, path))
        })
        .collect();
    out.sort();
    out
}

/// Record current template/data fingerprints into the cache (called at
/// finalize so the next build diffs against this one).
pub fn record_tree_fingerprints(cache: &mut BuildCache, config: &SiteConfig) {
    for (name, path) in enumerate_templates(config) {
        if let Some(fp) = Fingerprint::compute(&path) {
            cache.file_fingerprints.insert(format!("template:{name}"), fp);
        }
    }
    for (rel, path) in enumerate_data_files(config) {
        let digest = fingerprint::cached_file_hash(&path);
        if !digest.is_empty() {
            cache.data_fingerprints.insert(rel, digest.to_hex());
        }
    }
}
