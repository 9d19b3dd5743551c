//! The build orchestrator: an ordered phase list from sources to outputs.
//!
//! Phase order is strict: initialization → discovery → section finalization
//! → taxonomies → menus → incremental filter → render → assets →
//! postprocess → finalize. Early failures are fatal and leave the last-good
//! cache untouched; render failures are collected per page; asset and
//! postprocess failures degrade to warnings.

pub mod context;
pub mod input;
pub mod output;
pub mod stats;

pub use input::{BuildInput, ExplainMode};
pub use stats::{BuildOutcome, BuildStats};

use std::sync::Arc;

use anyhow::Result;
use rayon::prelude::*;
use rustc_hash::FxHashSet;

use crate::asset::process::{AssetManifest, fingerprint_assets, process_assets};
use crate::asset::scan::scan_assets;
use crate::cache::{BuildCache, InvalidationReason};
use crate::config::SiteConfig;
use crate::content::cascade::apply_cascade;
use crate::content::discover::{discover, finalize_sections, sort_sections};
use crate::content::menu::build_menus;
use crate::content::refs::setup_references;
use crate::content::{Site, taxonomy};
use crate::core::{ErrorKind, PageError};
use crate::incremental::filter::{self, RebuildReason, compute_plan};
use crate::incremental::{RebuildManifest, fingerprint, manifest};
use crate::render::template::TemplateService;
use crate::render::xref::XrefIndex;
use crate::render::{PageOutput, RenderSetup, render_page};
use crate::utils::plural;

use context::BuildContext;
use stats::{LoggingObserver, PhaseObserver, PhaseTimer};

/// Run one build.
pub fn build(config: &Arc<SiteConfig>, input: &BuildInput) -> Result<BuildStats> {
    build_with_observer(config, input, &LoggingObserver)
}

/// Run one build with explicit phase callbacks.
#[allow(clippy::too_many_lines)]
pub fn build_with_observer(
    config: &Arc<SiteConfig>,
    input: &BuildInput,
    observer: &dyn PhaseObserver,
) -> Result<BuildStats> {
    let mut stats = BuildStats::default();

    // ------------------------------------------------------------------
    // Phase 1: initialization: load/validate cache, create context.
    // ------------------------------------------------------------------
    let timer = PhaseTimer::start("initialization", observer);
    fingerprint::evict(
        &input
            .event_kinds
            .iter()
            .map(|(path, _)| path.clone())
            .collect::<Vec<_>>(),
    );
    let (cache, cache_warning) = BuildCache::load(&config.cache_file());
    if let Some(warning) = cache_warning {
        crate::log!("cache"; "{warning}");
        stats.warnings.push(warning);
    }
    let ctx = BuildContext::new(config.clone(), cache);
    stats
        .phases
        .push(timer.finish(observer, 1, 0, stats.warnings.len()));

    // ------------------------------------------------------------------
    // Phase 2: discovery: content tree scan plus the asset directory.
    // ------------------------------------------------------------------
    let timer = PhaseTimer::start("discovery", observer);
    let mut effective_config = config.clone();
    if input.drafts {
        let mut overridden = (**config).clone();
        overridden.build.drafts = true;
        effective_config = Arc::new(overridden);
    }
    let (mut site, discovery_warnings) = discover(&effective_config, input.mode)?;
    for warning in &discovery_warnings {
        crate::log!("warn"; "{warning}");
    }
    stats.warnings.extend(discovery_warnings);
    site.assets.extend(scan_assets(&config.assets_dir()));
    let discovered = site.pages.len() + site.assets.len();
    stats
        .phases
        .push(timer.finish(observer, discovered, 0, stats.warnings.len()));

    // ------------------------------------------------------------------
    // Phase 3: section finalization: index pages, cascade, ordering, refs.
    // ------------------------------------------------------------------
    let timer = PhaseTimer::start("sections", observer);
    finalize_sections(&mut site);
    apply_cascade(&mut site);
    sort_sections(&mut site);
    setup_references(&mut site);
    stats
        .phases
        .push(timer.finish(observer, site.sections.len(), 0, 0));

    // ------------------------------------------------------------------
    // Phase 4: taxonomies and dynamic pages.
    // ------------------------------------------------------------------
    let timer = PhaseTimer::start("taxonomies", observer);
    taxonomy::collect_taxonomies(&mut site);
    taxonomy::generate_taxonomy_pages(&mut site);
    setup_references(&mut site);
    let term_count: usize = site.taxonomies.values().map(|t| t.len()).sum();
    stats.phases.push(timer.finish(observer, term_count, 0, 0));

    // ------------------------------------------------------------------
    // Phase 5: menus.
    // ------------------------------------------------------------------
    let timer = PhaseTimer::start("menus", observer);
    build_menus(&mut site);
    stats
        .phases
        .push(timer.finish(observer, site.menus.len(), 0, 0));

    // ------------------------------------------------------------------
    // Phase 6: incremental filter.
    // ------------------------------------------------------------------
    let timer = PhaseTimer::start("filter", observer);
    let plan = {
        let cache_guard = ctx.cache.read();
        compute_plan(&site, &cache_guard, &ctx.tracker, input, config)
    };

    // The coordinator is the sole invalidation gateway: clear the caches of
    // pages whose source or effective metadata changed.
    if plan.full {
        let reason = match plan.pages.first().map(|e| e.reason) {
            Some(RebuildReason::Forced) => InvalidationReason::Forced,
            Some(RebuildReason::ContentChanged) => InvalidationReason::ContentChanged,
            _ => InvalidationReason::FullRebuild,
        };
        ctx.coordinator.invalidate_all(reason);
    } else {
        for entry in &plan.pages {
            let reason = match entry.reason {
                RebuildReason::ContentChanged => Some(InvalidationReason::ContentChanged),
                RebuildReason::NavChanged => Some(InvalidationReason::NavChanged),
                RebuildReason::CascadeDependency => Some(InvalidationReason::TaxonomyCascade),
                _ => None,
            };
            if let Some(reason) = reason {
                ctx.coordinator
                    .invalidate_page(&entry.key, reason, entry.trigger.as_deref());
            }
        }
    }

    let mut manifest = RebuildManifest::from_plan(manifest::new_build_id(), &plan);
    manifest.invalidations = ctx.coordinator.summary();
    stats.pages_skipped = plan.skipped.len();
    stats
        .phases
        .push(timer.finish(observer, plan.pages.len(), 0, 0));

    match input.explain {
        ExplainMode::Off => {}
        ExplainMode::Table => crate::log!("explain"; "\n{}", manifest.render_table()),
        ExplainMode::Json => println!("{}", manifest.to_json()),
    }

    if input.dry_run {
        stats.manifest = manifest;
        return Ok(stats);
    }

    // Asset manifest must exist before rendering: `asset_url` resolves
    // through it.
    let asset_manifest = Arc::new(AssetManifest::new());
    fingerprint_assets(&mut site.assets, config, &asset_manifest);

    // ------------------------------------------------------------------
    // Phase 7: render.
    // ------------------------------------------------------------------
    let timer = PhaseTimer::start("render", observer);
    let xref = Arc::new(XrefIndex::from_site(&site));
    let mut templates = TemplateService::new(config);
    crate::render::context::register_functions(
        templates.env_mut(),
        asset_manifest.clone(),
        config.data_dir(),
        xref.clone(),
    );

    let parallel = input.parallel.unwrap_or(config.build.parallel);
    let selected = plan.page_ids(&site);
    let progress = crate::logger::PhaseProgress::start("render", selected.len());

    // Watcher-touched pages render first to minimize perceived dev latency.
    let changed_set: FxHashSet<_> = input.changed_sources.iter().cloned().collect();
    let (priority, rest): (Vec<_>, Vec<_>) = selected
        .into_iter()
        .partition(|(id, _)| changed_set.contains(&site.page(*id).source));

    let setup = RenderSetup {
        site: &site,
        config: config.as_ref(),
        templates: &templates,
        xref: xref.as_ref(),
        cache: ctx.cache.as_ref(),
        tracker: ctx.tracker.as_ref(),
        collector: &ctx.collector,
    };

    let mut results: Vec<Result<PageOutput, PageError>> = Vec::new();
    for batch in [priority, rest] {
        if crate::core::is_shutdown() {
            stats.cancelled = true;
            break;
        }
        let run = |&(id, _): &(crate::content::PageId, RebuildReason)| {
            let result = render_page(&setup, id);
            progress.advance();
            result
        };
        let batch_results: Vec<_> = if parallel {
            batch.par_iter().map(run).collect()
        } else {
            batch.iter().map(run).collect()
        };
        results.extend(batch_results);
    }
    ctx.tracker.flush();
    drop(setup);

    // Apply worker outputs single-threaded; pages never observe each
    // other's cache writes mid-phase.
    let mut rendered = 0usize;
    for result in results {
        match result {
            Ok(output) => {
                rendered += 1;
                manifest.record_duration(&output.key, output.duration_ms);
                for warning in &output.warnings {
                    crate::log!("warn"; "{}: {warning}", output.key);
                }
                stats
                    .warnings
                    .extend(output.warnings.iter().map(|w| format!("{}: {w}", output.key)));

                // Fill the page record: parsed body, TOC, outbound links.
                if let Some(id) = site.page_by_key(&output.key) {
                    let page = site.page_mut(id);
                    page.html = output.body_html;
                    page.toc = output.toc;
                    page.links = output.links;
                }

                let mut cache = ctx.cache.write();
                if let Some(parsed) = output.parsed {
                    cache.parsed_content.insert(output.key.clone(), parsed);
                }
                if let Some(fp) = output.fingerprint {
                    cache.file_fingerprints.insert(output.key.clone(), fp);
                }
                cache.rendered_output.insert(output.key, output.rendered);
            }
            Err(error) => {
                if error.kind == ErrorKind::OutputWrite {
                    // Disk-level failure is fatal; do not persist the cache.
                    anyhow::bail!(
                        crate::core::Diagnostic::new(ErrorKind::OutputWrite, error.message)
                            .with_phase("render")
                    );
                }
                crate::log!("error"; "{error}");
                stats.page_errors.push(error);
            }
        }
    }
    stats.pages_built = rendered;
    let render_stats = timer.finish(observer, rendered, stats.page_errors.len(), 0);
    stats.phases.push(render_stats);
    progress.finish();

    // ------------------------------------------------------------------
    // Phase 8: asset processing.
    // ------------------------------------------------------------------
    let timer = PhaseTimer::start("assets", observer);
    let progress = crate::logger::PhaseProgress::start("assets", plan.assets.len());
    let asset_errors = process_assets(&site.assets, &plan.assets, config, &ctx.collector);
    for _ in 0..plan.assets.len() {
        progress.advance();
    }
    stats.assets_processed = plan.assets.len().saturating_sub(asset_errors);
    if asset_errors > 0 {
        stats
            .warnings
            .push(format!("{asset_errors} asset(s) failed to process"));
    }
    stats
        .phases
        .push(timer.finish(observer, plan.assets.len(), asset_errors, 0));
    progress.finish();

    // ------------------------------------------------------------------
    // Phase 9: postprocess: sitemap, feed, xref, redirects.
    // ------------------------------------------------------------------
    let timer = PhaseTimer::start("postprocess", observer);
    let mut postprocess_warnings = 0usize;
    let tasks: [(&str, Box<dyn FnOnce() -> Result<()> + '_>); 4] = [
        ("sitemap", Box::new(|| crate::postprocess::sitemap::build_sitemap(&site, &ctx.collector))),
        ("feed", Box::new(|| crate::postprocess::feed::build_feed(&site, &ctx.collector))),
        (
            "xref",
            Box::new(|| {
                crate::postprocess::xref_export::export_xref(&site, xref.as_ref(), &ctx.collector)
            }),
        ),
        (
            "redirects",
            Box::new(|| {
                crate::postprocess::redirects::write_redirects(&site, &ctx.collector).map(|_| ())
            }),
        ),
    ];
    for (name, task) in tasks {
        if let Err(e) = task() {
            crate::log!("warn"; "{name} generation failed: {e}");
            stats.warnings.push(format!("{name} generation failed: {e}"));
            postprocess_warnings += 1;
        }
    }
    stats
        .phases
        .push(timer.finish(observer, 4, 0, postprocess_warnings));

    // ------------------------------------------------------------------
    // Phase 10: finalize: persist cache, snapshots, manifests.
    // ------------------------------------------------------------------
    let timer = PhaseTimer::start("finalize", observer);
    if !stats.cancelled {
        {
            let mut cache = ctx.cache.write();
            cache.config_hash = config.config_hash();
            cache.dependencies = ctx.tracker.to_maps().0;
            cache.taxonomy_snapshot = taxonomy::snapshot(&site);
            for asset in &site.assets {
                if let Some(hash) = asset.hash {
                    cache.asset_fingerprints.insert(asset.key.clone(), hash.to_hex());
                }
            }
            for (path, hash) in ctx.collector.snapshot() {
                cache.output_snapshot.insert(path, hash);
            }
            filter::record_tree_fingerprints(&mut cache, config);
            record_autodoc_sources(&mut cache, config);
        }
        std::fs::create_dir_all(config.cache_dir()).ok();
        if let Err(e) = ctx.cache.read().save(&config.cache_file()) {
            crate::log!("warn"; "cache save failed: {e}");
            stats.warnings.push(format!("cache save failed: {e}"));
        }
        if config.build.cache_templates {
            persist_template_digests(&templates, config);
        }
    } else {
        crate::log!("build"; "cancelled, cache not saved");
    }

    stats.outputs = ctx.collector.records();
    stats.output_snapshot = ctx.cache.read().output_snapshot.clone();
    stats.manifest = manifest;
    stats.phases.push(timer.finish(observer, 1, 0, 0));

    crate::log!("build"; "{} page{} built, {} skipped, {} asset{} in {}ms",
        stats.pages_built, plural::s(stats.pages_built),
        stats.pages_skipped,
        stats.assets_processed, plural::s(stats.assets_processed),
        stats.total_duration_ms());

    Ok(stats)
}

/// Digest the autodoc source tree so extractor re-runs are detectable.
fn record_autodoc_sources(cache: &mut BuildCache, config: &SiteConfig) {
    let dir = config.generated_dir();
    if !dir.is_dir() {
        return;
    }
    for entry in jwalk::WalkDir::new(&dir)
        .skip_hidden(true)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
    {
        let path = entry.path();
        if let Some(rel) = crate::utils::path::relative_key(&dir, &path) {
            let digest = fingerprint::cached_file_hash(&path);
            if !digest.is_empty() {
                cache.autodoc_sources.insert(rel, digest.to_hex());
            }
        }
    }
}

/// Persist template source digests for cross-process compiled-template
/// staleness checks.
fn persist_template_digests(templates: &TemplateService, config: &SiteConfig) {
    let mut digests = std::collections::BTreeMap::new();
    for (name, _) in filter::enumerate_templates(config) {
        digests.insert(name.clone(), templates.digest_of(&[name]));
    }
    let dir = config.compiled_templates_dir();
    if std::fs::create_dir_all(&dir).is_ok() {
        if let Ok(body) = serde_json::to_vec_pretty(&digests) {
            let _ = crate::utils::atomic::write_atomic(&dir.join("index.json"), &body);
        }
    }
}

// ============================================================================
// Tests: end-to-end build scenarios
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::BuildMode;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, body: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, body).unwrap();
    }

    fn site_config(root: &Path) -> Arc<SiteConfig> {
        let mut config = SiteConfig::default();
        config.root = root.to_path_buf();
        config.config_path = root.join("bengal.toml");
        config.site.title = "Scenario".to_string();
        Arc::new(config)
    }

    fn run_build(config: &Arc<SiteConfig>) -> BuildStats {
        let input = BuildInput::new(BuildMode::Production, config.config_hash());
        build(config, &input).unwrap()
    }

    fn trivial_site(root: &Path) {
        write(root, "content/index.md", "---\ntitle: Home\n---\nHello.");
        write(root, "content/about.md", "---\ntitle: About\n---\nAbout us.");
        write(
            root,
            "templates/page.html",
            "<h1>{{ page.title }}</h1>{{ content }}",
        );
    }

    #[test]
    fn scenario_1_cold_build_of_trivial_site() {
        let dir = TempDir::new().unwrap();
        trivial_site(dir.path());
        let config = site_config(dir.path());
        let stats = run_build(&config);

        let home = fs::read_to_string(dir.path().join("public/index.html")).unwrap();
        assert!(home.contains("<h1>Home</h1>"));
        assert!(home.contains("<p>Hello.</p>"));

        let about = fs::read_to_string(dir.path().join("public/about/index.html")).unwrap();
        assert!(about.contains("<h1>About</h1>"));
        assert!(about.contains("<p>About us.</p>"));

        // First build classifies all pages as content-changed.
        assert_eq!(stats.manifest.entries.len(), 2);
        assert!(stats
            .manifest
            .entries
            .iter()
            .all(|e| e.reason == "CONTENT_CHANGED"));
        assert_eq!(stats.outcome(), BuildOutcome::Success);
    }

    #[test]
    fn scenario_2_warm_rebuild_no_changes() {
        let dir = TempDir::new().unwrap();
        trivial_site(dir.path());
        let config = site_config(dir.path());

        let first = run_build(&config);
        assert_eq!(first.pages_built, 2);
        let home_before = fs::read(dir.path().join("public/index.html")).unwrap();

        let second = run_build(&config);
        assert_eq!(second.pages_built, 0);
        assert_eq!(second.manifest.entries.len(), 0);
        assert_eq!(second.pages_skipped, 2);

        let home_after = fs::read(dir.path().join("public/index.html")).unwrap();
        assert_eq!(home_before, home_after);
        assert_eq!(second.outcome(), BuildOutcome::Success);

        // Reload decision: nothing changed.
        let decision = crate::devloop::reload::decide(&second.outputs, &first.output_snapshot);
        assert_eq!(decision, crate::devloop::reload::ReloadAction::None);
    }

    #[test]
    fn warm_rebuild_after_edit_rebuilds_only_changed() {
        let dir = TempDir::new().unwrap();
        trivial_site(dir.path());
        let config = site_config(dir.path());
        run_build(&config);

        crate::incremental::fingerprint::clear_memo();
        write(dir.path(), "content/about.md", "---\ntitle: About\n---\nRewritten.");
        let stats = run_build(&config);

        let about_entry = stats
            .manifest
            .entries
            .iter()
            .find(|e| e.key == "about.md")
            .expect("about.md should be rebuilt");
        assert_eq!(about_entry.reason, "CONTENT_CHANGED");
        // The home page lists its siblings, so it may ride along via a
        // recorded page dependency, but only with about.md as the trigger.
        for entry in &stats.manifest.entries {
            if entry.key != "about.md" {
                assert_eq!(entry.trigger.as_deref(), Some("about.md"));
            }
        }

        let about = fs::read_to_string(dir.path().join("public/about/index.html")).unwrap();
        assert!(about.contains("Rewritten."));
    }

    #[test]
    fn scenario_4_asset_fingerprint_change_forces_page_rebuild() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "content/index.md", "---\ntitle: Home\n---\nHello.");
        write(
            dir.path(),
            "templates/page.html",
            "<html><head><link rel=\"stylesheet\" href=\"{{ asset_url('css/style.css') }}\"></head><body>{{ content }}</body></html>",
        );
        write(dir.path(), "assets/css/style.css", "body { color: red }");
        let config = site_config(dir.path());

        let first = run_build(&config);
        assert_eq!(first.pages_built, 1);
        let home = fs::read_to_string(dir.path().join("public/index.html")).unwrap();
        assert!(home.contains("/css/style."));
        let old_url_start = home.find("/css/style.").unwrap();
        let old_url = &home[old_url_start..home[old_url_start..].find('"').unwrap() + old_url_start];

        // Modify the stylesheet: the embedding page must rebuild with the
        // asset reason, and the HTML must reference the new fingerprint.
        crate::incremental::fingerprint::clear_memo();
        write(dir.path(), "assets/css/style.css", "body { color: blue }");
        let second = run_build(&config);

        let reasons: Vec<_> = second.manifest.entries.iter().map(|e| e.reason.as_str()).collect();
        assert!(reasons.contains(&"ASSET_FINGERPRINT_CHANGED"), "reasons: {reasons:?}");

        let home = fs::read_to_string(dir.path().join("public/index.html")).unwrap();
        let new_url_start = home.find("/css/style.").unwrap();
        let new_url = &home[new_url_start..home[new_url_start..].find('"').unwrap() + new_url_start];
        assert_ne!(old_url, new_url);

        // HTML changed, so the reload decision is a full reload.
        let decision = crate::devloop::reload::decide(&second.outputs, &first.output_snapshot);
        assert_eq!(decision, crate::devloop::reload::ReloadAction::Reload);
    }

    #[test]
    fn scenario_5_broken_cross_reference() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "content/index.md",
            "---\ntitle: Home\n---\nSee [[NonExistentPage]].",
        );
        write(dir.path(), "templates/page.html", "{{ content }}");
        let config = site_config(dir.path());

        let stats = run_build(&config);
        assert_eq!(stats.outcome(), BuildOutcome::SuccessWithWarnings);
        assert!(stats.warnings.iter().any(|w| w.contains("NonExistentPage")));

        let home = fs::read_to_string(dir.path().join("public/index.html")).unwrap();
        assert!(home.contains("<span class=\"broken-ref\">[NonExistentPage]</span>"));
    }

    #[test]
    fn scenario_6_escape_syntax_roundtrip() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "content/index.md",
            "---\ntitle: Home\n---\nWrite {! {{ page.title }} !} to show the *title*.",
        );
        write(dir.path(), "templates/page.html", "{{ content }}");
        let config = site_config(dir.path());
        run_build(&config);

        let home = fs::read_to_string(dir.path().join("public/index.html")).unwrap();
        // Literal expression preserved, delimiters gone, emphasis intact.
        assert!(home.contains("{{ page.title }}"));
        assert!(!home.contains("{!"));
        assert!(!home.contains("!}"));
        assert!(home.contains("<em>title</em>"));
    }

    #[test]
    fn output_missing_detected_on_warm_cache() {
        let dir = TempDir::new().unwrap();
        trivial_site(dir.path());
        let config = site_config(dir.path());
        run_build(&config);

        fs::remove_file(dir.path().join("public/about/index.html")).unwrap();
        let stats = run_build(&config);

        let entry = stats
            .manifest
            .entries
            .iter()
            .find(|e| e.key == "about.md")
            .expect("about.md should be rebuilt");
        assert_eq!(entry.reason, "OUTPUT_MISSING");
        assert!(dir.path().join("public/about/index.html").is_file());
    }

    #[test]
    fn deleted_cache_rebuild_produces_identical_output() {
        let dir = TempDir::new().unwrap();
        trivial_site(dir.path());
        let config = site_config(dir.path());
        run_build(&config);
        let before = fs::read(dir.path().join("public/index.html")).unwrap();

        fs::remove_file(config.cache_file()).unwrap();
        crate::incremental::fingerprint::clear_memo();
        let stats = run_build(&config);
        assert_eq!(stats.pages_built, 2); // full build again

        let after = fs::read(dir.path().join("public/index.html")).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn dry_run_skips_rendering_but_emits_plan() {
        let dir = TempDir::new().unwrap();
        trivial_site(dir.path());
        let config = site_config(dir.path());

        let mut input = BuildInput::new(BuildMode::Production, config.config_hash());
        input.dry_run = true;
        let stats = build(&config, &input).unwrap();

        assert_eq!(stats.manifest.entries.len(), 2);
        assert!(!dir.path().join("public/index.html").exists());
        assert!(!config.cache_file().exists());
    }

    #[test]
    fn strict_template_error_collected_per_page() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "content/good.md", "---\ntitle: Good\n---\nok");
        write(
            dir.path(),
            "content/bad.md",
            "---\ntitle: Bad\ntemplate: broken.html\n---\nx",
        );
        write(dir.path(), "templates/page.html", "{{ content }}");
        write(dir.path(), "templates/broken.html", "{{ undefined_fn() }}");
        let config = site_config(dir.path());

        let stats = run_build(&config);
        assert_eq!(stats.page_errors.len(), 1);
        assert_eq!(stats.page_errors[0].key, "bad.md");
        assert_eq!(stats.outcome(), BuildOutcome::Failure);
        // The healthy page still rendered.
        assert!(dir.path().join("public/good/index.html").is_file());
    }

    #[test]
    fn template_edit_triggers_dependent_rebuilds() {
        let dir = TempDir::new().unwrap();
        trivial_site(dir.path());
        let config = site_config(dir.path());
        run_build(&config);

        crate::incremental::fingerprint::clear_memo();
        write(
            dir.path(),
            "templates/page.html",
            "<h2>{{ page.title }}</h2>{{ content }}",
        );
        let stats = run_build(&config);

        assert_eq!(stats.manifest.entries.len(), 2);
        assert!(stats
            .manifest
            .entries
            .iter()
            .all(|e| e.reason == "TEMPLATE_CHANGED"));
        let home = fs::read_to_string(dir.path().join("public/index.html")).unwrap();
        assert!(home.contains("<h2>Home</h2>"));
    }

    #[test]
    fn sequential_and_parallel_builds_agree() {
        let dir_a = TempDir::new().unwrap();
        let dir_b = TempDir::new().unwrap();
        for root in [dir_a.path(), dir_b.path()] {
            for i in 0..12 {
                write(
                    root,
                    &format!("content/p{i}.md"),
                    &format!("---\ntitle: P{i}\n---\nBody {i}."),
                );
            }
            write(root, "templates/page.html", "<h1>{{ page.title }}</h1>{{ content }}");
        }

        let config_a = site_config(dir_a.path());
        let mut input_a = BuildInput::new(BuildMode::Production, config_a.config_hash());
        input_a.parallel = Some(true);
        build(&config_a, &input_a).unwrap();

        let config_b = site_config(dir_b.path());
        let mut input_b = BuildInput::new(BuildMode::Production, config_b.config_hash());
        input_b.parallel = Some(false);
        build(&config_b, &input_b).unwrap();

        for i in 0..12 {
            let a = fs::read(dir_a.path().join(format!("public/p{i}/index.html"))).unwrap();
            let b = fs::read(dir_b.path().join(format!("public/p{i}/index.html"))).unwrap();
            assert_eq!(a, b, "page p{i} differs between parallel and sequential");
        }
    }

    #[test]
    fn single_page_site_builds() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "content/index.md", "---\ntitle: Solo\n---\nOnly.");
        write(dir.path(), "templates/page.html", "{{ content }}");
        let config = site_config(dir.path());
        let stats = run_build(&config);
        assert_eq!(stats.pages_built, 1);
        assert!(dir.path().join("public/index.html").is_file());
        assert!(dir.path().join("public/sitemap.xml").is_file());
        assert!(dir.path().join("public/feed.xml").is_file());
    }
}
