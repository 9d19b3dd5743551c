//! Content discovery: walk the content tree into pages, sections, assets.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use jwalk::WalkDir;

use super::meta::parse_frontmatter;
use super::page::{Page, PageKind, SourceKey, page_order_key};
use super::site::Site;
use crate::asset::Asset;
use crate::config::SiteConfig;
use crate::core::{BuildMode, Diagnostic, ErrorKind};
use crate::utils::path::relative_key;

/// Content file extensions admitted as pages.
const CONTENT_EXTENSIONS: &[&str] = &["md", "html"];

/// Walk the configured content directories and produce the site skeleton:
/// pages, sections, and in-tree assets. Returns discovery warnings
/// (malformed frontmatter is recoverable).
pub fn discover(config: &Arc<SiteConfig>, mode: BuildMode) -> Result<(Site, Vec<String>)> {
    let mut site = Site::new(config.clone());
    let mut warnings = Vec::new();

    let content_dir = config.content_dir();
    if !content_dir.is_dir() {
        anyhow::bail!(
            Diagnostic::new(
                ErrorKind::Discovery,
                format!("content directory {} does not exist", content_dir.display()),
            )
            .with_hint("create it or set content.dir in bengal.toml")
        );
    }

    let mut entries: Vec<_> = WalkDir::new(&content_dir)
        .skip_hidden(true)
        .sort(true)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| e.path())
        .collect();
    entries.sort();

    for path in entries {
        let Some(rel) = relative_key(&content_dir, &path) else {
            continue;
        };
        if is_content_file(&path) {
            admit_page(&mut site, config, mode, &path, &rel, false, &mut warnings)?;
        } else {
            // Non-content files under content/ are copied through as assets.
            site.assets.push(Asset::new(path, rel));
        }
    }

    // Autodoc output is discovered as generated pages.
    let generated_dir = config.generated_dir();
    if generated_dir.is_dir() {
        let mut generated: Vec<_> = WalkDir::new(&generated_dir)
            .skip_hidden(true)
            .sort(true)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
            .map(|e| e.path())
            .filter(|p| is_content_file(p))
            .collect();
        generated.sort();
        for path in generated {
            let Some(rel) = relative_key(&generated_dir, &path) else {
                continue;
            };
            admit_page(&mut site, config, mode, &path, &rel, true, &mut warnings)?;
        }
    }

    Ok((site, warnings))
}

fn is_content_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| CONTENT_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

#[allow(clippy::too_many_arguments)]
fn admit_page(
    site: &mut Site,
    config: &Arc<SiteConfig>,
    mode: BuildMode,
    path: &Path,
    rel: &str,
    autodoc: bool,
    warnings: &mut Vec<String>,
) -> Result<()> {
    let source = std::fs::read_to_string(path).with_context(|| {
        Diagnostic::new(
            ErrorKind::Discovery,
            format!("cannot read content file {}", path.display()),
        )
    })?;

    let fm = parse_frontmatter(&source);
    if let Some(problem) = &fm.malformed {
        warnings.push(format!("{rel}: malformed frontmatter ({problem}), metadata ignored"));
    }

    let key = if autodoc {
        SourceKey::virtual_key(&format!("autodoc/{rel}"))
    } else {
        SourceKey::from_rel(rel)
    };

    let mut page = Page::new(key, path.to_path_buf(), fm.meta, fm.body);
    page.malformed_meta = fm.malformed.is_some();
    page.autodoc = autodoc;
    page.generated = autodoc;
    page.version = config.versioning.version_of(rel).map(str::to_string);

    // Drafts are skipped outside dev mode unless explicitly included.
    if page.draft() && !config.build.drafts && !mode.is_dev() {
        crate::debug!("discover"; "skipping draft {}", page.key);
        return Ok(());
    }

    let dir_key = match rel.rfind('/') {
        Some(pos) => rel[..pos].to_string(),
        None => String::new(),
    };
    let section_id = site.ensure_section(&dir_key);
    page.section = Some(section_id);

    let is_index = page.is_index_source();
    let page_id = site.add_page(page);

    let section = site.section_mut(section_id);
    if is_index {
        if section.index_page.is_some() {
            warnings.push(format!("{rel}: section {dir_key:?} already has an index page"));
        }
        section.index_page = Some(page_id);
    } else {
        section.pages.push(page_id);
    }
    Ok(())
}

// ============================================================================
// Section finalization
// ============================================================================

/// Ensure every section has an index page (auto-generating archive indexes),
/// order page lists, and compute page kinds.
pub fn finalize_sections(site: &mut Site) {
    // Auto-generate missing index pages, root first so the home page exists.
    let mut missing: Vec<_> = site
        .section_ids()
        .filter(|id| site.section(*id).index_page.is_none())
        .collect();
    missing.sort();

    for section_id in missing {
        let section_key = site.section(section_id).key.clone();
        let title = site.section(section_id).default_title();

        let virtual_rel = if section_key.is_empty() {
            "_index.md".to_string()
        } else {
            format!("{section_key}/_index.md")
        };
        let mut meta = super::meta::MetaMap::new();
        meta.insert("title".into(), super::meta::MetaValue::Str(title));
        let mut page = Page::new(
            SourceKey::virtual_key(&virtual_rel),
            std::path::PathBuf::new(),
            meta,
            String::new(),
        );
        page.generated = true;
        page.section = Some(section_id);

        let page_id = site.add_page(page);
        site.section_mut(section_id).index_page = Some(page_id);
    }

    // Pull each section's cascade from its index page.
    for section_id in site.section_ids().collect::<Vec<_>>() {
        let cascade = site
            .section(section_id)
            .index_page
            .and_then(|pid| site.page(pid).cascade().cloned())
            .unwrap_or_default();
        site.section_mut(section_id).cascade = cascade;
    }

    sort_sections(site);

    // Compute page kinds from position.
    let root = site.root_section;
    for page_id in site.page_ids().collect::<Vec<_>>() {
        let kind = {
            let page = site.page(page_id);
            let section = page.section.unwrap_or(root);
            let is_index = site.section(section).index_page == Some(page_id);
            match (is_index, section == root) {
                (true, true) => PageKind::Home,
                (true, false) => PageKind::Section,
                _ => PageKind::Page,
            }
        };
        site.page_mut(page_id).kind = kind;
    }

    site.invalidate_page_caches();
}

/// Order regular pages within each section: (weight, date desc, title, key).
///
/// Re-run after cascade application, which can introduce weights/dates.
pub fn sort_sections(site: &mut Site) {
    for section_id in site.section_ids().collect::<Vec<_>>() {
        let mut pages = std::mem::take(&mut site.section_mut(section_id).pages);
        pages.sort_by_key(|&pid| page_order_key(site.page(pid)));
        site.section_mut(section_id).pages = pages;

        let mut children = std::mem::take(&mut site.section_mut(section_id).children);
        children.sort_by(|a, b| site.section(*a).key.cmp(&site.section(*b).key));
        site.section_mut(section_id).children = children;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn site_with(files: &[(&str, &str)]) -> (Site, Vec<String>, TempDir) {
        let dir = TempDir::new().unwrap();
        for (rel, body) in files {
            let path = dir.path().join("content").join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, body).unwrap();
        }
        let mut config = SiteConfig::default();
        config.root = dir.path().to_path_buf();
        let config = Arc::new(config);
        let (mut site, warnings) = discover(&config, BuildMode::Production).unwrap();
        finalize_sections(&mut site);
        (site, warnings, dir)
    }

    #[test]
    fn trivial_site_discovers_two_pages() {
        let (site, warnings, _dir) = site_with(&[
            ("index.md", "---\ntitle: Home\n---\nHello."),
            ("about.md", "---\ntitle: About\n---\nAbout us."),
        ]);
        assert!(warnings.is_empty());
        assert_eq!(site.regular_pages().len(), 2);

        let home = site.page_by_key("index.md").unwrap();
        assert_eq!(site.page(home).kind, PageKind::Home);
        let about = site.page_by_key("about.md").unwrap();
        assert_eq!(site.page(about).kind, PageKind::Page);
    }

    #[test]
    fn every_section_has_index_after_finalization() {
        let (site, _, _dir) = site_with(&[
            ("docs/a.md", "---\ntitle: A\n---\n"),
            ("docs/guide/b.md", "---\ntitle: B\n---\n"),
        ]);
        for id in site.section_ids() {
            assert!(
                site.section(id).index_page.is_some(),
                "section {:?} missing index",
                site.section(id).key
            );
        }
        // Auto-generated indexes are virtual pages.
        let docs = site.section_by_key("docs").unwrap();
        let index = site.section(docs).index_page.unwrap();
        assert!(site.page(index).generated);
        assert!(site.page(index).key.is_virtual());
    }

    #[test]
    fn explicit_index_is_used() {
        let (site, _, _dir) = site_with(&[
            ("docs/_index.md", "---\ntitle: Documentation\n---\nWelcome."),
            ("docs/a.md", "---\ntitle: A\n---\n"),
        ]);
        let docs = site.section_by_key("docs").unwrap();
        let index = site.section(docs).index_page.unwrap();
        assert!(!site.page(index).generated);
        assert_eq!(site.page(index).title(), "Documentation");
        assert_eq!(site.page(index).kind, PageKind::Section);
    }

    #[test]
    fn malformed_frontmatter_is_admitted_with_warning() {
        let (site, warnings, _dir) =
            site_with(&[("bad.md", "---\ntitle: [broken\n---\nBody still here.")]);
        assert_eq!(warnings.len(), 1);
        let page = site.page_by_key("bad.md").unwrap();
        assert!(site.page(page).malformed_meta);
        assert_eq!(site.page(page).raw_body, "Body still here.");
    }

    #[test]
    fn non_content_files_become_assets() {
        let (site, _, _dir) = site_with(&[
            ("index.md", "hello"),
            ("docs/diagram.png", "not-a-real-png"),
        ]);
        assert_eq!(site.assets.len(), 1);
        assert_eq!(site.assets[0].key, "docs/diagram.png");
    }

    #[test]
    fn drafts_skipped_in_production() {
        let (site, _, _dir) = site_with(&[
            ("live.md", "---\ntitle: Live\n---\n"),
            ("wip.md", "---\ntitle: WIP\ndraft: true\n---\n"),
        ]);
        assert!(site.page_by_key("live.md").is_some());
        assert!(site.page_by_key("wip.md").is_none());
    }

    #[test]
    fn section_pages_ordered_by_weight_then_title() {
        let (site, _, _dir) = site_with(&[
            ("docs/z.md", "---\ntitle: Zeta\nweight: 1\n---\n"),
            ("docs/a.md", "---\ntitle: Alpha\nweight: 2\n---\n"),
            ("docs/m.md", "---\ntitle: Mid\nweight: 1\n---\n"),
        ]);
        let docs = site.section_by_key("docs").unwrap();
        let titles: Vec<_> = site
            .section(docs)
            .pages
            .iter()
            .map(|&pid| site.page(pid).title())
            .collect();
        assert_eq!(titles, vec!["Mid", "Zeta", "Alpha"]);
    }

    #[test]
    fn one_page_site_builds_home() {
        let (site, _, _dir) = site_with(&[("index.md", "---\ntitle: Solo\n---\nOnly page.")]);
        assert_eq!(site.regular_pages().len(), 1);
        let home = site.page_by_key("index.md").unwrap();
        assert_eq!(site.page(home).kind, PageKind::Home);
        assert_eq!(site.page(home).url, "/");
    }
}
