//! Template context: what every page render sees.
//!
//! The context merges site-wide globals, the page's typed metadata,
//! navigation accessors, and the helper functions (`asset_url`, `data`,
//! `ref`). Helpers record dependency edges through the thread-local
//! tracker as they are called.

use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use minijinja::{Environment, Value, context};
use serde::Serialize;

use super::xref::XrefIndex;
use crate::asset::process::AssetManifest;
use crate::content::meta::{MetaMap, MetaValue};
use crate::content::{PageId, PageKind, Site, TocEntry};
use crate::incremental::{DepKind, Dependency, DependencyTracker};

/// Compact page reference exposed in listings and navigation.
#[derive(Debug, Clone, Serialize)]
pub struct LinkCtx {
    pub key: String,
    pub title: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Enclosing section key, for `in_section`/`is_ancestor` helpers.
    pub section_key: String,
}

fn link_ctx(site: &Site, id: PageId, record: bool) -> LinkCtx {
    let page = site.page(id);
    if record {
        DependencyTracker::record_current(Dependency::new(DepKind::Page, page.key.as_str()));
    }
    LinkCtx {
        key: page.key.as_str().to_string(),
        title: page.title(),
        url: page.url.clone(),
        date: page.date_raw().map(str::to_string),
        description: page.description().map(str::to_string),
        section_key: page
            .section
            .map(|sid| site.section(sid).key.clone())
            .unwrap_or_default(),
    }
}

#[derive(Debug, Serialize)]
struct SiteCtx<'a> {
    title: &'a str,
    baseurl: &'a str,
    language: &'a str,
    description: &'a str,
    author: &'a str,
}

#[derive(Debug, Serialize)]
struct SectionCtx {
    key: String,
    title: String,
    url: String,
    regular_pages: Vec<LinkCtx>,
    sections: Vec<SectionLink>,
    regular_pages_recursive: Vec<LinkCtx>,
}

#[derive(Debug, Serialize)]
struct SectionLink {
    key: String,
    title: String,
    url: String,
}

#[derive(Debug, Serialize)]
struct PageCtx {
    key: String,
    title: String,
    url: String,
    kind: PageKind,
    is_home: bool,
    is_section: bool,
    is_page: bool,
    draft: bool,
    weight: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    keywords: Vec<String>,
    tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<String>,
    section_key: String,
    next: Option<LinkCtx>,
    prev: Option<LinkCtx>,
    next_in_section: Option<LinkCtx>,
    prev_in_section: Option<LinkCtx>,
    parent: Option<LinkCtx>,
    ancestors: Vec<SectionLink>,
    toc: Vec<TocEntry>,
    /// Full metadata map: cascade results and custom keys.
    meta: MetaMap,
}

/// Build the render context for one page.
///
/// For listing pages (home, section indexes, taxonomy terms), the pages
/// exposed in `pages`/`section.regular_pages` are recorded as dependencies.
pub fn build_context(site: &Site, id: PageId, body_html: String, toc: &[TocEntry]) -> Value {
    let page = site.page(id);
    let is_listing = page.is_home()
        || page.is_section()
        || page.meta.get("term").is_some()
        || page.meta.get("taxonomy").is_some();

    let section_id = page.section.unwrap_or(site.root_section);
    // A section index page lists its own section, not the parent.
    let listed_section = section_id;

    let section_ctx = {
        let section = site.section(listed_section);
        SectionCtx {
            key: section.key.clone(),
            title: site.section_title(listed_section),
            url: section.url(),
            regular_pages: section
                .pages
                .iter()
                .map(|&pid| link_ctx(site, pid, is_listing))
                .collect(),
            sections: section
                .children
                .iter()
                .map(|&sid| SectionLink {
                    key: site.section(sid).key.clone(),
                    title: site.section_title(sid),
                    url: site.section(sid).url(),
                })
                .collect(),
            regular_pages_recursive: site
                .regular_pages_recursive(listed_section)
                .into_iter()
                .map(|pid| link_ctx(site, pid, is_listing))
                .collect(),
        }
    };

    // Taxonomy term pages expose their member slice as `pages`.
    let pages_ctx: Vec<LinkCtx> = if let (Some(taxonomy), Some(term)) = (
        page.meta.get("taxonomy").and_then(MetaValue::as_str),
        page.meta.get("term").and_then(MetaValue::as_str),
    ) {
        let page_number = page
            .meta
            .get("page_number")
            .and_then(MetaValue::as_int)
            .unwrap_or(1) as usize;
        site.taxonomies
            .get(taxonomy)
            .and_then(|terms| terms.get(term))
            .map(|members| {
                let start = (page_number - 1) * crate::content::taxonomy::PAGE_SIZE;
                members
                    .iter()
                    .skip(start)
                    .take(crate::content::taxonomy::PAGE_SIZE)
                    .map(|&pid| link_ctx(site, pid, true))
                    .collect()
            })
            .unwrap_or_default()
    } else {
        section_ctx.regular_pages.clone()
    };

    let page_ctx = PageCtx {
        key: page.key.as_str().to_string(),
        title: page.title(),
        url: page.url.clone(),
        kind: page.kind,
        is_home: page.is_home(),
        is_section: page.is_section(),
        is_page: page.is_page(),
        draft: page.draft(),
        weight: page.weight(),
        date: page.date_raw().map(str::to_string),
        description: page.description().map(str::to_string),
        keywords: page.keywords(),
        tags: page.tags(),
        version: page.version.clone(),
        section_key: site.section(section_id).key.clone(),
        next: page.next.map(|pid| link_ctx(site, pid, false)),
        prev: page.prev.map(|pid| link_ctx(site, pid, false)),
        next_in_section: page.next_in_section.map(|pid| link_ctx(site, pid, false)),
        prev_in_section: page.prev_in_section.map(|pid| link_ctx(site, pid, false)),
        parent: site.section(section_id).index_page.and_then(|pid| {
            if pid == id {
                // A section's index page points at its parent section index.
                let parent = site.section(section_id).parent?;
                site.section(parent).index_page.map(|p| link_ctx(site, p, false))
            } else {
                Some(link_ctx(site, pid, false))
            }
        }),
        ancestors: site
            .ancestors_of(id)
            .into_iter()
            .map(|sid| SectionLink {
                key: site.section(sid).key.clone(),
                title: site.section_title(sid),
                url: site.section(sid).url(),
            })
            .collect(),
        toc: toc.to_vec(),
        meta: page.meta.clone(),
    };

    context! {
        site => SiteCtx {
            title: &site.config.site.title,
            baseurl: &site.config.site.baseurl,
            language: &site.config.site.language,
            description: &site.config.site.description,
            author: &site.config.site.author,
        },
        page => page_ctx,
        content => Value::from_safe_string(body_html),
        toc => toc,
        section => section_ctx,
        pages => pages_ctx,
        menus => &site.menus,
    }
}

// ============================================================================
// Helper functions registered on the environment
// ============================================================================

/// Register `asset_url`, `data`, `ref` and the page-relation helpers.
///
/// Each helper records the dependency edge it creates through the
/// thread-local tracker of the page currently rendering.
pub fn register_functions(
    env: &mut Environment<'static>,
    manifest: Arc<AssetManifest>,
    data_dir: PathBuf,
    xref: Arc<XrefIndex>,
) {
    let data_cache: Arc<DashMap<String, Value>> = Arc::new(DashMap::new());

    env.add_function("asset_url", move |path: &str| -> Value {
        let key = path.trim_start_matches('/').to_string();
        DependencyTracker::record_current(Dependency::new(DepKind::Asset, key.clone()));
        let url = manifest.url_for(&key).unwrap_or_else(|| format!("/{key}"));
        Value::from_safe_string(url)
    });

    env.add_function(
        "data",
        move |name: &str| -> Result<Value, minijinja::Error> {
            if let Some(cached) = data_cache.get(name) {
                // Still record the edge: the cache is per-process, the
                // dependency is per-page.
                if let Some(rel) = find_data_file(&data_dir, name).map(|(rel, _)| rel) {
                    DependencyTracker::record_current(Dependency::new(DepKind::DataFile, rel));
                }
                return Ok(cached.clone());
            }
            let Some((rel, path)) = find_data_file(&data_dir, name) else {
                return Err(minijinja::Error::new(
                    minijinja::ErrorKind::InvalidOperation,
                    format!("no data file named {name:?}"),
                ));
            };
            DependencyTracker::record_current(Dependency::new(DepKind::DataFile, rel));
            let value = load_data_file(&path).map_err(|e| {
                minijinja::Error::new(
                    minijinja::ErrorKind::InvalidOperation,
                    format!("data file {} failed to parse: {e}", path.display()),
                )
            })?;
            data_cache.insert(name.to_string(), value.clone());
            Ok(value)
        },
    );

    env.add_function(
        "ref",
        move |target: &str| -> Result<Value, minijinja::Error> {
            match xref.resolve(target) {
                Some(entry) => {
                    DependencyTracker::record_current(Dependency::new(
                        DepKind::Page,
                        entry.key.clone(),
                    ));
                    Ok(Value::from_safe_string(entry.path.clone()))
                }
                None => Err(minijinja::Error::new(
                    minijinja::ErrorKind::InvalidOperation,
                    format!("unresolved reference {target:?}"),
                )),
            }
        },
    );

    // Page relation helpers operating on context values.
    env.add_function("eq", |a: Value, b: Value| -> bool {
        attr_str(&a, "key") == attr_str(&b, "key")
    });
    env.add_function("in_section", |page: Value, section: Value| -> bool {
        attr_str(&page, "section_key") == attr_str(&section, "key")
    });
    env.add_function("is_ancestor", |section: Value, other: Value| -> bool {
        let section_key = attr_str(&section, "key");
        let other_key = attr_str(&other, "key");
        other_key != section_key
            && (section_key.is_empty() || other_key.starts_with(&format!("{section_key}/")))
    });
    env.add_function("is_descendant", |section: Value, other: Value| -> bool {
        let section_key = attr_str(&section, "key");
        let other_key = attr_str(&other, "key");
        section_key != other_key
            && (other_key.is_empty() || section_key.starts_with(&format!("{other_key}/")))
    });
}

fn attr_str(value: &Value, attr: &str) -> String {
    value
        .get_attr(attr)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default()
}

/// Locate `name.{toml,yaml,yml,json}` in the data directory.
fn find_data_file(data_dir: &std::path::Path, name: &str) -> Option<(String, PathBuf)> {
    for ext in ["toml", "yaml", "yml", "json"] {
        let rel = format!("{name}.{ext}");
        let path = data_dir.join(&rel);
        if path.is_file() {
            return Some((rel, path));
        }
    }
    None
}

fn load_data_file(path: &std::path::Path) -> anyhow::Result<Value> {
    let raw = std::fs::read_to_string(path)?;
    let meta: MetaValue = match path.extension().and_then(|e| e.to_str()) {
        Some("toml") => {
            let table: toml::Table = toml::from_str(&raw)?;
            MetaValue::Map(table.into_iter().map(|(k, v)| (k, v.into())).collect())
        }
        Some("json") => {
            let value: serde_yaml::Value = serde_yaml::from_str(&raw)?;
            value.into()
        }
        _ => {
            let value: serde_yaml::Value = serde_yaml::from_str(&raw)?;
            value.into()
        }
    };
    Ok(Value::from_serialize(&meta))
}
