//! The Page type: one unit of renderable content.

use std::path::PathBuf;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::meta::{MetaMap, MetaValue};
use super::section::SectionId;
use crate::utils::path::strip_extension;

/// Prefix for pages whose source does not exist on disk (taxonomy terms,
/// archives, pagination, redirects, autodoc).
pub const VIRTUAL_PREFIX: &str = "_virtual/";

/// Arena index of a page within `Site::pages`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageId(pub usize);

/// Canonical source key: content-relative slash path (`docs/a.md`), or a
/// virtual-prefixed path for generated pages.
///
/// Uniquely identifies a page across the site and across builds; it is the
/// key into every per-page cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceKey(String);

impl SourceKey {
    pub fn from_rel(rel: impl Into<String>) -> Self {
        Self(rel.into())
    }

    /// Key for a generated page.
    pub fn virtual_key(path: &str) -> Self {
        Self(format!("{VIRTUAL_PREFIX}{path}"))
    }

    pub fn is_virtual(&self) -> bool {
        self.0.starts_with(VIRTUAL_PREFIX)
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SourceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Position-derived page kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageKind {
    Home,
    Section,
    Page,
}

/// One table-of-contents entry extracted from a heading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TocEntry {
    pub level: u8,
    pub id: String,
    pub title: String,
}

/// A single unit of renderable content.
///
/// Mutated only up to the end of discovery + finalization; the render
/// pipeline treats it as read-only apart from filling `html` and `toc`.
#[derive(Debug, Clone)]
pub struct Page {
    pub key: SourceKey,
    /// Absolute source path; empty for virtual pages.
    pub source: PathBuf,
    pub meta: MetaMap,
    pub raw_body: String,
    /// Parsed HTML body, filled by the render pipeline.
    pub html: String,
    pub toc: Vec<TocEntry>,
    /// Output path relative to the output directory.
    pub output_rel: PathBuf,
    /// Root-relative URL with trailing slash (`/docs/a/`).
    pub url: String,
    /// Outbound references recorded during render.
    pub links: Vec<String>,
    pub generated: bool,
    pub autodoc: bool,
    /// Frontmatter was present but failed to parse (recoverable).
    pub malformed_meta: bool,
    pub kind: PageKind,
    pub section: Option<SectionId>,
    /// Version root this page lives under, when versioning is enabled.
    pub version: Option<String>,

    // Navigation neighbors, attached by reference setup.
    pub next: Option<PageId>,
    pub prev: Option<PageId>,
    pub next_in_section: Option<PageId>,
    pub prev_in_section: Option<PageId>,
}

impl Page {
    /// Create a page shell; URL and output path are derived from the key.
    pub fn new(key: SourceKey, source: PathBuf, meta: MetaMap, raw_body: String) -> Self {
        let mut page = Self {
            key,
            source,
            meta,
            raw_body,
            html: String::new(),
            toc: Vec::new(),
            output_rel: PathBuf::new(),
            url: String::new(),
            links: Vec::new(),
            generated: false,
            autodoc: false,
            malformed_meta: false,
            kind: PageKind::Page,
            section: None,
            version: None,
            next: None,
            prev: None,
            next_in_section: None,
            prev_in_section: None,
        };
        page.url = page.compute_url();
        page.output_rel = page.compute_output_rel();
        page
    }

    // ------------------------------------------------------------------------
    // Typed metadata accessors
    // ------------------------------------------------------------------------

    /// Title from frontmatter, falling back to the final key segment.
    pub fn title(&self) -> String {
        if let Some(title) = self.meta.get("title").and_then(MetaValue::as_str) {
            return title.to_string();
        }
        let stem = strip_extension(self.key.as_str());
        let segment = stem.rsplit('/').next().unwrap_or(stem);
        let segment = if segment == "_index" || segment == "index" {
            stem.rsplit('/').nth(1).unwrap_or("Home")
        } else {
            segment
        };
        segment.replace(['-', '_'], " ")
    }

    pub fn weight(&self) -> i64 {
        self.meta.get("weight").and_then(MetaValue::as_int).unwrap_or(0)
    }

    pub fn draft(&self) -> bool {
        self.meta.get("draft").and_then(MetaValue::as_bool).unwrap_or(false)
    }

    pub fn slug(&self) -> Option<&str> {
        self.meta.get("slug").and_then(MetaValue::as_str)
    }

    pub fn date_raw(&self) -> Option<&str> {
        self.meta.get("date").and_then(MetaValue::as_str)
    }

    /// Parsed date: `YYYY-MM-DD` or the date component of an RFC 3339 string.
    pub fn date(&self) -> Option<NaiveDate> {
        let raw = self.date_raw()?;
        let date_part = raw.get(..10).unwrap_or(raw);
        NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
    }

    pub fn description(&self) -> Option<&str> {
        self.meta.get("description").and_then(MetaValue::as_str)
    }

    pub fn keywords(&self) -> Vec<String> {
        self.meta
            .get("keywords")
            .map(MetaValue::as_string_list)
            .unwrap_or_default()
    }

    pub fn tags(&self) -> Vec<String> {
        self.meta
            .get("tags")
            .map(MetaValue::as_string_list)
            .unwrap_or_default()
    }

    pub fn aliases(&self) -> Vec<String> {
        self.meta
            .get("aliases")
            .map(MetaValue::as_string_list)
            .unwrap_or_default()
    }

    /// Section cascade declared by this page (only meaningful on index pages
    /// and top-level pages).
    pub fn cascade(&self) -> Option<&MetaMap> {
        self.meta.get("cascade").and_then(MetaValue::as_map)
    }

    /// Explicit template override from frontmatter.
    pub fn template(&self) -> Option<&str> {
        self.meta.get("template").and_then(MetaValue::as_str)
    }

    /// Menu membership: `menu: main` or `menu: { name: main, weight: 5 }`.
    pub fn menu(&self) -> Option<(String, i64)> {
        match self.meta.get("menu")? {
            MetaValue::Str(name) => Some((name.clone(), self.weight())),
            MetaValue::Map(map) => {
                let name = map.get("name").and_then(MetaValue::as_str)?.to_string();
                let weight = map.get("weight").and_then(MetaValue::as_int).unwrap_or(0);
                Some((name, weight))
            }
            _ => None,
        }
    }

    pub const fn is_home(&self) -> bool {
        matches!(self.kind, PageKind::Home)
    }

    pub const fn is_section(&self) -> bool {
        matches!(self.kind, PageKind::Section)
    }

    pub const fn is_page(&self) -> bool {
        matches!(self.kind, PageKind::Page)
    }

    /// Whether this is a section index source (`_index.md` / `_index.html`).
    pub fn is_index_source(&self) -> bool {
        let stem = strip_extension(self.key.as_str());
        stem == "_index" || stem.ends_with("/_index") || stem == "index" || stem.ends_with("/index")
    }

    // ------------------------------------------------------------------------
    // URL and output path
    // ------------------------------------------------------------------------

    fn compute_url(&self) -> String {
        let key = self
            .key
            .as_str()
            .strip_prefix(VIRTUAL_PREFIX)
            .unwrap_or(self.key.as_str());
        let stem = strip_extension(key);

        // 404 is served from the output root, not a directory.
        if stem == "404" {
            return "/404.html".to_string();
        }

        let mut segments: Vec<&str> = stem.split('/').filter(|s| !s.is_empty()).collect();
        if let Some(last) = segments.last().copied() {
            if last == "index" || last == "_index" {
                segments.pop();
            }
        }
        if let Some(slug) = self.slug() {
            if segments.is_empty() {
                segments.push(slug);
            } else {
                *segments.last_mut().unwrap() = slug;
            }
        }
        if segments.is_empty() {
            return "/".to_string();
        }
        format!("/{}/", segments.join("/"))
    }

    fn compute_output_rel(&self) -> PathBuf {
        if self.url == "/404.html" {
            return PathBuf::from("404.html");
        }
        let trimmed = self.url.trim_matches('/');
        if trimmed.is_empty() {
            PathBuf::from("index.html")
        } else {
            PathBuf::from(trimmed).join("index.html")
        }
    }

    /// Recompute URL and output path after metadata changes (cascade can
    /// introduce a slug).
    pub fn refresh_routes(&mut self) {
        self.url = self.compute_url();
        self.output_rel = self.compute_output_rel();
    }
}

/// Sort key for the ordered page list of a section: (weight, date desc,
/// title, key). Stable across builds.
pub fn page_order_key(page: &Page) -> (i64, std::cmp::Reverse<NaiveDate>, String, String) {
    (
        page.weight(),
        std::cmp::Reverse(page.date().unwrap_or(NaiveDate::MIN)),
        page.title(),
        page.key.as_str().to_string(),
    )
}
