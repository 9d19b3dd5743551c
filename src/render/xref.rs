//! Cross references: the site-wide address index and `[[target]]` resolution.

use std::sync::LazyLock;

use regex::Regex;
use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::content::Site;
use crate::utils::path::strip_extension;

/// One addressable item.
#[derive(Debug, Clone, Serialize)]
pub struct XrefEntry {
    /// Canonical source key of the backing page (not exported).
    #[serde(skip)]
    pub key: String,
    /// Stable name: canonical key without extension.
    pub name: String,
    /// `page` or `section`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Root-relative URL.
    pub path: String,
    pub title: String,
}

/// Site-wide lookup for cross references, built once per build and shared
/// read-only by render workers.
#[derive(Debug, Default)]
pub struct XrefIndex {
    entries: Vec<XrefEntry>,
    by_name: FxHashMap<String, usize>,
    by_title: FxHashMap<String, usize>,
}

impl XrefIndex {
    pub fn from_site(site: &Site) -> Self {
        let mut index = Self::default();
        for id in site.page_ids() {
            let page = site.page(id);
            let name = strip_extension(
                page.key
                    .as_str()
                    .strip_prefix(crate::content::page::VIRTUAL_PREFIX)
                    .unwrap_or(page.key.as_str()),
            )
            .to_string();
            let kind = if page.is_section() || page.is_home() {
                "section"
            } else {
                "page"
            };
            let entry = XrefEntry {
                key: page.key.as_str().to_string(),
                name: name.clone(),
                kind: kind.to_string(),
                path: page.url.clone(),
                title: page.title(),
            };
            let idx = index.entries.len();
            index.by_name.entry(name).or_insert(idx);
            index
                .by_title
                .entry(entry.title.to_lowercase())
                .or_insert(idx);
            index.entries.push(entry);
        }
        index
    }

    /// Resolve a `[[target]]`: by name (key without extension), then by
    /// title (case-insensitive).
    pub fn resolve(&self, target: &str) -> Option<&XrefEntry> {
        let trimmed = target.trim();
        if let Some(&idx) = self.by_name.get(strip_extension(trimmed)) {
            return Some(&self.entries[idx]);
        }
        self.by_title
            .get(&trimmed.to_lowercase())
            .map(|&idx| &self.entries[idx])
    }

    pub fn entries(&self) -> &[XrefEntry] {
        &self.entries
    }
}

static XREF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\[([^\[\]]+)\]\]").expect("xref regex"));

/// Replace `[[target]]` spans in rendered HTML. Resolved targets become
/// links; broken ones become marker spans and are reported as warnings.
pub fn resolve_refs(html: &str, index: &XrefIndex) -> (String, Vec<String>) {
    let mut broken = Vec::new();
    let out = XREF_RE
        .replace_all(html, |captures: &regex::Captures| {
            let target = captures[1].trim();
            match index.resolve(target) {
                Some(entry) => {
                    format!(
                        "<a href=\"{}\">{}</a>",
                        entry.path,
                        crate::utils::html::escape(&entry.title)
                    )
                }
                None => {
                    broken.push(target.to_string());
                    format!(
                        "<span class=\"broken-ref\">[{}]</span>",
                        crate::utils::html::escape(target)
                    )
                }
            }
        })
        .into_owned();
    (out, broken)
}
