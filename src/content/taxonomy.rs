//! Taxonomies: term collection and generated term/list pages.
//!
//! Generated pages are disposable: their structural existence is recomputed
//! every build; only their rendered output may be cache-served.

use std::collections::BTreeMap;
use std::path::PathBuf;

use super::meta::{MetaMap, MetaValue};
use super::page::{Page, PageId, SourceKey, page_order_key};
use super::site::Site;

/// Members per paginated term list page.
pub const PAGE_SIZE: usize = 10;

/// URL-safe slug for a taxonomy term.
pub fn slugify(term: &str) -> String {
    let ascii = deunicode::deunicode(term).to_lowercase();
    let mut slug = String::with_capacity(ascii.len());
    let mut last_dash = true;
    for ch in ascii.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch);
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    slug.trim_end_matches('-').to_string()
}

/// Collect term → member maps for every configured taxonomy.
pub fn collect_taxonomies(site: &mut Site) {
    let taxonomy_names = site.config.content.taxonomies.clone();
    let mut taxonomies: BTreeMap<String, BTreeMap<String, Vec<PageId>>> = BTreeMap::new();

    for name in &taxonomy_names {
        let mut terms: BTreeMap<String, Vec<PageId>> = BTreeMap::new();
        for page_id in site.regular_pages() {
            let page = site.page(page_id);
            let values = page
                .meta
                .get(name)
                .map(MetaValue::as_string_list)
                .unwrap_or_default();
            for term in values {
                terms.entry(term).or_default().push(page_id);
            }
        }
        for members in terms.values_mut() {
            members.sort_by_key(|&pid| page_order_key(site.page(pid)));
        }
        taxonomies.insert(name.clone(), terms);
    }

    site.taxonomies = taxonomies;
}

/// Generate virtual taxonomy index, term, and pagination pages.
pub fn generate_taxonomy_pages(site: &mut Site) {
    let mut new_pages: Vec<Page> = Vec::new();

    for (taxonomy, terms) in site.taxonomies.clone() {
        if terms.is_empty() {
            continue;
        }

        // Taxonomy index page (e.g. /tags/).
        let mut meta = MetaMap::new();
        meta.insert("title".into(), MetaValue::Str(taxonomy.clone()));
        meta.insert("taxonomy".into(), MetaValue::Str(taxonomy.clone()));
        meta.insert("template".into(), MetaValue::Str("taxonomy.html".into()));
        let mut index = Page::new(
            SourceKey::virtual_key(&format!("{taxonomy}/_index.md")),
            PathBuf::new(),
            meta,
            String::new(),
        );
        index.generated = true;
        new_pages.push(index);

        for (term, members) in &terms {
            let slug = slugify(term);
            let total_pages = members.len().div_ceil(PAGE_SIZE).max(1);

            for page_number in 1..=total_pages {
                let rel = if page_number == 1 {
                    format!("{taxonomy}/{slug}.md")
                } else {
                    format!("{taxonomy}/{slug}/page/{page_number}.md")
                };
                let mut meta = MetaMap::new();
                meta.insert("title".into(), MetaValue::Str(term.clone()));
                meta.insert("taxonomy".into(), MetaValue::Str(taxonomy.clone()));
                meta.insert("term".into(), MetaValue::Str(term.clone()));
                meta.insert("page_number".into(), MetaValue::Int(page_number as i64));
                meta.insert("total_pages".into(), MetaValue::Int(total_pages as i64));
                meta.insert("template".into(), MetaValue::Str("term.html".into()));

                let mut page = Page::new(
                    SourceKey::virtual_key(&rel),
                    PathBuf::new(),
                    meta,
                    String::new(),
                );
                page.generated = true;
                new_pages.push(page);
            }
        }
    }

    for page in new_pages {
        site.add_page(page);
    }
}

/// Term membership by key, persisted in the cache for change detection.
pub fn snapshot(site: &Site) -> BTreeMap<String, BTreeMap<String, Vec<String>>> {
    site.taxonomies
        .iter()
        .map(|(taxonomy, terms)| {
            let terms = terms
                .iter()
                .map(|(term, members)| {
                    let keys = members
                        .iter()
                        .map(|&pid| site.page(pid).key.as_str().to_string())
                        .collect();
                    (term.clone(), keys)
                })
                .collect();
            (taxonomy.clone(), terms)
        })
        .collect()
}

/// Term pages whose membership changed relative to the previous snapshot.
///
/// Returns virtual page keys for changed terms (added, removed, reordered).
pub fn changed_terms(
    site: &Site,
    previous: &BTreeMap<String, BTreeMap<String, Vec<String>>>,
) -> Vec<String> {
    let current = snapshot(site);
    let mut changed = Vec::new();

    let empty = BTreeMap::new();
    for (taxonomy, terms) in &current {
        let prev_terms = previous.get(taxonomy).unwrap_or(&empty);
        for (term, members) in terms {
            if prev_terms.get(term) != Some(members) {
                changed.push(format!("_virtual/{taxonomy}/{}.md", slugify(term)));
            }
        }
        for term in prev_terms.keys() {
            if !terms.contains_key(term) {
                changed.push(format!("_virtual/{taxonomy}/{}.md", slugify(term)));
            }
        }
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SiteConfig;
    use crate::content::discover::{discover, finalize_sections};
    use crate::core::BuildMode;
    use std::fs;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn tagged_site(files: &[(&str, &str)]) -> (Site, TempDir) {
        let dir = TempDir::new().unwrap();
        for (rel, body) in files {
            let path = dir.path().join("content").join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, body).unwrap();
        }
        let mut config = SiteConfig::default();
        config.root = dir.path().to_path_buf();
        let config = Arc::new(config);
        let (mut site, _) = discover(&config, BuildMode::Production).unwrap();
        finalize_sections(&mut site);
        collect_taxonomies(&mut site);
        generate_taxonomy_pages(&mut site);
        (site, dir)
    }

    #[test]
    fn slugify_flattens_terms() {
        assert_eq!(slugify("Rust Programming"), "rust-programming");
        assert_eq!(slugify("C++"), "c");
        assert_eq!(slugify("  spaced  "), "spaced");
    }

    #[test]
    fn terms_collected_and_pages_generated() {
        let (site, _dir) = tagged_site(&[
            ("a.md", "---\ntitle: A\ntags: [rust, web]\n---\n"),
            ("b.md", "---\ntitle: B\ntags: [rust]\n---\n"),
        ]);
        let tags = site.taxonomies.get("tags").unwrap();
        assert_eq!(tags.get("rust").map(Vec::len), Some(2));
        assert_eq!(tags.get("web").map(Vec::len), Some(1));

        // Virtual pages: tags index + two term pages.
        let index = site.page_by_key("_virtual/tags/_index.md").unwrap();
        assert!(site.page(index).generated);
        assert_eq!(site.page(index).url, "/tags/");

        let rust = site.page_by_key("_virtual/tags/rust.md").unwrap();
        assert_eq!(site.page(rust).url, "/tags/rust/");
    }

    #[test]
    fn pagination_pages_beyond_page_size() {
        let mut files: Vec<(String, String)> = Vec::new();
        for i in 0..25 {
            files.push((
                format!("p{i:02}.md"),
                format!("---\ntitle: P{i}\ntags: [many]\n---\n"),
            ));
        }
        let refs: Vec<(&str, &str)> = files.iter().map(|(a, b)| (a.as_str(), b.as_str())).collect();
        let (site, _dir) = tagged_site(&refs);

        assert!(site.page_by_key("_virtual/tags/many.md").is_some());
        assert!(site.page_by_key("_virtual/tags/many/page/2.md").is_some());
        assert!(site.page_by_key("_virtual/tags/many/page/3.md").is_some());
        assert!(site.page_by_key("_virtual/tags/many/page/4.md").is_none());
    }

    #[test]
    fn snapshot_detects_membership_change() {
        let (site, _dir) = tagged_site(&[("a.md", "---\ntitle: A\ntags: [rust]\n---\n")]);
        let before = snapshot(&site);
        assert!(changed_terms(&site, &before).is_empty());

        // Simulate previous build without the term.
        let empty = BTreeMap::new();
        let changed = changed_terms(&site, &empty);
        assert_eq!(changed, vec!["_virtual/tags/rust.md".to_string()]);
    }

    #[test]
    fn no_tags_no_virtual_pages() {
        let (site, _dir) = tagged_site(&[("a.md", "---\ntitle: A\n---\n")]);
        assert!(site.page_by_key("_virtual/tags/_index.md").is_none());
        assert!(site.generated_pages().iter().all(|&pid| {
            // Only auto-generated section indexes remain.
            site.page(pid).key.as_str().ends_with("_index.md")
        }));
    }
}
