//! The Site aggregate: root owner of pages, sections, assets, taxonomies.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use super::menu::MenuItem;
use super::page::{Page, PageId};
use super::section::{Section, SectionId};
use crate::asset::Asset;
use crate::config::SiteConfig;

/// Cached derived page lists, invalidated whenever the page list changes.
#[derive(Debug, Clone)]
struct PageLists {
    regular: Vec<PageId>,
    generated: Vec<PageId>,
}

/// The root aggregate. Exclusively owns Sections, Pages and Assets; pages
/// and sections reference each other through arena indices.
pub struct Site {
    pub root: PathBuf,
    pub config: Arc<SiteConfig>,
    pub pages: Vec<Page>,
    pub sections: Vec<Section>,
    pub root_section: SectionId,
    pub assets: Vec<Asset>,
    /// taxonomy name → term → member pages.
    pub taxonomies: BTreeMap<String, BTreeMap<String, Vec<PageId>>>,
    /// menu name → ordered items.
    pub menus: BTreeMap<String, Vec<MenuItem>>,

    key_index: FxHashMap<String, PageId>,
    /// Lowercase title → page, for `[[Title]]` cross references.
    title_index: FxHashMap<String, PageId>,
    section_index: FxHashMap<String, SectionId>,
    list_cache: Mutex<Option<PageLists>>,
}

impl Site {
    pub fn new(config: Arc<SiteConfig>) -> Self {
        let root_section = Section::new(SectionId(0), String::new(), None);
        let mut section_index = FxHashMap::default();
        section_index.insert(String::new(), SectionId(0));
        Self {
            root: config.root.clone(),
            config,
            pages: Vec::new(),
            sections: vec![root_section],
            root_section: SectionId(0),
            assets: Vec::new(),
            taxonomies: BTreeMap::new(),
            menus: BTreeMap::new(),
            key_index: FxHashMap::default(),
            title_index: FxHashMap::default(),
            section_index: FxHashMap::default(),
            list_cache: Mutex::new(None),
        }
    }

    // ------------------------------------------------------------------------
    // Pages
    // ------------------------------------------------------------------------

    /// Append a page, maintaining the key index.
    ///
    /// Canonical keys are unique: adding a page with an existing key replaces
    /// the previous one (same logical page) and a warning is logged.
    pub fn add_page(&mut self, page: Page) -> PageId {
        if let Some(&existing) = self.key_index.get(page.key.as_str()) {
            crate::log!("warn"; "duplicate page key {}, keeping the newer source", page.key);
            self.pages[existing.0] = page;
            self.invalidate_page_caches();
            return existing;
        }
        let id = PageId(self.pages.len());
        self.key_index.insert(page.key.as_str().to_string(), id);
        self.title_index.insert(page.title().to_lowercase(), id);
        self.pages.push(page);
        self.invalidate_page_caches();
        id
    }

    #[inline]
    pub fn page(&self, id: PageId) -> &Page {
        &self.pages[id.0]
    }

    #[inline]
    pub fn page_mut(&mut self, id: PageId) -> &mut Page {
        &mut self.pages[id.0]
    }

    pub fn page_by_key(&self, key: &str) -> Option<PageId> {
        self.key_index.get(key).copied()
    }

    pub fn page_by_title(&self, title: &str) -> Option<PageId> {
        self.title_index.get(&title.to_lowercase()).copied()
    }

    /// Resolve a root-relative URL back to its page.
    pub fn page_by_url(&self, url: &str) -> Option<PageId> {
        self.pages
            .iter()
            .position(|p| p.url == url)
            .map(PageId)
    }

    pub fn page_ids(&self) -> impl Iterator<Item = PageId> + '_ {
        (0..self.pages.len()).map(PageId)
    }

    /// Non-generated pages, cached.
    pub fn regular_pages(&self) -> Vec<PageId> {
        self.lists().regular
    }

    /// Generated (virtual) pages, cached.
    pub fn generated_pages(&self) -> Vec<PageId> {
        self.lists().generated
    }

    /// Drop the derived list caches. Must be called by any phase that
    /// appends or removes pages.
    pub fn invalidate_page_caches(&self) {
        *self.list_cache.lock() = None;
    }

    fn lists(&self) -> PageLists {
        let mut guard = self.list_cache.lock();
        if let Some(lists) = guard.as_ref() {
            return lists.clone();
        }
        let mut regular = Vec::new();
        let mut generated = Vec::new();
        for id in 0..self.pages.len() {
            if self.pages[id].generated {
                generated.push(PageId(id));
            } else {
                regular.push(PageId(id));
            }
        }
        let lists = PageLists { regular, generated };
        *guard = Some(lists.clone());
        lists
    }

    // ------------------------------------------------------------------------
    // Sections
    // ------------------------------------------------------------------------

    #[inline]
    pub fn section(&self, id: SectionId) -> &Section {
        &self.sections[id.0]
    }

    #[inline]
    pub fn section_mut(&mut self, id: SectionId) -> &mut Section {
        &mut self.sections[id.0]
    }

    pub fn section_by_key(&self, key: &str) -> Option<SectionId> {
        if key.is_empty() {
            return Some(self.root_section);
        }
        self.section_index.get(key).copied()
    }

    /// Get or create the section for a content-relative directory key,
    /// creating intermediate ancestors as needed.
    pub fn ensure_section(&mut self, key: &str) -> SectionId {
        if key.is_empty() {
            return self.root_section;
        }
        if let Some(&id) = self.section_index.get(key) {
            return id;
        }
        let parent_key = match key.rfind('/') {
            Some(pos) => &key[..pos],
            None => "",
        };
        let parent = self.ensure_section(parent_key);
        let id = SectionId(self.sections.len());
        self.sections.push(Section::new(id, key.to_string(), Some(parent)));
        self.sections[parent.0].children.push(id);
        self.section_index.insert(key.to_string(), id);
        id
    }

    pub fn section_ids(&self) -> impl Iterator<Item = SectionId> + '_ {
        (0..self.sections.len()).map(SectionId)
    }

    /// Ancestor chain of a page, nearest-first, resolved lazily through the
    /// section tree rather than stored as pointers.
    pub fn ancestors_of(&self, id: PageId) -> Vec<SectionId> {
        let mut out = Vec::new();
        let mut current = self.pages[id.0].section;
        while let Some(section_id) = current {
            out.push(section_id);
            current = self.sections[section_id.0].parent;
        }
        out
    }

    /// Section title: index page title when set, structural fallback otherwise.
    pub fn section_title(&self, id: SectionId) -> String {
        let section = self.section(id);
        section
            .index_page
            .map(|pid| self.page(pid).title())
            .unwrap_or_else(|| section.default_title())
    }

    /// Regular pages of a section and all descendant sections.
    pub fn regular_pages_recursive(&self, id: SectionId) -> Vec<PageId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(section_id) = stack.pop() {
            let section = self.section(section_id);
            out.extend(section.pages.iter().copied());
            stack.extend(section.children.iter().copied());
        }
        out
    }

    // ------------------------------------------------------------------------
    // URLs
    // ------------------------------------------------------------------------

    /// Absolute URL: baseurl + root-relative url.
    pub fn abs_url(&self, url: &str) -> String {
        let base = self.config.site.baseurl.trim_end_matches('/');
        if base.is_empty() {
            url.to_string()
        } else {
            format!("{base}{url}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::meta::MetaMap;
    use crate::content::page::SourceKey;

    fn test_site() -> Site {
        Site::new(Arc::new(SiteConfig::default()))
    }

    fn make_page(key: &str, generated: bool) -> Page {
        let mut page = Page::new(
            SourceKey::from_rel(key),
            PathBuf::new(),
            MetaMap::new(),
            String::new(),
        );
        page.generated = generated;
        page
    }

    #[test]
    fn page_lists_split_regular_and_generated() {
        let mut site = test_site();
        site.add_page(make_page("a.md", false));
        site.add_page(make_page("b.md", true));
        site.add_page(make_page("c.md", false));

        assert_eq!(site.regular_pages().len(), 2);
        assert_eq!(site.generated_pages().len(), 1);
        // Invariant: pages == regular ⊎ generated
        assert_eq!(
            site.regular_pages().len() + site.generated_pages().len(),
            site.pages.len()
        );
    }

    #[test]
    fn list_cache_invalidated_on_append() {
        let mut site = test_site();
        site.add_page(make_page("a.md", false));
        assert_eq!(site.regular_pages().len(), 1);
        site.add_page(make_page("b.md", false));
        assert_eq!(site.regular_pages().len(), 2);
    }

    #[test]
    fn duplicate_key_replaces() {
        let mut site = test_site();
        let first = site.add_page(make_page("a.md", false));
        let second = site.add_page(make_page("a.md", false));
        assert_eq!(first, second);
        assert_eq!(site.pages.len(), 1);
    }

    #[test]
    fn ensure_section_creates_ancestors() {
        let mut site = test_site();
        let id = site.ensure_section("docs/guide/advanced");
        assert_eq!(site.section(id).key, "docs/guide/advanced");
        assert!(site.section_by_key("docs/guide").is_some());
        assert!(site.section_by_key("docs").is_some());

        let parent = site.section(id).parent.unwrap();
        assert_eq!(site.section(parent).key, "docs/guide");
    }

    #[test]
    fn ancestors_nearest_first() {
        let mut site = test_site();
        let deep = site.ensure_section("docs/guide");
        let pid = site.add_page(make_page("docs/guide/a.md", false));
        site.page_mut(pid).section = Some(deep);

        let ancestors = site.ancestors_of(pid);
        assert_eq!(ancestors.len(), 3); // docs/guide, docs, root
        assert_eq!(site.section(ancestors[0]).key, "docs/guide");
        assert_eq!(site.section(ancestors[2]).key, "");
    }

    #[test]
    fn abs_url_joins_baseurl() {
        let mut config = SiteConfig::default();
        config.site.baseurl = "https://example.com/".to_string();
        let site = Site::new(Arc::new(config));
        assert_eq!(site.abs_url("/docs/a/"), "https://example.com/docs/a/");
    }
}
