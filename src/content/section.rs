//! Section tree: named groupings of pages.

use super::meta::MetaMap;
use super::page::PageId;

/// Arena index of a section within `Site::sections`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SectionId(pub usize);

/// A named grouping of pages organized as a tree.
///
/// The root section exists implicitly with an empty key. After section
/// finalization every section has exactly one index page.
#[derive(Debug, Clone)]
pub struct Section {
    pub id: SectionId,
    /// Directory name; empty for the root section.
    pub name: String,
    /// Content-relative directory path (`""`, `"docs"`, `"docs/guide"`).
    pub key: String,
    pub parent: Option<SectionId>,
    /// Ordered child sections.
    pub children: Vec<SectionId>,
    /// Ordered regular (non-index) pages.
    pub pages: Vec<PageId>,
    /// Required non-null after section finalization.
    pub index_page: Option<PageId>,
    /// This section's own `cascade` metadata (from its index page).
    pub cascade: MetaMap,
}

impl Section {
    pub fn new(id: SectionId, key: String, parent: Option<SectionId>) -> Self {
        let name = key.rsplit('/').next().unwrap_or("").to_string();
        Self {
            id,
            name,
            key,
            parent,
            children: Vec::new(),
            pages: Vec::new(),
            index_page: None,
            cascade: MetaMap::new(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.key.is_empty()
    }

    /// Display title: index page title wins, handled at the site level;
    /// this is the structural fallback.
    pub fn default_title(&self) -> String {
        if self.is_root() {
            "Home".to_string()
        } else {
            self.name.replace(['-', '_'], " ")
        }
    }

    /// Root-relative URL of the section with trailing slash.
    pub fn url(&self) -> String {
        if self.key.is_empty() {
            "/".to_string()
        } else {
            format!("/{}/", self.key)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_section_url() {
        let root = Section::new(SectionId(0), String::new(), None);
        assert!(root.is_root());
        assert_eq!(root.url(), "/");
        assert_eq!(root.default_title(), "Home");
    }

    #[test]
    fn nested_section_name_and_url() {
        let section = Section::new(SectionId(1), "docs/user-guide".to_string(), Some(SectionId(0)));
        assert_eq!(section.name, "user-guide");
        assert_eq!(section.url(), "/docs/user-guide/");
        assert_eq!(section.default_title(), "user guide");
    }
}
