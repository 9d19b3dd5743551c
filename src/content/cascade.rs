//! Cascade propagation: section metadata flowing down to descendant pages.
//!
//! Rules, evaluated from the root downward:
//! 1. Start with an empty effective cascade.
//! 2. At each section, merge the section's own `cascade` on top of the
//!    parent's effective cascade.
//! 3. A page receives a cascade key iff its own frontmatter does not define
//!    that key. Page frontmatter always wins.
//! 4. The root layer is merged from top-level pages that declare `cascade`,
//!    in ascending lexicographic key order (greatest key wins ties); it sits
//!    beneath all section cascades.

use super::meta::{MetaMap, merge_maps};
use super::site::Site;

/// Propagate cascade metadata down the section tree.
pub fn apply_cascade(site: &mut Site) {
    let root_layer = root_cascade(site);
    let root = site.root_section;
    walk(site, root, &root_layer);
}

/// Merge cascades declared by top-level pages (pages of the root section,
/// including its index page), in ascending lexicographic key order.
fn root_cascade(site: &Site) -> MetaMap {
    let root = site.section(site.root_section);
    let mut declaring: Vec<_> = root
        .pages
        .iter()
        .chain(root.index_page.iter())
        .copied()
        .filter(|&pid| site.page(pid).cascade().is_some())
        .collect();
    declaring.sort_by(|a, b| site.page(*a).key.cmp(&site.page(*b).key));

    let mut merged = MetaMap::new();
    for pid in declaring {
        if let Some(cascade) = site.page(pid).cascade() {
            merged = merge_maps(&merged, cascade);
        }
    }
    merged
}

fn walk(site: &mut Site, section_id: super::section::SectionId, inherited: &MetaMap) {
    let effective = {
        let section = site.section(section_id);
        if section.id == site.root_section {
            // Root: top-level page cascades ARE the root layer; the root
            // section's own cascade (from content/index.md) is already in it.
            inherited.clone()
        } else {
            merge_maps(inherited, &section.cascade.clone())
        }
    };

    // Apply to every page in this section, index page included.
    let targets: Vec<_> = {
        let section = site.section(section_id);
        section
            .pages
            .iter()
            .chain(section.index_page.iter())
            .copied()
            .collect()
    };
    for page_id in targets {
        let page = site.page_mut(page_id);
        let mut touched_routes = false;
        for (key, value) in &effective {
            if key == "cascade" {
                continue;
            }
            if !page.meta.contains_key(key) {
                page.meta.insert(key.clone(), value.clone());
                if key == "slug" {
                    touched_routes = true;
                }
            }
        }
        if touched_routes {
            page.refresh_routes();
        }
    }

    let children: Vec<_> = site.section(section_id).children.clone();
    for child in children {
        walk(site, child, &effective);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SiteConfig;
    use crate::content::discover::{discover, finalize_sections};
    use crate::content::meta::MetaValue;
    use crate::core::BuildMode;
    use std::fs;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn cascaded_site(files: &[(&str, &str)]) -> (Site, TempDir) {
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
        apply_cascade(&mut site);
        (site, dir)
    }

    fn meta_str<'s>(site: &'s Site, key: &str, field: &str) -> Option<&'s str> {
        let id = site.page_by_key(key)?;
        site.page(id).meta.get(field).and_then(MetaValue::as_str)
    }

    #[test]
    fn root_cascade_reaches_descendants() {
        let (site, _dir) = cascaded_site(&[
            ("index.md", "---\ncascade:\n  type: doc\n---\n"),
            ("docs/a.md", "---\ntitle: A\n---\n"),
            ("docs/b.md", "---\ntitle: B\ntype: guide\n---\n"),
        ]);
        // Cascaded key lands where undeclared; own frontmatter wins.
        assert_eq!(meta_str(&site, "docs/a.md", "type"), Some("doc"));
        assert_eq!(meta_str(&site, "docs/b.md", "type"), Some("guide"));
        // Index page keeps its own metadata (no `type` injected into cascade holder).
        assert_eq!(meta_str(&site, "index.md", "type"), Some("doc"));
    }

    #[test]
    fn section_cascade_overrides_root() {
        let (site, _dir) = cascaded_site(&[
            ("index.md", "---\ncascade:\n  type: doc\n---\n"),
            ("docs/_index.md", "---\ncascade:\n  type: reference\n---\n"),
            ("docs/a.md", "---\ntitle: A\n---\n"),
            ("top.md", "---\ntitle: Top\n---\n"),
        ]);
        // Nearest ancestor cascade wins.
        assert_eq!(meta_str(&site, "docs/a.md", "type"), Some("reference"));
        // Sibling outside the section gets the root layer.
        assert_eq!(meta_str(&site, "top.md", "type"), Some("doc"));
    }

    #[test]
    fn root_tie_break_is_lexicographic() {
        // Both top-level pages declare `badge`; the greatest key wins.
        let (site, _dir) = cascaded_site(&[
            ("aaa.md", "---\ncascade:\n  badge: from-aaa\n---\n"),
            ("zzz.md", "---\ncascade:\n  badge: from-zzz\n---\n"),
            ("docs/x.md", "---\ntitle: X\n---\n"),
        ]);
        assert_eq!(meta_str(&site, "docs/x.md", "badge"), Some("from-zzz"));
    }

    #[test]
    fn deep_chain_resolves_nearest_ancestor() {
        let mut files: Vec<(String, String)> = Vec::new();
        files.push(("index.md".into(), "---\ncascade:\n  depth: root\n---\n".into()));
        let mut dir_path = String::new();
        for level in 0..10 {
            if !dir_path.is_empty() {
                dir_path.push('/');
            }
            dir_path.push_str(&format!("l{level}"));
            files.push((
                format!("{dir_path}/page.md"),
                "---\ntitle: P\n---\n".to_string(),
            ));
        }
        // Override at level 5.
        files.push((
            "l0/l1/l2/l3/l4/l5/_index.md".into(),
            "---\ncascade:\n  depth: five\n---\n".into(),
        ));
        let refs: Vec<(&str, &str)> = files.iter().map(|(a, b)| (a.as_str(), b.as_str())).collect();
        let (site, _dir) = cascaded_site(&refs);

        assert_eq!(meta_str(&site, "l0/l1/page.md", "depth"), Some("root"));
        assert_eq!(
            meta_str(&site, "l0/l1/l2/l3/l4/l5/l6/page.md", "depth"),
            Some("five")
        );
    }

    #[test]
    fn cascade_key_itself_not_propagated() {
        let (site, _dir) = cascaded_site(&[
            ("index.md", "---\ncascade:\n  type: doc\n---\n"),
            ("docs/a.md", "---\ntitle: A\n---\n"),
        ]);
        let id = site.page_by_key("docs/a.md").unwrap();
        assert!(!site.page(id).meta.contains_key("cascade"));
    }
}
