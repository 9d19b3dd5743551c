//! Menu trees built from config entries and page frontmatter.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::site::Site;

/// One resolved menu item, exposed to templates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MenuItem {
    pub name: String,
    pub url: String,
    pub weight: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    /// Set per-page at render time when the item's URL matches.
    pub active: bool,
    pub children: Vec<MenuItem>,
}

/// Build menu trees from `[site.menu.*]` config entries plus pages that
/// declare membership in frontmatter (`menu: main`).
pub fn build_menus(site: &mut Site) {
    let mut flat: BTreeMap<String, Vec<MenuItem>> = BTreeMap::new();

    for (menu_name, entries) in &site.config.site.menu {
        let items = flat.entry(menu_name.clone()).or_default();
        for entry in entries {
            items.push(MenuItem {
                name: entry.name.clone(),
                url: entry.url.clone(),
                weight: entry.weight,
                parent: entry.parent.clone(),
                active: false,
                children: Vec::new(),
            });
        }
    }

    for page_id in site.regular_pages() {
        let page = site.page(page_id);
        if let Some((menu_name, weight)) = page.menu() {
            flat.entry(menu_name).or_default().push(MenuItem {
                name: page.title(),
                url: page.url.clone(),
                weight,
                parent: None,
                active: false,
                children: Vec::new(),
            });
        }
    }

    site.menus = flat
        .into_iter()
        .map(|(name, items)| (name, nest(items)))
        .collect();
}

/// Nest items under their parents (matched by name) and sort each level by
/// (weight, name).
fn nest(items: Vec<MenuItem>) -> Vec<MenuItem> {
    let (children, mut roots): (Vec<_>, Vec<_>) =
        items.into_iter().partition(|item| item.parent.is_some());

    for child in children {
        let parent_name = child.parent.clone().unwrap_or_default();
        match roots.iter_mut().find(|r| r.name == parent_name) {
            Some(parent) => parent.children.push(child),
            // Orphaned child: promote to top level.
            None => roots.push(child),
        }
    }

    for root in &mut roots {
        root.children.sort_by(|a, b| (a.weight, &a.name).cmp(&(b.weight, &b.name)));
    }
    roots.sort_by(|a, b| (a.weight, &a.name).cmp(&(b.weight, &b.name)));
    roots
}
