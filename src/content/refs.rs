//! Navigation references: next/prev globally and within sections.

use super::page::{PageId, page_order_key};
use super::site::Site;

/// Attach next/prev neighbors.
///
/// Global order is (section key, weight, date desc, title, key) over regular
/// pages; section order is the section's finalized page list. Accessors are
/// total: pages at the ends get `None`.
pub fn setup_references(site: &mut Site) {
    // Global chain over regular, non-index pages.
    let mut global: Vec<PageId> = site
        .regular_pages()
        .into_iter()
        .filter(|&pid| {
            let page = site.page(pid);
            page.section
                .map(|sid| site.section(sid).index_page != Some(pid))
                .unwrap_or(true)
        })
        .collect();
    global.sort_by_key(|&pid| {
        let page = site.page(pid);
        let section_key = page
            .section
            .map(|sid| site.section(sid).key.clone())
            .unwrap_or_default();
        (section_key, page_order_key(page))
    });

    for window in 0..global.len() {
        let prev = window.checked_sub(1).map(|i| global[i]);
        let next = global.get(window + 1).copied();
        let page = site.page_mut(global[window]);
        page.prev = prev;
        page.next = next;
    }

    // Section-local chains follow the section's ordered page list.
    for section_id in site.section_ids().collect::<Vec<_>>() {
        let pages = site.section(section_id).pages.clone();
        for idx in 0..pages.len() {
            let prev = idx.checked_sub(1).map(|i| pages[i]);
            let next = pages.get(idx + 1).copied();
            let page = site.page_mut(pages[idx]);
            page.prev_in_section = prev;
            page.next_in_section = next;
        }
    }
}
