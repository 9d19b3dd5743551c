//! Sitemap generation (sitemaps.org schema).

use anyhow::Result;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};

use crate::build::output::{OutputCollector, OutputKind};
use crate::content::Site;
use crate::utils::atomic::write_atomic;
use crate::utils::hash;

const SITEMAP_NS: &str = "http://www.sitemaps.org/schemas/sitemap/0.9";

/// Build and write `sitemap.xml`.
pub fn build_sitemap(site: &Site, collector: &OutputCollector) -> Result<()> {
    let xml = render_xml(&collect_entries(site))?;
    let rel = std::path::Path::new("sitemap.xml");
    write_atomic(&site.config.output_dir().join(rel), &xml)?;
    collector.record(rel, OutputKind::Other, hash::hash_bytes(&xml));
    Ok(())
}

/// `(absolute URL, optional lastmod)` per listed page, URL-sorted for
/// stable output across builds.
fn collect_entries(site: &Site) -> Vec<(String, Option<String>)> {
    let mut entries: Vec<_> = site
        .page_ids()
        .map(|id| site.page(id))
        .filter(|page| !page.draft() && page.url != "/404.html")
        .map(|page| (site.abs_url(&page.url), page.date_raw().map(str::to_string)))
        .collect();
    entries.sort();
    entries
}

/// Serialize through quick-xml events; text nodes are entity-escaped by
/// the writer.
fn render_xml(entries: &[(String, Option<String>)]) -> Result<Vec<u8>> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let mut urlset = BytesStart::new("urlset");
    urlset.push_attribute(("xmlns", SITEMAP_NS));
    writer.write_event(Event::Start(urlset))?;

    for (loc, lastmod) in entries {
        writer.write_event(Event::Start(BytesStart::new("url")))?;
        text_element(&mut writer, "loc", loc)?;
        if let Some(lastmod) = lastmod {
            text_element(&mut writer, "lastmod", lastmod)?;
        }
        writer.write_event(Event::End(BytesEnd::new("url")))?;
    }

    writer.write_event(Event::End(BytesEnd::new("urlset")))?;
    let mut xml = writer.into_inner();
    xml.push(b'\n');
    Ok(xml)
}

fn text_element(writer: &mut Writer<Vec<u8>>, name: &str, text: &str) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
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

    fn sitemap_for(baseurl: &str, files: &[(&str, &str)]) -> (String, TempDir, usize) {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("content")).unwrap();
        for (rel, body) in files {
            fs::write(dir.path().join("content").join(rel), body).unwrap();
        }
        let mut config = SiteConfig::default();
        config.root = dir.path().to_path_buf();
        config.site.baseurl = baseurl.to_string();
        let config = Arc::new(config);
        let (mut site, _) = discover(&config, BuildMode::Production).unwrap();
        finalize_sections(&mut site);

        let collector = OutputCollector::new();
        build_sitemap(&site, &collector).unwrap();
        let xml = fs::read_to_string(dir.path().join("public/sitemap.xml")).unwrap();
        (xml, dir, collector.records().len())
    }

    #[test]
    fn sitemap_lists_pages_with_lastmod() {
        let (xml, _dir, records) = sitemap_for(
            "https://example.com",
            &[
                ("index.md", "---\ntitle: Home\ndate: 2024-01-01\n---\n"),
                ("about.md", "---\ntitle: About\n---\n"),
            ],
        );
        assert!(xml.contains("<urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">"));
        assert!(xml.contains("<loc>https://example.com/</loc>"));
        assert!(xml.contains("<loc>https://example.com/about/</loc>"));
        assert!(xml.contains("<lastmod>2024-01-01</lastmod>"));
        assert_eq!(records, 1);
    }

    #[test]
    fn urls_are_entity_escaped() {
        let (xml, _dir, _) = sitemap_for(
            "https://example.com/?lang=en&x=1",
            &[("index.md", "---\ntitle: Home\n---\n")],
        );
        assert!(xml.contains("&amp;x=1"));
        assert!(!xml.contains("&x=1</loc>"));
    }

    #[test]
    fn entries_sorted_and_drafts_excluded() {
        let entries = vec![
            ("https://e.com/z/".to_string(), None),
            ("https://e.com/a/".to_string(), Some("2024-01-01".to_string())),
        ];
        let mut sorted = entries.clone();
        sorted.sort();
        assert_eq!(sorted[0].0, "https://e.com/a/");

        let xml = String::from_utf8(render_xml(&sorted).unwrap()).unwrap();
        assert!(xml.find("/a/").unwrap() < xml.find("/z/").unwrap());
    }
}
