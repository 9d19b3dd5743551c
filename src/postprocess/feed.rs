//! RSS 2.0 feed generation (`feed.xml`).

use anyhow::{Result, anyhow};
use chrono::{NaiveDate, TimeZone, Utc};
use rss::{ChannelBuilder, GuidBuilder, ItemBuilder, validation::Validate};

use crate::build::output::{OutputCollector, OutputKind};
use crate::content::Site;
use crate::utils::atomic::write_atomic;
use crate::utils::hash;

/// Build and write the RSS 2.0 feed.
///
/// Items are the site's dated regular pages, newest first. Publication
/// dates come from frontmatter, never the wall clock.
pub fn build_feed(site: &Site, collector: &OutputCollector) -> Result<()> {
    let mut dated: Vec<_> = site
        .regular_pages()
        .into_iter()
        .map(|id| site.page(id))
        .filter(|page| !page.draft())
        .filter_map(|page| page.date().map(|date| (date, page)))
        .collect();
    dated.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.key.cmp(&b.1.key)));

    let items: Vec<rss::Item> = dated
        .iter()
        .map(|(date, page)| {
            let link = site.abs_url(&page.url);
            ItemBuilder::default()
                .title(Some(page.title()))
                .link(Some(link.clone()))
                .guid(GuidBuilder::default().permalink(true).value(link).build())
                .description(page.description().map(str::to_string))
                .pub_date(Some(to_rfc2822(*date)))
                .build()
        })
        .collect();

    let channel = ChannelBuilder::default()
        .title(&site.config.site.title)
        .link(site.abs_url("/"))
        .description(&site.config.site.description)
        .language(Some(site.config.site.language.clone()))
        .generator(Some("bengal".to_string()))
        .items(items)
        .build();

    channel
        .validate()
        .map_err(|e| anyhow!("RSS validation failed: {e}"))?;
    let xml = channel.to_string();

    let rel = std::path::Path::new("feed.xml");
    write_atomic(&site.config.output_dir().join(rel), xml.as_bytes())?;
    collector.record(rel, OutputKind::Other, hash::hash_str(&xml));
    Ok(())
}

/// Frontmatter date (midnight UTC) in RFC 2822 for `pubDate`.
fn to_rfc2822(date: NaiveDate) -> String {
    let datetime = date.and_hms_opt(0, 0, 0).unwrap_or_default();
    Utc.from_utc_datetime(&datetime).to_rfc2822()
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

    #[test]
    fn feed_lists_dated_pages_newest_first() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("content")).unwrap();
        fs::write(
            dir.path().join("content/old.md"),
            "---\ntitle: Old Post\ndate: 2024-01-01\ndescription: First\n---\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("content/new.md"),
            "---\ntitle: New Post\ndate: 2024-06-01\ndescription: Second\n---\n",
        )
        .unwrap();
        fs::write(dir.path().join("content/undated.md"), "---\ntitle: No Date\n---\n").unwrap();

        let mut config = SiteConfig::default();
        config.root = dir.path().to_path_buf();
        config.site.title = "Feed Test".to_string();
        config.site.baseurl = "https://example.com".to_string();
        config.site.description = "A test".to_string();
        let config = Arc::new(config);
        let (mut site, _) = discover(&config, BuildMode::Production).unwrap();
        finalize_sections(&mut site);

        let collector = OutputCollector::new();
        build_feed(&site, &collector).unwrap();

        let xml = fs::read_to_string(dir.path().join("public/feed.xml")).unwrap();
        assert!(xml.contains("<title>Feed Test</title>"));
        assert!(xml.contains("New Post"));
        assert!(xml.contains("Old Post"));
        assert!(!xml.contains("No Date"));
        // Newest first.
        assert!(xml.find("New Post").unwrap() < xml.find("Old Post").unwrap());
        assert_eq!(collector.records().len(), 1);
    }

    #[test]
    fn rfc2822_from_frontmatter_date() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let formatted = to_rfc2822(date);
        assert!(formatted.contains("Mar 2024"));
        assert!(formatted.contains("+0000"));
    }
}
