//! Alias redirect stubs.
//!
//! Pages can declare `aliases: [/old-url/]`; each alias gets a small HTML
//! stub that meta-refreshes to the canonical URL.

use anyhow::Result;
use std::path::PathBuf;

use crate::build::output::{OutputCollector, OutputKind};
use crate::content::Site;
use crate::utils::atomic::write_atomic;
use crate::utils::hash;

/// Write a redirect stub for every declared alias.
///
/// Returns the number of stubs written.
pub fn write_redirects(site: &Site, collector: &OutputCollector) -> Result<usize> {
    let output_dir = site.config.output_dir();
    let mut written = 0;

    for id in site.page_ids() {
        let page = site.page(id);
        for alias in page.aliases() {
            let Some(rel) = alias_output_rel(&alias) else {
                crate::log!("warn"; "ignoring invalid alias {alias:?} on {}", page.key);
                continue;
            };
            let target = site.abs_url(&page.url);
            let html = redirect_html(&target);
            write_atomic(&output_dir.join(&rel), html.as_bytes())?;
            collector.record(&rel, OutputKind::Html, hash::hash_str(&html));
            written += 1;
        }
    }
    Ok(written)
}

/// `/old/post/` → `old/post/index.html`.
fn alias_output_rel(alias: &str) -> Option<PathBuf> {
    let trimmed = alias.trim().trim_matches('/');
    if trimmed.is_empty() || trimmed.contains("..") {
        return None;
    }
    Some(PathBuf::from(trimmed).join("index.html"))
}

fn redirect_html(target: &str) -> String {
    let escaped = crate::utils::html::escape_attr(target);
    format!(
        "<!doctype html><html><head><meta charset=\"utf-8\">\
         <meta http-equiv=\"refresh\" content=\"0; url={escaped}\">\
         <link rel=\"canonical\" href=\"{escaped}\">\
         </head><body><a href=\"{escaped}\">Redirecting…</a></body></html>"
    )
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
    fn alias_stub_written() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("content")).unwrap();
        fs::write(
            dir.path().join("content/post.md"),
            "---\ntitle: Post\naliases: [/legacy/post/]\n---\n",
        )
        .unwrap();

        let mut config = SiteConfig::default();
        config.root = dir.path().to_path_buf();
        let config = Arc::new(config);
        let (mut site, _) = discover(&config, BuildMode::Production).unwrap();
        finalize_sections(&mut site);

        let collector = OutputCollector::new();
        let written = write_redirects(&site, &collector).unwrap();
        assert_eq!(written, 1);

        let html = fs::read_to_string(dir.path().join("public/legacy/post/index.html")).unwrap();
        assert!(html.contains("url=/post/"));
        assert!(html.contains("canonical"));
    }

    #[test]
    fn invalid_aliases_skipped() {
        assert!(alias_output_rel("/ok/path/").is_some());
        assert!(alias_output_rel("").is_none());
        assert!(alias_output_rel("/../escape/").is_none());
    }
}
