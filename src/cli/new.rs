//! Scaffolding: `new site NAME` and `new page PATH`.

use std::path::Path;

use anyhow::{Context, Result, bail};

use crate::config::{CONFIG_FILE, SiteConfig};

const DEFAULT_CONFIG: &str = r#"[site]
title = "My Site"
baseurl = ""
description = ""
author = ""

[build]
output_dir = "public"

[content]
taxonomies = ["tags"]
"#;

const DEFAULT_PAGE_TEMPLATE: &str = r#"<!doctype html>
<html lang="{{ site.language }}">
<head>
  <meta charset="utf-8">
  <title>{{ page.title }} | {{ site.title }}</title>
</head>
<body>
  <main>
    <h1>{{ page.title }}</h1>
    {{ content }}
  </main>
</body>
</html>
"#;

const DEFAULT_INDEX: &str = r#"---
title: Home
---

Welcome to your new Bengal site.
"#;

/// Scaffold a new site directory.
pub fn new_site(name: &Path) -> Result<()> {
    if name.join(CONFIG_FILE).exists() {
        bail!("{} already contains a {CONFIG_FILE}", name.display());
    }

    for dir in ["content", "templates", "assets", "data"] {
        std::fs::create_dir_all(name.join(dir))
            .with_context(|| format!("cannot create {}/{dir}", name.display()))?;
    }
    std::fs::write(name.join(CONFIG_FILE), DEFAULT_CONFIG)?;
    std::fs::write(name.join("content/index.md"), DEFAULT_INDEX)?;
    std::fs::write(name.join("templates/page.html"), DEFAULT_PAGE_TEMPLATE)?;

    crate::log!("new"; "site scaffolded at {}", name.display());
    crate::log!("new"; "next: cd {} && bengal serve", name.display());
    Ok(())
}

/// Scaffold a new Markdown page with frontmatter.
pub fn new_page(config: &SiteConfig, rel: &Path) -> Result<()> {
    let rel = if rel.extension().is_none() {
        rel.with_extension("md")
    } else {
        rel.to_path_buf()
    };
    let path = config.content_dir().join(&rel);
    if path.exists() {
        bail!("{} already exists", path.display());
    }

    let title = rel
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("untitled")
        .replace(['-', '_'], " ");
    let date = chrono::Local::now().format("%Y-%m-%d");
    let body = format!("---\ntitle: {title}\ndate: {date}\ndraft: true\n---\n\n");

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, body)?;
    crate::log!("new"; "created {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn scaffolded_site_loads_and_builds_shape() {
        let dir = TempDir::new().unwrap();
        let site_dir = dir.path().join("blog");
        new_site(&site_dir).unwrap();

        assert!(site_dir.join("bengal.toml").is_file());
        assert!(site_dir.join("content/index.md").is_file());
        assert!(site_dir.join("templates/page.html").is_file());

        // The generated config must parse cleanly.
        let config = SiteConfig::from_path(&site_dir.join("bengal.toml")).unwrap();
        assert_eq!(config.site.title, "My Site");
    }

    #[test]
    fn scaffold_refuses_existing_site() {
        let dir = TempDir::new().unwrap();
        let site_dir = dir.path().join("blog");
        new_site(&site_dir).unwrap();
        assert!(new_site(&site_dir).is_err());
    }

    #[test]
    fn new_page_writes_frontmatter() {
        let dir = TempDir::new().unwrap();
        let site_dir = dir.path().join("blog");
        new_site(&site_dir).unwrap();
        let config = SiteConfig::from_path(&site_dir.join("bengal.toml")).unwrap();

        new_page(&config, Path::new("docs/getting-started")).unwrap();
        let body =
            std::fs::read_to_string(site_dir.join("content/docs/getting-started.md")).unwrap();
        assert!(body.starts_with("---\ntitle: getting started\n"));
        assert!(body.contains("draft: true"));
    }
}
