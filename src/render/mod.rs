//! The render pipeline: parse → template → postprocess → write, per page.
//!
//! Workers share the site, templates, and cache read-only; everything a
//! page render produces comes back in a [`PageOutput`] and is applied to
//! the cache by the orchestrator after the phase, so concurrently-rendering
//! pages never observe each other's writes.

pub mod context;
pub mod escape;
pub mod highlight;
pub mod markdown;
pub mod template;
pub mod write;
pub mod xref;

use std::sync::LazyLock;
use std::time::Instant;

use parking_lot::RwLock;
use regex::Regex;

use crate::build::output::OutputCollector;
use crate::cache::{BuildCache, ParsedEntry, RenderedEntry};
use crate::config::SiteConfig;
use crate::content::meta::{meta_digest, nav_digest};
use crate::content::{PageId, PageKind, Site, TocEntry};
use crate::core::{ErrorKind, PageError};
use crate::incremental::fingerprint::Fingerprint;
use crate::incremental::{DepKind, Dependency, DependencyTracker};
use crate::utils::hash;

use template::TemplateService;
use xref::XrefIndex;

/// Everything a render worker needs, shared read-only.
pub struct RenderSetup<'a> {
    pub site: &'a Site,
    pub config: &'a SiteConfig,
    pub templates: &'a TemplateService,
    pub xref: &'a XrefIndex,
    pub cache: &'a RwLock<BuildCache>,
    pub tracker: &'a DependencyTracker,
    pub collector: &'a OutputCollector,
}

/// Result of rendering one page; applied to the cache and the page record
/// post-phase.
pub struct PageOutput {
    pub key: String,
    /// New parse entry when the body was (re)parsed.
    pub parsed: Option<ParsedEntry>,
    pub rendered: RenderedEntry,
    pub fingerprint: Option<Fingerprint>,
    /// Parsed body HTML, TOC, and outbound links for the page record.
    pub body_html: String,
    pub toc: Vec<crate::content::TocEntry>,
    pub links: Vec<String>,
    pub warnings: Vec<String>,
    pub duration_ms: u64,
}

/// Render one page end to end.
pub fn render_page(setup: &RenderSetup, id: PageId) -> Result<PageOutput, PageError> {
    let started = Instant::now();
    let page = setup.site.page(id);
    let key = page.key.as_str().to_string();
    let mut warnings = Vec::new();

    // ------------------------------------------------------------------
    // 1. Load source or hit the parsed-content cache.
    // ------------------------------------------------------------------
    let body_digest = hash::hash_str(&page.raw_body).to_hex();
    let meta_dig = meta_digest(&page.meta).to_hex();

    let cached_entry = setup.cache.read().parsed_content.get(&key).cloned();
    let (entry, reparsed) = match cached_entry {
        Some(entry)
            if entry.parser_version == markdown::PARSER_VERSION
                && entry.body_digest == body_digest
                && entry.meta_digest == meta_dig =>
        {
            (entry, false)
        }
        _ => {
            let (rewritten, stash) = escape::extract(&page.raw_body);
            let parsed = markdown::parse(&rewritten);
            let entry = ParsedEntry {
                html: parsed.html,
                toc: parsed.toc,
                links: parsed.links,
                escapes: stash,
                body_digest,
                meta_digest: meta_dig,
                nav_digest: nav_digest(&page.meta).to_hex(),
                cascade_digest: page
                    .cascade()
                    .map(|c| meta_digest(c).to_hex())
                    .unwrap_or_default(),
                parser_version: markdown::PARSER_VERSION,
            };
            (entry, true)
        }
    };

    // ------------------------------------------------------------------
    // 2. Compute the template context.
    // ------------------------------------------------------------------
    setup.tracker.begin_page();

    let template_name = select_template(setup, page.template(), page.kind).ok_or_else(|| {
        PageError {
            key: key.clone(),
            kind: ErrorKind::TemplateRender,
            message: "no template found (tried the kind-specific chain and page.html)".into(),
        }
    })?;

    let closure = setup.templates.dependencies_of(&template_name);
    for name in &closure {
        DependencyTracker::record_current(Dependency::new(DepKind::Template, name.clone()));
    }
    record_cross_version(setup, id);

    let mut body = entry.html.clone();
    if body.contains("<!-- toc -->") {
        body = body.replace("<!-- toc -->", &toc_html(&entry.toc));
    }
    body = rewrite_md_links(&body, setup.site, &key);

    let ctx = context::build_context(setup.site, id, body, &entry.toc);

    // ------------------------------------------------------------------
    // 3. Render the template.
    // ------------------------------------------------------------------
    let html = setup.templates.render(&template_name, ctx).map_err(|err| {
        // Drain the thread-local dep set so the failure does not leak into
        // the next page rendered on this worker.
        let _ = setup.tracker.end_page(&key);
        PageError {
            key: key.clone(),
            kind: err.kind,
            message: err.to_string(),
        }
    })?;

    // ------------------------------------------------------------------
    // 4. Postprocess: cross-refs, escape restore, social-card meta.
    // ------------------------------------------------------------------
    let (html, broken) = xref::resolve_refs(&html, setup.xref);
    for target in broken {
        warnings.push(format!("broken reference [[{target}]]"));
    }
    let html = escape::restore(&html, &entry.escapes);
    let html = inject_og_meta(&html, setup.site, id);

    // ------------------------------------------------------------------
    // 5. Write output atomically; collect dependency digests.
    // ------------------------------------------------------------------
    let body_hash = write::write_page(
        &setup.config.output_dir(),
        &page.output_rel,
        &html,
        setup.collector,
        &key,
    )?;

    let deps = setup.tracker.end_page(&key);
    let mut dep_keys: Vec<String> = deps.iter().map(Dependency::reverse_key).collect();
    dep_keys.sort();

    let rendered = RenderedEntry {
        output_hash: body_hash.to_hex(),
        template_digest: setup.templates.digest_of(&closure),
        dep_digest: hash::hash_strs(dep_keys).to_hex(),
    };

    let fingerprint = if page.generated {
        None
    } else {
        Fingerprint::compute(&page.source)
    };

    let body_html = escape::restore(&entry.html, &entry.escapes);
    let toc = entry.toc.clone();
    let links = entry.links.clone();

    Ok(PageOutput {
        key,
        parsed: reparsed.then_some(entry),
        rendered,
        fingerprint,
        body_html,
        toc,
        links,
        warnings,
        duration_ms: started.elapsed().as_millis() as u64,
    })
}

/// Kind-specific template chain; explicit frontmatter override wins.
fn select_template(
    setup: &RenderSetup,
    explicit: Option<&str>,
    kind: PageKind,
) -> Option<String> {
    if let Some(name) = explicit {
        if setup.templates.template_exists(name) {
            return Some(name.to_string());
        }
    }
    let chain: &[&str] = match kind {
        PageKind::Home => &["index.html", "home.html", "page.html"],
        PageKind::Section => &["section.html", "list.html", "page.html"],
        PageKind::Page => &["page.html", "single.html"],
    };
    setup.templates.first_existing(chain)
}

/// Cross-version sibling edges for versioned docs.
fn record_cross_version(setup: &RenderSetup, id: PageId) {
    let page = setup.site.page(id);
    let Some(version) = &page.version else {
        return;
    };
    let key = page.key.as_str();
    let Some(rest) = key.strip_prefix(&format!("{version}/")) else {
        return;
    };
    for other in &setup.config.versioning.versions {
        if other == version {
            continue;
        }
        let sibling = format!("{other}/{rest}");
        if setup.site.page_by_key(&sibling).is_some() {
            DependencyTracker::record_current(Dependency::new(DepKind::CrossVersion, sibling));
        }
    }
}

/// Rendered table of contents for the `<!-- toc -->` marker.
fn toc_html(toc: &[TocEntry]) -> String {
    if toc.is_empty() {
        return String::new();
    }
    let mut out = String::from("<ul class=\"toc\">");
    for entry in toc {
        out.push_str(&format!(
            "<li class=\"toc-level-{}\"><a href=\"#{}\">{}</a></li>",
            entry.level,
            entry.id,
            crate::utils::html::escape(&entry.title)
        ));
    }
    out.push_str("</ul>");
    out
}

static MD_HREF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"href="([^":]+\.md)""#).expect("md href regex"));

/// Rewrite relative `*.md` links to final page URLs.
fn rewrite_md_links(html: &str, site: &Site, page_key: &str) -> String {
    let dir = match page_key.rfind('/') {
        Some(pos) => &page_key[..pos],
        None => "",
    };
    MD_HREF_RE
        .replace_all(html, |captures: &regex::Captures| {
            let target = &captures[1];
            match resolve_relative_key(dir, target).and_then(|key| site.page_by_key(&key)) {
                Some(id) => format!("href=\"{}\"", site.page(id).url),
                None => captures[0].to_string(),
            }
        })
        .into_owned()
}

/// Join a relative link with the page's directory, resolving `.` and `..`.
fn resolve_relative_key(dir: &str, target: &str) -> Option<String> {
    let target = target.strip_prefix("./").unwrap_or(target);
    let base: Vec<&str> = if target.starts_with('/') {
        Vec::new()
    } else if dir.is_empty() {
        Vec::new()
    } else {
        dir.split('/').collect()
    };
    let mut parts = base;
    for segment in target.trim_start_matches('/').split('/') {
        match segment {
            "." | "" => {}
            ".." => {
                parts.pop()?;
            }
            other => parts.push(other),
        }
    }
    Some(parts.join("/"))
}

/// OpenGraph social-card metadata, injected into `<head>` when present.
fn inject_og_meta(html: &str, site: &Site, id: PageId) -> String {
    let Some(pos) = html.find("</head>") else {
        return html.to_string();
    };
    let page = site.page(id);
    let mut tags = String::new();
    tags.push_str(&format!(
        "<meta property=\"og:title\" content=\"{}\">",
        crate::utils::html::escape_attr(&page.title())
    ));
    if let Some(description) = page.description() {
        tags.push_str(&format!(
            "<meta property=\"og:description\" content=\"{}\">",
            crate::utils::html::escape_attr(description)
        ));
    }
    tags.push_str(&format!(
        "<meta property=\"og:url\" content=\"{}\">",
        crate::utils::html::escape_attr(&site.abs_url(&page.url))
    ));
    if !site.config.site.title.is_empty() {
        tags.push_str(&format!(
            "<meta property=\"og:site_name\" content=\"{}\">",
            crate::utils::html::escape_attr(&site.config.site.title)
        ));
    }

    let mut out = String::with_capacity(html.len() + tags.len());
    out.push_str(&html[..pos]);
    out.push_str(&tags);
    out.push_str(&html[pos..]);
    out
}
