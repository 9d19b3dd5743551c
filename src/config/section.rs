//! Configuration section definitions.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ============================================================================
// [site]
// ============================================================================

/// Site-wide identity, injected into every template context.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteSection {
    pub title: String,
    /// Absolute base URL (e.g. `https://example.com`); empty means root-relative.
    pub baseurl: String,
    pub language: String,
    pub description: String,
    pub author: String,
    /// Configured menus: menu name → entries. Pages can join a menu from
    /// frontmatter as well.
    pub menu: std::collections::BTreeMap<String, Vec<MenuEntry>>,
}

impl Default for SiteSection {
    fn default() -> Self {
        Self {
            title: String::new(),
            baseurl: String::new(),
            language: "en".to_string(),
            description: String::new(),
            author: String::new(),
            menu: std::collections::BTreeMap::new(),
        }
    }
}

/// A configured menu entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MenuEntry {
    pub name: String,
    pub url: String,
    pub weight: i64,
    /// Name of the parent entry for nested menus.
    pub parent: Option<String>,
}

impl Default for MenuEntry {
    fn default() -> Self {
        Self {
            name: String::new(),
            url: String::new(),
            weight: 0,
            parent: None,
        }
    }
}

// ============================================================================
// [build]
// ============================================================================

/// Incremental build behavior: `auto` uses the cache when present and valid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IncrementalMode {
    #[default]
    Auto,
    Always,
    Never,
}

impl IncrementalMode {
    /// Coercion from a CLI `--incremental` boolean.
    pub const fn from_flag(flag: bool) -> Self {
        if flag { Self::Always } else { Self::Never }
    }
}

// Config accepts `incremental = true/false` as well as `"auto"`.
impl<'de> Deserialize<'de> for IncrementalMode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct ModeVisitor;

        impl serde::de::Visitor<'_> for ModeVisitor {
            type Value = IncrementalMode;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str("a boolean or \"auto\"")
            }

            fn visit_bool<E: serde::de::Error>(self, value: bool) -> Result<Self::Value, E> {
                Ok(IncrementalMode::from_flag(value))
            }

            fn visit_str<E: serde::de::Error>(self, value: &str) -> Result<Self::Value, E> {
                match value {
                    "auto" => Ok(IncrementalMode::Auto),
                    "always" => Ok(IncrementalMode::Always),
                    "never" => Ok(IncrementalMode::Never),
                    other => Err(E::unknown_variant(other, &["auto", "always", "never"])),
                }
            }
        }

        deserializer.deserialize_any(ModeVisitor)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BuildSection {
    pub output_dir: PathBuf,
    /// Use the rayon worker pool for rendering and assets.
    pub parallel: bool,
    pub incremental: IncrementalMode,
    /// Elevate per-page errors to a non-zero exit code.
    pub strict: bool,
    /// Persist compiled templates across builds.
    pub cache_templates: bool,
    /// Include draft pages.
    pub drafts: bool,
}

impl Default for BuildSection {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("public"),
            parallel: true,
            incremental: IncrementalMode::Auto,
            strict: false,
            cache_templates: true,
            drafts: false,
        }
    }
}

// ============================================================================
// [content]
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ContentSection {
    pub dir: PathBuf,
    pub data_dir: PathBuf,
    /// Additional watch roots for the dev server.
    pub watch_paths: Vec<PathBuf>,
    /// Taxonomy names collected from frontmatter (term lists generated for each).
    pub taxonomies: Vec<String>,
}

impl Default for ContentSection {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("content"),
            data_dir: PathBuf::from("data"),
            watch_paths: Vec::new(),
            taxonomies: vec!["tags".to_string()],
        }
    }
}

// ============================================================================
// [assets]
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AssetsSection {
    pub dir: PathBuf,
    /// Emit content-hash filenames (`style.3f2a1b4c.css`).
    pub fingerprint: bool,
    /// Whitespace-safe minification of CSS/JS on copy.
    pub minify: bool,
}

impl Default for AssetsSection {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("assets"),
            fingerprint: true,
            minify: false,
        }
    }
}

// ============================================================================
// [theme]
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ThemeSection {
    /// Theme identifier under `themes/`.
    pub name: Option<String>,
    /// Project template directory; overrides theme templates by name.
    pub templates_dir: PathBuf,
}

impl Default for ThemeSection {
    fn default() -> Self {
        Self {
            name: None,
            templates_dir: PathBuf::from("templates"),
        }
    }
}

// ============================================================================
// [serve]
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServeSection {
    pub host: String,
    pub port: u16,
    /// Open a browser after the first successful build.
    pub open: bool,
    pub watch: bool,
    /// Debounce window for batched watcher events.
    pub debounce_ms: u64,
    /// Liveness timeout for stuck subprocess builds.
    pub build_timeout_secs: u64,
}

impl Default for ServeSection {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            open: false,
            watch: true,
            debounce_ms: 100,
            build_timeout_secs: 120,
        }
    }
}

// ============================================================================
// [autodoc]
// ============================================================================

/// One documentation extractor: an external command whose output lands under
/// `.bengal/generated/` and is discovered as autodoc pages.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Extractor {
    /// Command and arguments, run from the project root.
    pub command: Vec<String>,
    /// Output subdirectory under `.bengal/generated/`.
    pub output: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AutodocSection {
    /// Export `xref.json` alongside the built site.
    pub export_xref: bool,
    pub python: Option<Extractor>,
    pub api: Option<Extractor>,
    pub cli: Option<Extractor>,
}

impl AutodocSection {
    pub fn extractor(&self, kind: &str) -> Option<&Extractor> {
        match kind {
            "python" => self.python.as_ref(),
            "api" => self.api.as_ref(),
            "cli" => self.cli.as_ref(),
            _ => None,
        }
    }
}

// ============================================================================
// [versioning]
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VersioningSection {
    pub enabled: bool,
    /// Top-level content directories that are version roots, e.g. `["v1", "v2"]`.
    pub versions: Vec<String>,
    /// The version presented as current in the xref index.
    pub current: Option<String>,
}

impl VersioningSection {
    /// The version a content-relative key belongs to, if any.
    pub fn version_of(&self, key: &str) -> Option<&str> {
        if !self.enabled {
            return None;
        }
        let head = key.split('/').next()?;
        self.versions.iter().find(|v| v.as_str() == head).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sensible() {
        let build = BuildSection::default();
        assert_eq!(build.output_dir, PathBuf::from("public"));
        assert!(build.cache_templates);
        assert_eq!(build.incremental, IncrementalMode::Auto);

        let serve = ServeSection::default();
        assert_eq!(serve.debounce_ms, 100);
        assert_eq!(serve.build_timeout_secs, 120);
    }

    #[test]
    fn incremental_from_flag() {
        assert_eq!(IncrementalMode::from_flag(true), IncrementalMode::Always);
        assert_eq!(IncrementalMode::from_flag(false), IncrementalMode::Never);
    }

    #[test]
    fn incremental_accepts_bool_or_auto() {
        #[derive(Deserialize)]
        struct Wrapper {
            incremental: IncrementalMode,
        }
        let from_bool: Wrapper = toml::from_str("incremental = false").unwrap();
        assert_eq!(from_bool.incremental, IncrementalMode::Never);
        let from_str: Wrapper = toml::from_str("incremental = \"auto\"").unwrap();
        assert_eq!(from_str.incremental, IncrementalMode::Auto);
        assert!(toml::from_str::<Wrapper>("incremental = \"bogus\"").is_err());
    }

    #[test]
    fn version_of_resolves_head_segment() {
        let versioning = VersioningSection {
            enabled: true,
            versions: vec!["v1".into(), "v2".into()],
            current: Some("v2".into()),
        };
        assert_eq!(versioning.version_of("v1/guide/a.md"), Some("v1"));
        assert_eq!(versioning.version_of("docs/a.md"), None);
    }

    #[test]
    fn version_of_disabled_is_none() {
        let versioning = VersioningSection::default();
        assert_eq!(versioning.version_of("v1/a.md"), None);
    }
}
