//! Site configuration management for `bengal.toml`.
//!
//! | Section        | Purpose                                         |
//! |----------------|-------------------------------------------------|
//! | `[site]`       | Site identity (title, baseurl, author, menus)   |
//! | `[build]`      | Output dir, parallelism, incremental, strict    |
//! | `[content]`    | Content/data dirs, extra watch roots            |
//! | `[assets]`     | Asset dir, fingerprinting, minification         |
//! | `[theme]`      | Theme name and template directories             |
//! | `[serve]`      | Development server (host, port, watch, timeout) |
//! | `[autodoc]`    | Documentation extractor commands                |
//! | `[versioning]` | Multi-version docs                              |

pub mod section;

pub use section::{
    AssetsSection, AutodocSection, BuildSection, ContentSection, IncrementalMode, MenuEntry,
    ServeSection, SiteSection, ThemeSection, VersioningSection,
};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use crate::core::{Diagnostic, ErrorKind};
use crate::utils::hash;

/// Default config file name.
pub const CONFIG_FILE: &str = "bengal.toml";

/// Cache root directory name under the site root.
pub const STATE_DIR: &str = ".bengal";

// ============================================================================
// root configuration
// ============================================================================

/// Root configuration structure representing bengal.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SiteConfig {
    /// Absolute path to the config file (internal use only)
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Project root directory - parent of config file (internal use only)
    #[serde(skip)]
    pub root: PathBuf,

    #[serde(default)]
    pub site: SiteSection,

    #[serde(default)]
    pub build: BuildSection,

    #[serde(default)]
    pub content: ContentSection,

    #[serde(default)]
    pub assets: AssetsSection,

    #[serde(default)]
    pub theme: ThemeSection,

    #[serde(default)]
    pub serve: ServeSection,

    #[serde(default)]
    pub autodoc: AutodocSection,

    #[serde(default)]
    pub versioning: VersioningSection,
}

impl SiteConfig {
    /// Load configuration from an explicit config file path.
    pub fn from_path(config_path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(config_path).with_context(|| {
            Diagnostic::new(
                ErrorKind::Config,
                format!("cannot read config file {}", config_path.display()),
            )
            .with_hint("run 'bengal new site NAME' to scaffold a project")
        })?;

        let mut config: SiteConfig = toml::from_str(&raw).map_err(|e| {
            anyhow::Error::new(
                Diagnostic::new(ErrorKind::Config, e.to_string())
                    .with_path(config_path)
                    .with_hint("check bengal.toml against the documented sections"),
            )
        })?;

        config.config_path = crate::utils::normalize_path(config_path);
        config.root = config
            .config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        config.validate()?;
        Ok(config)
    }

    /// Search upward from `start` for the config file, then load it.
    pub fn discover(start: &Path) -> Result<Self> {
        let mut dir = Some(start.to_path_buf());
        while let Some(current) = dir {
            let candidate = current.join(CONFIG_FILE);
            if candidate.is_file() {
                return Self::from_path(&candidate);
            }
            dir = current.parent().map(Path::to_path_buf);
        }
        bail!(
            Diagnostic::new(
                ErrorKind::Config,
                format!("no {CONFIG_FILE} found in {} or any parent", start.display()),
            )
            .with_hint("run 'bengal new site NAME' to create a project")
        )
    }

    /// Validation pass: paths must not escape the root, ports must be sane.
    fn validate(&self) -> Result<()> {
        for (label, dir) in [
            ("content.dir", &self.content.dir),
            ("content.data_dir", &self.content.data_dir),
            ("assets.dir", &self.assets.dir),
            ("theme.templates_dir", &self.theme.templates_dir),
            ("build.output_dir", &self.build.output_dir),
        ] {
            if dir.is_absolute() || dir.components().any(|c| matches!(c, std::path::Component::ParentDir)) {
                bail!(
                    Diagnostic::new(
                        ErrorKind::Config,
                        format!("{label} must be a relative path inside the project"),
                    )
                    .with_path(&self.config_path)
                );
            }
        }
        if self.versioning.enabled && self.versioning.versions.is_empty() {
            bail!(
                Diagnostic::new(
                    ErrorKind::Config,
                    "versioning.enabled is set but versioning.versions is empty",
                )
                .with_path(&self.config_path)
                .with_hint("list the version directories, e.g. versions = [\"v1\", \"v2\"]")
            );
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Path accessors (all absolute)
    // ------------------------------------------------------------------------

    pub fn root_join(&self, rel: impl AsRef<Path>) -> PathBuf {
        self.root.join(rel)
    }

    pub fn content_dir(&self) -> PathBuf {
        self.root.join(&self.content.dir)
    }

    pub fn data_dir(&self) -> PathBuf {
        self.root.join(&self.content.data_dir)
    }

    pub fn assets_dir(&self) -> PathBuf {
        self.root.join(&self.assets.dir)
    }

    pub fn templates_dir(&self) -> PathBuf {
        self.root.join(&self.theme.templates_dir)
    }

    /// Theme template directory (`themes/<name>/templates`), if a theme is set.
    pub fn theme_templates_dir(&self) -> Option<PathBuf> {
        self.theme
            .name
            .as_deref()
            .map(|name| self.root.join("themes").join(name).join("templates"))
    }

    pub fn output_dir(&self) -> PathBuf {
        self.root.join(&self.build.output_dir)
    }

    pub fn state_dir(&self) -> PathBuf {
        self.root.join(STATE_DIR)
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.state_dir().join("cache")
    }

    pub fn cache_file(&self) -> PathBuf {
        self.cache_dir().join("buildcache.bin")
    }

    pub fn compiled_templates_dir(&self) -> PathBuf {
        self.cache_dir().join("templates")
    }

    pub fn swizzle_registry_path(&self) -> PathBuf {
        self.state_dir().join("themes").join("sources.json")
    }

    /// Directory holding generated virtual-page sources (autodoc output).
    pub fn generated_dir(&self) -> PathBuf {
        self.state_dir().join("generated")
    }

    /// All roots the dev-server watcher observes.
    pub fn watch_roots(&self) -> Vec<PathBuf> {
        let mut roots = vec![
            self.content_dir(),
            self.templates_dir(),
            self.assets_dir(),
            self.data_dir(),
            self.config_path.clone(),
        ];
        if let Some(theme) = self.theme_templates_dir() {
            roots.push(theme);
        }
        for extra in &self.content.watch_paths {
            roots.push(self.root.join(extra));
        }
        roots.retain(|p| p.exists());
        roots
    }

    /// Stable hash of the effective configuration.
    ///
    /// Any difference forces a full rebuild.
    pub fn config_hash(&self) -> String {
        let serialized = serde_json::to_string(self).unwrap_or_default();
        hash::hash_str(&serialized).to_hex()
    }
}

// ============================================================================
// global handle
// ============================================================================

static CONFIG: LazyLock<ArcSwap<SiteConfig>> =
    LazyLock::new(|| ArcSwap::from_pointee(SiteConfig::default()));

/// Install the loaded config as the process-wide handle and return it.
pub fn init_config(config: SiteConfig) -> Arc<SiteConfig> {
    let arc = Arc::new(config);
    CONFIG.store(arc.clone());
    arc
}

/// Get the current global config.
pub fn cfg() -> Arc<SiteConfig> {
    CONFIG.load_full()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_config(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join(CONFIG_FILE);
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn load_minimal_config() {
        let dir = TempDir::new().unwrap();
        let path = write_config(dir.path(), "[site]\ntitle = \"Test\"\n");
        let config = SiteConfig::from_path(&path).unwrap();
        assert_eq!(config.site.title, "Test");
        assert_eq!(config.build.output_dir, PathBuf::from("public"));
        assert!(config.build.parallel);
    }

    #[test]
    fn unknown_key_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write_config(dir.path(), "[site]\ntitle = \"x\"\nbogus = 1\n");
        assert!(SiteConfig::from_path(&path).is_err());
    }

    #[test]
    fn absolute_output_dir_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write_config(dir.path(), "[build]\noutput_dir = \"/tmp/out\"\n");
        assert!(SiteConfig::from_path(&path).is_err());
    }

    #[test]
    fn discover_walks_upward() {
        let dir = TempDir::new().unwrap();
        write_config(dir.path(), "[site]\ntitle = \"Up\"\n");
        let nested = dir.path().join("content/docs");
        fs::create_dir_all(&nested).unwrap();
        let config = SiteConfig::discover(&nested).unwrap();
        assert_eq!(config.site.title, "Up");
    }

    #[test]
    fn config_hash_changes_with_content() {
        let dir = TempDir::new().unwrap();
        let path = write_config(dir.path(), "[site]\ntitle = \"A\"\n");
        let a = SiteConfig::from_path(&path).unwrap().config_hash();
        write_config(dir.path(), "[site]\ntitle = \"B\"\n");
        let b = SiteConfig::from_path(&path).unwrap().config_hash();
        assert_ne!(a, b);
    }

    #[test]
    fn versioning_requires_versions() {
        let dir = TempDir::new().unwrap();
        let path = write_config(dir.path(), "[versioning]\nenabled = true\n");
        assert!(SiteConfig::from_path(&path).is_err());
    }
}
