//! Swizzling: copy a theme template into the project for customization,
//! with a provenance registry enabling safe upstream updates.
//!
//! Registry: `.bengal/themes/sources.json`, an array of records
//! `{target, source, theme, upstream_checksum, local_checksum, timestamp}`;
//! both checksums are SHA-256.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::config::SiteConfig;
use crate::core::{Diagnostic, ErrorKind};
use crate::utils::atomic::write_atomic;
use crate::utils::hash::sha256_file;

/// One swizzled template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwizzleRecord {
    /// Project-relative path of the copied template.
    pub target: String,
    /// Absolute path of the theme template it came from.
    pub source: String,
    pub theme: String,
    /// SHA-256 of the upstream template at swizzle/update time.
    pub upstream_checksum: String,
    /// SHA-256 of the local copy at swizzle/update time.
    pub local_checksum: String,
    /// ISO-8601 UTC timestamp of the last copy.
    pub timestamp: String,
}

/// Update state of a swizzled template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwizzleState {
    /// Local copy matches the recorded upstream, which is unchanged.
    UpToDate,
    /// Upstream changed; local copy is pristine, safe to update.
    UpstreamChanged,
    /// Local copy was edited; updates will not touch it.
    LocallyModified,
    /// The upstream template no longer exists.
    UpstreamMissing,
}

impl SwizzleState {
    pub const fn label(self) -> &'static str {
        match self {
            Self::UpToDate => "up-to-date",
            Self::UpstreamChanged => "upstream-changed",
            Self::LocallyModified => "locally-modified",
            Self::UpstreamMissing => "upstream-missing",
        }
    }
}

fn load_registry(path: &Path) -> Result<Vec<SwizzleRecord>> {
    match std::fs::read_to_string(path) {
        Ok(raw) => Ok(serde_json::from_str(&raw)
            .with_context(|| format!("swizzle registry {} is corrupt", path.display()))?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(e).context("cannot read swizzle registry"),
    }
}

fn save_registry(path: &Path, records: &[SwizzleRecord]) -> Result<()> {
    let body = serde_json::to_vec_pretty(records)?;
    write_atomic(path, &body)?;
    Ok(())
}

fn now_iso() -> String {
    chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// Copy a theme template into the project and record its provenance.
pub fn swizzle(config: &SiteConfig, template: &str) -> Result<SwizzleRecord> {
    let Some(theme_dir) = config.theme_templates_dir() else {
        bail!(
            Diagnostic::new(ErrorKind::Config, "no theme configured")
                .with_hint("set theme.name in bengal.toml before swizzling")
        );
    };
    let theme_name = config.theme.name.clone().unwrap_or_default();

    if template.contains("..") {
        bail!(Diagnostic::new(
            ErrorKind::Config,
            format!("invalid template path {template:?}")
        ));
    }
    let source = theme_dir.join(template);
    if !source.is_file() {
        bail!(
            Diagnostic::new(
                ErrorKind::Config,
                format!("theme {theme_name:?} has no template {template:?}"),
            )
            .with_path(&source)
        );
    }

    let target_rel: PathBuf = config.theme.templates_dir.join(template);
    let target = config.root_join(&target_rel);
    let contents = std::fs::read(&source)?;
    write_atomic(&target, &contents)?;

    let checksum = sha256_file(&source)?;
    let record = SwizzleRecord {
        target: crate::utils::to_slash(&target_rel),
        source: source.display().to_string(),
        theme: theme_name,
        upstream_checksum: checksum.clone(),
        local_checksum: checksum,
        timestamp: now_iso(),
    };

    let registry_path = config.swizzle_registry_path();
    let mut records = load_registry(&registry_path)?;
    records.retain(|r| r.target != record.target);
    records.push(record.clone());
    save_registry(&registry_path, &records)?;

    crate::log!("theme"; "swizzled {template} from {}", record.theme);
    Ok(record)
}

/// List swizzled templates with their update state.
pub fn swizzle_list(config: &SiteConfig) -> Result<Vec<(SwizzleRecord, SwizzleState)>> {
    let records = load_registry(&config.swizzle_registry_path())?;
    Ok(records
        .into_iter()
        .map(|record| {
            let state = state_of(config, &record);
            (record, state)
        })
        .collect())
}

fn state_of(config: &SiteConfig, record: &SwizzleRecord) -> SwizzleState {
    let source = PathBuf::from(&record.source);
    let Ok(upstream) = sha256_file(&source) else {
        return SwizzleState::UpstreamMissing;
    };
    let local = sha256_file(&config.root_join(&record.target)).unwrap_or_default();

    if local != record.upstream_checksum {
        SwizzleState::LocallyModified
    } else if upstream != record.upstream_checksum {
        SwizzleState::UpstreamChanged
    } else {
        SwizzleState::UpToDate
    }
}

/// Re-copy swizzled templates whose upstream changed AND whose local copy
/// is byte-identical to the recorded upstream. Returns how many updated.
pub fn swizzle_update(config: &SiteConfig) -> Result<usize> {
    let registry_path = config.swizzle_registry_path();
    let mut records = load_registry(&registry_path)?;
    let mut updated = 0;

    for record in &mut records {
        let source = PathBuf::from(&record.source);
        let target = config.root_join(&record.target);

        let Ok(upstream) = sha256_file(&source) else {
            crate::log!("warn"; "{}: upstream missing, skipped", record.target);
            continue;
        };
        let Ok(local) = sha256_file(&target) else {
            crate::log!("warn"; "{}: local copy missing, skipped", record.target);
            continue;
        };

        // Update only when local is pristine and upstream moved.
        if local != record.upstream_checksum {
            crate::log!("theme"; "{}: locally modified, left alone", record.target);
            continue;
        }
        if upstream == record.upstream_checksum {
            continue;
        }

        let contents = std::fs::read(&source)?;
        write_atomic(&target, &contents)?;
        record.upstream_checksum = upstream.clone();
        record.local_checksum = upstream;
        record.timestamp = now_iso();
        updated += 1;
        crate::log!("theme"; "{}: updated from upstream", record.target);
    }

    save_registry(&registry_path, &records)?;
    Ok(updated)
}
