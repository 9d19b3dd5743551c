//! Asset processing: fingerprint, optional minify, atomic copy.

use std::path::PathBuf;

use dashmap::DashMap;
use rayon::prelude::*;

use super::{Asset, AssetKind};
use crate::build::output::{OutputCollector, OutputKind};
use crate::config::SiteConfig;
use crate::utils::atomic::write_atomic;
use crate::utils::hash;

/// Asset key → final URL, consumed by the `asset_url` template function.
///
/// Populated for every asset each build so pages can reference assets that
/// were themselves skipped by the incremental filter.
#[derive(Debug, Default)]
pub struct AssetManifest {
    urls: DashMap<String, String>,
}

impl AssetManifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn url_for(&self, key: &str) -> Option<String> {
        self.urls.get(key).map(|u| u.clone())
    }

    pub fn insert(&self, key: String, url: String) {
        self.urls.insert(key, url);
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }
}

/// Compute content hashes and final output names for every asset, filling
/// the manifest. Cheap relative to rendering; runs every build.
pub fn fingerprint_assets(assets: &mut [Asset], config: &SiteConfig, manifest: &AssetManifest) {
    for asset in assets.iter_mut() {
        let digest = hash::hash_file(&asset.source);
        asset.hash = Some(digest);

        if config.assets.fingerprint && !digest.is_empty() {
            let name = fingerprinted_name(&asset.key, &digest.short());
            asset.output_rel = PathBuf::from(&name);
            asset.fingerprinted_name = Some(name);
        } else {
            asset.output_rel = PathBuf::from(&asset.key);
            asset.fingerprinted_name = None;
        }

        manifest.insert(asset.key.clone(), asset.url());
    }
}

/// Insert the hash before the extension: `css/style.css` → `css/style.3f2a1b4c.css`.
fn fingerprinted_name(key: &str, short_hash: &str) -> String {
    match key.rfind('.') {
        Some(dot) if !key[dot..].contains('/') => {
            format!("{}.{}{}", &key[..dot], short_hash, &key[dot..])
        }
        _ => format!("{key}.{short_hash}"),
    }
}

/// Copy/minify the selected assets into the output directory.
///
/// Returns the number of per-asset failures; failures are warnings and the
/// original file is copied through unprocessed where possible.
pub fn process_assets(
    assets: &[Asset],
    selected: &[usize],
    config: &SiteConfig,
    collector: &OutputCollector,
) -> usize {
    let process_one = |&idx: &usize| -> usize {
        let asset = &assets[idx];
        match process_single(asset, config, collector) {
            Ok(()) => 0,
            Err(e) => {
                crate::log!("warn"; "asset {} failed: {}, copying as-is", asset.key, e);
                match copy_through(asset, config, collector) {
                    Ok(()) => 0,
                    Err(_) => 1,
                }
            }
        }
    };

    if config.build.parallel {
        selected.par_iter().map(process_one).sum()
    } else {
        selected.iter().map(process_one).sum()
    }
}

fn process_single(
    asset: &Asset,
    config: &SiteConfig,
    collector: &OutputCollector,
) -> anyhow::Result<()> {
    let mut data = std::fs::read(&asset.source)?;

    if config.assets.minify && asset.kind.is_minifiable() {
        data = minify(&data, asset.kind);
    }

    write_output(asset, &data, config, collector)
}

fn copy_through(
    asset: &Asset,
    config: &SiteConfig,
    collector: &OutputCollector,
) -> anyhow::Result<()> {
    let data = std::fs::read(&asset.source)?;
    write_output(asset, &data, config, collector)
}

fn write_output(
    asset: &Asset,
    data: &[u8],
    config: &SiteConfig,
    collector: &OutputCollector,
) -> anyhow::Result<()> {
    let out_path = config.output_dir().join(&asset.output_rel);
    write_atomic(&out_path, data)?;

    let kind = match asset.kind {
        AssetKind::Css => OutputKind::Css,
        AssetKind::Js => OutputKind::Js,
        _ => OutputKind::Asset,
    };
    collector.record(&asset.output_rel, kind, hash::hash_bytes(data));
    Ok(())
}

/// Whitespace-safe minification: trims per-line indentation and drops blank
/// lines. Anything smarter belongs to an external tool.
fn minify(data: &[u8], kind: AssetKind) -> Vec<u8> {
    if !kind.is_minifiable() {
        return data.to_vec();
    }
    let Ok(text) = std::str::from_utf8(data) else {
        return data.to_vec();
    };
    let mut out = String::with_capacity(text.len());
    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        out.push_str(trimmed);
        out.push('\n');
    }
    out.into_bytes()
}
