//! Cross-project reference index export (`xref.json`).
//!
//! Other sites consume this to resolve cross-project links. Format:
//! `{version, project, baseurl, generated, entries: {name → {type, path,
//! title}}}` with `version` fixed at "1".

use anyhow::Result;
use serde_json::json;

use crate::build::output::{OutputCollector, OutputKind};
use crate::content::Site;
use crate::render::xref::XrefIndex;
use crate::utils::atomic::write_atomic;
use crate::utils::hash;

/// Write `xref.json` when `autodoc.export_xref` is enabled.
pub fn export_xref(site: &Site, index: &XrefIndex, collector: &OutputCollector) -> Result<()> {
    if !site.config.autodoc.export_xref {
        return Ok(());
    }

    let mut entries = serde_json::Map::new();
    for entry in index.entries() {
        entries.insert(
            entry.name.clone(),
            json!({
                "type": entry.kind,
                "path": entry.path,
                "title": entry.title,
            }),
        );
    }

    let document = json!({
        "version": "1",
        "project": site.config.site.title,
        "baseurl": site.config.site.baseurl,
        "generated": chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        "entries": entries,
    });

    let body = serde_json::to_string_pretty(&document)?;
    let rel = std::path::Path::new("xref.json");
    write_atomic(&site.config.output_dir().join(rel), body.as_bytes())?;
    collector.record(rel, OutputKind::Other, hash::hash_str(&body));
    Ok(())
}
