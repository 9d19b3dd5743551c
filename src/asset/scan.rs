//! Asset discovery: walk the assets directory.

use std::path::Path;

use jwalk::WalkDir;

use super::Asset;
use crate::utils::path::relative_key;

/// Scan the assets directory into Asset records, sorted by key for
/// deterministic ordering.
pub fn scan_assets(assets_dir: &Path) -> Vec<Asset> {
    if !assets_dir.is_dir() {
        return Vec::new();
    }

    let mut assets: Vec<Asset> = WalkDir::new(assets_dir)
        .skip_hidden(true)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter_map(|entry| {
            let path = entry.path();
            let key = relative_key(assets_dir, &path)?;
            Some(Asset::new(path, key))
        })
        .collect();

    assets.sort_by(|a, b| a.key.cmp(&b.key));
    assets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::AssetKind;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn scans_nested_assets_sorted() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("css")).unwrap();
        fs::create_dir_all(dir.path().join("js")).unwrap();
        fs::write(dir.path().join("css/style.css"), "body{}").unwrap();
        fs::write(dir.path().join("js/app.js"), "x()").unwrap();
        fs::write(dir.path().join("favicon.ico"), [0u8; 4]).unwrap();

        let assets = scan_assets(dir.path());
        let keys: Vec<_> = assets.iter().map(|a| a.key.as_str()).collect();
        assert_eq!(keys, vec!["css/style.css", "favicon.ico", "js/app.js"]);
        assert_eq!(assets[0].kind, AssetKind::Css);
    }

    #[test]
    fn missing_dir_is_empty() {
        assert!(scan_assets(Path::new("/nonexistent/assets")).is_empty());
    }

    #[test]
    fn hidden_files_skipped() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(".DS_Store"), "x").unwrap();
        fs::write(dir.path().join("ok.css"), "x").unwrap();
        let assets = scan_assets(dir.path());
        assert_eq!(assets.len(), 1);
        assert_eq!(assets[0].key, "ok.css");
    }
}
