//! Asset classification by extension.

use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetKind {
    Css,
    Js,
    Image,
    Font,
    Data,
    Other,
}

impl AssetKind {
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match ext.as_str() {
            "css" => Self::Css,
            "js" | "mjs" => Self::Js,
            "png" | "jpg" | "jpeg" | "gif" | "webp" | "avif" | "svg" | "ico" => Self::Image,
            "woff" | "woff2" | "ttf" | "otf" | "eot" => Self::Font,
            "json" | "yaml" | "yml" | "toml" | "csv" | "txt" | "xml" => Self::Data,
            _ => Self::Other,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Css => "css",
            Self::Js => "js",
            Self::Image => "image",
            Self::Font => "font",
            Self::Data => "data",
            Self::Other => "other",
        }
    }

    /// Whether the minify pass applies to this kind.
    pub const fn is_minifiable(self) -> bool {
        matches!(self, Self::Css | Self::Js)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_by_extension() {
        assert_eq!(AssetKind::from_path(Path::new("a/style.CSS")), AssetKind::Css);
        assert_eq!(AssetKind::from_path(Path::new("app.mjs")), AssetKind::Js);
        assert_eq!(AssetKind::from_path(Path::new("logo.svg")), AssetKind::Image);
        assert_eq!(AssetKind::from_path(Path::new("font.woff2")), AssetKind::Font);
        assert_eq!(AssetKind::from_path(Path::new("info.json")), AssetKind::Data);
        assert_eq!(AssetKind::from_path(Path::new("video.mp4")), AssetKind::Other);
        assert_eq!(AssetKind::from_path(Path::new("LICENSE")), AssetKind::Other);
    }
}
