//! Typed page metadata and frontmatter parsing.
//!
//! Frontmatter is heterogeneous at the source level (YAML between `---`
//! fences or TOML between `+++` fences). It is converted exactly once, at
//! discovery, into the [`MetaValue`] variant; everything downstream works
//! with typed values.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::utils::hash::{self, ContentHash};

/// Frontmatter keys that affect navigation. A change to any of these in a
/// modified file classifies the change as nav-affecting.
pub const NAV_KEYS: &[&str] = &["title", "menu", "weight", "date", "draft", "slug"];

/// A typed metadata value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetaValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<MetaValue>),
    Map(MetaMap),
}

/// Ordered metadata map; ordering keeps digests deterministic.
pub type MetaMap = BTreeMap<String, MetaValue>;

impl MetaValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[MetaValue]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&MetaMap> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Coerce to a list of strings: a bare string becomes a one-element list.
    pub fn as_string_list(&self) -> Vec<String> {
        match self {
            Self::Str(s) => vec![s.clone()],
            Self::List(items) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        }
    }
}

impl From<serde_yaml::Value> for MetaValue {
    fn from(value: serde_yaml::Value) -> Self {
        use serde_yaml::Value as Y;
        match value {
            Y::Null => Self::Str(String::new()),
            Y::Bool(b) => Self::Bool(b),
            Y::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Self::Int(i)
                } else {
                    Self::Float(n.as_f64().unwrap_or(0.0))
                }
            }
            Y::String(s) => Self::Str(s),
            Y::Sequence(items) => Self::List(items.into_iter().map(Into::into).collect()),
            Y::Mapping(map) => {
                let mut out = MetaMap::new();
                for (k, v) in map {
                    if let Y::String(key) = k {
                        out.insert(key, v.into());
                    }
                }
                Self::Map(out)
            }
            Y::Tagged(tagged) => tagged.value.into(),
        }
    }
}

impl From<toml::Value> for MetaValue {
    fn from(value: toml::Value) -> Self {
        use toml::Value as T;
        match value {
            T::String(s) => Self::Str(s),
            T::Integer(i) => Self::Int(i),
            T::Float(f) => Self::Float(f),
            T::Boolean(b) => Self::Bool(b),
            T::Datetime(dt) => Self::Str(dt.to_string()),
            T::Array(items) => Self::List(items.into_iter().map(Into::into).collect()),
            T::Table(table) => {
                Self::Map(table.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
        }
    }
}

// ============================================================================
// Frontmatter parsing
// ============================================================================

/// Result of splitting a content file into metadata and body.
#[derive(Debug, Default)]
pub struct Frontmatter {
    pub meta: MetaMap,
    pub body: String,
    /// Set when delimiters were present but the metadata failed to parse;
    /// the page is admitted without metadata and a warning is emitted.
    pub malformed: Option<String>,
}

/// Split frontmatter from a content file.
///
/// `---` fences delimit YAML, `+++` fences delimit TOML. A file without a
/// leading fence has no metadata.
pub fn parse_frontmatter(source: &str) -> Frontmatter {
    if let Some(rest) = fence_body(source, "---") {
        return parse_fenced(rest, "---", |raw| {
            let value: serde_yaml::Value = serde_yaml::from_str(raw)?;
            Ok(match MetaValue::from(value) {
                MetaValue::Map(map) => map,
                _ => MetaMap::new(),
            })
        });
    }
    if let Some(rest) = fence_body(source, "+++") {
        return parse_fenced(rest, "+++", |raw| {
            let table: toml::Table = toml::from_str(raw)?;
            Ok(table
                .into_iter()
                .map(|(k, v)| (k, MetaValue::from(v)))
                .collect())
        });
    }
    Frontmatter {
        meta: MetaMap::new(),
        body: source.to_string(),
        malformed: None,
    }
}

/// Text after an opening fence on its own first line, or None.
fn fence_body<'a>(source: &'a str, fence: &str) -> Option<&'a str> {
    let rest = source.strip_prefix(fence)?;
    rest.strip_prefix('\n')
        .or_else(|| rest.strip_prefix("\r\n"))
}

fn parse_fenced<F>(rest: &str, fence: &str, parse: F) -> Frontmatter
where
    F: Fn(&str) -> anyhow::Result<MetaMap>,
{
    // Closing fence must sit at the start of a line.
    let close = format!("\n{fence}");
    let Some(end) = rest.find(&close) else {
        return Frontmatter {
            meta: MetaMap::new(),
            body: rest.to_string(),
            malformed: Some(format!("unterminated {fence} frontmatter fence")),
        };
    };

    let raw_meta = &rest[..end];
    let after = &rest[end + close.len()..];
    let body = after
        .strip_prefix("\r\n")
        .or_else(|| after.strip_prefix('\n'))
        .unwrap_or(after)
        .to_string();

    match parse(raw_meta) {
        Ok(meta) => Frontmatter {
            meta,
            body,
            malformed: None,
        },
        Err(e) => Frontmatter {
            meta: MetaMap::new(),
            body,
            malformed: Some(e.to_string()),
        },
    }
}

// ============================================================================
// Digests
// ============================================================================

/// Digest of the full metadata map.
pub fn meta_digest(meta: &MetaMap) -> ContentHash {
    let serialized = serde_json::to_string(meta).unwrap_or_default();
    hash::hash_str(&serialized)
}

/// Digest over navigation-affecting keys only.
///
/// Compared against the cached digest to detect `nav_changed`.
pub fn nav_digest(meta: &MetaMap) -> ContentHash {
    let mut parts: Vec<String> = Vec::with_capacity(NAV_KEYS.len());
    for key in NAV_KEYS {
        let value = meta
            .get(*key)
            .map(|v| serde_json::to_string(v).unwrap_or_default())
            .unwrap_or_default();
        parts.push(format!("{key}={value}"));
    }
    hash::hash_strs(parts)
}

/// Merge `overlay` on top of `base`: overlay keys win.
pub fn merge_maps(base: &MetaMap, overlay: &MetaMap) -> MetaMap {
    let mut out = base.clone();
    for (k, v) in overlay {
        out.insert(k.clone(), v.clone());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yaml_frontmatter_parses() {
        let source = "---\ntitle: Hello\nweight: 3\ndraft: true\ntags: [a, b]\n---\nBody text.";
        let fm = parse_frontmatter(source);
        assert!(fm.malformed.is_none());
        assert_eq!(fm.meta.get("title").and_then(MetaValue::as_str), Some("Hello"));
        assert_eq!(fm.meta.get("weight").and_then(MetaValue::as_int), Some(3));
        assert_eq!(fm.meta.get("draft").and_then(MetaValue::as_bool), Some(true));
        assert_eq!(
            fm.meta.get("tags").map(MetaValue::as_string_list),
            Some(vec!["a".to_string(), "b".to_string()])
        );
        assert_eq!(fm.body, "Body text.");
    }

    #[test]
    fn toml_frontmatter_parses() {
        let source = "+++\ntitle = \"Hi\"\nweight = 2\n+++\nBody.";
        let fm = parse_frontmatter(source);
        assert!(fm.malformed.is_none());
        assert_eq!(fm.meta.get("title").and_then(MetaValue::as_str), Some("Hi"));
        assert_eq!(fm.body, "Body.");
    }

    #[test]
    fn no_frontmatter_is_all_body() {
        let fm = parse_frontmatter("# Just markdown\n");
        assert!(fm.meta.is_empty());
        assert_eq!(fm.body, "# Just markdown\n");
    }

    #[test]
    fn malformed_frontmatter_is_recoverable() {
        let source = "---\ntitle: [unclosed\n---\nBody survives.";
        let fm = parse_frontmatter(source);
        assert!(fm.malformed.is_some());
        assert!(fm.meta.is_empty());
        assert_eq!(fm.body, "Body survives.");
    }

    #[test]
    fn unterminated_fence_is_malformed() {
        let fm = parse_frontmatter("---\ntitle: x\nno closing fence");
        assert!(fm.malformed.is_some());
    }

    #[test]
    fn nested_yaml_map_becomes_meta_map() {
        let source = "---\ncascade:\n  type: doc\n  badge: new\n---\n";
        let fm = parse_frontmatter(source);
        let cascade = fm.meta.get("cascade").and_then(MetaValue::as_map).unwrap();
        assert_eq!(cascade.get("type").and_then(MetaValue::as_str), Some("doc"));
    }

    #[test]
    fn nav_digest_ignores_non_nav_keys() {
        let mut a = MetaMap::new();
        a.insert("title".into(), MetaValue::Str("T".into()));
        a.insert("description".into(), MetaValue::Str("one".into()));

        let mut b = a.clone();
        b.insert("description".into(), MetaValue::Str("two".into()));
        assert_eq!(nav_digest(&a), nav_digest(&b));

        b.insert("title".into(), MetaValue::Str("U".into()));
        assert_ne!(nav_digest(&a), nav_digest(&b));
    }

    #[test]
    fn meta_digest_detects_any_change() {
        let mut a = MetaMap::new();
        a.insert("description".into(), MetaValue::Str("one".into()));
        let mut b = a.clone();
        b.insert("description".into(), MetaValue::Str("two".into()));
        assert_ne!(meta_digest(&a), meta_digest(&b));
    }

    #[test]
    fn merge_overlay_wins() {
        let mut base = MetaMap::new();
        base.insert("type".into(), MetaValue::Str("doc".into()));
        base.insert("badge".into(), MetaValue::Str("old".into()));
        let mut overlay = MetaMap::new();
        overlay.insert("badge".into(), MetaValue::Str("new".into()));

        let merged = merge_maps(&base, &overlay);
        assert_eq!(merged.get("type").and_then(MetaValue::as_str), Some("doc"));
        assert_eq!(merged.get("badge").and_then(MetaValue::as_str), Some("new"));
    }
}
