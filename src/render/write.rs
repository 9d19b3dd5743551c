//! Output writing: content-hash meta tag, head injection, atomic write.

use std::path::Path;

use crate::build::output::{OutputCollector, OutputKind};
use crate::core::{ErrorKind, PageError};
use crate::utils::atomic::write_atomic;
use crate::utils::hash::{self, ContentHash};

/// Meta tag name carrying the stable body hash for the reload controller.
pub const CONTENT_HASH_META: &str = "bengal:content-hash";

/// Compute the stable content hash of a rendered page (the HTML excluding
/// any existing content-hash tag) and inject the tag.
///
/// The tag goes before `</head>` when present, otherwise it is prepended.
pub fn inject_content_hash(html: &str) -> (String, ContentHash) {
    let stripped = strip_hash_tag(html);
    let digest = hash::hash_str(&stripped);
    let tag = format!(
        "<meta name=\"{CONTENT_HASH_META}\" content=\"{}\">",
        digest.to_hex()
    );

    let injected = match find_head_close(&stripped) {
        Some(pos) => {
            let mut out = String::with_capacity(stripped.len() + tag.len());
            out.push_str(&stripped[..pos]);
            out.push_str(&tag);
            out.push_str(&stripped[pos..]);
            out
        }
        None => format!("{tag}{stripped}"),
    };
    (injected, digest)
}

fn strip_hash_tag(html: &str) -> String {
    match html.find(CONTENT_HASH_META) {
        None => html.to_string(),
        Some(pos) => {
            let start = html[..pos].rfind("<meta").unwrap_or(pos);
            let end = html[pos..]
                .find('>')
                .map(|e| pos + e + 1)
                .unwrap_or(html.len());
            format!("{}{}", &html[..start], &html[end..])
        }
    }
}

fn find_head_close(html: &str) -> Option<usize> {
    html.find("</head>").or_else(|| html.find("</HEAD>"))
}

/// Write a rendered page atomically and record it with the collector.
///
/// Returns the body content hash (the one embedded in the meta tag).
pub fn write_page(
    output_dir: &Path,
    rel: &Path,
    html: &str,
    collector: &OutputCollector,
    page_key: &str,
) -> Result<ContentHash, PageError> {
    let (final_html, body_hash) = inject_content_hash(html);
    let out_path = output_dir.join(rel);
    write_atomic(&out_path, final_html.as_bytes()).map_err(|e| PageError {
        key: page_key.to_string(),
        kind: ErrorKind::OutputWrite,
        message: format!("cannot write {}: {e}", out_path.display()),
    })?;
    collector.record(rel, OutputKind::Html, hash::hash_str(&final_html));
    Ok(body_hash)
}
