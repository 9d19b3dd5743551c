//! Literal template-expression escape syntax.
//!
//! `{! expr !}` in Markdown source denotes "this text appears verbatim in
//! the output, no template substitution". The delimiters use no character
//! Markdown treats as an inline emphasis or code marker. Two-phase:
//! spans are replaced with placeholder tokens before Markdown parsing and
//! restored in the rendered HTML after template rendering.

pub const OPEN: &str = "{!";
pub const CLOSE: &str = "!}";

/// Placeholder for stash slot `n`: plain ASCII that passes through both the
/// Markdown parser and the template engine untouched.
fn placeholder(n: usize) -> String {
    format!("@@BENGAL:ESC:{n}@@")
}

/// Replace every `{! ... !}` span with a placeholder; returns the rewritten
/// source and the stash of literal texts (delimiters removed, trimmed).
///
/// An unterminated opener is left in place verbatim.
pub fn extract(source: &str) -> (String, Vec<String>) {
    let mut out = String::with_capacity(source.len());
    let mut stash = Vec::new();
    let mut rest = source;

    while let Some(start) = rest.find(OPEN) {
        out.push_str(&rest[..start]);
        let after_open = &rest[start + OPEN.len()..];
        match after_open.find(CLOSE) {
            Some(end) => {
                out.push_str(&placeholder(stash.len()));
                stash.push(after_open[..end].trim().to_string());
                rest = &after_open[end + CLOSE.len()..];
            }
            None => {
                // No closing delimiter: keep the opener literally.
                out.push_str(OPEN);
                rest = after_open;
            }
        }
    }
    out.push_str(rest);
    (out, stash)
}

/// Restore placeholders in rendered HTML with their literal texts.
pub fn restore(html: &str, stash: &[String]) -> String {
    let mut out = html.to_string();
    for (n, literal) in stash.iter().enumerate() {
        out = out.replace(&placeholder(n), literal);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_preserves_template_expression() {
        let source = "Use {! {{ page.title }} !} in templates.";
        let (rewritten, stash) = extract(source);
        assert!(!rewritten.contains("{{"));
        assert_eq!(stash, vec!["{{ page.title }}"]);

        let restored = restore(&rewritten, &stash);
        assert_eq!(restored, "Use @@BENGAL:ESC:0@@ in templates.".replace("@@BENGAL:ESC:0@@", "{{ page.title }}"));
        assert!(restored.contains("{{ page.title }}"));
        assert!(!restored.contains("{!"));
    }

    #[test]
    fn multiple_spans() {
        let source = "{! a !} and {! b !}";
        let (rewritten, stash) = extract(source);
        assert_eq!(stash, vec!["a", "b"]);
        assert_eq!(restore(&rewritten, &stash), "a and b");
    }

    #[test]
    fn no_spans_is_identity() {
        let (rewritten, stash) = extract("plain *markdown* text");
        assert_eq!(rewritten, "plain *markdown* text");
        assert!(stash.is_empty());
    }

    #[test]
    fn unterminated_opener_kept_literal() {
        let (rewritten, stash) = extract("broken {! here");
        assert_eq!(rewritten, "broken {! here");
        assert!(stash.is_empty());
    }

    #[test]
    fn emphasis_around_span_unaffected() {
        let source = "*emphasis* {! {% raw %} !} _more_";
        let (rewritten, stash) = extract(source);
        assert!(rewritten.starts_with("*emphasis* "));
        assert!(rewritten.ends_with(" _more_"));
        assert_eq!(stash, vec!["{% raw %}"]);
    }

    #[test]
    fn placeholder_survives_markdown_shapes() {
        // The token is bare ASCII with no Markdown-significant characters
        // other than @, which CommonMark leaves alone.
        let token = placeholder(3);
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric() || ":@".contains(c)));
    }
}
