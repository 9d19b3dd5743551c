//! Code-block highlighting contract.
//!
//! Thread-safe, never panics, always HTML-escapes, and falls back to
//! plain-text rendering for unknown languages. Class-based markup keeps the
//! actual color work in theme CSS.

use crate::utils::html;

/// Languages we emit a `language-*` class for.
const KNOWN_LANGUAGES: &[&str] = &[
    "bash", "c", "cpp", "css", "go", "html", "java", "javascript", "js", "json", "markdown",
    "md", "python", "py", "rust", "sh", "shell", "sql", "toml", "ts", "typescript", "xml",
    "yaml", "yml",
];

#[derive(Debug, Clone, Default)]
pub struct HighlightOptions {
    /// 1-based lines to mark with a `hl` span.
    pub hl_lines: Vec<usize>,
    pub show_linenos: bool,
}

/// Whether a language is recognized.
pub fn supports_language(lang: &str) -> bool {
    KNOWN_LANGUAGES.contains(&lang.to_ascii_lowercase().as_str())
}

/// Render a code block. Unknown languages fall back to plain text; the
/// output is always fully escaped.
pub fn highlight(code: &str, lang: &str, opts: &HighlightOptions) -> String {
    let lang = lang.trim().to_ascii_lowercase();
    let class = if !lang.is_empty() && supports_language(&lang) {
        format!(" class=\"language-{lang}\"")
    } else {
        String::new()
    };

    let mut body = String::with_capacity(code.len() + 64);
    for (idx, line) in code.lines().enumerate() {
        let lineno = idx + 1;
        let escaped = html::escape(line);
        let highlighted = opts.hl_lines.contains(&lineno);

        if opts.show_linenos {
            body.push_str(&format!("<span class=\"lineno\">{lineno}</span>"));
        }
        if highlighted {
            body.push_str("<span class=\"hl\">");
            body.push_str(&escaped);
            body.push_str("</span>");
        } else {
            body.push_str(&escaped);
        }
        body.push('\n');
    }

    format!("<pre><code{class}>{body}</code></pre>")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_language_gets_class() {
        let out = highlight("let x = 1;", "rust", &HighlightOptions::default());
        assert!(out.contains("class=\"language-rust\""));
        assert!(out.contains("let x = 1;"));
    }

    #[test]
    fn unknown_language_falls_back_plain() {
        let out = highlight("whatever", "klingon", &HighlightOptions::default());
        assert!(!out.contains("language-"));
        assert!(out.contains("whatever"));
        assert!(!supports_language("klingon"));
    }

    #[test]
    fn html_entities_always_escaped() {
        let out = highlight("<script>alert('x')</script>", "html", &HighlightOptions::default());
        assert!(!out.contains("<script>"));
        assert!(out.contains("&lt;script&gt;"));
    }

    #[test]
    fn hl_lines_wrapped() {
        let opts = HighlightOptions {
            hl_lines: vec![2],
            show_linenos: false,
        };
        let out = highlight("a\nb\nc", "rust", &opts);
        assert!(out.contains("<span class=\"hl\">b</span>"));
        assert!(!out.contains("<span class=\"hl\">a</span>"));
    }

    #[test]
    fn linenos_emitted() {
        let opts = HighlightOptions {
            hl_lines: Vec::new(),
            show_linenos: true,
        };
        let out = highlight("x\ny", "py", &opts);
        assert!(out.contains("<span class=\"lineno\">1</span>"));
        assert!(out.contains("<span class=\"lineno\">2</span>"));
    }

    #[test]
    fn empty_code_is_fine() {
        let out = highlight("", "", &HighlightOptions::default());
        assert!(out.starts_with("<pre><code>"));
    }
}
