//! Structured diagnostics for user-visible failures.
//!
//! Every fatal error surfaces as a [`Diagnostic`] with a kind, the phase it
//! occurred in, an optional path, a message, a suggested action, and an
//! optional source excerpt with the failing span.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Error taxonomy. Kinds, not type names: each maps to the propagation
/// policy described in the error-handling design.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed or invalid config. Fatal.
    Config,
    /// Content tree unreadable. Fatal except malformed frontmatter.
    Discovery,
    /// Cache file unreadable or version mismatch. Recoverable.
    CacheLoad,
    /// Template failed to parse. Per-page.
    TemplateSyntax,
    /// Template failed to render. Per-page.
    TemplateRender,
    /// Markdown parse failure. Per-page.
    MarkdownParse,
    /// `[[target]]` did not resolve. Non-fatal warning.
    CrossReferenceBroken,
    /// Asset could not be processed. Per-asset warning.
    AssetProcessing,
    /// Output write failed (disk full, permissions). Fatal.
    OutputWrite,
    /// Filesystem watcher failure in dev mode.
    Watcher,
}

impl ErrorKind {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Config => "config",
            Self::Discovery => "discovery",
            Self::CacheLoad => "cache-load",
            Self::TemplateSyntax => "template-syntax",
            Self::TemplateRender => "template-render",
            Self::MarkdownParse => "markdown-parse",
            Self::CrossReferenceBroken => "broken-xref",
            Self::AssetProcessing => "asset",
            Self::OutputWrite => "output-write",
            Self::Watcher => "watcher",
        }
    }
}

/// Structured diagnostic record attached to fatal errors and streamed to the
/// browser overlay in dev mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: ErrorKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    /// Source excerpt with the failing span, when available.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
}

impl Diagnostic {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            phase: None,
            path: None,
            message: message.into(),
            hint: None,
            excerpt: None,
        }
    }

    pub fn with_phase(mut self, phase: impl Into<String>) -> Self {
        self.phase = Some(phase.into());
        self
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn with_excerpt(mut self, excerpt: impl Into<String>) -> Self {
        self.excerpt = Some(excerpt.into());
        self
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.kind.label(), self.message)?;
        if let Some(path) = &self.path {
            write!(f, " ({})", path.display())?;
        }
        if let Some(hint) = &self.hint {
            write!(f, "\n  hint: {hint}")?;
        }
        if let Some(excerpt) = &self.excerpt {
            write!(f, "\n{excerpt}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Diagnostic {}

/// A per-page error collected during rendering; the build continues and
/// reports these at the end.
#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
#[error("{key}: [{}] {message}", .kind.label())]
pub struct PageError {
    /// Canonical source key of the failing page.
    pub key: String,
    pub kind: ErrorKind,
    pub message: String,
}

/// Build a caret-annotated excerpt around a 1-based line/column in `source`.
pub fn excerpt_at(source: &str, line: usize, column: usize) -> String {
    let mut out = String::new();
    let start = line.saturating_sub(2).max(1);
    for (idx, text) in source.lines().enumerate() {
        let lineno = idx + 1;
        if lineno < start {
            continue;
        }
        if lineno > line {
            break;
        }
        out.push_str(&format!("{lineno:>4} | {text}\n"));
        if lineno == line {
            out.push_str(&format!("     | {:>width$}^\n", "", width = column.saturating_sub(1)));
        }
    }
    out
}
