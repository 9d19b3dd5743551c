//! Reload wire protocol: JSON messages over the WebSocket channel.

use serde::{Deserialize, Serialize};

use crate::core::Diagnostic;

/// Message sent from the dev server to connected browsers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReloadMessage {
    /// Full page reload.
    Reload {
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    /// Re-inject the listed stylesheets; no navigation.
    ReloadCss { paths: Vec<String> },
    /// Connection established.
    Connected { version: String },
    /// Build failed: show the overlay, keep the current page.
    BuildError { diagnostic: Diagnostic },
    /// Build recovered: clear the overlay.
    ClearError,
}

impl ReloadMessage {
    pub fn reload() -> Self {
        Self::Reload { reason: None }
    }

    pub fn connected() -> Self {
        Self::Connected {
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{\"type\":\"reload\"}".to_string())
    }
}
