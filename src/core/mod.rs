//! Core build-wide state: build mode, shutdown signal, diagnostics.

pub mod diagnostic;

pub use diagnostic::{Diagnostic, ErrorKind, PageError};

use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;

/// Build mode affects draft handling and template strictness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum BuildMode {
    Production,
    Development,
}

impl BuildMode {
    #[inline]
    pub const fn is_dev(self) -> bool {
        matches!(self, Self::Development)
    }
}

/// Global shutdown flag, set by Ctrl+C.
static SHUTDOWN: AtomicBool = AtomicBool::new(false);

/// Install the global Ctrl+C handler (before any blocking operations).
pub fn setup_shutdown_handler() -> Result<()> {
    ctrlc::set_handler(|| {
        if SHUTDOWN.swap(true, Ordering::SeqCst) {
            // Second Ctrl+C: exit immediately
            std::process::exit(130);
        }
        crate::log!("bengal"; "shutting down...");
    })?;
    Ok(())
}

/// Whether shutdown was requested.
#[inline]
pub fn is_shutdown() -> bool {
    SHUTDOWN.load(Ordering::SeqCst)
}

/// Request shutdown programmatically (used by tests and the dev loop).
#[inline]
pub fn request_shutdown() {
    SHUTDOWN.store(true, Ordering::SeqCst);
}
