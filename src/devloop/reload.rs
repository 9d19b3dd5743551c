//! The reload decision: what the browser should do after a build.

use std::time::{Duration, Instant};

use rustc_hash::FxHashMap;

use crate::build::output::{OutputKind, OutputRecord};

/// Minimum spacing between full-reload events.
pub const RELOAD_THROTTLE_MS: u64 = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadAction {
    /// Nothing changed; no client refresh.
    None,
    /// All changed outputs are CSS: inject stylesheets, no navigation.
    ReloadCss,
    /// Anything else changed: full page reload.
    Reload,
}

/// Diff this build's outputs against the previous snapshot.
///
/// An output counts as changed when its hash differs from (or is absent
/// in) the prior inventory.
pub fn decide(records: &[OutputRecord], previous: &FxHashMap<String, String>) -> ReloadAction {
    let changed: Vec<&OutputRecord> = records
        .iter()
        .filter(|r| previous.get(&r.path) != Some(&r.hash))
        .collect();

    if changed.is_empty() {
        return ReloadAction::None;
    }
    if changed.iter().all(|r| r.kind == OutputKind::Css) {
        return ReloadAction::ReloadCss;
    }
    ReloadAction::Reload
}

/// Changed CSS output paths, for targeted stylesheet injection.
pub fn changed_css_paths(
    records: &[OutputRecord],
    previous: &FxHashMap<String, String>,
) -> Vec<String> {
    records
        .iter()
        .filter(|r| r.kind == OutputKind::Css && previous.get(&r.path) != Some(&r.hash))
        .map(|r| format!("/{}", r.path))
        .collect()
}

/// Collapses reload events closer together than the throttle window.
pub struct ReloadThrottle {
    last_reload: Option<Instant>,
    min_interval: Duration,
}

impl Default for ReloadThrottle {
    fn default() -> Self {
        Self {
            last_reload: None,
            min_interval: Duration::from_millis(RELOAD_THROTTLE_MS),
        }
    }
}

impl ReloadThrottle {
    /// Whether a reload may be sent now; records the send when allowed.
    pub fn allow(&mut self) -> bool {
        match self.last_reload {
            Some(last) if last.elapsed() < self.min_interval => false,
            _ => {
                self.last_reload = Some(Instant::now());
                true
            }
        }
    }
}
