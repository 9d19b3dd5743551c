//! Build statistics: phase timings, per-page errors, overall outcome.

use std::time::Instant;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use super::output::OutputRecord;
use crate::core::PageError;
use crate::incremental::RebuildManifest;

/// Stats emitted by each phase's completion callback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseStats {
    pub name: String,
    pub duration_ms: u64,
    pub items_processed: usize,
    pub errors: usize,
    pub warnings: usize,
}

/// Observer for phase lifecycle callbacks.
pub trait PhaseObserver: Send + Sync {
    fn phase_started(&self, name: &str);
    fn phase_completed(&self, stats: &PhaseStats);
}

/// Default observer: verbose-only log lines.
pub struct LoggingObserver;

impl PhaseObserver for LoggingObserver {
    fn phase_started(&self, name: &str) {
        crate::debug!("build"; "phase {name} started");
    }

    fn phase_completed(&self, stats: &PhaseStats) {
        crate::debug!("build"; "phase {} done: {} item(s), {} error(s), {}ms",
            stats.name, stats.items_processed, stats.errors, stats.duration_ms);
    }
}

/// Timer for one phase.
pub struct PhaseTimer {
    name: String,
    started: Instant,
}

impl PhaseTimer {
    pub fn start(name: &str, observer: &dyn PhaseObserver) -> Self {
        observer.phase_started(name);
        Self {
            name: name.to_string(),
            started: Instant::now(),
        }
    }

    pub fn finish(
        self,
        observer: &dyn PhaseObserver,
        items_processed: usize,
        errors: usize,
        warnings: usize,
    ) -> PhaseStats {
        let stats = PhaseStats {
            name: self.name,
            duration_ms: self.started.elapsed().as_millis() as u64,
            items_processed,
            errors,
            warnings,
        };
        observer.phase_completed(&stats);
        stats
    }
}

/// Overall classification of a finished build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildOutcome {
    Success,
    SuccessWithWarnings,
    Failure,
}

/// Everything a build reports back.
#[derive(Debug, Default)]
pub struct BuildStats {
    pub phases: Vec<PhaseStats>,
    pub pages_built: usize,
    pub pages_skipped: usize,
    pub assets_processed: usize,
    pub page_errors: Vec<PageError>,
    pub warnings: Vec<String>,
    pub manifest: RebuildManifest,
    /// Every file written this build.
    pub outputs: Vec<OutputRecord>,
    /// Final output inventory (path → hash), for the reload decision.
    pub output_snapshot: FxHashMap<String, String>,
    /// Build was cancelled before completion; cache was not saved.
    pub cancelled: bool,
}

impl BuildStats {
    pub fn outcome(&self) -> BuildOutcome {
        if !self.page_errors.is_empty() {
            BuildOutcome::Failure
        } else if !self.warnings.is_empty() {
            BuildOutcome::SuccessWithWarnings
        } else {
            BuildOutcome::Success
        }
    }

    pub fn total_duration_ms(&self) -> u64 {
        self.phases.iter().map(|p| p.duration_ms).sum()
    }
}
