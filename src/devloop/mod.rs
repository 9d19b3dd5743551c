//! The dev-server loop: watcher → debouncer → classifier → build →
//! reload decision → client notification.

pub mod debounce;
pub mod http;
pub mod message;
pub mod reload;
pub mod watcher;
pub mod ws;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use rustc_hash::FxHashMap;

use crate::build::{self, BuildInput, BuildStats};
use crate::cache::BuildCache;
use crate::config::SiteConfig;
use crate::core::{BuildMode, Diagnostic, ErrorKind};
use crate::incremental::classify::{ChangeKind, classify_changes};
use crate::logger;

use debounce::Debouncer;
use message::ReloadMessage;
use reload::{ReloadAction, ReloadThrottle};

/// Run the dev loop until shutdown. Assumes an initial build has already
/// populated the output directory and `initial_snapshot`.
pub fn run(
    config: Arc<SiteConfig>,
    ws: ws::WsServer,
    mut snapshot: FxHashMap<String, String>,
) -> Result<()> {
    let (tx, rx) = crossbeam::channel::unbounded::<notify::Event>();
    let _watcher = watcher::spawn_watcher(config.watch_roots(), tx)?;

    let mut debouncer = Debouncer::new(config.serve.debounce_ms);
    let mut throttle = ReloadThrottle::default();

    crate::log!("watch"; "watching {} root(s)", config.watch_roots().len());

    while !crate::core::is_shutdown() {
        // Drain pending events, waiting up to the debouncer's advice.
        match rx.recv_timeout(debouncer.sleep_duration().min(Duration::from_millis(250))) {
            Ok(event) => {
                debouncer.add_event(&event);
                // Keep draining without blocking to coalesce the batch.
                while let Ok(event) = rx.try_recv() {
                    debouncer.add_event(&event);
                }
            }
            Err(crossbeam::channel::RecvTimeoutError::Timeout) => {}
            Err(crossbeam::channel::RecvTimeoutError::Disconnected) => break,
        }

        let Some(changes) = debouncer.take_if_ready() else {
            continue;
        };

        let batch: Vec<(std::path::PathBuf, ChangeKind)> = changes.into_iter().collect();
        let (cache, _) = BuildCache::load(&config.cache_file());
        let change_set = classify_changes(&batch, &config, &cache);
        if change_set.is_empty() {
            continue;
        }

        let input = BuildInput::from_changes(
            BuildMode::Development,
            config.config_hash(),
            &change_set,
        );

        match run_build(&config, &input) {
            Ok(stats) if stats.page_errors.is_empty() => {
                let action = reload::decide(&stats.outputs, &snapshot);
                match action {
                    ReloadAction::None => {
                        logger::status_unchanged("no output changes");
                    }
                    ReloadAction::ReloadCss => {
                        let paths = reload::changed_css_paths(&stats.outputs, &snapshot);
                        ws.broadcast(&ReloadMessage::ReloadCss { paths });
                        logger::status_success(&format!(
                            "rebuilt {} page(s), css refresh",
                            stats.pages_built
                        ));
                    }
                    ReloadAction::Reload => {
                        if throttle.allow() {
                            ws.broadcast(&ReloadMessage::reload());
                        }
                        logger::status_success(&format!(
                            "rebuilt {} page(s), reloading",
                            stats.pages_built
                        ));
                    }
                }
                ws.broadcast(&ReloadMessage::ClearError);
                snapshot = stats.output_snapshot;
            }
            Ok(stats) => {
                // Per-page failures: previous output stays, no refresh, the
                // error streams to the browser overlay.
                let first = &stats.page_errors[0];
                logger::status_error(
                    &format!("build failed: {}", first.key),
                    &first.message,
                );
                ws.broadcast(&ReloadMessage::BuildError {
                    diagnostic: Diagnostic::new(first.kind, first.message.clone())
                        .with_phase("render")
                        .with_path(first.key.clone()),
                });
            }
            Err(e) => {
                logger::status_error("build failed", &e.to_string());
                ws.broadcast(&ReloadMessage::BuildError {
                    diagnostic: Diagnostic::new(ErrorKind::Discovery, e.to_string()),
                });
            }
        }
    }
    Ok(())
}

/// Run a build in-process or in a subprocess, per `BENGAL_BUILD_EXECUTOR`.
pub fn run_build(config: &Arc<SiteConfig>, input: &BuildInput) -> Result<BuildStats> {
    match std::env::var("BENGAL_BUILD_EXECUTOR").as_deref() {
        Ok("subprocess") => run_build_subprocess(config, input),
        _ => build::build(config, input),
    }
}

/// Wire format a subprocess build reports back through `--emit-stats`.
#[derive(serde::Serialize, serde::Deserialize)]
pub struct StatsWire {
    pub pages_built: usize,
    pub pages_skipped: usize,
    pub outputs: Vec<crate::build::output::OutputRecord>,
    pub output_snapshot: FxHashMap<String, String>,
    pub page_errors: Vec<crate::core::PageError>,
    pub warnings: Vec<String>,
}

impl StatsWire {
    pub fn from_stats(stats: &BuildStats) -> Self {
        Self {
            pages_built: stats.pages_built,
            pages_skipped: stats.pages_skipped,
            outputs: stats.outputs.clone(),
            output_snapshot: stats.output_snapshot.clone(),
            page_errors: stats.page_errors.clone(),
            warnings: stats.warnings.clone(),
        }
    }

    pub fn into_stats(self) -> BuildStats {
        BuildStats {
            pages_built: self.pages_built,
            pages_skipped: self.pages_skipped,
            outputs: self.outputs,
            output_snapshot: self.output_snapshot,
            page_errors: self.page_errors,
            warnings: self.warnings,
            ..BuildStats::default()
        }
    }
}

/// Out-of-process build with a liveness timeout: a stuck subprocess is
/// killed and the rebuild marked failed.
fn run_build_subprocess(config: &Arc<SiteConfig>, input: &BuildInput) -> Result<BuildStats> {
    let state_dir = config.state_dir();
    std::fs::create_dir_all(&state_dir)?;
    let input_path = state_dir.join("build-input.json");
    let stats_path = state_dir.join("build-stats.json");
    std::fs::write(&input_path, serde_json::to_vec(input)?)?;
    let _ = std::fs::remove_file(&stats_path);

    let exe = std::env::current_exe()?;
    let mut child = std::process::Command::new(exe)
        .current_dir(&config.root)
        .arg("build")
        .arg("--input-json")
        .arg(&input_path)
        .arg("--emit-stats")
        .arg(&stats_path)
        .spawn()?;

    let timeout = Duration::from_secs(config.serve.build_timeout_secs);
    let started = std::time::Instant::now();
    loop {
        if let Some(status) = child.try_wait()? {
            if !status.success() && !stats_path.exists() {
                anyhow::bail!("subprocess build failed with {status}");
            }
            break;
        }
        if started.elapsed() > timeout {
            let _ = child.kill();
            let _ = child.wait();
            anyhow::bail!(
                "subprocess build exceeded the {}s liveness timeout",
                config.serve.build_timeout_secs
            );
        }
        std::thread::sleep(Duration::from_millis(50));
    }

    let raw = std::fs::read(&stats_path)?;
    let wire: StatsWire = serde_json::from_slice(&raw)?;
    Ok(wire.into_stats())
}
