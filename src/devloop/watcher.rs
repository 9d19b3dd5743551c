//! Filesystem watcher thread feeding the debouncer channel.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use crossbeam::channel::Sender;
use notify::{RecommendedWatcher, RecursiveMode, Watcher};

/// Creation retries with exponential backoff before surfacing the error.
const WATCHER_RETRIES: u32 = 3;

/// Start a recursive watcher on the given roots. Events flow into `tx`;
/// the returned watcher must be kept alive for the watch to continue.
pub fn spawn_watcher(roots: Vec<PathBuf>, tx: Sender<notify::Event>) -> Result<RecommendedWatcher> {
    let mut last_error: Option<notify::Error> = None;

    for attempt in 0..WATCHER_RETRIES {
        if attempt > 0 {
            let backoff = Duration::from_millis(100 * 2u64.pow(attempt));
            crate::log!("watch"; "watcher start failed, retrying in {:?}", backoff);
            std::thread::sleep(backoff);
        }

        let sender = tx.clone();
        let result = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            match res {
                Ok(event) => {
                    let _ = sender.send(event);
                }
                Err(e) => {
                    crate::log!("watch"; "watcher error: {e}");
                }
            }
        });

        match result {
            Ok(mut watcher) => {
                for root in &roots {
                    let mode = if root.is_dir() {
                        RecursiveMode::Recursive
                    } else {
                        RecursiveMode::NonRecursive
                    };
                    watcher
                        .watch(root, mode)
                        .with_context(|| format!("cannot watch {}", root.display()))?;
                }
                return Ok(watcher);
            }
            Err(e) => last_error = Some(e),
        }
    }

    Err(anyhow::anyhow!(
        "failed to start filesystem watcher after {WATCHER_RETRIES} attempts: {}",
        last_error.map(|e| e.to_string()).unwrap_or_default()
    ))
}
