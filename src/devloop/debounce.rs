//! Event debouncing: coalesce raw watcher events into one batch per quiet
//! window.
//!
//! Consecutive events on the same path are folded through a pure merge
//! table, so a batch carries at most one change per path and short-lived
//! files (created and deleted within the window) vanish entirely.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use rustc_hash::FxHashMap;

use crate::incremental::classify::ChangeKind;
use crate::utils::normalize_path;

/// Editor scratch suffixes that must never trigger builds.
const SCRATCH_SUFFIXES: &[&str] = &["swp", "swo", "swx", "tmp", "bak", "orig", "rej", "part"];

/// Coalesces watcher events until the configured quiet window elapses.
pub struct Debouncer {
    window: Duration,
    pending: FxHashMap<PathBuf, ChangeKind>,
    last_event: Option<Instant>,
}

impl Debouncer {
    pub fn new(window_ms: u64) -> Self {
        Self {
            window: Duration::from_millis(window_ms),
            pending: FxHashMap::default(),
            last_event: None,
        }
    }

    /// Fold a raw notify event into the pending batch.
    pub fn add_event(&mut self, event: &notify::Event) {
        let Some(incoming) = change_kind(&event.kind) else {
            return;
        };
        for path in &event.paths {
            if is_editor_scratch(path) {
                continue;
            }
            self.observe(normalize_path(path), incoming);
        }
    }

    fn observe(&mut self, path: PathBuf, incoming: ChangeKind) {
        self.last_event = Some(Instant::now());
        match self.pending.remove(&path) {
            None => {
                crate::debug!("watch"; "+{} {}", incoming.label(), path.display());
                self.pending.insert(path, incoming);
            }
            Some(pending) => match merge(pending, incoming) {
                Some(folded) => {
                    if folded != pending {
                        crate::debug!("watch"; "{} folds into {} for {}",
                            incoming.label(), folded.label(), path.display());
                    }
                    self.pending.insert(path, folded);
                }
                None => {
                    crate::debug!("watch"; "transient file dropped: {}", path.display());
                }
            },
        }
    }

    /// Take the batch once the quiet window has elapsed.
    pub fn take_if_ready(&mut self) -> Option<FxHashMap<PathBuf, ChangeKind>> {
        let quiet_since = self.last_event?;
        if quiet_since.elapsed() < self.window || self.pending.is_empty() {
            return None;
        }
        self.last_event = None;
        Some(std::mem::take(&mut self.pending))
    }

    /// How long the caller may sleep before the batch could become ready.
    pub fn sleep_duration(&self) -> Duration {
        match self.last_event {
            Some(last) => self
                .window
                .saturating_sub(last.elapsed())
                .max(Duration::from_millis(1)),
            None => Duration::from_secs(86_400),
        }
    }
}

/// Fold two changes on the same path observed within one window.
///
/// `None` means the path needs no rebuild at all (it appeared and vanished).
fn merge(pending: ChangeKind, incoming: ChangeKind) -> Option<ChangeKind> {
    use ChangeKind::{Created, Modified, Removed};
    match (pending, incoming) {
        // A brand-new file stays "created" through edits, and cancels out
        // if it is deleted again before anyone saw it.
        (Created, Removed) => None,
        (Created, _) => Some(Created),
        // A deletion followed by reappearance is the later event.
        (Removed, Created | Modified) => Some(incoming),
        (Removed, Removed) => Some(Removed),
        // An edited file that gets deleted is a deletion.
        (Modified, Removed) => Some(Removed),
        (Modified, _) => Some(Modified),
    }
}

/// Map a notify event kind onto a change, ignoring the noise.
fn change_kind(kind: &notify::EventKind) -> Option<ChangeKind> {
    use notify::EventKind;
    match kind {
        EventKind::Create(_) => Some(ChangeKind::Created),
        EventKind::Remove(_) => Some(ChangeKind::Removed),
        // Metadata-only changes (mtime/chmod noise) would loop forever.
        EventKind::Modify(notify::event::ModifyKind::Metadata(_)) => None,
        EventKind::Modify(_) => Some(ChangeKind::Modified),
        _ => None,
    }
}

/// Editor scratch artifacts: hidden files, `~` backups, and swap suffixes.
fn is_editor_scratch(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return true;
    };
    if name.starts_with('.') || name.ends_with('~') {
        return true;
    }
    match name.rsplit_once('.') {
        Some((_, suffix)) => SCRATCH_SUFFIXES.contains(&suffix),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::{
        Event, EventKind,
        event::{CreateKind, DataChange, ModifyKind, RemoveKind},
    };

    fn event(kind: EventKind, path: &str) -> Event {
        Event {
            kind,
            paths: vec![PathBuf::from(path)],
            attrs: Default::default(),
        }
    }

    fn modify(path: &str) -> Event {
        event(EventKind::Modify(ModifyKind::Data(DataChange::Content)), path)
    }

    #[test]
    fn merge_table_covers_all_transitions() {
        use ChangeKind::{Created, Modified, Removed};
        assert_eq!(merge(Created, Removed), None);
        assert_eq!(merge(Created, Modified), Some(Created));
        assert_eq!(merge(Removed, Created), Some(Created));
        assert_eq!(merge(Removed, Modified), Some(Modified));
        assert_eq!(merge(Modified, Removed), Some(Removed));
        assert_eq!(merge(Modified, Modified), Some(Modified));
    }

    #[test]
    fn repeated_modifies_collapse_to_one() {
        let mut debouncer = Debouncer::new(0);
        debouncer.add_event(&modify("/site/content/a.md"));
        debouncer.add_event(&modify("/site/content/a.md"));
        let batch = debouncer.take_if_ready().unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch.values().next(), Some(&ChangeKind::Modified));
    }

    #[test]
    fn transient_file_produces_no_batch() {
        let mut debouncer = Debouncer::new(0);
        debouncer.add_event(&event(EventKind::Create(CreateKind::File), "/site/content/x.md"));
        debouncer.add_event(&event(EventKind::Remove(RemoveKind::File), "/site/content/x.md"));
        assert!(debouncer.take_if_ready().is_none());
    }

    #[test]
    fn edit_then_delete_is_a_deletion() {
        let mut debouncer = Debouncer::new(0);
        debouncer.add_event(&modify("/site/content/x.md"));
        debouncer.add_event(&event(EventKind::Remove(RemoveKind::File), "/site/content/x.md"));
        let batch = debouncer.take_if_ready().unwrap();
        assert_eq!(batch.values().next(), Some(&ChangeKind::Removed));
    }

    #[test]
    fn scratch_files_never_enter_the_batch() {
        let mut debouncer = Debouncer::new(0);
        debouncer.add_event(&modify("/site/content/.a.md.swp"));
        debouncer.add_event(&modify("/site/content/a.md~"));
        debouncer.add_event(&modify("/site/content/a.md.bak"));
        assert!(debouncer.take_if_ready().is_none());

        assert!(is_editor_scratch(Path::new("/x/.hidden")));
        assert!(is_editor_scratch(Path::new("/x/file.orig")));
        assert!(!is_editor_scratch(Path::new("/x/real.md")));
    }

    #[test]
    fn metadata_noise_ignored() {
        let mut debouncer = Debouncer::new(0);
        debouncer.add_event(&event(
            EventKind::Modify(ModifyKind::Metadata(notify::event::MetadataKind::Any)),
            "/site/content/a.md",
        ));
        assert!(debouncer.take_if_ready().is_none());
    }

    #[test]
    fn quiet_window_gates_the_batch() {
        let mut debouncer = Debouncer::new(10_000);
        debouncer.add_event(&modify("/site/content/a.md"));
        assert!(debouncer.take_if_ready().is_none());
        assert!(debouncer.sleep_duration() > Duration::from_secs(5));
    }
}
