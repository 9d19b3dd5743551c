//! Dependency tracking for incremental builds.
//!
//! Three layers:
//! - `DependencyGraph`: pure data structure with forward/reverse mappings
//! - `DependencyTracker`: thread-safe service owned by the build context
//! - thread-local accumulation during parallel rendering, flushed once per
//!   phase with a single write lock

use std::cell::RefCell;

use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

/// What kind of input a page depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepKind {
    /// Template or transitively included partial (template-dir-relative name).
    Template,
    /// Data file (data-dir-relative path).
    DataFile,
    /// Another page whose content/title/date/summary this page reads.
    Page,
    /// Asset referenced through a URL-generating helper (asset key).
    Asset,
    /// Cross-version sibling page (versioned docs).
    CrossVersion,
}

impl DepKind {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Template => "template",
            Self::DataFile => "data",
            Self::Page => "page",
            Self::Asset => "asset",
            Self::CrossVersion => "xversion",
        }
    }
}

/// One directed dependency edge target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dependency {
    pub kind: DepKind,
    pub target: String,
}

impl Dependency {
    pub fn new(kind: DepKind, target: impl Into<String>) -> Self {
        Self {
            kind,
            target: target.into(),
        }
    }

    /// Namespaced key used by the reverse index (`template:page.html`).
    pub fn reverse_key(&self) -> String {
        format!("{}:{}", self.kind.label(), self.target)
    }
}

type DepEntry = (String, Vec<Dependency>);

// =============================================================================
// Layer 1: Data Structure
// =============================================================================

/// Bidirectional dependency graph.
///
/// # Invariants
/// - Forward and reverse mappings are always consistent
/// - Self-references are excluded
#[derive(Debug, Default)]
pub struct DependencyGraph {
    /// page key → its dependencies
    forward: FxHashMap<String, FxHashSet<Dependency>>,
    /// namespaced dependency key → page keys that use it
    reverse: FxHashMap<String, FxHashSet<String>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record dependencies for a page, replacing any existing set.
    pub fn record(&mut self, page_key: &str, deps: &[Dependency]) {
        self.remove_page(page_key);

        let deps: FxHashSet<Dependency> = deps
            .iter()
            .filter(|d| !(d.kind == DepKind::Page && d.target == page_key))
            .cloned()
            .collect();

        for dep in &deps {
            self.reverse
                .entry(dep.reverse_key())
                .or_default()
                .insert(page_key.to_string());
        }
        self.forward.insert(page_key.to_string(), deps);
    }

    /// Page keys that depend on the given target.
    pub fn dependents_of(&self, kind: DepKind, target: &str) -> Vec<String> {
        self.reverse
            .get(&Dependency::new(kind, target).reverse_key())
            .map(|set| {
                let mut keys: Vec<_> = set.iter().cloned().collect();
                keys.sort();
                keys
            })
            .unwrap_or_default()
    }

    /// Dependencies of a page.
    pub fn uses(&self, page_key: &str) -> Option<&FxHashSet<Dependency>> {
        self.forward.get(page_key)
    }

    pub fn clear(&mut self) {
        self.forward.clear();
        self.reverse.clear();
    }

    pub fn page_count(&self) -> usize {
        self.forward.len()
    }

    pub fn reverse_count(&self) -> usize {
        self.reverse.len()
    }

    /// Export as plain maps for cache persistence.
    pub fn to_maps(
        &self,
    ) -> (
        FxHashMap<String, Vec<Dependency>>,
        FxHashMap<String, Vec<String>>,
    ) {
        let forward = self
            .forward
            .iter()
            .map(|(k, set)| {
                let mut deps: Vec<_> = set.iter().cloned().collect();
                deps.sort_by(|a, b| a.reverse_key().cmp(&b.reverse_key()));
                (k.clone(), deps)
            })
            .collect();
        let reverse = self
            .reverse
            .iter()
            .map(|(k, set)| {
                let mut keys: Vec<_> = set.iter().cloned().collect();
                keys.sort();
                (k.clone(), keys)
            })
            .collect();
        (forward, reverse)
    }

    /// Rebuild from persisted forward edges (reverse index is re-derived).
    pub fn from_forward(forward: &FxHashMap<String, Vec<Dependency>>) -> Self {
        let mut graph = Self::new();
        for (page, deps) in forward {
            graph.record(page, deps);
        }
        graph
    }

    fn remove_page(&mut self, page_key: &str) {
        let Some(old) = self.forward.remove(page_key) else {
            return;
        };
        for dep in old {
            let key = dep.reverse_key();
            if let Some(dependents) = self.reverse.get_mut(&key) {
                dependents.remove(page_key);
                if dependents.is_empty() {
                    self.reverse.remove(&key);
                }
            }
        }
    }
}

// =============================================================================
// Layer 2: Thread-safe service
// =============================================================================

thread_local! {
    /// Per-thread accumulator, lock-free during parallel rendering.
    static LOCAL: RefCell<Vec<DepEntry>> = const { RefCell::new(Vec::new()) };
    /// Deps of the page currently being rendered on this thread.
    static CURRENT: RefCell<Vec<Dependency>> = const { RefCell::new(Vec::new()) };
}

/// Thread-safe dependency tracker with an explicit lifetime: created per
/// build, seeded from the cache, flushed back after rendering.
#[derive(Debug, Default)]
pub struct DependencyTracker {
    graph: RwLock<DependencyGraph>,
}

impl DependencyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_cache(forward: &FxHashMap<String, Vec<Dependency>>) -> Self {
        Self {
            graph: RwLock::new(DependencyGraph::from_forward(forward)),
        }
    }

    pub fn dependents_of(&self, kind: DepKind, target: &str) -> Vec<String> {
        self.graph.read().dependents_of(kind, target)
    }

    pub fn uses(&self, page_key: &str) -> Vec<Dependency> {
        self.graph
            .read()
            .uses(page_key)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn record(&self, page_key: &str, deps: &[Dependency]) {
        self.graph.write().record(page_key, deps);
    }

    pub fn clear(&self) {
        self.graph.write().clear();
    }

    pub fn to_maps(
        &self,
    ) -> (
        FxHashMap<String, Vec<Dependency>>,
        FxHashMap<String, Vec<String>>,
    ) {
        self.graph.read().to_maps()
    }

    pub fn stats(&self) -> (usize, usize) {
        let graph = self.graph.read();
        (graph.page_count(), graph.reverse_count())
    }

    // -------------------------------------------------------------------------
    // Layer 3: thread-local recording during parallel rendering
    // -------------------------------------------------------------------------

    /// Begin recording for a page on the current thread.
    pub fn begin_page(&self) {
        CURRENT.with(|deps| deps.borrow_mut().clear());
    }

    /// Record a dependency of the page currently rendering on this thread.
    pub fn record_current(dep: Dependency) {
        CURRENT.with(|deps| deps.borrow_mut().push(dep));
    }

    /// Finish the current page: stash its deps into the thread-local batch
    /// and return them for digesting.
    pub fn end_page(&self, page_key: &str) -> Vec<Dependency> {
        let deps = CURRENT.with(|deps| std::mem::take(&mut *deps.borrow_mut()));
        LOCAL.with(|batch| {
            batch
                .borrow_mut()
                .push((page_key.to_string(), deps.clone()));
        });
        deps
    }

    /// Merge all thread-local batches into the graph with one write lock.
    ///
    /// Call once after the parallel render phase completes.
    pub fn flush(&self) {
        let rayon_batches: Vec<Vec<DepEntry>> =
            rayon::broadcast(|_| LOCAL.with(|batch| std::mem::take(&mut *batch.borrow_mut())));
        let main_batch: Vec<DepEntry> =
            LOCAL.with(|batch| std::mem::take(&mut *batch.borrow_mut()));

        let mut graph = self.graph.write();
        for (page, deps) in rayon_batches.into_iter().flatten().chain(main_batch) {
            graph.record(&page, &deps);
        }
        crate::debug!("deps"; "graph now tracks {} pages, {} reverse entries",
            graph.page_count(), graph.reverse_count());
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn dep(kind: DepKind, target: &str) -> Dependency {
        Dependency::new(kind, target)
    }

    mod dependency_graph {
        use super::*;

        #[test]
        fn new_graph_is_empty() {
            let graph = DependencyGraph::new();
            assert!(graph.dependents_of(DepKind::Template, "page.html").is_empty());
        }

        #[test]
        fn basic_recording() {
            let mut graph = DependencyGraph::new();
            graph.record("docs/a.md", &[dep(DepKind::Template, "page.html")]);

            let users = graph.dependents_of(DepKind::Template, "page.html");
            assert_eq!(users, vec!["docs/a.md"]);
        }

        #[test]
        fn self_reference_excluded() {
            let mut graph = DependencyGraph::new();
            graph.record(
                "docs/a.md",
                &[dep(DepKind::Page, "docs/a.md"), dep(DepKind::Page, "docs/b.md")],
            );
            assert!(graph.dependents_of(DepKind::Page, "docs/a.md").is_empty());
            assert_eq!(graph.dependents_of(DepKind::Page, "docs/b.md"), vec!["docs/a.md"]);
        }

        #[test]
        fn update_replaces_old_dependencies() {
            let mut graph = DependencyGraph::new();
            graph.record("a.md", &[dep(DepKind::Template, "old.html")]);
            graph.record("a.md", &[dep(DepKind::Template, "new.html")]);

            assert!(graph.dependents_of(DepKind::Template, "old.html").is_empty());
            assert_eq!(graph.dependents_of(DepKind::Template, "new.html"), vec!["a.md"]);
        }

        #[test]
        fn kinds_do_not_collide() {
            // A data file and a template with the same name are distinct targets.
            let mut graph = DependencyGraph::new();
            graph.record("a.md", &[dep(DepKind::Template, "shared")]);
            graph.record("b.md", &[dep(DepKind::DataFile, "shared")]);

            assert_eq!(graph.dependents_of(DepKind::Template, "shared"), vec!["a.md"]);
            assert_eq!(graph.dependents_of(DepKind::DataFile, "shared"), vec!["b.md"]);
        }

        #[test]
        fn multiple_pages_share_dependency() {
            let mut graph = DependencyGraph::new();
            graph.record("a.md", &[dep(DepKind::Template, "base.html")]);
            graph.record("b.md", &[dep(DepKind::Template, "base.html")]);

            let users = graph.dependents_of(DepKind::Template, "base.html");
            assert_eq!(users, vec!["a.md", "b.md"]);
        }

        #[test]
        fn roundtrip_through_maps() {
            let mut graph = DependencyGraph::new();
            graph.record("a.md", &[dep(DepKind::Template, "t.html"), dep(DepKind::Asset, "s.css")]);
            let (forward, reverse) = graph.to_maps();

            let restored = DependencyGraph::from_forward(&forward);
            assert_eq!(restored.dependents_of(DepKind::Template, "t.html"), vec!["a.md"]);
            assert_eq!(restored.dependents_of(DepKind::Asset, "s.css"), vec!["a.md"]);
            assert!(reverse.contains_key("template:t.html"));
        }

        #[test]
        fn clear_removes_all() {
            let mut graph = DependencyGraph::new();
            graph.record("a.md", &[dep(DepKind::Template, "t.html")]);
            graph.clear();
            assert!(graph.dependents_of(DepKind::Template, "t.html").is_empty());
        }
    }

    mod tracker {
        use super::*;

        #[test]
        fn current_page_recording_flow() {
            let tracker = DependencyTracker::new();
            tracker.begin_page();
            DependencyTracker::record_current(dep(DepKind::Template, "page.html"));
            DependencyTracker::record_current(dep(DepKind::DataFile, "authors.toml"));
            let deps = tracker.end_page("docs/a.md");
            assert_eq!(deps.len(), 2);

            tracker.flush();
            assert_eq!(
                tracker.dependents_of(DepKind::DataFile, "authors.toml"),
                vec!["docs/a.md"]
            );
        }

        #[test]
        fn parallel_recording_flushes_all_threads() {
            use rayon::prelude::*;

            let tracker = DependencyTracker::new();
            (0..32).into_par_iter().for_each(|i| {
                tracker.begin_page();
                DependencyTracker::record_current(dep(DepKind::Template, "shared.html"));
                tracker.end_page(&format!("p{i}.md"));
            });
            tracker.flush();

            let users = tracker.dependents_of(DepKind::Template, "shared.html");
            assert_eq!(users.len(), 32);
        }
    }
}
