//! The CacheCoordinator: sole gateway for per-page cache invalidation.
//!
//! Invariants:
//! - All three layers (parsed, rendered, fingerprint) are cleared together;
//!   partial invalidation is a bug.
//! - The event log is bounded (10 000 entries, FIFO-trimmed).
//! - Operations are serialized through one coordinator mutex.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use super::BuildCache;
use crate::incremental::DepKind;

/// Bounded length of the invalidation event log.
pub const EVENT_LOG_CAP: usize = 10_000;

/// Why a page's caches were invalidated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidationReason {
    ContentChanged,
    TemplateChanged,
    DataFileChanged,
    AssetChanged,
    ConfigChanged,
    StructuralChange,
    TaxonomyCascade,
    NavChanged,
    Forced,
    FullRebuild,
}

impl InvalidationReason {
    pub const fn label(self) -> &'static str {
        match self {
            Self::ContentChanged => "content_changed",
            Self::TemplateChanged => "template_changed",
            Self::DataFileChanged => "data_file_changed",
            Self::AssetChanged => "asset_changed",
            Self::ConfigChanged => "config_changed",
            Self::StructuralChange => "structural_change",
            Self::TaxonomyCascade => "taxonomy_cascade",
            Self::NavChanged => "nav_changed",
            Self::Forced => "forced",
            Self::FullRebuild => "full_rebuild",
        }
    }
}

/// One recorded invalidation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvalidationEvent {
    pub key: String,
    pub reason: InvalidationReason,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trigger: Option<String>,
}

/// Sole gateway for per-page cache invalidation.
pub struct CacheCoordinator {
    cache: Arc<RwLock<BuildCache>>,
    events: Mutex<VecDeque<InvalidationEvent>>,
}

impl CacheCoordinator {
    pub fn new(cache: Arc<RwLock<BuildCache>>) -> Self {
        Self {
            cache,
            events: Mutex::new(VecDeque::new()),
        }
    }

    pub fn cache(&self) -> &Arc<RwLock<BuildCache>> {
        &self.cache
    }

    /// Invalidate one page: clears parsed content, rendered output, and the
    /// file fingerprint together.
    pub fn invalidate_page(&self, key: &str, reason: InvalidationReason, trigger: Option<&str>) {
        {
            let mut cache = self.cache.write();
            cache.parsed_content.remove(key);
            cache.rendered_output.remove(key);
            cache.file_fingerprints.remove(key);
        }
        self.push_event(InvalidationEvent {
            key: key.to_string(),
            reason,
            trigger: trigger.map(str::to_string),
        });
    }

    /// Invalidate every page depending on a data file.
    pub fn invalidate_for_data_file(
        &self,
        data_rel: &str,
        tracker: &crate::incremental::DependencyTracker,
    ) -> usize {
        let dependents = tracker.dependents_of(DepKind::DataFile, data_rel);
        for key in &dependents {
            self.invalidate_page(key, InvalidationReason::DataFileChanged, Some(data_rel));
        }
        dependents.len()
    }

    /// Invalidate every page depending on a template.
    pub fn invalidate_for_template(
        &self,
        template_name: &str,
        tracker: &crate::incremental::DependencyTracker,
    ) -> usize {
        let dependents = tracker.dependents_of(DepKind::Template, template_name);
        for key in &dependents {
            self.invalidate_page(key, InvalidationReason::TemplateChanged, Some(template_name));
        }
        dependents.len()
    }

    /// Invalidate affected taxonomy term pages when a member changed.
    pub fn invalidate_taxonomy_cascade(&self, member_key: &str, term_page_keys: &[String]) {
        for term_key in term_page_keys {
            self.invalidate_page(term_key, InvalidationReason::TaxonomyCascade, Some(member_key));
        }
    }

    /// Invalidate every page.
    pub fn invalidate_all(&self, reason: InvalidationReason) {
        let keys: Vec<String> = {
            let mut cache = self.cache.write();
            let keys: Vec<String> = cache
                .parsed_content
                .keys()
                .chain(cache.rendered_output.keys())
                .cloned()
                .collect::<std::collections::BTreeSet<_>>()
                .into_iter()
                .collect();
            cache.parsed_content.clear();
            cache.rendered_output.clear();
            cache.file_fingerprints.clear();
            keys
        };
        for key in keys {
            self.push_event(InvalidationEvent {
                key,
                reason,
                trigger: None,
            });
        }
    }

    fn push_event(&self, event: InvalidationEvent) {
        let mut events = self.events.lock();
        if events.len() >= EVENT_LOG_CAP {
            events.pop_front();
        }
        events.push_back(event);
    }

    pub fn events(&self) -> Vec<InvalidationEvent> {
        self.events.lock().iter().cloned().collect()
    }

    /// Event counts grouped by reason, for the rebuild manifest.
    pub fn summary(&self) -> BTreeMap<String, usize> {
        let mut summary = BTreeMap::new();
        for event in self.events.lock().iter() {
            *summary.entry(event.reason.label().to_string()).or_insert(0) += 1;
        }
        summary
    }
}
