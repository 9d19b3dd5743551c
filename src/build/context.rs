//! BuildContext: state accumulated across the phases of one build.

use std::sync::Arc;

use parking_lot::RwLock;

use super::output::OutputCollector;
use crate::cache::{BuildCache, CacheCoordinator};
use crate::config::SiteConfig;
use crate::incremental::DependencyTracker;

/// Scoped to a single build invocation; owns the cache for its duration.
pub struct BuildContext {
    pub config: Arc<SiteConfig>,
    pub cache: Arc<RwLock<BuildCache>>,
    pub coordinator: CacheCoordinator,
    pub collector: OutputCollector,
    pub tracker: Arc<DependencyTracker>,
}

impl BuildContext {
    pub fn new(config: Arc<SiteConfig>, cache: BuildCache) -> Self {
        let tracker = Arc::new(DependencyTracker::from_cache(&cache.dependencies));
        let cache = Arc::new(RwLock::new(cache));
        Self {
            config,
            coordinator: CacheCoordinator::new(cache.clone()),
            cache,
            collector: OutputCollector::new(),
            tracker,
        }
    }
}
