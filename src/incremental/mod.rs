//! Incremental build substrate: fingerprints, dependency tracking, change
//! classification, provenance filtering, rebuild manifest.

pub mod classify;
pub mod filter;
pub mod fingerprint;
pub mod graph;
pub mod manifest;

pub use classify::{ChangeKind, ChangeSet, FileCategory};
pub use filter::{BuildPlan, RebuildReason};
pub use fingerprint::Fingerprint;
pub use graph::{DepKind, Dependency, DependencyTracker};
pub use manifest::RebuildManifest;
