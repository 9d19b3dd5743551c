//! Theme customization: swizzled templates with provenance tracking.

pub mod swizzle;

pub use swizzle::{SwizzleRecord, SwizzleState, swizzle, swizzle_list, swizzle_update};
