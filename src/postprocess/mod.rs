//! Post-processing outputs: sitemap, RSS feed, xref index, redirects.
//!
//! Each generator records what it writes with the output collector;
//! failures here are warnings, never build aborts.

pub mod feed;
pub mod redirects;
pub mod sitemap;
pub mod xref_export;
