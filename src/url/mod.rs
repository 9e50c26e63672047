//! URL handling: canonical normalization and per-URL crawl context.
//!
//! Everything the crawler knows about a URL lives here:
//! - Flag-driven normalization into the canonical form used for dedup
//! - The [`UrlContext`] that carries provenance and caller state through
//!   the pipeline

mod context;
mod normalize;

pub use context::{UrlContext, UserState};
pub use normalize::{normalize, NormalizeFlags};
