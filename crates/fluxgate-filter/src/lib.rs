//! Similarity Admission Filter
//!
//! Sheds redundant work in front of a real-time generation engine by
//! comparing each frame representation with its predecessor:
//! - Frames that differ enough are always forwarded
//! - Near-duplicates become drop candidates
//! - Drop candidates escape with a half-normal probability, so a static
//!   scene keeps refreshing instead of freezing
//!
//! # Decision Curve
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Similarity Admission                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                              │
//! │  cos(prev, cur) ──> (s + 1) / 2 ──> ^ scale ──> score       │
//! │                                                   │          │
//! │                          score <= threshold ──────┤──> Pass  │
//! │                                                   │          │
//! │                          score >  threshold       ↓          │
//! │                  w = 1 - (1 - score) / (1 - threshold)       │
//! │                  w < |N(0,1)|  ──> Pass (escaped)            │
//! │                  otherwise     ──> Drop                      │
//! │                                                              │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! The random source is injectable, which makes the stochastic
//! behaviour reproducible under a fixed seed.

mod error;
mod filter;
pub mod similarity;

pub use error::{FilterError, Result};
pub use filter::{Admission, FilterConfig, FilterStats, PassReason, SimilarityFilter};

/// Default score above which a frame becomes a drop candidate
pub const DEFAULT_THRESHOLD: f32 = 0.95;

/// Default exponent applied to the normalized similarity
pub const DEFAULT_THRESHOLD_SCALE: f32 = 7.0;

/// Default lower bound on the cosine norm product
pub const DEFAULT_EPS: f32 = 1e-6;

/// Prelude for common imports
pub mod prelude {
    pub use super::{Admission, FilterConfig, PassReason, Result, SimilarityFilter};
}
