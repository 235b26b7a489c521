//! Weighted quantile sketching.
//!
//! - [`summary`]: ordered summaries with combine and prune
//! - [`weighted`]: streaming per-feature sketch
//! - [`reducer`]: fixed-size wire blocks and the cross-worker merge

pub mod reducer;
pub mod summary;
pub mod weighted;

pub use reducer::SketchReducer;
pub use summary::{SummaryEntry, WQSummary};
pub use weighted::WeightedQuantileSketch;
