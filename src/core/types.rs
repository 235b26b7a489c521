//! Core data types for the quantile histogram core.

/// Raw feature value type, equivalent to `bst_float`.
pub type FeatureValue = f32;

/// Rank and accumulated weight type used inside quantile summaries.
/// 64-bit so that long weighted streams keep exact integer ranks.
pub type Rank = f64;

/// Per-row sample weight as stored in dataset metadata.
pub type Weight = f32;

/// Feature index as stored in sparse row entries.
pub type FeatureIndex = u32;

/// Global bin index into the flat cut array.
pub type BinIndex = u32;

/// Row identifier across all batches.
pub type RowIndex = usize;

/// Histogram accumulation type for gradient statistics.
pub type Hist = f64;
