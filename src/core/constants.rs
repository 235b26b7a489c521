//! Numeric constants shared by the sketch, cut and binning passes.

/// Default maximum number of bins per feature.
pub const DEFAULT_MAX_BIN: usize = 256;

/// Upper limit for `max_bin`. Local bin positions of one feature,
/// `0..max_bin`, then fit in a `u16`; global bin ids are `u32`.
pub const MAX_MAX_BIN: usize = 65536;

static_assertions::const_assert!(MAX_MAX_BIN - 1 <= u16::MAX as usize);

/// Over-provisioning factor for sketch accuracy. Local sketches run with
/// `eps = 1 / (max_bin * SKETCH_FACTOR)` and are pruned to
/// `max_bin * SKETCH_FACTOR` entries before the all-reduce, which absorbs
/// the error introduced by the final prune down to `max_bin` entries.
pub const DEFAULT_SKETCH_FACTOR: usize = 8;

/// Tolerance subtracted from summary values when emitting cut points, and
/// added to the per-feature sentinel.
pub const RT_EPS: f32 = 1e-6;

/// Default number of rows per batch for in-memory datasets.
pub const DEFAULT_BATCH_ROWS: usize = 1 << 16;

/// Default number of worker threads (0 means all available cores).
pub const DEFAULT_NUM_THREADS: usize = 0;

/// Rows handled per task when accumulating hit counts and histograms.
pub const ROW_BLOCK_SIZE: usize = 4096;
