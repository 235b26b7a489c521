//! Threading utilities built on Rayon.
//!
//! - `feature_ranges` is the static feature-id partition used by the sketch pass
//! - `build_pool` creates the pool every parallel pass runs inside

use crate::core::error::{HistError, Result};
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::cmp::min;
use std::ops::Range;

/// Threading helpers shared by the sketch and binning passes
#[derive(Debug)]
pub struct Threading;

impl Threading {
    /// Contiguous, disjoint ranges covering `0..num_features`, one per thread.
    ///
    /// Every feature belongs to exactly one range for the whole pass. Empty
    /// ranges are dropped, so fewer ranges than threads may be returned.
    pub fn feature_ranges(num_features: usize, num_threads: usize) -> Vec<Range<usize>> {
        let nthread = num_threads.max(1);
        let nstep = (num_features + nthread - 1) / nthread;
        (0..nthread)
            .map(|tid| min(nstep * tid, num_features)..min(nstep * (tid + 1), num_features))
            .filter(|range| !range.is_empty())
            .collect()
    }

    /// Build a Rayon pool with exactly `num_threads` workers.
    pub fn build_pool(num_threads: usize) -> Result<ThreadPool> {
        ThreadPoolBuilder::new()
            .num_threads(num_threads.max(1))
            .thread_name(|i| format!("quantile-hist-{}", i))
            .build()
            .map_err(|e| HistError::threading(format!("Failed to build thread pool: {}", e)))
    }
}
