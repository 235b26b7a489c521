//! Streaming weighted quantile sketch.
//!
//! Values are buffered in an input queue. When the queue fills up it is
//! turned into an exact summary and carried into a hierarchy of levels,
//! each holding at most `limit_size` entries. A full level is merged with
//! the incoming carry and handed to the next level. The structure is sized
//! at construction from the expected number of rows so that the final
//! summary has rank error at most about `eps * total_weight`.

use super::summary::WQSummary;
use crate::core::error::{HistError, Result};
use crate::core::types::{FeatureValue, Rank};

#[derive(Debug, Clone, Copy)]
struct QueueEntry {
    value: FeatureValue,
    weight: Rank,
}

/// Unsorted buffer of pushed values. Consecutive pushes of the same value
/// share one slot.
#[derive(Debug, Clone, Default)]
struct SketchQueue {
    entries: Vec<QueueEntry>,
}

impl SketchQueue {
    fn push(&mut self, value: FeatureValue, weight: Rank) {
        if let Some(last) = self.entries.last_mut() {
            if last.value == value {
                last.weight += weight;
                return;
            }
        }
        self.entries.push(QueueEntry { value, weight });
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn make_summary(&self) -> WQSummary {
        let mut pairs: Vec<(FeatureValue, Rank)> =
            self.entries.iter().map(|e| (e.value, e.weight)).collect();
        pairs.sort_unstable_by(|a, b| a.0.total_cmp(&b.0));
        WQSummary::from_sorted_weighted(&pairs)
    }

    fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Weighted quantile sketch over one feature.
#[derive(Debug, Clone)]
pub struct WeightedQuantileSketch {
    feature: usize,
    eps: f64,
    limit_size: usize,
    num_levels: usize,
    inqueue: SketchQueue,
    levels: Vec<WQSummary>,
}

impl WeightedQuantileSketch {
    /// Sketch sized for about `maxn` observations with error bound `eps`
    pub fn new(maxn: usize, eps: f64) -> Result<Self> {
        Self::for_feature(0, maxn, eps)
    }

    /// Sketch for feature `feature`, used in error reports
    pub fn for_feature(feature: usize, maxn: usize, eps: f64) -> Result<Self> {
        if !(eps > 0.0 && eps < 1.0) {
            return Err(HistError::invalid_parameter(
                "eps",
                eps.to_string(),
                "must lie in (0, 1)",
            ));
        }

        let mut num_levels = 1usize;
        let limit_size = loop {
            let limit = (num_levels as f64 / eps).ceil() as usize + 1;
            let reach = (1usize << num_levels.min(62)).saturating_mul(limit);
            if reach >= maxn || num_levels >= 62 {
                break limit;
            }
            num_levels += 1;
        };

        Ok(WeightedQuantileSketch {
            feature,
            eps,
            limit_size,
            num_levels,
            inqueue: SketchQueue::default(),
            levels: Vec::new(),
        })
    }

    pub fn feature(&self) -> usize {
        self.feature
    }

    pub fn eps(&self) -> f64 {
        self.eps
    }

    /// Maximum number of entries held by one level
    pub fn limit_size(&self) -> usize {
        self.limit_size
    }

    /// Number of levels planned at construction
    pub fn num_levels(&self) -> usize {
        self.num_levels
    }

    /// Push a weighted observation.
    pub fn push(&mut self, value: FeatureValue, weight: Rank) -> Result<()> {
        if !value.is_finite() {
            return Err(HistError::InvalidFeatureValue {
                feature: self.feature,
                value,
            });
        }
        if !(weight >= 0.0 && weight.is_finite()) {
            return Err(HistError::NegativeWeight { value, weight });
        }

        if self.inqueue.len() >= self.limit_size * 2 {
            let temp = self.inqueue.make_summary();
            self.inqueue.clear();
            self.push_temp(temp);
        }
        // fold -0.0 into 0.0 so both land on one entry
        let value = if value == 0.0 { 0.0 } else { value };
        self.inqueue.push(value, weight);
        Ok(())
    }

    /// Merge an existing summary of the same feature into the sketch
    pub fn push_summary(&mut self, summary: &WQSummary) {
        if summary.is_empty() {
            return;
        }
        self.push_temp(summary.clone());
    }

    fn push_temp(&mut self, temp: WQSummary) {
        let mut carry = temp;
        let mut l = 0;
        loop {
            if l == self.levels.len() {
                self.levels.push(WQSummary::new());
            }
            let pruned = WQSummary::compress(&carry, self.limit_size);
            if self.levels[l].is_empty() {
                self.levels[l] = pruned;
                break;
            }
            let merged = WQSummary::combine(&pruned, &self.levels[l]);
            if merged.len() > self.limit_size {
                self.levels[l].clear();
                carry = merged;
                l += 1;
            } else {
                self.levels[l] = merged;
                break;
            }
        }
        if self.levels.len() > self.num_levels {
            log::debug!(
                "feature {} sketch grew to {} levels, planned {}",
                self.feature,
                self.levels.len(),
                self.num_levels
            );
        }
    }

    /// Summary of everything pushed so far, at most `limit_size` entries.
    ///
    /// Does not disturb the sketch state; further pushes are still valid.
    pub fn get_summary(&self) -> WQSummary {
        let queued = self.inqueue.make_summary();
        let mut acc = WQSummary::compress(&queued, self.limit_size);
        for level in self.levels.iter().filter(|level| !level.is_empty()) {
            acc = if acc.is_empty() {
                level.clone()
            } else {
                WQSummary::compress(&WQSummary::combine(&acc, level), self.limit_size)
            };
        }
        acc
    }
}
