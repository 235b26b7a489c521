//! Per-feature histogram cut points.
//!
//! [`CutMatrixBuilder`] makes one pass over the dataset, sketching every
//! feature in parallel with a static feature-range partition, prunes the
//! local summaries, all-reduces them across workers and finally derives
//! `max_bin` cut points per feature from the merged summary.

use crate::config::HistConfig;
use crate::core::constants::RT_EPS;
use crate::core::error::{HistError, Result};
use crate::core::network::Network;
use crate::core::types::{BinIndex, FeatureValue, Rank};
use crate::core::utils::Threading;
use crate::dataset::{DMatrix, MetaInfo, RowBatch};
use crate::sketch::{SketchReducer, WQSummary, WeightedQuantileSketch};

use rayon::prelude::*;
use rayon::ThreadPool;
use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::time::Instant;

/// Flat cut points for all features.
///
/// Cuts of feature `f` live in `cut[row_ptr[f]..row_ptr[f + 1]]`, strictly
/// increasing, the last one being a sentinel above every value observed
/// for `f`. Global bin `row_ptr[f] + k` covers values below `cut[row_ptr[f] + k]`
/// and at or above the previous cut.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistCutMatrix {
    row_ptr: Vec<u32>,
    cut: Vec<FeatureValue>,
    min_val: Vec<FeatureValue>,
}

impl HistCutMatrix {
    /// Build cut points for `dmat` on a single worker
    pub fn init<D: DMatrix + ?Sized>(dmat: &D, max_num_bins: usize) -> Result<Self> {
        let config = HistConfig {
            max_bin: max_num_bins,
            ..HistConfig::default()
        };
        CutMatrixBuilder::new(config).build(dmat)
    }

    /// Derive cut points from already reduced per-feature summaries.
    ///
    /// Each summary is pruned to `max_num_bins` entries first. A feature
    /// without any observation gets a lone sentinel. Fails when the total
    /// cut count no longer fits a `u32` offset.
    pub fn from_summaries(summaries: &[WQSummary], max_num_bins: usize) -> Result<Self> {
        let mut matrix = HistCutMatrix {
            row_ptr: Vec::with_capacity(summaries.len() + 1),
            cut: Vec::new(),
            min_val: Vec::with_capacity(summaries.len()),
        };
        matrix.row_ptr.push(0);
        for summary in summaries {
            matrix.push_feature(summary, max_num_bins)?;
        }
        Ok(matrix)
    }

    fn push_feature(&mut self, summary: &WQSummary, max_num_bins: usize) -> Result<()> {
        let pruned = WQSummary::set_prune(summary, max_num_bins);
        let entries = pruned.entries();

        let mut last_cut: Option<FeatureValue> = None;
        for entry in entries.iter().skip(1) {
            let cpt = entry.value - RT_EPS;
            if last_cut.map_or(true, |prev| cpt > prev) {
                self.cut.push(cpt);
                last_cut = Some(cpt);
            }
        }

        let (first, last) = match (entries.first(), entries.last()) {
            (Some(first), Some(last)) => (first.value, last.value),
            _ => (0.0, 0.0),
        };
        self.cut.push(last + last.abs() + RT_EPS);
        self.min_val.push(first - (first.abs() + RT_EPS));
        self.row_ptr.push(cut_offset(self.cut.len())?);
        Ok(())
    }

    /// Whether the matrix holds cut points (a default value holds none)
    pub fn is_built(&self) -> bool {
        self.row_ptr.len() > 1
    }

    pub fn cut(&self) -> &[FeatureValue] {
        &self.cut
    }

    pub fn row_ptr(&self) -> &[u32] {
        &self.row_ptr
    }

    /// Per feature, a value strictly below the smallest summarized value
    pub fn min_values(&self) -> &[FeatureValue] {
        &self.min_val
    }

    pub fn num_features(&self) -> usize {
        self.row_ptr.len().saturating_sub(1)
    }

    /// Bins owned by feature `fid`.
    ///
    /// # Panics
    ///
    /// Panics if `fid >= self.num_features()`.
    pub fn num_bins(&self, fid: usize) -> usize {
        (self.row_ptr[fid + 1] - self.row_ptr[fid]) as usize
    }

    pub fn total_bins(&self) -> usize {
        self.cut.len()
    }

    /// Cut points of feature `fid`.
    ///
    /// # Panics
    ///
    /// Panics if `fid >= self.num_features()`; see
    /// [`get_feature_cuts`](Self::get_feature_cuts) for a checked lookup.
    pub fn feature_cuts(&self, fid: usize) -> &[FeatureValue] {
        &self.cut[self.row_ptr[fid] as usize..self.row_ptr[fid + 1] as usize]
    }

    /// Cut points of feature `fid`, or `None` when out of range
    pub fn get_feature_cuts(&self, fid: usize) -> Option<&[FeatureValue]> {
        let begin = *self.row_ptr.get(fid)? as usize;
        let end = *self.row_ptr.get(fid + 1)? as usize;
        self.cut.get(begin..end)
    }

    /// Global bin of `value` for feature `fid`: the first cut strictly
    /// greater than `value`, clamped to the feature's last bin.
    ///
    /// `fid` must be below `self.num_features()`.
    #[inline]
    pub fn search_bin(&self, fid: usize, value: FeatureValue) -> BinIndex {
        let cuts = self.feature_cuts(fid);
        let pos = cuts.partition_point(|&c| c <= value);
        self.row_ptr[fid] + pos.min(cuts.len().saturating_sub(1)) as BinIndex
    }
}

fn cut_offset(len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| {
        HistError::invalid_parameter(
            "max_bin",
            len.to_string(),
            "total cut count exceeds the u32 bin index range",
        )
    })
}

/// Builds a [`HistCutMatrix`], possibly across several workers.
#[derive(Debug, Clone)]
pub struct CutMatrixBuilder {
    config: HistConfig,
    network: Network,
}

impl CutMatrixBuilder {
    pub fn new(config: HistConfig) -> Self {
        CutMatrixBuilder {
            config,
            network: Network::local(),
        }
    }

    /// Reduce summaries over `network` instead of a single worker
    pub fn with_network(mut self, network: Network) -> Self {
        self.network = network;
        self
    }

    pub fn config(&self) -> &HistConfig {
        &self.config
    }

    /// Sketch, reduce and cut.
    ///
    /// Every worker of the network must call this with the same
    /// configuration and feature count; all of them return identical cuts.
    /// A worker may hold no rows as long as some worker holds one. When
    /// any worker fails locally, all of them return an error instead of
    /// waiting on the failed one.
    pub fn build<D: DMatrix + ?Sized>(&self, dmat: &D) -> Result<HistCutMatrix> {
        let start = Instant::now();
        let info = dmat.info();
        let local = self.summarize_local(dmat);

        // every worker reaches this step, failed or not
        let failed = self.network.global_sum_u64(u64::from(local.is_err()))?;
        let (pool, mut summaries) = match local {
            Err(e) => {
                log::warn!(
                    "worker {} failed before the summary reduction: {}",
                    self.network.rank(),
                    e
                );
                return Err(e);
            }
            Ok(_) if failed > 0 => {
                return Err(HistError::WorkerFailure {
                    failed: failed as usize,
                    num_machines: self.network.num_machines(),
                })
            }
            Ok(local) => local,
        };

        let global_rows = self.network.global_sum_u64(info.num_row as u64)?;
        if global_rows == 0 {
            return Err(HistError::EmptyDataset);
        }

        let capacity = self.config.sketch_capacity();
        let reducer = SketchReducer::new(capacity);
        pool.install(|| reducer.allreduce(&self.network, &mut summaries))?;

        let matrix = HistCutMatrix::from_summaries(&summaries, self.config.max_bin)?;
        log::info!(
            "built {} cut points for {} features from {} rows on {} worker(s) in {:?}",
            matrix.total_bins(),
            matrix.num_features(),
            global_rows,
            self.network.num_machines(),
            start.elapsed()
        );
        Ok(matrix)
    }

    /// Local pass: validate, sketch and prune to the reducer capacity.
    /// Returns the pool for the reduction along with the summaries.
    fn summarize_local<D: DMatrix + ?Sized>(
        &self,
        dmat: &D,
    ) -> Result<(ThreadPool, Vec<WQSummary>)> {
        self.config.validate()?;
        let info = dmat.info();
        if info.num_col == 0 {
            return Err(HistError::EmptyDataset);
        }
        info.validate()?;

        let start = Instant::now();
        let num_threads = self.config.effective_num_threads();
        let pool = Threading::build_pool(num_threads)?;
        let capacity = self.config.sketch_capacity();

        let summaries = pool.install(|| -> Result<Vec<WQSummary>> {
            let sketches = self.sketch_local(dmat, num_threads)?;
            Ok(sketches
                .par_iter()
                .map(|sketch| WQSummary::set_prune(&sketch.get_summary(), capacity))
                .collect())
        })?;
        log::debug!(
            "sketched {} features over {} local rows in {:?}",
            info.num_col,
            info.num_row,
            start.elapsed()
        );
        Ok((pool, summaries))
    }

    fn sketch_local<D: DMatrix + ?Sized>(
        &self,
        dmat: &D,
        num_threads: usize,
    ) -> Result<Vec<WeightedQuantileSketch>> {
        let info = dmat.info();
        let eps = self.config.sketch_eps();
        let mut sketches = (0..info.num_col)
            .map(|fid| WeightedQuantileSketch::for_feature(fid, info.num_row, eps))
            .collect::<Result<Vec<_>>>()?;

        let ranges = Threading::feature_ranges(info.num_col, num_threads);
        let mut parts = partition_sketches(&mut sketches, &ranges);
        for batch in dmat.row_batches() {
            info.check_batch(batch.base_rowid, batch.size())?;
            parts
                .par_iter_mut()
                .try_for_each(|(begin, part)| push_batch(&batch, info, *begin, part))?;
        }

        Ok(sketches)
    }
}

/// Split the sketch arena into one disjoint mutable slice per range.
fn partition_sketches<'a>(
    sketches: &'a mut [WeightedQuantileSketch],
    ranges: &[Range<usize>],
) -> Vec<(usize, &'a mut [WeightedQuantileSketch])> {
    let mut rest = sketches;
    let mut parts = Vec::with_capacity(ranges.len());
    for range in ranges {
        let (head, tail) = std::mem::take(&mut rest).split_at_mut(range.len());
        parts.push((range.start, head));
        rest = tail;
    }
    parts
}

/// Push the observations of `batch` whose feature lies in
/// `begin..begin + part.len()`.
fn push_batch(
    batch: &RowBatch<'_>,
    info: &MetaInfo,
    begin: usize,
    part: &mut [WeightedQuantileSketch],
) -> Result<()> {
    let end = begin + part.len();
    for (i, row) in batch.iter().enumerate() {
        let weight = info.get_weight(batch.base_rowid + i) as Rank;
        for entry in row {
            let fid = entry.index as usize;
            if fid >= info.num_col {
                return Err(HistError::FeatureOutOfRange {
                    feature: fid,
                    num_features: info.num_col,
                });
            }
            if fid >= begin && fid < end {
                part[fid - begin].push(entry.fvalue, weight)?;
            }
        }
    }
    Ok(())
}
