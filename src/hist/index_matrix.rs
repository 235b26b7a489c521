//! Quantized, row-major view of a dataset.

use super::cut_matrix::HistCutMatrix;
use crate::config::HistConfig;
use crate::core::constants::ROW_BLOCK_SIZE;
use crate::core::error::{HistError, Result};
use crate::core::types::BinIndex;
use crate::core::utils::Threading;
use crate::dataset::{DMatrix, SparseEntry};

use rayon::prelude::*;
use std::sync::Arc;
use std::time::Instant;

/// Global bin ids of every present cell, grouped by row.
///
/// Row `r` owns `index[row_ptr[r]..row_ptr[r + 1]]`, sorted ascending.
/// `hit_count[b]` counts the cells that fell into bin `b`.
#[derive(Debug, Clone)]
pub struct GHistIndexMatrix {
    row_ptr: Vec<usize>,
    index: Vec<BinIndex>,
    hit_count: Vec<usize>,
    cut: Arc<HistCutMatrix>,
}

impl GHistIndexMatrix {
    /// Bin `dmat` against `cut` with default threading
    pub fn init<D: DMatrix + ?Sized>(dmat: &D, cut: Arc<HistCutMatrix>) -> Result<Self> {
        IndexBinner::new(HistConfig::default())
            .with_cut_matrix(cut)
            .build(dmat)
    }

    pub fn row_ptr(&self) -> &[usize] {
        &self.row_ptr
    }

    pub fn index(&self) -> &[BinIndex] {
        &self.index
    }

    pub fn hit_count(&self) -> &[usize] {
        &self.hit_count
    }

    pub fn cut(&self) -> &Arc<HistCutMatrix> {
        &self.cut
    }

    pub fn num_rows(&self) -> usize {
        self.row_ptr.len() - 1
    }

    /// Sorted bin ids of row `r`
    #[inline]
    pub fn row(&self, r: usize) -> &[BinIndex] {
        &self.index[self.row_ptr[r]..self.row_ptr[r + 1]]
    }

    pub fn total_entries(&self) -> usize {
        self.index.len()
    }
}

/// Second pass over the dataset: maps every cell to its global bin.
#[derive(Debug, Clone)]
pub struct IndexBinner {
    config: HistConfig,
    cut: Option<Arc<HistCutMatrix>>,
}

impl IndexBinner {
    pub fn new(config: HistConfig) -> Self {
        IndexBinner { config, cut: None }
    }

    pub fn with_cut_matrix(mut self, cut: Arc<HistCutMatrix>) -> Self {
        self.cut = Some(cut);
        self
    }

    /// Bin every row of `dmat`.
    ///
    /// Fails without producing a matrix when no built cut matrix is set,
    /// the dataset is empty, its feature count differs from the cut
    /// matrix, or a cell holds an out-of-range feature or a non-finite
    /// value.
    pub fn build<D: DMatrix + ?Sized>(&self, dmat: &D) -> Result<GHistIndexMatrix> {
        let cut = match &self.cut {
            Some(cut) if cut.is_built() => Arc::clone(cut),
            _ => return Err(HistError::MissingCutMatrix),
        };
        let info = dmat.info();
        if info.num_row == 0 {
            return Err(HistError::EmptyDataset);
        }
        if info.num_col != cut.num_features() {
            return Err(HistError::FeatureCountMismatch {
                expected: cut.num_features(),
                actual: info.num_col,
            });
        }

        let start = Instant::now();
        let pool = Threading::build_pool(self.config.effective_num_threads())?;

        let mut row_ptr: Vec<usize> = Vec::with_capacity(info.num_row + 1);
        row_ptr.push(0);
        let mut index: Vec<BinIndex> = Vec::with_capacity(info.num_nonzero);

        let hit_count = pool.install(|| -> Result<Vec<usize>> {
            for batch in dmat.row_batches() {
                let rbegin = row_ptr.len() - 1;
                for row in batch.iter() {
                    let prev = row_ptr[row_ptr.len() - 1];
                    row_ptr.push(prev + row.len());
                }
                let ibegin = row_ptr[rbegin];
                let iend = row_ptr[row_ptr.len() - 1];
                index.resize(iend, 0);

                let slots = split_rows(&mut index[ibegin..iend], &row_ptr[rbegin..]);
                slots
                    .into_par_iter()
                    .enumerate()
                    .try_for_each(|(i, slot)| bin_row(&cut, batch.row(i), slot))?;
            }
            Ok(count_hits(&index, cut.total_bins()))
        })?;

        if row_ptr.len() != info.num_row + 1 {
            return Err(HistError::dataset(format!(
                "dataset declared {} rows but yielded {}",
                info.num_row,
                row_ptr.len() - 1
            )));
        }

        log::info!(
            "binned {} entries of {} rows into {} bins in {:?}",
            index.len(),
            info.num_row,
            cut.total_bins(),
            start.elapsed()
        );

        Ok(GHistIndexMatrix {
            row_ptr,
            index,
            hit_count,
            cut,
        })
    }
}

/// Carve `index` into one disjoint slot per row of `row_ptr` (absolute
/// positions, first one at the start of `index`).
fn split_rows<'a>(index: &'a mut [BinIndex], row_ptr: &[usize]) -> Vec<&'a mut [BinIndex]> {
    let mut rest = index;
    let mut slots = Vec::with_capacity(row_ptr.len().saturating_sub(1));
    for w in row_ptr.windows(2) {
        let (head, tail) = std::mem::take(&mut rest).split_at_mut(w[1] - w[0]);
        slots.push(head);
        rest = tail;
    }
    slots
}

fn bin_row(cut: &HistCutMatrix, row: &[SparseEntry], slot: &mut [BinIndex]) -> Result<()> {
    let num_features = cut.num_features();
    for (dst, entry) in slot.iter_mut().zip(row) {
        let fid = entry.index as usize;
        if fid >= num_features {
            return Err(HistError::FeatureOutOfRange {
                feature: fid,
                num_features,
            });
        }
        if !entry.fvalue.is_finite() {
            return Err(HistError::InvalidFeatureValue {
                feature: fid,
                value: entry.fvalue,
            });
        }
        *dst = cut.search_bin(fid, entry.fvalue);
    }
    slot.sort_unstable();
    Ok(())
}

fn count_hits(index: &[BinIndex], nbins: usize) -> Vec<usize> {
    index
        .par_chunks(ROW_BLOCK_SIZE)
        .fold(
            || vec![0usize; nbins],
            |mut hits, chunk| {
                for &bin in chunk {
                    hits[bin as usize] += 1;
                }
                hits
            },
        )
        .reduce(
            || vec![0usize; nbins],
            |mut a, b| {
                for (x, y) in a.iter_mut().zip(b) {
                    *x += y;
                }
                a
            },
        )
}
