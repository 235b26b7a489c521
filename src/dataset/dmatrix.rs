//! Row-batch view of a sparse dataset.

use crate::core::error::{HistError, Result};
use crate::core::types::{FeatureIndex, FeatureValue, RowIndex, Weight};
use serde::{Deserialize, Serialize};

/// One present cell of a sparse row.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SparseEntry {
    /// Feature id
    pub index: FeatureIndex,
    /// Feature value
    pub fvalue: FeatureValue,
}

static_assertions::assert_eq_size!(SparseEntry, u64);

impl SparseEntry {
    pub fn new(index: FeatureIndex, fvalue: FeatureValue) -> Self {
        SparseEntry { index, fvalue }
    }
}

/// Dataset metadata needed by the cut and index passes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetaInfo {
    /// Rows held locally
    pub num_row: usize,
    /// Declared feature count
    pub num_col: usize,
    /// Present cells across all rows
    pub num_nonzero: usize,
    /// Per-row weights; empty means every row weighs 1.0
    pub weights: Vec<Weight>,
}

impl MetaInfo {
    /// Check that `weights` is empty or holds one weight per row.
    pub fn validate(&self) -> Result<()> {
        if !self.weights.is_empty() && self.weights.len() != self.num_row {
            return Err(HistError::dataset(format!(
                "weights length {} does not match row count {}",
                self.weights.len(),
                self.num_row
            )));
        }
        Ok(())
    }

    /// Check that a batch of `size` rows starting at `base_rowid` lies
    /// within the declared rows.
    pub fn check_batch(&self, base_rowid: RowIndex, size: usize) -> Result<()> {
        match base_rowid.checked_add(size) {
            Some(end) if end <= self.num_row => Ok(()),
            _ => Err(HistError::dataset(format!(
                "batch of {} rows at row {} exceeds the {} declared rows",
                size, base_rowid, self.num_row
            ))),
        }
    }

    /// Weight of row `ridx`.
    ///
    /// `ridx` must be below `num_row` of a validated `MetaInfo`.
    #[inline]
    pub fn get_weight(&self, ridx: RowIndex) -> Weight {
        if self.weights.is_empty() {
            1.0
        } else {
            self.weights[ridx]
        }
    }
}

/// A contiguous range of CSR rows starting at global row `base_rowid`.
///
/// `offset` holds `size() + 1` positions into `data`; row `i` is
/// `data[offset[i]..offset[i + 1]]`.
#[derive(Debug, Clone, Copy)]
pub struct RowBatch<'a> {
    pub base_rowid: RowIndex,
    offset: &'a [usize],
    data: &'a [SparseEntry],
}

impl<'a> RowBatch<'a> {
    pub fn new(base_rowid: RowIndex, offset: &'a [usize], data: &'a [SparseEntry]) -> Self {
        debug_assert!(!offset.is_empty());
        debug_assert!(offset.last().map_or(true, |&end| end <= data.len()));
        RowBatch {
            base_rowid,
            offset,
            data,
        }
    }

    /// Number of rows in the batch
    pub fn size(&self) -> usize {
        self.offset.len().saturating_sub(1)
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Entries of row `i`, counted from the start of the batch
    #[inline]
    pub fn row(&self, i: usize) -> &'a [SparseEntry] {
        &self.data[self.offset[i]..self.offset[i + 1]]
    }

    /// Entries present in this batch
    pub fn num_entries(&self) -> usize {
        match (self.offset.first(), self.offset.last()) {
            (Some(&begin), Some(&end)) => end - begin,
            _ => 0,
        }
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = &'a [SparseEntry]> + 'a {
        let data = self.data;
        self.offset.windows(2).map(move |w| &data[w[0]..w[1]])
    }
}

/// Source of row batches for the cut and index passes.
///
/// `row_batches` restarts from the first batch on every call, so a dataset
/// can be scanned once for sketching and again for binning.
pub trait DMatrix: Sync {
    fn info(&self) -> &MetaInfo;

    fn row_batches(&self) -> Box<dyn Iterator<Item = RowBatch<'_>> + '_>;
}
