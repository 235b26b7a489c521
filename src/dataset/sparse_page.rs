//! In-memory CSR dataset.

use super::dmatrix::{DMatrix, MetaInfo, RowBatch, SparseEntry};
use crate::core::constants::DEFAULT_BATCH_ROWS;
use crate::core::error::{HistError, Result};
use crate::core::types::{FeatureIndex, Weight};
use crate::{dataset_error, ensure};

use ndarray::{Array1, Array2};

/// CSR dataset held in memory and served in fixed-size row batches.
#[derive(Debug, Clone)]
pub struct SparsePageDMatrix {
    info: MetaInfo,
    offset: Vec<usize>,
    data: Vec<SparseEntry>,
    batch_rows: usize,
}

impl SparsePageDMatrix {
    /// Build from CSR arrays.
    ///
    /// `offset` must start at 0, be non-decreasing and end at `data.len()`.
    /// Every entry must reference a feature below `num_col`. `weights`, when
    /// given and non-empty, needs one value per row.
    pub fn from_csr(
        offset: Vec<usize>,
        data: Vec<SparseEntry>,
        num_col: usize,
        weights: Option<Vec<Weight>>,
    ) -> Result<Self> {
        ensure!(
            offset.first() == Some(&0),
            dataset_error!("row offsets must start at 0")
        );
        if let Some(pos) = offset.windows(2).position(|w| w[1] < w[0]) {
            return Err(HistError::dataset(format!(
                "row offsets decrease at row {}: {} -> {}",
                pos,
                offset[pos],
                offset[pos + 1]
            )));
        }
        ensure!(
            offset.last() == Some(&data.len()),
            dataset_error!(
                "row offsets end at {:?} but {} entries were given",
                offset.last(),
                data.len()
            )
        );
        if let Some(entry) = data.iter().find(|e| e.index as usize >= num_col) {
            return Err(HistError::FeatureOutOfRange {
                feature: entry.index as usize,
                num_features: num_col,
            });
        }

        let num_row = offset.len() - 1;
        let weights = weights.unwrap_or_default();
        ensure!(
            weights.is_empty() || weights.len() == num_row,
            dataset_error!(
                "weights length {} does not match row count {}",
                weights.len(),
                num_row
            )
        );

        let info = MetaInfo {
            num_row,
            num_col,
            num_nonzero: data.len(),
            weights,
        };

        Ok(SparsePageDMatrix {
            info,
            offset,
            data,
            batch_rows: DEFAULT_BATCH_ROWS,
        })
    }

    /// Build from a dense matrix; NaN cells are missing and not stored.
    pub fn from_dense(features: &Array2<f32>, weights: Option<&Array1<f32>>) -> Result<Self> {
        let num_col = features.ncols();
        let mut offset = Vec::with_capacity(features.nrows() + 1);
        let mut data = Vec::with_capacity(features.len());
        offset.push(0);

        for row in features.rows() {
            data.extend(
                row.iter()
                    .enumerate()
                    .filter(|(_, v)| !v.is_nan())
                    .map(|(fid, &v)| SparseEntry::new(fid as FeatureIndex, v)),
            );
            offset.push(data.len());
        }

        let weights = weights.map(|w| w.to_vec());
        Self::from_csr(offset, data, num_col, weights)
    }

    /// Rows handed out per batch (at least 1)
    pub fn with_batch_size(mut self, batch_rows: usize) -> Self {
        self.batch_rows = batch_rows.max(1);
        self
    }

    pub fn batch_size(&self) -> usize {
        self.batch_rows
    }

    pub fn num_batches(&self) -> usize {
        self.info.num_row.div_ceil(self.batch_rows)
    }
}

impl DMatrix for SparsePageDMatrix {
    fn info(&self) -> &MetaInfo {
        &self.info
    }

    fn row_batches(&self) -> Box<dyn Iterator<Item = RowBatch<'_>> + '_> {
        let num_row = self.info.num_row;
        let step = self.batch_rows;
        Box::new((0..num_row).step_by(step).map(move |begin| {
            let end = (begin + step).min(num_row);
            RowBatch::new(begin, &self.offset[begin..=end], &self.data)
        }))
    }
}
