//! Gradient histograms over a quantized dataset.

use super::index_matrix::GHistIndexMatrix;
use crate::core::constants::ROW_BLOCK_SIZE;
use crate::core::error::{HistError, Result};
use crate::core::types::{Hist, RowIndex};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::ops::{AddAssign, Sub};

/// First and second order gradient of one row
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GradientPair {
    pub grad: f32,
    pub hess: f32,
}

impl GradientPair {
    pub fn new(grad: f32, hess: f32) -> Self {
        GradientPair { grad, hess }
    }
}

/// Gradient sums of one bin
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GHistEntry {
    pub sum_grad: Hist,
    pub sum_hess: Hist,
}

impl GHistEntry {
    #[inline]
    pub fn add_pair(&mut self, gpair: GradientPair) {
        self.sum_grad += gpair.grad as Hist;
        self.sum_hess += gpair.hess as Hist;
    }
}

impl AddAssign for GHistEntry {
    fn add_assign(&mut self, other: GHistEntry) {
        self.sum_grad += other.sum_grad;
        self.sum_hess += other.sum_hess;
    }
}

impl Sub for GHistEntry {
    type Output = GHistEntry;

    fn sub(self, other: GHistEntry) -> GHistEntry {
        GHistEntry {
            sum_grad: self.sum_grad - other.sum_grad,
            sum_hess: self.sum_hess - other.sum_hess,
        }
    }
}

/// Accumulates per-bin gradient sums for a set of rows.
///
/// Work is split into row blocks, each filling a private histogram, and the
/// private histograms are summed afterwards. Runs on the current rayon pool.
#[derive(Debug, Clone, Copy)]
pub struct GHistBuilder {
    nbins: usize,
}

impl GHistBuilder {
    pub fn new(nbins: usize) -> Self {
        GHistBuilder { nbins }
    }

    /// Builder sized for every bin of `gmat`
    pub fn for_matrix(gmat: &GHistIndexMatrix) -> Self {
        Self::new(gmat.cut().total_bins())
    }

    pub fn num_bins(&self) -> usize {
        self.nbins
    }

    /// Histogram of `gpair` over the rows in `row_indices`
    pub fn build_hist(
        &self,
        gpair: &[GradientPair],
        row_indices: &[RowIndex],
        gmat: &GHistIndexMatrix,
    ) -> Result<Vec<GHistEntry>> {
        if gmat.cut().total_bins() != self.nbins {
            return Err(HistError::invalid_parameter(
                "nbins",
                self.nbins.to_string(),
                format!("index matrix has {} bins", gmat.cut().total_bins()),
            ));
        }
        if gpair.len() < gmat.num_rows() {
            return Err(HistError::dataset(format!(
                "{} gradient pairs for {} rows",
                gpair.len(),
                gmat.num_rows()
            )));
        }
        if let Some(&ridx) = row_indices.iter().find(|&&r| r >= gmat.num_rows()) {
            return Err(HistError::dataset(format!(
                "row {} out of range for {} rows",
                ridx,
                gmat.num_rows()
            )));
        }

        let nbins = self.nbins;
        let hist = row_indices
            .par_chunks(ROW_BLOCK_SIZE)
            .fold(
                || vec![GHistEntry::default(); nbins],
                |mut hist, rows| {
                    for &ridx in rows {
                        let g = gpair[ridx];
                        for &bin in gmat.row(ridx) {
                            hist[bin as usize].add_pair(g);
                        }
                    }
                    hist
                },
            )
            .reduce(
                || vec![GHistEntry::default(); nbins],
                |mut a, b| {
                    for (x, y) in a.iter_mut().zip(b) {
                        *x += y;
                    }
                    a
                },
            );
        Ok(hist)
    }

    /// Sibling histogram from the parent and the other child
    pub fn subtraction_trick(
        parent: &[GHistEntry],
        sibling: &[GHistEntry],
    ) -> Result<Vec<GHistEntry>> {
        if parent.len() != sibling.len() {
            return Err(HistError::invalid_parameter(
                "sibling",
                format!("{} bins", sibling.len()),
                format!("parent has {} bins", parent.len()),
            ));
        }
        Ok(parent
            .par_iter()
            .zip(sibling.par_iter())
            .map(|(&p, &s)| p - s)
            .collect())
    }
}
