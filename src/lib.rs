//! # quantile-hist
//!
//! Quantile sketching and histogram quantization for histogram-based
//! gradient boosting.
//!
//! Two passes over a sparse dataset turn raw feature values into small
//! integer bin ids:
//!
//! 1. [`CutMatrixBuilder`] streams every row once, feeds each feature's
//!    values into a weighted quantile sketch, all-reduces the per-feature
//!    summaries across workers and derives at most `max_bin` cut points per
//!    feature ([`HistCutMatrix`]).
//! 2. [`IndexBinner`] streams the rows again and maps every present cell to
//!    its global bin id ([`GHistIndexMatrix`]), counting hits per bin.
//!
//! [`GHistBuilder`] then accumulates gradient statistics per bin.
//!
//! ## Quick Start
//!
//! ```rust
//! use quantile_hist::prelude::*;
//! use ndarray::array;
//! use std::sync::Arc;
//!
//! # fn main() -> quantile_hist::Result<()> {
//! let features = array![[1.0, 0.5], [2.0, f32::NAN], [3.0, 1.5], [4.0, 2.5]];
//! let dmat = SparsePageDMatrix::from_dense(&features, None)?;
//!
//! let config = HistConfigBuilder::new().max_bin(4).build()?;
//! let cut = Arc::new(CutMatrixBuilder::new(config.clone()).build(&dmat)?);
//! let gmat = IndexBinner::new(config).with_cut_matrix(cut).build(&dmat)?;
//!
//! assert_eq!(gmat.num_rows(), 4);
//! assert_eq!(gmat.row(1).len(), 1);
//! # Ok(())
//! # }
//! ```
//!
//! ## Distributed workers
//!
//! Workers cooperate only through the all-reduce inside
//! [`CutMatrixBuilder::build`]. Plug a transport in by implementing
//! [`Collective`] and passing it with [`CutMatrixBuilder::with_network`];
//! [`InProcessGroup`] runs several workers as threads of one process.
//!
//! ## Architecture
//!
//! - [`core`]: errors, constants, numeric types, collectives, threading
//! - [`config`]: [`HistConfig`] and its builder
//! - [`dataset`]: the [`DMatrix`] row-batch abstraction and an in-memory CSR
//! - [`sketch`]: weighted quantile summaries, streaming sketch, reducer
//! - [`hist`]: cut matrix, index matrix, gradient histograms

#![warn(missing_debug_implementations, rust_2018_idioms)]

pub mod config;
pub mod core;
pub mod dataset;
pub mod hist;
pub mod sketch;

pub use config::{HistConfig, HistConfigBuilder};
pub use crate::core::{
    constants::*,
    error::{HistError, Result},
    init_logging,
    network::{Collective, InProcessCollective, InProcessGroup, LocalCollective, Network},
    types::*,
};
pub use dataset::{DMatrix, MetaInfo, RowBatch, SparseEntry, SparsePageDMatrix};
pub use hist::{
    CutMatrixBuilder, GHistBuilder, GHistEntry, GHistIndexMatrix, GradientPair, HistCutMatrix,
    IndexBinner,
};
pub use sketch::{SketchReducer, SummaryEntry, WQSummary, WeightedQuantileSketch};

/// Crate version
pub use crate::core::CORE_MODULE_VERSION as VERSION;

/// Commonly used items
pub mod prelude {
    pub use crate::config::{HistConfig, HistConfigBuilder};
    pub use crate::core::error::{HistError, Result};
    pub use crate::core::network::{Collective, InProcessGroup, Network};
    pub use crate::dataset::{DMatrix, SparseEntry, SparsePageDMatrix};
    pub use crate::hist::{
        CutMatrixBuilder, GHistBuilder, GHistIndexMatrix, GradientPair, HistCutMatrix,
        IndexBinner,
    };
}
