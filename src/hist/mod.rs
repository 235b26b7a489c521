//! Histogram cut points, quantized index and gradient histograms.
//!
//! - [`cut_matrix`]: per-feature cut points from sketched and reduced summaries
//! - [`index_matrix`]: row-major global bin ids for every present cell
//! - [`builder`]: per-bin gradient sums over the index matrix

pub mod builder;
pub mod cut_matrix;
pub mod index_matrix;

pub use builder::{GHistBuilder, GHistEntry, GradientPair};
pub use cut_matrix::{CutMatrixBuilder, HistCutMatrix};
pub use index_matrix::{GHistIndexMatrix, IndexBinner};
