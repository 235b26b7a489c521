//! Dataset access for the cut and index passes.
//!
//! The passes only need row batches in CSR form plus a little metadata, so
//! they are written against the [`DMatrix`] trait. [`SparsePageDMatrix`] is
//! the in-memory implementation.

pub mod dmatrix;
pub mod sparse_page;

pub use dmatrix::{DMatrix, MetaInfo, RowBatch, SparseEntry};
pub use sparse_page::SparsePageDMatrix;
