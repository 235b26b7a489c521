//! Internal utilities.

pub mod threading;

pub use threading::Threading;
