//! Core infrastructure shared by every pass.
//!
//! - [`types`]: Fundamental numeric aliases
//! - [`constants`]: Tolerances and defaults
//! - [`error`]: Error type and `Result` alias
//! - [`network`]: Collective transport used for the cross-worker reduction
//! - [`utils`]: Threading helpers

pub mod constants;
pub mod error;
pub mod network;
pub mod types;
pub mod utils;

pub use constants::*;
pub use error::{HistError, Result};
pub use network::{Collective, InProcessCollective, InProcessGroup, LocalCollective, Network};
pub use types::*;

/// Version information for the crate
pub const CORE_MODULE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the `env_logger` backend for the `log` facade.
///
/// Falls back to `default_level` when `RUST_LOG` is unset. Safe to call
/// more than once; later calls are ignored.
pub fn init_logging(default_level: log::LevelFilter) {
    let env = env_logger::Env::default().default_filter_or(default_level.as_str());
    let _ = env_logger::Builder::from_env(env).try_init();
}
