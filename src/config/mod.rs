//! Configuration management.
//!
//! [`HistConfig`] carries the parameters shared by the cut matrix builder
//! and the index binner. It can be assembled with [`HistConfigBuilder`],
//! read from a `.toml`/`.json` file, or overridden from `QHIST_*`
//! environment variables.

pub mod core;

pub use self::core::{HistConfig, HistConfigBuilder};

/// Default file name looked up by drivers that keep a config next to the data
pub const DEFAULT_CONFIG_FILE: &str = "quantile_hist.toml";
