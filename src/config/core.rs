//! Configuration structure and builder for cut matrix and index construction.

use crate::core::constants::*;
use crate::config_error;
use crate::core::error::{HistError, Result};

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Parameters controlling sketch accuracy, bin count and parallelism.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistConfig {
    /// Maximum number of bins per feature
    pub max_bin: usize,
    /// Accuracy over-provisioning factor for local sketches
    pub sketch_factor: usize,
    /// Number of worker threads (0 = all cores)
    pub num_threads: usize,
    /// Verbosity (<0 error, 0 warning, 1 info, >=2 debug)
    pub verbosity: i32,
}

impl Default for HistConfig {
    fn default() -> Self {
        HistConfig {
            max_bin: DEFAULT_MAX_BIN,
            sketch_factor: DEFAULT_SKETCH_FACTOR,
            num_threads: DEFAULT_NUM_THREADS,
            verbosity: 1,
        }
    }
}

impl HistConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the configuration parameters
    pub fn validate(&self) -> Result<()> {
        if self.max_bin < 2 {
            return Err(HistError::invalid_parameter(
                "max_bin",
                self.max_bin.to_string(),
                "must be at least 2",
            ));
        }

        if self.max_bin > MAX_MAX_BIN {
            return Err(HistError::invalid_parameter(
                "max_bin",
                self.max_bin.to_string(),
                format!("cannot exceed {}", MAX_MAX_BIN),
            ));
        }

        if self.sketch_factor < 1 {
            return Err(HistError::invalid_parameter(
                "sketch_factor",
                self.sketch_factor.to_string(),
                "must be at least 1",
            ));
        }

        Ok(())
    }

    /// Sketch error bound: `1 / (max_bin * sketch_factor)`
    pub fn sketch_eps(&self) -> f64 {
        1.0 / (self.max_bin * self.sketch_factor) as f64
    }

    /// Summary capacity used for the all-reduce payload
    pub fn sketch_capacity(&self) -> usize {
        self.max_bin * self.sketch_factor
    }

    /// Thread count after resolving 0 to the number of logical cores
    pub fn effective_num_threads(&self) -> usize {
        if self.num_threads == 0 {
            num_cpus::get()
        } else {
            self.num_threads
        }
    }

    /// Map verbosity to a `log` filter
    pub fn log_level_filter(&self) -> log::LevelFilter {
        match self.verbosity {
            v if v < 0 => log::LevelFilter::Error,
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        }
    }

    /// Load configuration from a `.toml` or `.json` file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| HistError::config(format!("Failed to read config file: {}", e)))?;

        let config: HistConfig = match path.extension().and_then(|s| s.to_str()) {
            Some("json") => serde_json::from_str(&content)
                .map_err(|e| HistError::config(format!("Failed to parse JSON config: {}", e)))?,
            Some("toml") => toml::from_str(&content)
                .map_err(|e| HistError::config(format!("Failed to parse TOML config: {}", e)))?,
            _ => {
                return Err(HistError::config(
                    "Unsupported config file format. Use .json or .toml",
                ))
            }
        };

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a `.toml` or `.json` file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = match path.extension().and_then(|s| s.to_str()) {
            Some("json") => serde_json::to_string_pretty(self)
                .map_err(|e| HistError::config(format!("Failed to serialize to JSON: {}", e)))?,
            Some("toml") => toml::to_string_pretty(self)
                .map_err(|e| HistError::config(format!("Failed to serialize to TOML: {}", e)))?,
            _ => {
                return Err(HistError::config(
                    "Unsupported config file format. Use .json or .toml",
                ))
            }
        };

        std::fs::write(path, content)
            .map_err(|e| HistError::config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Load configuration from `QHIST_*` environment variables on top of defaults
    pub fn load_from_environment() -> Result<Self> {
        let mut config = HistConfig::default();
        config.apply_environment_overrides()?;
        Ok(config)
    }

    /// Override fields from `QHIST_*` environment variables when set
    pub fn apply_environment_overrides(&mut self) -> Result<()> {
        if let Some(v) = env_value("QHIST_MAX_BIN")? {
            self.max_bin = v;
        }
        if let Some(v) = env_value("QHIST_SKETCH_FACTOR")? {
            self.sketch_factor = v;
        }
        if let Some(v) = env_value("QHIST_NUM_THREADS")? {
            self.num_threads = v;
        }
        if let Some(v) = env_value("QHIST_VERBOSITY")? {
            self.verbosity = v;
        }
        self.validate()
    }
}

fn env_value<T: std::str::FromStr>(key: &str) -> Result<Option<T>> {
    match std::env::var(key) {
        Ok(val) => val
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| config_error!("Invalid {}: {}", key, val)),
        Err(_) => Ok(None),
    }
}

/// Configuration builder for fluent configuration creation
#[derive(Debug, Clone)]
pub struct HistConfigBuilder {
    config: HistConfig,
    validation_errors: Vec<String>,
}

impl HistConfigBuilder {
    /// Create a new configuration builder
    pub fn new() -> Self {
        HistConfigBuilder {
            config: HistConfig::default(),
            validation_errors: Vec::new(),
        }
    }

    /// Set the maximum number of bins per feature
    pub fn max_bin(mut self, max_bin: usize) -> Self {
        if max_bin < 2 {
            self.validation_errors
                .push("max_bin must be at least 2".to_string());
        }
        self.config.max_bin = max_bin;
        self
    }

    /// Set the sketch safety factor
    pub fn sketch_factor(mut self, factor: usize) -> Self {
        if factor < 1 {
            self.validation_errors
                .push("sketch_factor must be at least 1".to_string());
        }
        self.config.sketch_factor = factor;
        self
    }

    /// Set the number of threads
    pub fn num_threads(mut self, threads: usize) -> Self {
        self.config.num_threads = threads;
        self
    }

    /// Set verbosity
    pub fn verbosity(mut self, verbosity: i32) -> Self {
        self.config.verbosity = verbosity;
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<HistConfig> {
        if !self.validation_errors.is_empty() {
            return Err(HistError::config(format!(
                "Configuration validation failed: {}",
                self.validation_errors.join(", ")
            )));
        }

        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for HistConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
