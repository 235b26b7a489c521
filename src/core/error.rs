//! Error handling and error types for the quantile histogram core.
//!
//! Every construction step in this crate is a one-shot deterministic pass
//! over a fixed dataset. Errors therefore abort construction and are never
//! retried internally: rerunning from scratch with the same inputs is the
//! only valid recovery.

use std::io;
use thiserror::Error;

/// Main error type for the library.
#[derive(Error, Debug)]
pub enum HistError {
    /// Configuration and validation errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Invalid input parameters
    #[error("Invalid parameter: {parameter} = {value}, {reason}")]
    InvalidParameter {
        parameter: String,
        value: String,
        reason: String,
    },

    /// Malformed dataset content
    #[error("Dataset error: {message}")]
    Dataset { message: String },

    /// Dataset without rows or features
    #[error("Empty dataset provided")]
    EmptyDataset,

    /// A row references a feature beyond the declared feature count
    #[error("Feature index {feature} out of range, dataset declares {num_features} features")]
    FeatureOutOfRange { feature: usize, num_features: usize },

    /// Feature count differs between the cut matrix and the dataset being binned
    #[error("Feature count mismatch: expected {expected}, got {actual}")]
    FeatureCountMismatch { expected: usize, actual: usize },

    /// NaN or infinite feature value
    #[error("Feature {feature} has invalid value: {value}")]
    InvalidFeatureValue { feature: usize, value: f32 },

    /// Negative or non-finite sample weight pushed into a sketch
    #[error("Invalid weight {weight} pushed for value {value}, weights must be finite and non-negative")]
    NegativeWeight { value: f32, weight: f64 },

    /// Binning requested without a built cut matrix
    #[error("Cut matrix has not been built")]
    MissingCutMatrix,

    /// Collective transport failure
    #[error("Network error: {message}")]
    Network { message: String },

    /// Workers disagree on the shape of a collective payload
    #[error("Worker mismatch: expected {expected}, got {actual}")]
    WorkerMismatch { expected: String, actual: String },

    /// Another worker failed before the collective step, so this one aborts too
    #[error("{failed} of {num_machines} worker(s) failed before the summary reduction")]
    WorkerFailure { failed: usize, num_machines: usize },

    /// Summary encoding or decoding errors
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// Thread pool construction or synchronization errors
    #[error("Threading error: {message}")]
    Threading { message: String },

    /// File I/O errors
    #[error("I/O error: {source}")]
    IO {
        #[from]
        source: io::Error,
    },

    /// JSON serialization errors
    #[error("JSON error: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },

    /// Bincode serialization errors
    #[error("Bincode error: {source}")]
    Bincode {
        #[from]
        source: bincode::Error,
    },

    /// Internal library errors (should not occur in normal usage)
    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Type alias for Results using HistError
pub type Result<T> = std::result::Result<T, HistError>;

impl HistError {
    /// Create a configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        HistError::Config {
            message: message.into(),
        }
    }

    /// Create a dataset error
    pub fn dataset<S: Into<String>>(message: S) -> Self {
        HistError::Dataset {
            message: message.into(),
        }
    }

    /// Create a network error
    pub fn network<S: Into<String>>(message: S) -> Self {
        HistError::Network {
            message: message.into(),
        }
    }

    /// Create a serialization error
    pub fn serialization<S: Into<String>>(message: S) -> Self {
        HistError::Serialization {
            message: message.into(),
        }
    }

    /// Create a threading error
    pub fn threading<S: Into<String>>(message: S) -> Self {
        HistError::Threading {
            message: message.into(),
        }
    }

    /// Create an internal error (should be used sparingly)
    pub fn internal<S: Into<String>>(message: S) -> Self {
        HistError::Internal {
            message: message.into(),
        }
    }

    /// Create an invalid parameter error
    pub fn invalid_parameter<P, V, R>(parameter: P, value: V, reason: R) -> Self
    where
        P: Into<String>,
        V: Into<String>,
        R: Into<String>,
    {
        HistError::InvalidParameter {
            parameter: parameter.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Create a worker mismatch error
    pub fn worker_mismatch<E, A>(expected: E, actual: A) -> Self
    where
        E: Into<String>,
        A: Into<String>,
    {
        HistError::WorkerMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Whether rerunning the failed step could succeed without changing inputs.
    ///
    /// Always false: all passes here are deterministic.
    pub fn is_recoverable(&self) -> bool {
        false
    }

    /// Whether this error reports a violated precondition on the inputs
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            HistError::EmptyDataset
                | HistError::FeatureOutOfRange { .. }
                | HistError::FeatureCountMismatch { .. }
                | HistError::InvalidFeatureValue { .. }
                | HistError::NegativeWeight { .. }
                | HistError::MissingCutMatrix
        )
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            HistError::Config { .. } => "config",
            HistError::InvalidParameter { .. } => "invalid_parameter",
            HistError::Dataset { .. } => "dataset",
            HistError::EmptyDataset => "empty_dataset",
            HistError::FeatureOutOfRange { .. } => "feature_out_of_range",
            HistError::FeatureCountMismatch { .. } => "feature_count_mismatch",
            HistError::InvalidFeatureValue { .. } => "invalid_feature_value",
            HistError::NegativeWeight { .. } => "negative_weight",
            HistError::MissingCutMatrix => "missing_cut_matrix",
            HistError::Network { .. } => "network",
            HistError::WorkerMismatch { .. } => "worker_mismatch",
            HistError::WorkerFailure { .. } => "worker_failure",
            HistError::Serialization { .. } => "serialization",
            HistError::Threading { .. } => "threading",
            HistError::IO { .. } => "io",
            HistError::Json { .. } => "json",
            HistError::Bincode { .. } => "bincode",
            HistError::Internal { .. } => "internal",
        }
    }
}

/// Convenience macros for error creation
#[macro_export]
macro_rules! config_error {
    ($msg:expr) => {
        $crate::core::error::HistError::config($msg)
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::core::error::HistError::config(format!($fmt, $($arg)*))
    };
}

#[macro_export]
macro_rules! dataset_error {
    ($msg:expr) => {
        $crate::core::error::HistError::dataset($msg)
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::core::error::HistError::dataset(format!($fmt, $($arg)*))
    };
}

#[macro_export]
macro_rules! ensure {
    ($cond:expr, $err:expr) => {
        if !($cond) {
            return Err($err.into());
        }
    };
}
