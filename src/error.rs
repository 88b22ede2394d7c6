//! Error types for traffic-gnn operations.
//!
//! Provides rich error context for library consumers. Tensor shape
//! assertions inside the numeric kernels stay panics; everything that can
//! go wrong because of an input file or a configuration value is reported
//! through [`TrafficError`].

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for traffic-gnn operations.
pub type Result<T> = std::result::Result<T, TrafficError>;

/// Main error type for traffic-gnn operations.
///
/// # Examples
///
/// ```
/// use traffic_gnn::error::TrafficError;
///
/// let err = TrafficError::MissingColumn {
///     table: "traffic".to_string(),
///     column: "average_speed".to_string(),
/// };
/// assert!(err.to_string().contains("average_speed"));
/// ```
#[derive(Error, Debug)]
pub enum TrafficError {
    /// I/O error (file not found, permission denied, etc.).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed CSV content.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// A required column is absent from an input table.
    #[error("Missing column '{column}' in {table} table")]
    MissingColumn {
        /// Table name ("traffic" or "road network")
        table: String,
        /// Column name
        column: String,
    },

    /// An intersection has no traffic measurements to aggregate.
    #[error("No traffic measurements for intersection '{intersection}'")]
    MissingTraffic {
        /// Intersection identifier
        intersection: String,
    },

    /// A road segment references an intersection that was never declared.
    #[error("Road segment references unknown intersection '{intersection}'")]
    UnknownIntersection {
        /// Intersection identifier
        intersection: String,
    },

    /// The road network produced no nodes.
    #[error("Road network contains no intersections")]
    EmptyGraph,

    /// Tensor or table dimensions don't match.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected dimensions description
        expected: String,
        /// Actual dimensions found
        actual: String,
    },

    /// Invalid hyperparameter value provided.
    #[error("Invalid hyperparameter: {param} = {value} ({constraint})")]
    InvalidHyperparameter {
        /// Parameter name
        param: String,
        /// Provided value
        value: String,
        /// Constraint description
        constraint: String,
    },

    /// Invalid or corrupt checkpoint file.
    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    /// A transformer was used before `fit`.
    #[error("{0} is not fitted")]
    NotFitted(String),

    /// Plot rendering failed.
    #[error("Plot error: {0}")]
    Plot(String),

    /// Configuration file could not be parsed.
    #[error("Config error in {}: {message}", path.display())]
    Config {
        /// Config file path
        path: PathBuf,
        /// Parser message
        message: String,
    },
}

impl TrafficError {
    /// Convenience constructor for [`TrafficError::InvalidHyperparameter`].
    pub(crate) fn invalid_param(
        param: &str,
        value: impl ToString,
        constraint: &str,
    ) -> Self {
        Self::InvalidHyperparameter {
            param: param.to_string(),
            value: value.to_string(),
            constraint: constraint.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_column_display() {
        let err = TrafficError::MissingColumn {
            table: "road network".to_string(),
            column: "distance".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Missing column 'distance' in road network table"
        );
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: TrafficError = io.into();
        assert!(matches!(err, TrafficError::Io(_)));
        assert!(err.to_string().contains("gone"));
    }

    #[test]
    fn test_invalid_param_helper() {
        let err = TrafficError::invalid_param("learning_rate", -0.1, "must be > 0");
        let msg = err.to_string();
        assert!(msg.contains("learning_rate"));
        assert!(msg.contains("-0.1"));
        assert!(msg.contains("must be > 0"));
    }
}
