use thiserror::Error;

use super::config::ConfigError;
use crate::core::histogram::kernel::HistogramError;
use crate::core::models::configuration::ModelError;
use crate::core::transform::TransformError;
use crate::core::weighting::scheme::WeightingError;

/// Coarse classification of a [`ConstraintError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Inputs or settings are inconsistent.
    Configuration,
    /// A lifecycle call arrived in the wrong state.
    Transaction,
    /// A normalisation or fit hit a zero, negative or non-finite quantity.
    NumericDegeneracy,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConstraintError {
    #[error("Invalid configuration: {source}")]
    Model {
        #[from]
        source: ModelError,
    },

    #[error("Histogram computation failed: {source}")]
    Histogram {
        #[from]
        source: HistogramError,
    },

    #[error("Weighting failed: {source}")]
    Weighting {
        #[from]
        source: WeightingError,
    },

    #[error("Observable transform failed: {source}")]
    Transform {
        #[from]
        source: TransformError,
    },

    #[error("Invalid constraint settings: {source}")]
    Settings {
        #[from]
        source: ConfigError,
    },

    #[error("Cannot {operation} while the constraint is {state}")]
    Transaction {
        operation: &'static str,
        state: &'static str,
    },

    #[error("Numerically degenerate: {0}")]
    NumericDegeneracy(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl ConstraintError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Model { .. } | Self::Settings { .. } | Self::Configuration(_) => {
                ErrorKind::Configuration
            }
            Self::Histogram { source } => histogram_kind(source),
            Self::Weighting { source } => match source {
                WeightingError::Degenerate(_) | WeightingError::NonFiniteWeight { .. } => {
                    ErrorKind::NumericDegeneracy
                }
                _ => ErrorKind::Configuration,
            },
            Self::Transform { source } => match source {
                TransformError::Degenerate(_) => ErrorKind::NumericDegeneracy,
                TransformError::Histogram(inner) => histogram_kind(inner),
                _ => ErrorKind::Configuration,
            },
            Self::Transaction { .. } => ErrorKind::Transaction,
            Self::NumericDegeneracy(_) => ErrorKind::NumericDegeneracy,
        }
    }
}

fn histogram_kind(error: &HistogramError) -> ErrorKind {
    match error {
        HistogramError::InvalidDistance { .. } => ErrorKind::NumericDegeneracy,
        _ => ErrorKind::Configuration,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_are_classified_by_cause() {
        let e: ConstraintError = ModelError::EmptySubset.into();
        assert_eq!(e.kind(), ErrorKind::Configuration);

        let e: ConstraintError = TransformError::Degenerate("zero volume".into()).into();
        assert_eq!(e.kind(), ErrorKind::NumericDegeneracy);

        let e: ConstraintError = HistogramError::InvalidDistance {
            first: 0,
            second: 1,
            distance: f64::NAN,
        }
        .into();
        assert_eq!(e.kind(), ErrorKind::NumericDegeneracy);

        let e = ConstraintError::Transaction {
            operation: "accept a move",
            state: "idle",
        };
        assert_eq!(e.kind(), ErrorKind::Transaction);
        assert_eq!(e.to_string(), "Cannot accept a move while the constraint is idle");
    }
}
