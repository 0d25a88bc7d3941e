//! Error types and validation functions for mixture modelling.
//!
//! Every failure the engine can report is a [`MixtureError`]. Numeric
//! degeneracies (tiny determinants, underflowing likelihoods) are never
//! errors; they are clamped to the floors in [`crate::math_utils::constants`].

use crate::distrib::DistribKind;
use thiserror::Error;

/// Error types for distribution, mixture, pool and accumulator operations.
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum MixtureError {
    /// Feature, distribution or mixture dimensions disagree.
    #[error("Dimension mismatch in {context}: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimension required by the receiving object
        expected: usize,
        /// Dimension actually supplied
        actual: usize,
        /// Operation that detected the mismatch
        context: String,
    },

    /// An indexed accessor was given an out-of-range value.
    #[error("Index {index} out of bounds in {context} (valid range 0..{limit})")]
    IndexOutOfBounds {
        /// Offending index
        index: usize,
        /// Number of valid entries
        limit: usize,
        /// Operation that detected the bad index
        context: String,
    },

    /// Two objects of incompatible distribution kinds were combined.
    #[error("Type mismatch: expected {expected} distribution, got {actual}")]
    TypeMismatch {
        /// Kind required by the receiver
        expected: DistribKind,
        /// Kind actually supplied
        actual: DistribKind,
    },

    /// A mixture identifier already belongs to another mixture of the pool.
    #[error("Duplicate mixture id: {id}")]
    DuplicateId {
        /// Colliding identifier
        id: String,
    },

    /// A mean or accumulated statistic was read before any frame was added.
    #[error("Empty accumulator: no frame accumulated for {statistic}")]
    EmptyAccumulator {
        /// Statistic that was requested
        statistic: String,
    },

    /// The requested value is not defined in the current state.
    #[error("Undefined state: {reason}")]
    UndefinedState {
        /// Why the value cannot be produced
        reason: String,
    },

    /// A covariance component is exactly zero when its inverse is needed.
    #[error("Division by zero: covariance component {index} is zero")]
    DivisionByZero {
        /// Index of the zero component
        index: usize,
    },

    /// A full covariance matrix could not be inverted.
    #[error("Singular covariance matrix (det = {determinant:.3e})")]
    SingularCovariance {
        /// Determinant reported by the decomposition
        determinant: f64,
    },

    /// Invalid parameter value.
    #[error("Invalid parameter: {parameter} = {value}, expected {constraint}")]
    InvalidParameter {
        /// Parameter name
        parameter: String,
        /// Value provided
        value: f64,
        /// Valid range or constraint description
        constraint: String,
    },

    /// No mixture with this identifier exists in the pool.
    #[error("Mixture not found: {id}")]
    MixtureNotFound {
        /// Identifier that was looked up
        id: String,
    },
}

/// Result type for mixture operations.
pub type MixtureResult<T> = Result<T, MixtureError>;

/// Validates that a supplied dimension matches the expected one.
///
/// # Example
/// ```rust
/// use gmm_stat::errors::validate_dimension;
///
/// assert!(validate_dimension(5, 5, "test").is_ok());
/// assert!(validate_dimension(5, 4, "test").is_err());
/// ```
pub fn validate_dimension(expected: usize, actual: usize, context: &str) -> MixtureResult<()> {
    if expected != actual {
        return Err(MixtureError::DimensionMismatch {
            expected,
            actual,
            context: context.to_string(),
        });
    }
    Ok(())
}

/// Validates that `index` addresses one of `limit` entries.
///
/// # Example
/// ```rust
/// use gmm_stat::errors::validate_index;
///
/// assert!(validate_index(2, 3, "test").is_ok());
/// assert!(validate_index(3, 3, "test").is_err());
/// ```
pub fn validate_index(index: usize, limit: usize, context: &str) -> MixtureResult<()> {
    if index >= limit {
        return Err(MixtureError::IndexOutOfBounds {
            index,
            limit,
            context: context.to_string(),
        });
    }
    Ok(())
}

/// Validates a mixture weight: finite and non-negative.
pub fn validate_weight(weight: f64) -> MixtureResult<()> {
    if !weight.is_finite() || weight < 0.0 {
        return Err(MixtureError::InvalidParameter {
            parameter: "weight".to_string(),
            value: weight,
            constraint: "a finite value >= 0".to_string(),
        });
    }
    Ok(())
}

/// Validates the kind of a distribution against the kind a container expects.
pub fn validate_kind(expected: DistribKind, actual: DistribKind) -> MixtureResult<()> {
    if expected != actual {
        return Err(MixtureError::TypeMismatch { expected, actual });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_dimension_mismatch_reports_both_sizes() {
        match validate_dimension(5, 3, "compute_lk") {
            Err(MixtureError::DimensionMismatch {
                expected,
                actual,
                context,
            }) => {
                assert_eq!(expected, 5);
                assert_eq!(actual, 3);
                assert_eq!(context, "compute_lk");
            }
            other => panic!("Expected DimensionMismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_index_boundaries() {
        assert!(validate_index(0, 1, "t").is_ok());
        assert!(validate_index(1, 1, "t").is_err());
        assert!(validate_index(0, 0, "t").is_err());
    }

    #[test]
    fn test_validate_weight() {
        assert!(validate_weight(0.0).is_ok());
        assert!(validate_weight(0.7).is_ok());
        assert!(validate_weight(-0.1).is_err());
        assert!(validate_weight(f64::NAN).is_err());
        assert!(validate_weight(f64::INFINITY).is_err());
    }

    #[test]
    fn test_validate_kind() {
        assert!(validate_kind(DistribKind::Diagonal, DistribKind::Diagonal).is_ok());
        match validate_kind(DistribKind::Diagonal, DistribKind::Full) {
            Err(MixtureError::TypeMismatch { expected, actual }) => {
                assert_eq!(expected, DistribKind::Diagonal);
                assert_eq!(actual, DistribKind::Full);
            }
            other => panic!("Expected TypeMismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_error_messages_carry_context() {
        let err = MixtureError::IndexOutOfBounds {
            index: 3,
            limit: 3,
            context: "set_distrib_to_mixture".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains('3'));
        assert!(msg.contains("set_distrib_to_mixture"));
    }
}
