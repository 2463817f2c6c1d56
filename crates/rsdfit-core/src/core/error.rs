//! Error types for optimizer operations.
//!
//! This module defines the error type shared by the objective contract,
//! the optimizer state, the line search and the L-BFGS driver.
//!
//! Expected terminal conditions of a minimization (an exhausted line search,
//! a rejected curvature pair) are reported to the driver as explicit outcome
//! values and translated into a status code. The variants here cover the
//! conditions that are raised to the caller, plus error forms of those
//! outcomes for callers that work with the lower-level components directly.

use thiserror::Error;

/// Errors that can occur during optimization.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OptimizerError {
    /// Invalid optimizer configuration.
    ///
    /// This error occurs when the optimizer is configured with invalid
    /// parameters (e.g., a zero memory size or an unknown verbosity level).
    #[error("Invalid optimizer configuration: {reason}")]
    InvalidConfiguration {
        /// Description of the configuration error
        reason: String,
        /// Name of the invalid parameter
        parameter: String,
        /// Value that was invalid
        value: String,
    },

    /// A state field was requested by a name that does not exist.
    #[error("Unknown state field `{name}`; expected one of X, F, G, Gnorm")]
    UnknownField {
        /// The name that failed to resolve
        name: String,
    },

    /// Dimension mismatch between vectors.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected dimensions
        expected: String,
        /// Actual dimensions
        actual: String,
    },

    /// A curvature pair with zero curvature or zero gradient difference.
    ///
    /// Such a pair cannot contribute to the inverse-Hessian approximation.
    #[error("Degenerate curvature pair: s.y = {ys}, |y|^2 = {yy}")]
    DegenerateCurvature {
        /// Inner product of the parameter and gradient differences
        ys: f64,
        /// Squared norm of the gradient difference
        yy: f64,
    },

    /// Line search failed to find an acceptable step.
    ///
    /// This error occurs when the backtracking search exhausts its trial
    /// budget without satisfying the sufficient decrease condition.
    #[error("Line search failed: {reason}")]
    LineSearchFailed {
        /// Description of why the line search failed
        reason: String,
        /// Number of trial points evaluated
        iterations: usize,
        /// Last step size tried
        last_step_size: f64,
        /// Function value at the starting point
        initial_value: f64,
    },

    /// The objective or its gradient could not be evaluated.
    #[error("Objective evaluation failed: {reason}")]
    ObjectiveFailed {
        /// Description of the evaluation failure
        reason: String,
    },

    /// A checkpoint could not be used to resume a session.
    #[error("Invalid checkpoint: {reason}")]
    InvalidCheckpoint {
        /// Description of the inconsistency
        reason: String,
    },
}

impl OptimizerError {
    /// Create an InvalidConfiguration error.
    pub fn invalid_configuration<S1, S2, S3>(reason: S1, parameter: S2, value: S3) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
        S3: Into<String>,
    {
        Self::InvalidConfiguration {
            reason: reason.into(),
            parameter: parameter.into(),
            value: value.into(),
        }
    }

    /// Create an UnknownField error.
    pub fn unknown_field<S: Into<String>>(name: S) -> Self {
        Self::UnknownField { name: name.into() }
    }

    /// Create a DimensionMismatch error.
    pub fn dimension_mismatch<S1, S2>(expected: S1, actual: S2) -> Self
    where
        S1: std::fmt::Display,
        S2: std::fmt::Display,
    {
        Self::DimensionMismatch {
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    /// Create a DegenerateCurvature error.
    pub fn degenerate_curvature(ys: f64, yy: f64) -> Self {
        Self::DegenerateCurvature { ys, yy }
    }

    /// Create a LineSearchFailed error with detailed context.
    pub fn line_search_failed<S: Into<String>>(
        reason: S,
        iterations: usize,
        last_step_size: f64,
        initial_value: f64,
    ) -> Self {
        Self::LineSearchFailed {
            reason: reason.into(),
            iterations,
            last_step_size,
            initial_value,
        }
    }

    /// Create an ObjectiveFailed error.
    pub fn objective_failed<S: Into<String>>(reason: S) -> Self {
        Self::ObjectiveFailed {
            reason: reason.into(),
        }
    }

    /// Create an InvalidCheckpoint error.
    pub fn invalid_checkpoint<S: Into<String>>(reason: S) -> Self {
        Self::InvalidCheckpoint {
            reason: reason.into(),
        }
    }
}

/// Result type alias for optimizer operations.
pub type Result<T> = std::result::Result<T, OptimizerError>;
