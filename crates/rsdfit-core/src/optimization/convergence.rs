//! Convergence status and the tests that produce it.
//!
//! A minimization session carries a signed [`Status`] code. It starts at
//! `Running` and is recomputed by [`ConvergenceCriteria::check`] before
//! every step. The tests run in a fixed order and the first one satisfied
//! wins:
//!
//! 1. iteration budget exhausted (`MaxIterations`)
//! 2. relative parameter change below `xtol` (`ParameterTolerance`)
//! 3. relative objective change below `ftol` (`ObjectiveTolerance`)
//! 4. gradient norm below `gtol` (`GradientTolerance`)
//!
//! Tests 2-4 are skipped when `test_convergence` is off, and each of them
//! is disabled individually by setting its tolerance to `None`. Nothing is
//! tested on iteration 0.

use crate::{
    optimization::state::OptimizerState,
    types::{DVector, Scalar},
};
use num_traits::Float;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::fmt;

/// Convergence and termination status of a minimization session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Status {
    /// No stopping condition met yet
    #[default]
    Running,
    /// `|X - X_prev| < xtol * |X|` for every parameter
    ParameterTolerance,
    /// Relative change of the objective below `ftol`
    ObjectiveTolerance,
    /// Gradient norm below `gtol`
    GradientTolerance,
    /// Iteration budget exhausted
    MaxIterations,
    /// Backtracking exhausted its trial budget
    LineSearchFailed,
    /// The last curvature pair was rejected; not terminal
    DegenerateCurvature,
}

impl Status {
    /// Signed integer code of the status.
    pub fn code(self) -> i32 {
        match self {
            Status::Running => 0,
            Status::ParameterTolerance => 1,
            Status::ObjectiveTolerance => 2,
            Status::GradientTolerance => 3,
            Status::MaxIterations => -1,
            Status::LineSearchFailed => -4,
            Status::DegenerateCurvature => -5,
        }
    }

    /// Inverse of [`Status::code`].
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Status::Running),
            1 => Some(Status::ParameterTolerance),
            2 => Some(Status::ObjectiveTolerance),
            3 => Some(Status::GradientTolerance),
            -1 => Some(Status::MaxIterations),
            -4 => Some(Status::LineSearchFailed),
            -5 => Some(Status::DegenerateCurvature),
            _ => None,
        }
    }

    /// True for statuses that end a session.
    pub fn is_terminal(self) -> bool {
        !matches!(self, Status::Running | Status::DegenerateCurvature)
    }

    /// True when one of the tolerances was reached.
    pub fn is_converged(self) -> bool {
        self.code() > 0
    }

    /// Human-readable explanation of the status.
    pub fn description(self) -> &'static str {
        match self {
            Status::Running => "Algorithm has not yet converged, with no errors so far",
            Status::ParameterTolerance => "Tolerance reached: deltaX/X < xtol.",
            Status::ObjectiveTolerance => "Tolerance reached: deltaF/F < ftol.",
            Status::GradientTolerance => "Tolerance reached: Gnorm < gtol.",
            Status::MaxIterations => "Maximum number of iterations reached.",
            Status::LineSearchFailed => {
                "Linesearch failed; maximum number of iterations exceeded -- exiting."
            }
            Status::DegenerateCurvature => {
                "Curvature pair rejected; no L-BFGS update at this step."
            }
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.description(), self.code())
    }
}

/// Tolerances and limits deciding when a session stops.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ConvergenceCriteria<T: Scalar> {
    /// Relative objective tolerance (`None` disables the test)
    pub ftol: Option<T>,
    /// Relative parameter tolerance (`None` disables the test)
    pub xtol: Option<T>,
    /// Absolute gradient norm tolerance (`None` disables the test)
    pub gtol: Option<T>,
    /// Maximum number of iterations
    pub max_iterations: usize,
    /// When false only the iteration budget is checked
    pub test_convergence: bool,
}

impl<T: Scalar> Default for ConvergenceCriteria<T> {
    fn default() -> Self {
        Self {
            ftol: Some(<T as Scalar>::from_f64(1e-6)),
            xtol: Some(<T as Scalar>::from_f64(1e-4)),
            gtol: Some(<T as Scalar>::from_f64(1e-5)),
            max_iterations: 500,
            test_convergence: true,
        }
    }
}

impl<T: Scalar> ConvergenceCriteria<T> {
    /// Creates the default criteria.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the objective tolerance.
    pub fn with_ftol(mut self, ftol: Option<T>) -> Self {
        self.ftol = ftol;
        self
    }

    /// Sets the parameter tolerance.
    pub fn with_xtol(mut self, xtol: Option<T>) -> Self {
        self.xtol = xtol;
        self
    }

    /// Sets the gradient norm tolerance.
    pub fn with_gtol(mut self, gtol: Option<T>) -> Self {
        self.gtol = gtol;
        self
    }

    /// Sets the iteration budget.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Enables or disables the tolerance tests.
    pub fn with_test_convergence(mut self, test_convergence: bool) -> Self {
        self.test_convergence = test_convergence;
        self
    }

    /// Computes the status after `iteration` completed steps.
    pub fn check(
        &self,
        iteration: usize,
        current: &OptimizerState<T>,
        previous: &OptimizerState<T>,
    ) -> Status {
        if iteration == 0 {
            return Status::Running;
        }

        if iteration >= self.max_iterations {
            return Status::MaxIterations;
        }

        if !self.test_convergence {
            return Status::Running;
        }

        if let Some(xtol) = self.xtol {
            if parameters_converged(current.x(), previous.x(), xtol) {
                log::info!("parameter values have reached the required precision");
                return Status::ParameterTolerance;
            }
        }

        if let Some(ftol) = self.ftol {
            if relative_change(current.f(), previous.f()) < ftol {
                log::info!("objective function has reached the required precision");
                return Status::ObjectiveTolerance;
            }
        }

        if let Some(gtol) = self.gtol {
            if current.gnorm() < gtol {
                log::info!("gradient norm is now below the required tolerance");
                return Status::GradientTolerance;
            }
        }

        Status::Running
    }
}

/// True when every `|x_i - prev_i| < xtol * |x_i|`.
fn parameters_converged<T: Scalar>(x: &DVector<T>, prev: &DVector<T>, xtol: T) -> bool {
    x.iter()
        .zip(prev.iter())
        .all(|(&xi, &pi)| <T as Float>::abs(xi - pi) < xtol * <T as Float>::abs(xi))
}

/// `|f - f_prev| / max(|f|, |f_prev|, 1)`.
fn relative_change<T: Scalar>(f: T, f_prev: T) -> T {
    let scale = <T as Float>::max(
        <T as Float>::max(<T as Float>::abs(f), <T as Float>::abs(f_prev)),
        T::one(),
    );
    <T as Float>::abs(f - f_prev) / scale
}
