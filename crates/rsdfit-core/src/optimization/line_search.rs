//! Backtracking line search with the Armijo-Goldstein condition.
//!
//! Given the current point `x`, a direction `z` (the quasi-Newton step
//! before the sign flip) and the directional derivative `zg`, the search
//! evaluates candidates
//!
//! ```text
//! x' = x - rate * z,   rate = 1, tau, tau^2, ...
//! ```
//!
//! and accepts the first one with
//!
//! ```text
//! f(x) - f(x') >= rate * c * zg
//! ```
//!
//! Every candidate is rebuilt from `x`, never from the previous candidate.
//! If no candidate is accepted within `max_trials` evaluations the search
//! reports [`LineSearchOutcome::Exhausted`]; the driver turns that into a
//! terminal status instead of retrying.

use crate::{
    error::{OptimizerError, Result},
    objective::Objective,
    types::{DVector, Scalar},
};

/// A step accepted by the line search.
#[derive(Debug, Clone, PartialEq)]
pub struct LineSearchResult<T: Scalar> {
    /// The accepted step size
    pub step_size: T,
    /// The accepted point `x - step_size * z`
    pub new_point: DVector<T>,
    /// Objective value at the accepted point
    pub new_value: T,
    /// Number of objective evaluations used, including the accepted one
    pub function_evals: usize,
}

/// Outcome of one line search.
#[derive(Debug, Clone, PartialEq)]
pub enum LineSearchOutcome<T: Scalar> {
    /// A candidate satisfied the sufficient decrease condition.
    Accepted(LineSearchResult<T>),
    /// The trial budget ran out.
    Exhausted {
        /// Number of candidates evaluated
        trials: usize,
        /// Step size of the last candidate
        last_step_size: T,
        /// Objective value at the starting point
        initial_value: T,
    },
}

impl<T: Scalar> LineSearchOutcome<T> {
    /// Converts an exhausted search into a `LineSearchFailed` error.
    pub fn into_result(self) -> Result<LineSearchResult<T>> {
        match self {
            LineSearchOutcome::Accepted(result) => Ok(result),
            LineSearchOutcome::Exhausted {
                trials,
                last_step_size,
                initial_value,
            } => Err(OptimizerError::line_search_failed(
                "no step satisfied the sufficient decrease condition",
                trials,
                Scalar::to_f64(last_step_size),
                Scalar::to_f64(initial_value),
            )),
        }
    }

    /// True if a step was accepted.
    pub fn is_accepted(&self) -> bool {
        matches!(self, LineSearchOutcome::Accepted(_))
    }
}

/// Backtracking line search parameters.
///
/// The defaults are the constants used by the L-BFGS driver:
/// shrink factor `tau = 0.5`, sufficient decrease constant `c = 1e-5`,
/// initial step `1.0` and a budget of `500` evaluations.
#[derive(Debug, Clone, PartialEq)]
pub struct BacktrackingLineSearch<T: Scalar> {
    /// Shrink factor applied after every rejected candidate
    pub tau: T,
    /// Sufficient decrease constant
    pub c: T,
    /// Step size of the first candidate
    pub initial_step_size: T,
    /// Maximum number of candidates evaluated
    pub max_trials: usize,
}

impl<T: Scalar> Default for BacktrackingLineSearch<T> {
    fn default() -> Self {
        Self {
            tau: <T as Scalar>::from_f64(0.5),
            c: <T as Scalar>::from_f64(1e-5),
            initial_step_size: T::one(),
            max_trials: 500,
        }
    }
}

impl<T: Scalar> BacktrackingLineSearch<T> {
    /// Creates a line search with the default parameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the shrink factor.
    pub fn with_tau(mut self, tau: T) -> Self {
        self.tau = tau;
        self
    }

    /// Sets the sufficient decrease constant.
    pub fn with_c(mut self, c: T) -> Self {
        self.c = c;
        self
    }

    /// Sets the first step size.
    pub fn with_initial_step_size(mut self, step: T) -> Self {
        self.initial_step_size = step;
        self
    }

    /// Sets the evaluation budget.
    pub fn with_max_trials(mut self, max_trials: usize) -> Self {
        self.max_trials = max_trials;
        self
    }

    /// Checks that the parameters describe a shrinking search.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` if `tau` is outside `(0, 1)`, `c` or
    /// the initial step is not positive, or the budget is zero.
    pub fn validate(&self) -> Result<()> {
        if !(self.tau > T::zero() && self.tau < T::one()) {
            return Err(OptimizerError::invalid_configuration(
                "Shrink factor must lie in (0, 1)",
                "tau",
                self.tau.to_string(),
            ));
        }
        if !(self.c > T::zero()) {
            return Err(OptimizerError::invalid_configuration(
                "Sufficient decrease constant must be positive",
                "c",
                self.c.to_string(),
            ));
        }
        if !(self.initial_step_size > T::zero()) {
            return Err(OptimizerError::invalid_configuration(
                "Initial step size must be positive",
                "initial_step_size",
                self.initial_step_size.to_string(),
            ));
        }
        if self.max_trials == 0 {
            return Err(OptimizerError::invalid_configuration(
                "Line search needs at least one trial",
                "max_trials",
                "0",
            ));
        }
        Ok(())
    }

    /// Searches along `-direction` from `x`.
    ///
    /// `directional_derivative` is `zg = (z . G) / |z|` as computed by the
    /// driver, `current_value` is `f(x)`. Every evaluation increments
    /// `funcalls`, whether the candidate is accepted or not.
    ///
    /// # Errors
    ///
    /// Only objective evaluation errors are returned as `Err`; an exhausted
    /// budget is reported as [`LineSearchOutcome::Exhausted`].
    pub fn search<O>(
        &self,
        objective: &mut O,
        x: &DVector<T>,
        direction: &DVector<T>,
        directional_derivative: T,
        current_value: T,
        funcalls: &mut usize,
    ) -> Result<LineSearchOutcome<T>>
    where
        O: Objective<T> + ?Sized,
    {
        if x.len() != direction.len() {
            return Err(OptimizerError::dimension_mismatch(x.len(), direction.len()));
        }

        let mut rate = self.initial_step_size;
        let mut candidate = x.clone();

        for trial in 0..self.max_trials {
            if trial > 0 {
                rate *= self.tau;
            }

            candidate.copy_from(x);
            candidate.axpy(-rate, direction, T::one());

            let value = objective.value(&candidate)?;
            *funcalls += 1;

            // Armijo-Goldstein: NaN values never pass
            if current_value - value >= rate * self.c * directional_derivative {
                return Ok(LineSearchOutcome::Accepted(LineSearchResult {
                    step_size: rate,
                    new_point: candidate,
                    new_value: value,
                    function_evals: trial + 1,
                }));
            }
        }

        log::debug!(
            "line search exhausted after {} trials (last step {:e})",
            self.max_trials,
            Scalar::to_f64(rate)
        );

        Ok(LineSearchOutcome::Exhausted {
            trials: self.max_trials,
            last_step_size: rate,
            initial_value: current_value,
        })
    }
}

/// Computes `zg = (z . g) / |z|`, the projection of `g` onto the unit direction `z`.
pub fn directional_derivative<T: Scalar>(direction: &DVector<T>, gradient: &DVector<T>) -> T {
    direction.dot(gradient) / direction.norm()
}
