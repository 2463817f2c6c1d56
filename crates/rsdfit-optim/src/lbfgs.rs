//! Limited-memory BFGS driver.
//!
//! The driver owns the objective, a [`SessionRecord`] (current and previous
//! state, curvature memory, counters, status) and a small scratch buffer.
//! Each step follows the classical scheme:
//!
//! ```text
//! z  = H_k G                         two-loop recursion, k = min(M, iteration)
//! zg = (z . G) / |z|
//! if zg / |G| < 0.01:                poorly aligned: steepest descent
//!     z = G / |G|, zg = 1
//! X' = X - rate z                    backtracking line search
//! s  = X' - X, y = G(X') - G(X)      curvature pair
//! ```
//!
//! ## Algorithm Overview
//!
//! On the first iteration there are no curvature pairs and the direction is
//! the unit gradient. The line search starts at `rate = 1` and halves the
//! rate until the Armijo-Goldstein condition holds; running out of trials
//! ends the session with [`Status::LineSearchFailed`]. A degenerate
//! curvature pair only sets [`Status::DegenerateCurvature`], which the next
//! convergence check overwrites.
//!
//! ## Stepping
//!
//! [`LBFGS::minimize`] returns an iterator that checks convergence, takes
//! one step and yields a copy of the new state, until a terminal status is
//! reached. Dropping the iterator simply stops the session; calling
//! `minimize` again resumes it.
//!
//! # Example
//!
//! ```rust
//! use rsdfit_core::objective::FnObjective;
//! use rsdfit_core::types::DVector;
//! use rsdfit_optim::{LBFGS, LBFGSConfig};
//!
//! let objective = FnObjective::new(
//!     |x: &DVector<f64>| (x[0] - 3.0).powi(2) + 2.0 * (x[1] + 1.0).powi(2),
//!     |x: &DVector<f64>| DVector::from_vec(vec![2.0 * (x[0] - 3.0), 4.0 * (x[1] + 1.0)]),
//! );
//! let config = LBFGSConfig::new().with_display(0);
//! let mut lbfgs = LBFGS::new(objective, DVector::from_vec(vec![0.0, 0.0]), config).unwrap();
//!
//! let state = lbfgs.run_to_completion().unwrap();
//! assert!(lbfgs.status().is_converged());
//! assert!((state.x()[0] - 3.0).abs() < 1e-2);
//! ```

use crate::{checkpoint::SessionRecord, memory::CurvatureMemory};
use rsdfit_core::{
    convergence::{ConvergenceCriteria, Status},
    error::{OptimizerError, Result},
    history::History,
    line_search::{directional_derivative, BacktrackingLineSearch, LineSearchOutcome},
    objective::Objective,
    state::{OptimizerState, StateField},
    types::{DVector, Scalar},
};
use std::fmt;
use std::iter::FusedIterator;

/// Minimum of `zg / Gnorm` below which the step falls back to steepest descent.
const MIN_ALIGNMENT: f64 = 0.01;

/// Highest supported verbosity level.
const MAX_DISPLAY: u8 = 3;

/// Configuration for the L-BFGS driver.
#[derive(Debug, Clone, PartialEq)]
pub struct LBFGSConfig<T: Scalar> {
    /// Number of curvature pairs kept (`M`)
    pub memory_size: usize,
    /// Stopping rules
    pub convergence: ConvergenceCriteria<T>,
    /// Backtracking parameters
    pub line_search: BacktrackingLineSearch<T>,
    /// Verbosity, 0 (silent) to 3 (parameters and gradient every step)
    pub display: u8,
    /// State fields recorded after every step
    pub record: Vec<StateField>,
    /// Validate curvature pairs before rotating the memory
    pub strict_memory_updates: bool,
}

impl<T: Scalar> Default for LBFGSConfig<T> {
    fn default() -> Self {
        Self {
            memory_size: 100,
            convergence: ConvergenceCriteria::default(),
            line_search: BacktrackingLineSearch::default(),
            display: 2,
            record: vec![StateField::F, StateField::Gnorm],
            strict_memory_updates: false,
        }
    }
}

impl<T: Scalar> LBFGSConfig<T> {
    /// Creates a new configuration with default parameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the memory size (number of curvature pairs to store).
    pub fn with_memory_size(mut self, size: usize) -> Self {
        self.memory_size = size;
        self
    }

    /// Sets the relative objective tolerance; `None` disables the test.
    pub fn with_ftol(mut self, ftol: Option<T>) -> Self {
        self.convergence.ftol = ftol;
        self
    }

    /// Sets the relative parameter tolerance; `None` disables the test.
    pub fn with_xtol(mut self, xtol: Option<T>) -> Self {
        self.convergence.xtol = xtol;
        self
    }

    /// Sets the gradient norm tolerance; `None` disables the test.
    pub fn with_gtol(mut self, gtol: Option<T>) -> Self {
        self.convergence.gtol = gtol;
        self
    }

    /// Sets the maximum number of iterations.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.convergence.max_iterations = max_iterations;
        self
    }

    /// Enables or disables the tolerance tests.
    pub fn with_test_convergence(mut self, test_convergence: bool) -> Self {
        self.convergence.test_convergence = test_convergence;
        self
    }

    /// Sets the verbosity level.
    pub fn with_display(mut self, display: u8) -> Self {
        self.display = display;
        self
    }

    /// Sets the recorded fields.
    pub fn with_record(mut self, fields: Vec<StateField>) -> Self {
        self.record = fields;
        self
    }

    /// Sets the recorded fields by name.
    ///
    /// # Errors
    ///
    /// Returns `UnknownField` if a name is not one of `X`, `F`, `G`, `Gnorm`.
    pub fn with_record_names(mut self, names: &[&str]) -> Result<Self> {
        self.record = names
            .iter()
            .map(|name| name.parse())
            .collect::<Result<Vec<_>>>()?;
        Ok(self)
    }

    /// Replaces the line search parameters.
    pub fn with_line_search(mut self, line_search: BacktrackingLineSearch<T>) -> Self {
        self.line_search = line_search;
        self
    }

    /// Enables or disables strict curvature memory updates.
    pub fn with_strict_memory_updates(mut self, strict: bool) -> Self {
        self.strict_memory_updates = strict;
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` for a zero memory size, an unknown
    /// verbosity level or invalid line search parameters.
    pub fn validate(&self) -> Result<()> {
        if self.memory_size == 0 {
            return Err(OptimizerError::invalid_configuration(
                "Memory size must be a positive integer",
                "memory_size",
                "0",
            ));
        }
        if self.display > MAX_DISPLAY {
            return Err(OptimizerError::invalid_configuration(
                format!("Display level must be between 0 and {}", MAX_DISPLAY),
                "display",
                self.display.to_string(),
            ));
        }
        self.line_search.validate()
    }
}

/// What a single call to [`LBFGS::step`] did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StepOutcome<T: Scalar> {
    /// The step was taken and the curvature pair stored.
    Accepted {
        /// Accepted line search rate
        step_size: T,
    },
    /// The step was taken but the curvature pair was rejected.
    DegenerateCurvature {
        /// Inner product of the rejected pair
        ys: T,
        /// Squared norm of the rejected gradient difference
        yy: T,
    },
    /// No step was taken: the line search ran out of trials.
    LineSearchFailed {
        /// Candidates evaluated
        trials: usize,
        /// Rate of the last candidate
        last_step_size: T,
        /// Objective value at the unchanged current point
        initial_value: T,
    },
    /// No step was taken: the gradient vanishes at the current point.
    Stationary,
}

impl<T: Scalar> StepOutcome<T> {
    /// True if the parameters moved.
    pub fn moved(&self) -> bool {
        matches!(
            self,
            StepOutcome::Accepted { .. } | StepOutcome::DegenerateCurvature { .. }
        )
    }

    /// Converts the outcome into the accepted step size or an error.
    ///
    /// A stationary point yields a step size of zero.
    ///
    /// # Errors
    ///
    /// Returns `DegenerateCurvature` or `LineSearchFailed` for the
    /// corresponding outcomes.
    pub fn into_result(self) -> Result<T> {
        match self {
            StepOutcome::Accepted { step_size } => Ok(step_size),
            StepOutcome::Stationary => Ok(T::zero()),
            StepOutcome::DegenerateCurvature { ys, yy } => Err(
                OptimizerError::degenerate_curvature(Scalar::to_f64(ys), Scalar::to_f64(yy)),
            ),
            StepOutcome::LineSearchFailed {
                trials,
                last_step_size,
                initial_value,
            } => Err(OptimizerError::line_search_failed(
                "maximum number of line search iterations exceeded",
                trials,
                Scalar::to_f64(last_step_size),
                Scalar::to_f64(initial_value),
            )),
        }
    }
}

/// Limited-memory BFGS optimizer.
///
/// # Examples
///
/// ```rust
/// use rsdfit_core::objective::FnObjective;
/// use rsdfit_core::state::StateField;
/// use rsdfit_core::types::DVector;
/// use rsdfit_optim::{LBFGS, LBFGSConfig};
///
/// let objective = FnObjective::new(
///     |x: &DVector<f64>| 0.5 * x.norm_squared(),
///     |x: &DVector<f64>| x.clone(),
/// );
/// let config = LBFGSConfig::new().with_memory_size(5).with_display(0);
/// let mut lbfgs = LBFGS::new(objective, DVector::from_vec(vec![1.0, -2.0]), config).unwrap();
///
/// for state in lbfgs.minimize().take(3) {
///     let state = state.unwrap();
///     assert!(state.f() >= 0.0);
/// }
/// let history = lbfgs.history().unwrap();
/// assert!(history.len(StateField::F) <= 3);
/// ```
pub struct LBFGS<T: Scalar, O> {
    objective: O,
    config: LBFGSConfig<T>,
    session: SessionRecord<T>,
    history: Option<History<T>>,
    alpha: Vec<T>,
}

impl<T: Scalar, O> fmt::Debug for LBFGS<T, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LBFGS")
            .field("config", &self.config)
            .field("session", &self.session)
            .field("history", &self.history)
            .finish_non_exhaustive()
    }
}

impl<T: Scalar, O: Objective<T>> LBFGS<T, O> {
    /// Creates a driver at `x0`, evaluating the objective and gradient once.
    ///
    /// # Errors
    ///
    /// - `InvalidConfiguration` if the configuration is invalid or `x0` is
    ///   empty.
    /// - `DimensionMismatch` if the gradient length differs from `x0`.
    /// - Any error raised by the objective.
    pub fn new(mut objective: O, x0: DVector<T>, config: LBFGSConfig<T>) -> Result<Self> {
        config.validate()?;
        if x0.is_empty() {
            return Err(OptimizerError::invalid_configuration(
                "Initial point must have at least one parameter",
                "x0",
                "[]",
            ));
        }

        let f = objective.value(&x0)?;
        let g = objective.gradient(&x0)?;
        let initial = OptimizerState::new(x0, f, g, None)?;
        let memory = CurvatureMemory::new(config.memory_size, initial.dim())?;

        Ok(Self {
            objective,
            alpha: vec![T::zero(); config.memory_size],
            session: SessionRecord::new(initial, memory),
            config,
            history: None,
        })
    }

    /// Resumes a session from a record taken with [`LBFGS::checkpoint`].
    ///
    /// The objective is not evaluated. The memory size of the record
    /// replaces `config.memory_size`.
    ///
    /// # Errors
    ///
    /// - `InvalidCheckpoint` if the record is internally inconsistent.
    /// - `InvalidConfiguration` if the rest of the configuration is invalid.
    pub fn from_checkpoint(
        objective: O,
        record: SessionRecord<T>,
        mut config: LBFGSConfig<T>,
    ) -> Result<Self> {
        record.validate()?;
        config.memory_size = record.memory.capacity();
        config.validate()?;

        Ok(Self {
            objective,
            alpha: vec![T::zero(); config.memory_size],
            session: record,
            config,
            history: None,
        })
    }

    /// Returns an independent copy of the session record.
    pub fn checkpoint(&self) -> SessionRecord<T> {
        self.session.clone()
    }

    /// Recomputes the status from the current and previous state.
    pub fn check_convergence(&mut self) -> Status {
        let session = &mut self.session;
        session.status =
            self.config
                .convergence
                .check(session.iteration, &session.current, &session.previous);
        session.status
    }

    /// Takes one L-BFGS step from the current state.
    ///
    /// On success the previous state holds the old point, the current state
    /// the new one, the iteration counter is incremented and the configured
    /// fields are recorded. A failed line search or a vanishing gradient
    /// leaves both states untouched and sets a terminal status. A vanishing
    /// gradient reports `GradientTolerance` only when the gradient test is
    /// enabled; otherwise no direction exists and the step fails like an
    /// exhausted line search.
    ///
    /// # Errors
    ///
    /// Objective errors and gradients of the wrong length are returned as
    /// `Err`; the states are untouched in that case.
    pub fn step(&mut self) -> Result<StepOutcome<T>> {
        let gnorm = self.session.current.gnorm();
        if gnorm == T::zero() {
            log::debug!(
                "L-BFGS iteration {}: gradient vanishes, nothing to do",
                self.session.iteration
            );
            let criteria = &self.config.convergence;
            self.session.status = if criteria.test_convergence && criteria.gtol.is_some() {
                Status::GradientTolerance
            } else {
                Status::LineSearchFailed
            };
            return Ok(StepOutcome::Stationary);
        }

        let k = self.session.iteration.min(self.session.memory.capacity());
        let mut z = self.session.memory.two_loop_recursion(
            k,
            self.session.current.g(),
            gnorm,
            &mut self.alpha,
        )?;

        let mut zg = directional_derivative(&z, self.session.current.g());
        let alignment = zg / gnorm;
        if !(alignment >= <T as Scalar>::from_f64(MIN_ALIGNMENT)) {
            log::debug!(
                "L-BFGS iteration {}: the descent direction does not have a sufficient \
                 projection ({:.2e}) into the gradient; using steepest descent at this step",
                self.session.iteration,
                Scalar::to_f64(alignment)
            );
            z.copy_from(self.session.current.g());
            z.unscale_mut(gnorm);
            zg = T::one();
        }

        let outcome = self.config.line_search.search(
            &mut self.objective,
            self.session.current.x(),
            &z,
            zg,
            self.session.current.f(),
            &mut self.session.funcalls,
        )?;

        let accepted = match outcome {
            LineSearchOutcome::Accepted(result) => result,
            LineSearchOutcome::Exhausted {
                trials,
                last_step_size,
                initial_value,
            } => {
                self.session.status = Status::LineSearchFailed;
                return Ok(StepOutcome::LineSearchFailed {
                    trials,
                    last_step_size,
                    initial_value,
                });
            }
        };

        let gradient = self.objective.gradient(&accepted.new_point)?;
        if gradient.len() != self.session.dim() {
            return Err(OptimizerError::dimension_mismatch(
                self.session.dim(),
                gradient.len(),
            ));
        }

        let session = &mut self.session;
        session.previous.assign(&session.current)?;
        session
            .current
            .update(&accepted.new_point, accepted.new_value, &gradient, None)?;

        let s_k = session.current.x() - session.previous.x();
        let y_k = session.current.g() - session.previous.g();
        let step = match session
            .memory
            .update(&s_k, &y_k, self.config.strict_memory_updates)
        {
            Ok(()) => StepOutcome::Accepted {
                step_size: accepted.step_size,
            },
            Err(err @ OptimizerError::DegenerateCurvature { .. }) => {
                log::warn!("error taking the L-BFGS step: {}", err);
                session.status = Status::DegenerateCurvature;
                StepOutcome::DegenerateCurvature {
                    ys: s_k.dot(&y_k),
                    yy: y_k.norm_squared(),
                }
            }
            Err(err) => return Err(err),
        };

        session.iteration += 1;
        self.record_progress();

        Ok(step)
    }

    /// Returns an iterator that steps until a terminal status is reached.
    ///
    /// Each item is a copy of the state after one completed step. The
    /// configuration is validated when the first item is requested.
    pub fn minimize(&mut self) -> Minimize<'_, T, O> {
        Minimize {
            driver: self,
            started: false,
            finished: false,
        }
    }

    /// Steps until a terminal status is reached and returns the final state.
    ///
    /// # Errors
    ///
    /// Propagates configuration and objective errors. Reaching the
    /// iteration budget or a failed line search are not errors; inspect
    /// [`LBFGS::status`].
    pub fn run_to_completion(&mut self) -> Result<OptimizerState<T>> {
        for state in self.minimize() {
            state?;
        }
        Ok(self.session.current.clone())
    }

    fn ensure_runnable(&self) -> Result<()> {
        self.config.validate()?;
        if self.config.memory_size != self.session.memory.capacity() {
            return Err(OptimizerError::invalid_configuration(
                format!(
                    "Memory size is fixed at {} for this session",
                    self.session.memory.capacity()
                ),
                "memory_size",
                self.config.memory_size.to_string(),
            ));
        }
        Ok(())
    }
}

impl<T: Scalar, O> LBFGS<T, O> {
    /// Records the configured fields of the current state.
    pub fn record_progress(&mut self) {
        let fields = &self.config.record;
        self.history
            .get_or_insert_with(History::new)
            .record(&self.session.current, fields);
    }

    /// Records the named fields of the current state.
    ///
    /// # Errors
    ///
    /// Returns `UnknownField` if a name is not a state field; nothing is
    /// recorded in that case.
    pub fn record_progress_named(&mut self, names: &[&str]) -> Result<()> {
        self.history
            .get_or_insert_with(History::new)
            .record_named(&self.session.current, names)
    }

    /// The recorded history, if anything was recorded yet.
    pub fn history(&self) -> Option<&History<T>> {
        self.history.as_ref()
    }

    /// Removes and returns the recorded history.
    pub fn take_history(&mut self) -> Option<History<T>> {
        self.history.take()
    }

    /// Current status.
    pub fn status(&self) -> Status {
        self.session.status
    }

    /// Completed iterations.
    pub fn iteration(&self) -> usize {
        self.session.iteration
    }

    /// Objective evaluations made by the line search.
    pub fn funcalls(&self) -> usize {
        self.session.funcalls
    }

    /// State at the current point.
    pub fn current_state(&self) -> &OptimizerState<T> {
        &self.session.current
    }

    /// State before the last accepted step.
    pub fn previous_state(&self) -> &OptimizerState<T> {
        &self.session.previous
    }

    /// Curvature memory.
    pub fn memory(&self) -> &CurvatureMemory<T> {
        &self.session.memory
    }

    /// Configuration used by the next step.
    pub fn config(&self) -> &LBFGSConfig<T> {
        &self.config
    }

    /// Mutable access to the configuration between steps.
    ///
    /// The memory size is fixed for a session; changing it makes the next
    /// call to [`LBFGS::minimize`] fail.
    pub fn config_mut(&mut self) -> &mut LBFGSConfig<T> {
        &mut self.config
    }

    /// Replaces the configuration.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` if the configuration is invalid or
    /// changes the memory size of the session.
    pub fn set_config(&mut self, config: LBFGSConfig<T>) -> Result<()> {
        config.validate()?;
        if config.memory_size != self.session.memory.capacity() {
            return Err(OptimizerError::invalid_configuration(
                format!(
                    "Memory size is fixed at {} for this session",
                    self.session.memory.capacity()
                ),
                "memory_size",
                config.memory_size.to_string(),
            ));
        }
        self.config = config;
        Ok(())
    }

    /// The wrapped objective.
    pub fn objective(&self) -> &O {
        &self.objective
    }

    /// Consumes the driver, returning the objective and the session record.
    pub fn into_parts(self) -> (O, SessionRecord<T>) {
        (self.objective, self.session)
    }

    /// Iteration number, parameters and objective value as one line.
    pub fn parameter_status(&self) -> String {
        let current = &self.session.current;
        status_line(self.session.iteration, current.x(), current.f())
    }

    /// Iteration number, gradient components and gradient norm as one line.
    pub fn gradient_status(&self) -> String {
        let current = &self.session.current;
        status_line(self.session.iteration, current.g(), current.gnorm())
    }

    fn log_progress(&self) {
        if self.config.display >= 2 {
            log::info!("{}", self.parameter_status());
        }
        if self.config.display >= 3 {
            log::info!("{}", self.gradient_status());
        }
    }

    fn log_termination(&self) {
        if self.config.display >= 1 {
            log::info!("{}", self.session.status.description());
            log::info!("{}", self.parameter_status());
        }
    }
}

fn status_line<T: Scalar>(iteration: usize, values: &DVector<T>, last: T) -> String {
    let values = values
        .iter()
        .map(|&v| format!("{:15.6}", Scalar::to_f64(v)))
        .collect::<Vec<_>>()
        .join("   ");
    format!("{:04}   {}   {:15.6}", iteration, values, Scalar::to_f64(last))
}

/// Iterator returned by [`LBFGS::minimize`].
///
/// Yields one state per completed step and ends once the status becomes
/// terminal. An `Err` item ends the iteration as well.
pub struct Minimize<'a, T: Scalar, O> {
    driver: &'a mut LBFGS<T, O>,
    started: bool,
    finished: bool,
}

impl<T: Scalar, O> fmt::Debug for Minimize<'_, T, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Minimize")
            .field("iteration", &self.driver.session.iteration)
            .field("status", &self.driver.session.status)
            .field("finished", &self.finished)
            .finish()
    }
}

impl<T: Scalar, O: Objective<T>> Iterator for Minimize<'_, T, O> {
    type Item = Result<OptimizerState<T>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        if !self.started {
            self.started = true;
            if let Err(err) = self.driver.ensure_runnable() {
                self.finished = true;
                return Some(Err(err));
            }
        }

        if self.driver.check_convergence() != Status::Running {
            self.finished = true;
            self.driver.log_termination();
            return None;
        }

        self.driver.log_progress();

        match self.driver.step() {
            Ok(outcome) if outcome.moved() => Some(Ok(self.driver.session.current.clone())),
            Ok(_) => {
                self.finished = true;
                self.driver.log_termination();
                None
            }
            Err(err) => {
                self.finished = true;
                Some(Err(err))
            }
        }
    }
}

impl<T: Scalar, O: Objective<T>> FusedIterator for Minimize<'_, T, O> {}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rsdfit_core::objective::{CountingObjective, FnObjective};

    fn bowl() -> FnObjective<
        impl FnMut(&DVector<f64>) -> f64,
        impl FnMut(&DVector<f64>) -> DVector<f64>,
    > {
        FnObjective::new(
            |x: &DVector<f64>| 0.5 * x.norm_squared(),
            |x: &DVector<f64>| x.clone(),
        )
    }

    fn quiet() -> LBFGSConfig<f64> {
        LBFGSConfig::new().with_display(0)
    }

    #[test]
    fn test_config_defaults() {
        let config = LBFGSConfig::<f64>::new();
        assert_eq!(config.memory_size, 100);
        assert_eq!(config.convergence.ftol, Some(1e-6));
        assert_eq!(config.convergence.xtol, Some(1e-4));
        assert_eq!(config.convergence.gtol, Some(1e-5));
        assert_eq!(config.convergence.max_iterations, 500);
        assert_eq!(config.display, 2);
        assert_eq!(config.record, vec![StateField::F, StateField::Gnorm]);
        assert!(config.convergence.test_convergence);
        assert!(!config.strict_memory_updates);
    }

    #[test]
    fn test_config_builder() {
        let config = LBFGSConfig::<f64>::new()
            .with_memory_size(7)
            .with_ftol(None)
            .with_gtol(Some(1e-8))
            .with_max_iterations(20)
            .with_strict_memory_updates(true)
            .with_record_names(&["X", "F"])
            .unwrap();
        assert_eq!(config.memory_size, 7);
        assert_eq!(config.convergence.ftol, None);
        assert_eq!(config.convergence.gtol, Some(1e-8));
        assert_eq!(config.convergence.max_iterations, 20);
        assert!(config.strict_memory_updates);
        assert_eq!(config.record, vec![StateField::X, StateField::F]);

        assert_eq!(
            LBFGSConfig::<f64>::new().with_record_names(&["Y"]).unwrap_err(),
            OptimizerError::unknown_field("Y")
        );
    }

    #[test]
    fn test_config_validation() {
        assert!(LBFGSConfig::<f64>::new().validate().is_ok());
        assert!(LBFGSConfig::<f64>::new().with_memory_size(0).validate().is_err());
        assert!(LBFGSConfig::<f64>::new().with_display(4).validate().is_err());
    }

    #[test]
    fn test_construction_evaluates_once() {
        let objective = CountingObjective::new(bowl());
        let lbfgs = LBFGS::new(objective, DVector::from_vec(vec![3.0, 4.0]), quiet()).unwrap();

        assert_eq!(lbfgs.objective().value_evals(), 1);
        assert_eq!(lbfgs.objective().gradient_evals(), 1);
        assert_eq!(lbfgs.iteration(), 0);
        assert_eq!(lbfgs.funcalls(), 0);
        assert_eq!(lbfgs.status(), Status::Running);
        assert_relative_eq!(lbfgs.current_state().gnorm(), 5.0);
        assert_eq!(lbfgs.current_state(), lbfgs.previous_state());
    }

    #[test]
    fn test_into_parts_returns_objective_and_session() {
        let objective = CountingObjective::new(bowl());
        let mut lbfgs = LBFGS::new(objective, DVector::from_vec(vec![3.0, 4.0]), quiet()).unwrap();
        lbfgs.step().unwrap();
        let record = lbfgs.checkpoint();

        let (objective, session) = lbfgs.into_parts();
        assert_eq!(session, record);
        assert_eq!(session.iteration, 1);
        // Initial evaluation plus one accepted line-search candidate
        assert_eq!(objective.value_evals(), 2);
        assert_eq!(objective.gradient_evals(), 2);
    }

    #[test]
    fn test_rejects_bad_construction() {
        let err = LBFGS::new(bowl(), DVector::from_vec(vec![1.0]), quiet().with_memory_size(0))
            .unwrap_err();
        assert!(matches!(err, OptimizerError::InvalidConfiguration { .. }));

        let err = LBFGS::new(bowl(), DVector::from_vec(vec![]), quiet()).unwrap_err();
        assert!(matches!(err, OptimizerError::InvalidConfiguration { .. }));

        let short_gradient = FnObjective::new(
            |x: &DVector<f64>| x.norm_squared(),
            |_: &DVector<f64>| DVector::from_vec(vec![1.0]),
        );
        let err = LBFGS::new(short_gradient, DVector::from_vec(vec![1.0, 2.0]), quiet())
            .unwrap_err();
        assert!(matches!(err, OptimizerError::DimensionMismatch { .. }));
    }

    #[test]
    fn test_first_step_is_unit_steepest_descent() {
        // On 0.5 |x|^2 from (3, 4) the first candidate is X - G / |G|
        let mut lbfgs = LBFGS::new(bowl(), DVector::from_vec(vec![3.0, 4.0]), quiet()).unwrap();
        let outcome = lbfgs.step().unwrap();

        assert_eq!(outcome, StepOutcome::Accepted { step_size: 1.0 });
        assert_eq!(lbfgs.iteration(), 1);
        assert_eq!(lbfgs.funcalls(), 1);
        assert_relative_eq!(lbfgs.current_state().x()[0], 2.4, epsilon = 1e-12);
        assert_relative_eq!(lbfgs.current_state().x()[1], 3.2, epsilon = 1e-12);
        assert_eq!(lbfgs.previous_state().x(), &DVector::from_vec(vec![3.0, 4.0]));

        // The pair is s = -(0.6, 0.8), y = s
        assert_relative_eq!(lbfgs.memory().rho(0), 1.0, epsilon = 1e-12);
        assert_relative_eq!(lbfgs.memory().h0(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_second_step_is_newton_on_isotropic_quadratic() {
        let mut lbfgs = LBFGS::new(bowl(), DVector::from_vec(vec![3.0, 4.0]), quiet()).unwrap();
        lbfgs.step().unwrap();
        lbfgs.step().unwrap();
        assert_relative_eq!(lbfgs.current_state().x().norm(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_stationary_start() {
        let mut lbfgs = LBFGS::new(bowl(), DVector::from_vec(vec![0.0, 0.0]), quiet()).unwrap();
        assert_eq!(lbfgs.step().unwrap(), StepOutcome::Stationary);
        assert_eq!(lbfgs.status(), Status::GradientTolerance);
        assert_eq!(lbfgs.iteration(), 0);
        assert_eq!(lbfgs.funcalls(), 0);
        assert_eq!(lbfgs.minimize().count(), 0);
    }

    #[test]
    fn test_stationary_start_without_gradient_test() {
        for config in [
            quiet().with_gtol(None),
            quiet().with_test_convergence(false).with_max_iterations(50),
        ] {
            let mut lbfgs = LBFGS::new(bowl(), DVector::from_vec(vec![0.0, 0.0]), config).unwrap();
            assert_eq!(lbfgs.step().unwrap(), StepOutcome::Stationary);
            assert_eq!(lbfgs.status(), Status::LineSearchFailed);
            assert_eq!(lbfgs.iteration(), 0);
            assert_eq!(lbfgs.funcalls(), 0);
        }
    }

    #[test]
    fn test_exact_minimum_without_gradient_test_ends_with_line_search_failure() {
        // One unit steepest-descent step from a unit gradient lands on zero
        let config = quiet().with_test_convergence(false).with_max_iterations(50);
        let mut lbfgs = LBFGS::new(bowl(), DVector::from_vec(vec![0.6, 0.8]), config).unwrap();

        let steps = lbfgs.minimize().map(|s| s.unwrap()).count();
        assert_eq!(steps, 1);
        assert_eq!(lbfgs.current_state().gnorm(), 0.0);
        assert_eq!(lbfgs.status(), Status::LineSearchFailed);
    }

    fn resumed_with_pair(s: f64, y: f64) -> LBFGS<f64, impl Objective<f64>> {
        let start = OptimizerState::new(
            DVector::from_vec(vec![2.0]),
            2.0,
            DVector::from_vec(vec![2.0]),
            None,
        )
        .unwrap();
        let mut memory = CurvatureMemory::new(1, 1).unwrap();
        memory
            .update(&DVector::from_vec(vec![s]), &DVector::from_vec(vec![y]), false)
            .unwrap();
        let mut record = SessionRecord::new(start, memory);
        record.iteration = 1;
        LBFGS::from_checkpoint(bowl(), record, quiet()).unwrap()
    }

    #[test]
    fn test_misaligned_direction_falls_back_to_steepest_descent() {
        // rho = H0 = -1 turns the two-loop direction into -G
        let mut lbfgs = resumed_with_pair(1.0, -1.0);
        let mut alpha = [0.0];
        let z = lbfgs
            .memory()
            .two_loop_recursion(1, lbfgs.current_state().g(), 2.0, &mut alpha)
            .unwrap();
        assert_relative_eq!(z[0], -2.0);

        // Candidate is X - rate * G / Gnorm = 2 - 1
        let outcome = lbfgs.step().unwrap();
        assert_eq!(outcome, StepOutcome::Accepted { step_size: 1.0 });
        assert_eq!(lbfgs.funcalls(), 1);
        assert_relative_eq!(lbfgs.current_state().x()[0], 1.0);
        assert_relative_eq!(lbfgs.current_state().f(), 0.5);
    }

    #[test]
    fn test_nan_direction_falls_back_to_steepest_descent() {
        let mut lbfgs = resumed_with_pair(f64::NAN, 1.0);
        assert!(lbfgs.memory().h0().is_nan());

        let outcome = lbfgs.step().unwrap();
        assert_eq!(outcome, StepOutcome::Accepted { step_size: 1.0 });
        assert_relative_eq!(lbfgs.current_state().x()[0], 1.0);
    }

    #[test]
    fn test_degenerate_curvature_is_not_terminal() {
        // A linear objective has a constant gradient, so y = 0 on every step
        let linear = FnObjective::new(
            |x: &DVector<f64>| x[0],
            |_: &DVector<f64>| DVector::from_vec(vec![1.0]),
        );
        let mut lbfgs = LBFGS::new(linear, DVector::from_vec(vec![0.0]), quiet()).unwrap();

        let outcome = lbfgs.step().unwrap();
        assert!(matches!(outcome, StepOutcome::DegenerateCurvature { .. }));
        assert!(outcome.moved());
        assert!(matches!(
            outcome.into_result(),
            Err(OptimizerError::DegenerateCurvature { .. })
        ));
        assert_eq!(lbfgs.status(), Status::DegenerateCurvature);
        assert_eq!(lbfgs.iteration(), 1);
        assert_relative_eq!(lbfgs.current_state().x()[0], -1.0);

        // The next convergence check overwrites the status and stepping goes on
        assert!(lbfgs.minimize().next().unwrap().is_ok());
        assert_eq!(lbfgs.iteration(), 2);
    }

    #[test]
    fn test_line_search_failure_keeps_state() {
        // The gradient points the wrong way, so no candidate ever decreases f
        let wrong_sign = FnObjective::new(
            |x: &DVector<f64>| x[0] * x[0],
            |x: &DVector<f64>| DVector::from_vec(vec![-2.0 * x[0]]),
        );
        let mut lbfgs = LBFGS::new(wrong_sign, DVector::from_vec(vec![1.0]), quiet()).unwrap();
        let before = lbfgs.current_state().clone();

        let outcome = lbfgs.step().unwrap();
        assert!(matches!(
            outcome,
            StepOutcome::LineSearchFailed { trials: 500, .. }
        ));
        assert!(!outcome.moved());
        assert_eq!(lbfgs.status(), Status::LineSearchFailed);
        assert_eq!(lbfgs.funcalls(), 500);
        assert_eq!(lbfgs.iteration(), 0);
        assert_eq!(lbfgs.current_state(), &before);
        assert!(lbfgs.history().is_none());
    }

    #[test]
    fn test_objective_error_propagates() {
        struct Failing;
        impl Objective<f64> for Failing {
            fn value(&mut self, x: &DVector<f64>) -> Result<f64> {
                if x[0] < 1.0 {
                    Err(OptimizerError::objective_failed("model undefined"))
                } else {
                    Ok(x[0] * x[0])
                }
            }

            fn gradient(&mut self, x: &DVector<f64>) -> Result<DVector<f64>> {
                Ok(DVector::from_vec(vec![2.0 * x[0]]))
            }
        }

        let mut lbfgs = LBFGS::new(Failing, DVector::from_vec(vec![1.5]), quiet()).unwrap();
        let mut steps = lbfgs.minimize();
        assert!(matches!(
            steps.next(),
            Some(Err(OptimizerError::ObjectiveFailed { .. }))
        ));
        assert!(steps.next().is_none());
        assert_eq!(lbfgs.iteration(), 0);
    }

    #[test]
    fn test_history_recorded_after_each_step() {
        let config = quiet().with_record(vec![StateField::X, StateField::F]);
        let mut lbfgs = LBFGS::new(bowl(), DVector::from_vec(vec![3.0, 4.0]), config).unwrap();
        assert!(lbfgs.history().is_none());

        lbfgs.step().unwrap();
        let history = lbfgs.history().unwrap();
        assert_eq!(history.len(StateField::X), 1);
        assert_eq!(history.len(StateField::F), 1);
        assert_eq!(history.len(StateField::Gnorm), 0);
        assert_relative_eq!(history.scalars(StateField::F)[0], lbfgs.current_state().f());
    }

    #[test]
    fn test_record_progress_named() {
        let mut lbfgs = LBFGS::new(bowl(), DVector::from_vec(vec![3.0, 4.0]), quiet()).unwrap();
        assert_eq!(
            lbfgs.record_progress_named(&["G", "H0"]).unwrap_err(),
            OptimizerError::unknown_field("H0")
        );
        lbfgs.record_progress_named(&["G"]).unwrap();
        assert_eq!(lbfgs.history().unwrap().len(StateField::G), 1);
        assert!(lbfgs.take_history().is_some());
        assert!(lbfgs.history().is_none());
    }

    #[test]
    fn test_status_lines() {
        let lbfgs = LBFGS::new(bowl(), DVector::from_vec(vec![3.0, 4.0]), quiet()).unwrap();
        assert_eq!(
            lbfgs.parameter_status(),
            "0000          3.000000          4.000000         12.500000"
        );
        assert_eq!(
            lbfgs.gradient_status(),
            "0000          3.000000          4.000000          5.000000"
        );
    }

    #[test]
    fn test_set_config_keeps_memory_size() {
        let mut lbfgs = LBFGS::new(
            bowl(),
            DVector::from_vec(vec![3.0, 4.0]),
            quiet().with_memory_size(4),
        )
        .unwrap();
        assert!(lbfgs.set_config(quiet().with_memory_size(4).with_gtol(None)).is_ok());
        assert_eq!(lbfgs.config().convergence.gtol, None);
        assert!(lbfgs.set_config(quiet().with_memory_size(8)).is_err());

        lbfgs.config_mut().memory_size = 8;
        let mut steps = lbfgs.minimize();
        assert!(matches!(
            steps.next(),
            Some(Err(OptimizerError::InvalidConfiguration { .. }))
        ));
        assert!(steps.next().is_none());
    }

    #[test]
    fn test_max_iterations_ends_minimize() {
        let config = quiet().with_test_convergence(false).with_max_iterations(3);
        let mut lbfgs = LBFGS::new(bowl(), DVector::from_vec(vec![3.0, 4.0]), config).unwrap();
        let steps = lbfgs.minimize().take_while(|s| s.is_ok()).count();
        assert!(steps <= 3);
        assert!(lbfgs.status().is_terminal());
    }
}
