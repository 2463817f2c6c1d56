//! Session record for checkpoint and restart.
//!
//! A [`SessionRecord`] holds everything the L-BFGS driver mutates while
//! stepping. Handing a record taken from one driver to
//! [`LBFGS::from_checkpoint`](crate::lbfgs::LBFGS::from_checkpoint) yields a
//! driver whose next steps are identical to those of the source driver, given
//! the same objective. How the record is persisted is up to the caller; with
//! the `serde` feature it can be written with any serde format.

use crate::memory::CurvatureMemory;
use rsdfit_core::{
    convergence::Status,
    error::{OptimizerError, Result},
    state::OptimizerState,
    types::Scalar,
};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Mutable bookkeeping of one minimization session.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SessionRecord<T: Scalar> {
    /// Completed iterations
    pub iteration: usize,
    /// Objective evaluations made by the line search
    pub funcalls: usize,
    /// Status after the last convergence check or step
    pub status: Status,
    /// State at the current point
    pub current: OptimizerState<T>,
    /// State before the last accepted step
    pub previous: OptimizerState<T>,
    /// Curvature pairs
    pub memory: CurvatureMemory<T>,
}

impl<T: Scalar> SessionRecord<T> {
    /// Starts a fresh session at `initial`.
    pub(crate) fn new(initial: OptimizerState<T>, memory: CurvatureMemory<T>) -> Self {
        Self {
            iteration: 0,
            funcalls: 0,
            status: Status::Running,
            previous: initial.clone(),
            current: initial,
            memory,
        }
    }

    /// Number of parameters.
    pub fn dim(&self) -> usize {
        self.current.dim()
    }

    /// Checks that the states and the memory agree on the parameter count.
    ///
    /// # Errors
    ///
    /// Returns `InvalidCheckpoint` describing the first inconsistency.
    pub fn validate(&self) -> Result<()> {
        let dim = self.current.dim();
        if dim == 0 {
            return Err(OptimizerError::invalid_checkpoint("state has no parameters"));
        }
        for (label, state) in [("current", &self.current), ("previous", &self.previous)] {
            if state.x().len() != dim || state.g().len() != dim {
                return Err(OptimizerError::invalid_checkpoint(format!(
                    "{} state has {} parameters and {} gradient components, expected {}",
                    label,
                    state.x().len(),
                    state.g().len(),
                    dim
                )));
            }
        }
        self.memory.check_consistency(dim)
    }
}
