//! Core types for the rsdfit optimizers.
//!
//! This crate provides the building blocks shared by the optimization
//! drivers: the scalar abstraction, error types, the objective contract,
//! the optimizer state snapshot, convergence tests, history recording and
//! the backtracking line search.
//!
//! # Modules
//!
//! - [`error`]: Error types for optimizer operations
//! - [`objective`]: Objective function interface and adapters
//! - [`types`]: Scalar trait and vector alias
//! - [`optimization`]: State, convergence status, history and line search

pub mod core;
pub mod optimization;

pub use crate::core::{error, objective, types};
pub use optimization::{convergence, history, line_search, state};

// Re-export commonly used items at the crate root
pub use error::{OptimizerError, Result};

/// Prelude module for convenient imports.
///
/// # Example
/// ```
/// use rsdfit_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::convergence::{ConvergenceCriteria, Status};
    pub use crate::error::{OptimizerError, Result};
    pub use crate::history::History;
    pub use crate::line_search::{BacktrackingLineSearch, LineSearchOutcome, LineSearchResult};
    pub use crate::objective::{CountingObjective, FnObjective, NumericalGradient, Objective};
    pub use crate::state::{FieldValue, OptimizerState, RecordedValue, StateField};
    pub use crate::types::{DVector, Scalar};
}
