//! Optimizer state, convergence checks, history and line search.

pub mod convergence;
pub mod history;
pub mod line_search;
pub mod state;

// Re-export optimization components
pub use convergence::*;
pub use history::*;
pub use line_search::*;
pub use state::*;
