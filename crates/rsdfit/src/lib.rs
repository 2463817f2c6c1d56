//! # rsdfit
//!
//! Limited-memory BFGS minimization of expensive objective functions, with
//! a backtracking line search, convergence diagnostics, per-iteration
//! history and checkpoint/restart of whole sessions.
//!
//! This crate re-exports the public API of `rsdfit-core` and
//! `rsdfit-optim`.
//!
//! ## Quick Start
//!
//! ```rust
//! use rsdfit::prelude::*;
//!
//! // Least-squares fit of y = m x + b
//! let xs: Vec<f64> = (0..100).map(|i| i as f64 * 0.1).collect();
//! let ys: Vec<f64> = xs.iter().map(|x| 2.5 * x + 1.0).collect();
//! let (xs_g, ys_g) = (xs.clone(), ys.clone());
//!
//! let objective = FnObjective::new(
//!     move |p: &DVector<f64>| {
//!         xs.iter()
//!             .zip(&ys)
//!             .map(|(x, y)| (y - p[0] * x - p[1]).powi(2))
//!             .sum::<f64>()
//!     },
//!     move |p: &DVector<f64>| {
//!         let mut g = DVector::<f64>::zeros(2);
//!         for (x, y) in xs_g.iter().zip(&ys_g) {
//!             let r = y - p[0] * x - p[1];
//!             g[0] -= 2.0 * r * x;
//!             g[1] -= 2.0 * r;
//!         }
//!         g
//!     },
//! );
//!
//! let config = LBFGSConfig::new().with_display(0);
//! let mut lbfgs = LBFGS::new(objective, DVector::from_vec(vec![1.0, 0.0]), config).unwrap();
//! let state = lbfgs.run_to_completion().unwrap();
//!
//! assert!(lbfgs.status().is_converged());
//! assert!((state.x()[0] - 2.5).abs() < 0.125);
//! ```
//!
//! ## Features
//!
//! - `serde` (default): serialization of states, history and session
//!   records

// Re-export core functionality
pub use rsdfit_core::*;

// Re-export the optimizer
pub use rsdfit_optim::{
    checkpoint, lbfgs, memory, CurvatureMemory, LBFGSConfig, Minimize, SessionRecord,
    StepOutcome, LBFGS,
};

// Re-export the vector type from nalgebra
pub use nalgebra::DVector as Vector;

/// Prelude module for convenient imports
pub mod prelude {
    pub use rsdfit_core::prelude::*;
    pub use rsdfit_optim::{
        CurvatureMemory, LBFGSConfig, Minimize, SessionRecord, StepOutcome, LBFGS,
    };
}
