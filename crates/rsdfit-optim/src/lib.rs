//! rsdfit Optimization - the limited-memory BFGS driver.
//!
//! This crate builds the L-BFGS optimizer on top of the components in
//! `rsdfit-core`: a ring-buffered curvature memory, the driver with its
//! configuration and stepping iterator, and the session record used for
//! checkpoint and restart.
//!
//! # Examples
//!
//! ```rust
//! use rsdfit_core::objective::FnObjective;
//! use rsdfit_core::types::DVector;
//! use rsdfit_optim::{LBFGS, LBFGSConfig};
//!
//! let objective = FnObjective::new(
//!     |x: &DVector<f64>| x.norm_squared(),
//!     |x: &DVector<f64>| x * 2.0,
//! );
//! let config = LBFGSConfig::new().with_memory_size(10).with_display(0);
//! let mut lbfgs = LBFGS::new(objective, DVector::from_vec(vec![1.0, 1.0]), config).unwrap();
//!
//! // Take a few steps, save the session, carry on elsewhere
//! let _ = lbfgs.minimize().take(2).count();
//! let record = lbfgs.checkpoint();
//! assert_eq!(record.iteration, lbfgs.iteration());
//! ```

pub mod checkpoint;
pub mod lbfgs;
pub mod memory;

// Re-export the driver and its companions
pub use checkpoint::SessionRecord;
pub use lbfgs::{LBFGSConfig, Minimize, StepOutcome, LBFGS};
pub use memory::CurvatureMemory;
