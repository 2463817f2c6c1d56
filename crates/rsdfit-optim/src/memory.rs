//! Limited-memory inverse-Hessian approximation.
//!
//! [`CurvatureMemory`] keeps the `M` most recent curvature pairs
//! `(s_k, y_k)` together with `rho_k = 1 / (s_k . y_k)` and the initial
//! scale `H0 = (s . y) / |y|^2` of the newest accepted pair. Pairs are
//! addressed by logical index, `0` being the newest.
//!
//! Storage is a ring: rotating the memory moves the head back by one slot
//! so the oldest pair becomes logical index `0`, which is then overwritten
//! by the incoming pair. Nothing is shifted in memory.
//!
//! ## Rejected pairs
//!
//! A pair with `s . y == 0` or `|y|^2 == 0` is rejected. By default the
//! ring is rotated *before* the check, so after a rejection logical index
//! `0` still holds the oldest pair (or zeros while the ring is filling up)
//! and the newest accepted pair has moved to index `1`. With `strict` set,
//! the check runs first and a rejected pair leaves the memory untouched.

use rsdfit_core::{
    error::{OptimizerError, Result},
    types::{DVector, Scalar},
};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Bounded window of curvature pairs used by the two-loop recursion.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CurvatureMemory<T: Scalar> {
    /// Parameter differences, physical order
    s: Vec<DVector<T>>,
    /// Gradient differences, physical order
    y: Vec<DVector<T>>,
    /// Reciprocal curvatures, physical order
    rho: Vec<T>,
    /// Physical slot of logical index 0
    head: usize,
    /// Initial inverse-Hessian scale
    h0: T,
    /// Number of parameters
    dim: usize,
}

impl<T: Scalar> CurvatureMemory<T> {
    /// Creates a zero-filled memory holding `capacity` pairs of length `dim`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` if `capacity` is zero.
    pub fn new(capacity: usize, dim: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(OptimizerError::invalid_configuration(
                "Memory size must be a positive integer",
                "memory_size",
                "0",
            ));
        }

        Ok(Self {
            s: vec![DVector::zeros(dim); capacity],
            y: vec![DVector::zeros(dim); capacity],
            rho: vec![T::zero(); capacity],
            head: 0,
            h0: T::one(),
            dim,
        })
    }

    /// Number of pairs the memory can hold (`M`).
    pub fn capacity(&self) -> usize {
        self.rho.len()
    }

    /// Length of the stored vectors (`N`).
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Current initial inverse-Hessian scale.
    pub fn h0(&self) -> T {
        self.h0
    }

    #[inline]
    fn slot(&self, index: usize) -> usize {
        assert!(
            index < self.capacity(),
            "curvature pair index {} out of range for memory of size {}",
            index,
            self.capacity()
        );
        (self.head + index) % self.capacity()
    }

    /// Parameter difference at logical index `index` (0 = newest).
    ///
    /// # Panics
    ///
    /// Panics if `index >= capacity()`.
    pub fn s(&self, index: usize) -> &DVector<T> {
        &self.s[self.slot(index)]
    }

    /// Gradient difference at logical index `index` (0 = newest).
    ///
    /// # Panics
    ///
    /// Panics if `index >= capacity()`.
    pub fn y(&self, index: usize) -> &DVector<T> {
        &self.y[self.slot(index)]
    }

    /// Reciprocal curvature at logical index `index` (0 = newest).
    ///
    /// # Panics
    ///
    /// Panics if `index >= capacity()`.
    pub fn rho(&self, index: usize) -> T {
        self.rho[self.slot(index)]
    }

    /// Iterates over `(s, y, rho)` from newest to oldest.
    pub fn pairs(
        &self,
    ) -> impl DoubleEndedIterator<Item = (&DVector<T>, &DVector<T>, T)> + ExactSizeIterator + '_ {
        (0..self.capacity()).map(move |i| {
            let slot = self.slot(i);
            (&self.s[slot], &self.y[slot], self.rho[slot])
        })
    }

    fn rotate(&mut self) {
        self.head = (self.head + self.capacity() - 1) % self.capacity();
    }

    /// Stores a new curvature pair at logical index 0.
    ///
    /// Unless `strict` is set the ring is rotated before the pair is
    /// validated, see the module documentation.
    ///
    /// # Errors
    ///
    /// - `DimensionMismatch` if either vector has the wrong length (the
    ///   memory is left untouched).
    /// - `DegenerateCurvature` if `s_k . y_k == 0` or `|y_k|^2 == 0`.
    pub fn update(&mut self, s_k: &DVector<T>, y_k: &DVector<T>, strict: bool) -> Result<()> {
        if s_k.len() != self.dim {
            return Err(OptimizerError::dimension_mismatch(self.dim, s_k.len()));
        }
        if y_k.len() != self.dim {
            return Err(OptimizerError::dimension_mismatch(self.dim, y_k.len()));
        }

        let ys = s_k.dot(y_k);
        let yy = y_k.norm_squared();
        let degenerate = ys == T::zero() || yy == T::zero();

        if degenerate && strict {
            return Err(OptimizerError::degenerate_curvature(
                Scalar::to_f64(ys),
                Scalar::to_f64(yy),
            ));
        }

        self.rotate();

        if degenerate {
            return Err(OptimizerError::degenerate_curvature(
                Scalar::to_f64(ys),
                Scalar::to_f64(yy),
            ));
        }

        let head = self.head;
        self.s[head].copy_from(s_k);
        self.y[head].copy_from(y_k);
        self.rho[head] = T::one() / ys;
        self.h0 = ys / yy;
        Ok(())
    }

    /// Computes `z ~ H^-1 G` from the `valid_count` newest pairs.
    ///
    /// `valid_count` is clamped to the capacity. With no pairs the result
    /// is `H0 * G / gnorm`, i.e. the unit steepest-descent direction on a
    /// fresh memory. `alpha` is scratch space of at least
    /// `min(valid_count, capacity())` entries.
    ///
    /// # Errors
    ///
    /// Returns `DimensionMismatch` if the gradient has the wrong length or
    /// the scratch slice is too short.
    pub fn two_loop_recursion(
        &self,
        valid_count: usize,
        gradient: &DVector<T>,
        gnorm: T,
        alpha: &mut [T],
    ) -> Result<DVector<T>> {
        if gradient.len() != self.dim {
            return Err(OptimizerError::dimension_mismatch(self.dim, gradient.len()));
        }
        let k = valid_count.min(self.capacity());
        if alpha.len() < k {
            return Err(OptimizerError::dimension_mismatch(k, alpha.len()));
        }

        let mut q = gradient.clone();
        for i in 0..k {
            let slot = self.slot(i);
            alpha[i] = self.rho[slot] * self.s[slot].dot(&q);
            q.axpy(-alpha[i], &self.y[slot], T::one());
        }

        // q becomes z from here on
        let mut z = q;
        z.scale_mut(self.h0);
        if k == 0 {
            z.unscale_mut(gnorm);
        }

        for i in (0..k).rev() {
            let slot = self.slot(i);
            let beta = self.rho[slot] * self.y[slot].dot(&z);
            z.axpy(alpha[i] - beta, &self.s[slot], T::one());
        }

        Ok(z)
    }

    /// Checks the internal layout against a parameter count.
    ///
    /// # Errors
    ///
    /// Returns `InvalidCheckpoint` describing the first inconsistency.
    pub fn check_consistency(&self, dim: usize) -> Result<()> {
        let capacity = self.rho.len();
        if capacity == 0 {
            return Err(OptimizerError::invalid_checkpoint("memory has zero capacity"));
        }
        if self.s.len() != capacity || self.y.len() != capacity {
            return Err(OptimizerError::invalid_checkpoint(format!(
                "memory holds {} s and {} y vectors for {} rho values",
                self.s.len(),
                self.y.len(),
                capacity
            )));
        }
        if self.head >= capacity {
            return Err(OptimizerError::invalid_checkpoint(format!(
                "memory head {} out of range for capacity {}",
                self.head, capacity
            )));
        }
        if self.dim != dim || self.s.iter().chain(&self.y).any(|v| v.len() != dim) {
            return Err(OptimizerError::invalid_checkpoint(format!(
                "memory vectors do not match the {} state parameters",
                dim
            )));
        }
        Ok(())
    }
}
