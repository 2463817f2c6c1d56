//! Objective function interface for the optimizers.
//!
//! The optimizers only ever see an objective through the [`Objective`]
//! trait: a scalar function of a fixed-length parameter vector together
//! with its gradient. Both evaluations may be expensive and are never
//! re-entered; methods take `&mut self` so implementors can cache results
//! or keep evaluation counters without interior mutability.
//!
//! Extra arguments that a model-fitting caller would forward to every
//! evaluation (data arrays, fixed hyper-parameters) are captured by the
//! closures handed to [`FnObjective`].

use crate::{
    error::{OptimizerError, Result},
    types::{DVector, Scalar},
};
use num_traits::Float;
use std::fmt;

/// Trait for objective functions minimized by the optimizers.
pub trait Objective<T: Scalar> {
    /// Evaluates the objective function at `x`.
    fn value(&mut self, x: &DVector<T>) -> Result<T>;

    /// Evaluates the gradient of the objective at `x`.
    ///
    /// The returned vector must have the same length as `x`.
    fn gradient(&mut self, x: &DVector<T>) -> Result<DVector<T>>;
}

impl<T: Scalar, O: Objective<T> + ?Sized> Objective<T> for &mut O {
    fn value(&mut self, x: &DVector<T>) -> Result<T> {
        (**self).value(x)
    }

    fn gradient(&mut self, x: &DVector<T>) -> Result<DVector<T>> {
        (**self).gradient(x)
    }
}

impl<T: Scalar, O: Objective<T> + ?Sized> Objective<T> for Box<O> {
    fn value(&mut self, x: &DVector<T>) -> Result<T> {
        (**self).value(x)
    }

    fn gradient(&mut self, x: &DVector<T>) -> Result<DVector<T>> {
        (**self).gradient(x)
    }
}

/// Objective built from a pair of closures `f(x)` and `fprime(x)`.
///
/// # Example
///
/// ```rust
/// use rsdfit_core::objective::{FnObjective, Objective};
/// use rsdfit_core::types::DVector;
///
/// let scale = 3.0;
/// let mut objective = FnObjective::new(
///     move |x: &DVector<f64>| scale * x.norm_squared(),
///     move |x: &DVector<f64>| x * (2.0 * scale),
/// );
/// let x = DVector::from_vec(vec![1.0, 2.0]);
/// assert_eq!(objective.value(&x).unwrap(), 15.0);
/// ```
pub struct FnObjective<F, G> {
    f: F,
    fprime: G,
}

impl<F, G> FnObjective<F, G> {
    /// Wraps an objective closure and its gradient closure.
    pub fn new(f: F, fprime: G) -> Self {
        Self { f, fprime }
    }
}

impl<F, G> fmt::Debug for FnObjective<F, G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnObjective").finish_non_exhaustive()
    }
}

impl<T, F, G> Objective<T> for FnObjective<F, G>
where
    T: Scalar,
    F: FnMut(&DVector<T>) -> T,
    G: FnMut(&DVector<T>) -> DVector<T>,
{
    fn value(&mut self, x: &DVector<T>) -> Result<T> {
        Ok((self.f)(x))
    }

    fn gradient(&mut self, x: &DVector<T>) -> Result<DVector<T>> {
        Ok((self.fprime)(x))
    }
}

/// Objective whose gradient is approximated by central finite differences.
///
/// Each gradient costs `2 * n` evaluations of the wrapped closure, with a
/// per-coordinate step of `sqrt(eps) * max(1, |x_i|)`.
pub struct NumericalGradient<F> {
    f: F,
}

impl<F> NumericalGradient<F> {
    /// Wraps an objective closure.
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> fmt::Debug for NumericalGradient<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NumericalGradient").finish_non_exhaustive()
    }
}

impl<T, F> Objective<T> for NumericalGradient<F>
where
    T: Scalar,
    F: FnMut(&DVector<T>) -> T,
{
    fn value(&mut self, x: &DVector<T>) -> Result<T> {
        Ok((self.f)(x))
    }

    fn gradient(&mut self, x: &DVector<T>) -> Result<DVector<T>> {
        let root_eps = <T as Float>::sqrt(<T as Float>::epsilon());
        let two = <T as Scalar>::from_f64(2.0);
        let mut gradient = DVector::zeros(x.len());
        let mut probe = x.clone();

        for i in 0..x.len() {
            let h = root_eps * <T as Float>::max(T::one(), <T as Float>::abs(x[i]));

            probe[i] = x[i] + h;
            let f_plus = (self.f)(&probe);
            probe[i] = x[i] - h;
            let f_minus = (self.f)(&probe);
            probe[i] = x[i];

            let g = (f_plus - f_minus) / (two * h);
            if !<T as Float>::is_finite(g) {
                return Err(OptimizerError::objective_failed(format!(
                    "non-finite finite-difference derivative along coordinate {}",
                    i
                )));
            }
            gradient[i] = g;
        }

        Ok(gradient)
    }
}

/// Wrapper that counts objective and gradient evaluations.
#[derive(Debug, Clone)]
pub struct CountingObjective<O> {
    inner: O,
    value_evals: usize,
    gradient_evals: usize,
}

impl<O> CountingObjective<O> {
    /// Wraps an objective with zeroed counters.
    pub fn new(inner: O) -> Self {
        Self {
            inner,
            value_evals: 0,
            gradient_evals: 0,
        }
    }

    /// Number of objective evaluations performed so far.
    pub fn value_evals(&self) -> usize {
        self.value_evals
    }

    /// Number of gradient evaluations performed so far.
    pub fn gradient_evals(&self) -> usize {
        self.gradient_evals
    }

    /// Resets both counters to zero.
    pub fn reset_counts(&mut self) {
        self.value_evals = 0;
        self.gradient_evals = 0;
    }

    /// Borrow the wrapped objective.
    pub fn inner(&self) -> &O {
        &self.inner
    }

    /// Unwraps the counter.
    pub fn into_inner(self) -> O {
        self.inner
    }
}

impl<T: Scalar, O: Objective<T>> Objective<T> for CountingObjective<O> {
    fn value(&mut self, x: &DVector<T>) -> Result<T> {
        self.value_evals += 1;
        self.inner.value(x)
    }

    fn gradient(&mut self, x: &DVector<T>) -> Result<DVector<T>> {
        self.gradient_evals += 1;
        self.inner.gradient(x)
    }
}
