//! Snapshot of the optimizer at one point of parameter space.
//!
//! An [`OptimizerState`] bundles the parameters `X`, the objective value
//! `F`, the gradient `G` and its Euclidean norm `Gnorm`. The L-BFGS driver
//! owns two of them (current and previous) and updates both in place on
//! every accepted step; `clone()` is the only way to obtain an independent
//! value, which is what history recording and checkpoints do.

use crate::{
    error::{OptimizerError, Result},
    types::{DVector, Scalar},
};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Names of the fields carried by an [`OptimizerState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum StateField {
    /// Parameter vector
    X,
    /// Objective value
    F,
    /// Gradient vector
    G,
    /// Euclidean norm of the gradient
    Gnorm,
}

impl StateField {
    /// All fields, in iteration order.
    pub const ALL: [StateField; 4] = [
        StateField::X,
        StateField::F,
        StateField::G,
        StateField::Gnorm,
    ];

    /// The canonical name of the field.
    pub fn name(self) -> &'static str {
        match self {
            StateField::X => "X",
            StateField::F => "F",
            StateField::G => "G",
            StateField::Gnorm => "Gnorm",
        }
    }
}

impl fmt::Display for StateField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for StateField {
    type Err = OptimizerError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "X" => Ok(StateField::X),
            "F" => Ok(StateField::F),
            "G" => Ok(StateField::G),
            "Gnorm" => Ok(StateField::Gnorm),
            other => Err(OptimizerError::unknown_field(other)),
        }
    }
}

/// Borrowed view of one state field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue<'a, T: Scalar> {
    /// `F` or `Gnorm`
    Scalar(T),
    /// `X` or `G`
    Vector(&'a DVector<T>),
}

impl<T: Scalar> FieldValue<'_, T> {
    /// Copies the value out of the state.
    pub fn to_recorded(&self) -> RecordedValue<T> {
        match *self {
            FieldValue::Scalar(v) => RecordedValue::Scalar(v),
            FieldValue::Vector(v) => RecordedValue::Vector(v.clone()),
        }
    }
}

/// Owned copy of one state field, independent of the live state.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum RecordedValue<T: Scalar> {
    /// `F` or `Gnorm`
    Scalar(T),
    /// `X` or `G`
    Vector(DVector<T>),
}

impl<T: Scalar> RecordedValue<T> {
    /// Returns the scalar, if this is a scalar field.
    pub fn as_scalar(&self) -> Option<T> {
        match self {
            RecordedValue::Scalar(v) => Some(*v),
            RecordedValue::Vector(_) => None,
        }
    }

    /// Returns the vector, if this is a vector field.
    pub fn as_vector(&self) -> Option<&DVector<T>> {
        match self {
            RecordedValue::Scalar(_) => None,
            RecordedValue::Vector(v) => Some(v),
        }
    }
}

/// Parameters, objective value, gradient and gradient norm at one point.
///
/// `Gnorm` always equals `||G||` unless a value was supplied explicitly
/// when the state was built or updated.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct OptimizerState<T: Scalar> {
    #[cfg_attr(feature = "serde", serde(rename = "X"))]
    x: DVector<T>,
    #[cfg_attr(feature = "serde", serde(rename = "F"))]
    f: T,
    #[cfg_attr(feature = "serde", serde(rename = "G"))]
    g: DVector<T>,
    #[cfg_attr(feature = "serde", serde(rename = "Gnorm"))]
    gnorm: T,
}

impl<T: Scalar> OptimizerState<T> {
    /// Creates a state, computing `Gnorm` from `G` when it is not supplied.
    ///
    /// # Errors
    ///
    /// Returns `DimensionMismatch` if `x` and `g` differ in length.
    pub fn new(x: DVector<T>, f: T, g: DVector<T>, gnorm: Option<T>) -> Result<Self> {
        if x.len() != g.len() {
            return Err(OptimizerError::dimension_mismatch(x.len(), g.len()));
        }
        let gnorm = gnorm.unwrap_or_else(|| g.norm());
        Ok(Self { x, f, g, gnorm })
    }

    /// Copies new values into the buffers owned by this state.
    ///
    /// The parameter and gradient buffers are overwritten, never replaced.
    ///
    /// # Errors
    ///
    /// Returns `DimensionMismatch` if either vector has the wrong length;
    /// the state is left untouched in that case.
    pub fn update(&mut self, x: &DVector<T>, f: T, g: &DVector<T>, gnorm: Option<T>) -> Result<()> {
        if x.len() != self.x.len() {
            return Err(OptimizerError::dimension_mismatch(self.x.len(), x.len()));
        }
        if g.len() != self.g.len() {
            return Err(OptimizerError::dimension_mismatch(self.g.len(), g.len()));
        }
        self.x.copy_from(x);
        self.f = f;
        self.g.copy_from(g);
        self.gnorm = gnorm.unwrap_or_else(|| self.g.norm());
        Ok(())
    }

    /// Copies every field of `other` into this state's buffers.
    pub fn assign(&mut self, other: &OptimizerState<T>) -> Result<()> {
        self.update(&other.x, other.f, &other.g, Some(other.gnorm))
    }

    /// Number of parameters.
    pub fn dim(&self) -> usize {
        self.x.len()
    }

    /// Parameter vector `X`.
    pub fn x(&self) -> &DVector<T> {
        &self.x
    }

    /// Objective value `F`.
    pub fn f(&self) -> T {
        self.f
    }

    /// Gradient vector `G`.
    pub fn g(&self) -> &DVector<T> {
        &self.g
    }

    /// Gradient norm `Gnorm`.
    pub fn gnorm(&self) -> T {
        self.gnorm
    }

    /// Returns the value of a field.
    pub fn field(&self, field: StateField) -> FieldValue<'_, T> {
        match field {
            StateField::X => FieldValue::Vector(&self.x),
            StateField::F => FieldValue::Scalar(self.f),
            StateField::G => FieldValue::Vector(&self.g),
            StateField::Gnorm => FieldValue::Scalar(self.gnorm),
        }
    }

    /// Looks a field up by name.
    ///
    /// # Errors
    ///
    /// Returns `UnknownField` for any name other than `X`, `F`, `G`, `Gnorm`.
    pub fn get(&self, name: &str) -> Result<FieldValue<'_, T>> {
        let field: StateField = name.parse()?;
        Ok(self.field(field))
    }

    /// Iterates over the fields in the order `X`, `F`, `G`, `Gnorm`.
    pub fn iter(&self) -> impl Iterator<Item = (StateField, FieldValue<'_, T>)> + '_ {
        StateField::ALL.into_iter().map(move |field| (field, self.field(field)))
    }
}

impl<T: Scalar> fmt::Display for OptimizerState<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<State: F={:.6e}, Gnorm={:.6e}>",
            Scalar::to_f64(self.f),
            Scalar::to_f64(self.gnorm)
        )
    }
}
