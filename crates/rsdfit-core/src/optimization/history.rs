//! Per-iteration recording of state fields.

use crate::{
    error::Result,
    optimization::state::{OptimizerState, RecordedValue, StateField},
    types::Scalar,
};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Log of state fields, one entry per recorded iteration.
///
/// Every entry is an independent copy; mutating the live state afterwards
/// never alters what was recorded.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct History<T: Scalar> {
    entries: BTreeMap<StateField, Vec<RecordedValue<T>>>,
}

impl<T: Scalar> Default for History<T> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }
}

impl<T: Scalar> History<T> {
    /// Creates an empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends copies of `fields` taken from `state`.
    pub fn record(&mut self, state: &OptimizerState<T>, fields: &[StateField]) {
        for &field in fields {
            self.entries
                .entry(field)
                .or_default()
                .push(state.field(field).to_recorded());
        }
    }

    /// Appends copies of the fields named in `names`.
    ///
    /// # Errors
    ///
    /// Returns `UnknownField` if any name is not a state field. Names are
    /// resolved before anything is recorded.
    pub fn record_named(&mut self, state: &OptimizerState<T>, names: &[&str]) -> Result<()> {
        let fields = names
            .iter()
            .map(|name| name.parse())
            .collect::<Result<Vec<StateField>>>()?;
        self.record(state, &fields);
        Ok(())
    }

    /// Recorded values of one field.
    pub fn get(&self, field: StateField) -> Option<&[RecordedValue<T>]> {
        self.entries.get(&field).map(Vec::as_slice)
    }

    /// Number of recorded values for one field.
    pub fn len(&self, field: StateField) -> usize {
        self.entries.get(&field).map_or(0, Vec::len)
    }

    /// True if nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.values().all(Vec::is_empty)
    }

    /// Recorded values of a scalar field (`F` or `Gnorm`).
    pub fn scalars(&self, field: StateField) -> Vec<T> {
        self.get(field)
            .map(|values| values.iter().filter_map(RecordedValue::as_scalar).collect())
            .unwrap_or_default()
    }

    /// Fields that have at least one entry.
    pub fn fields(&self) -> impl Iterator<Item = StateField> + '_ {
        self.entries.keys().copied()
    }
}
