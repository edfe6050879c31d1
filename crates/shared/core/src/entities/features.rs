use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::values::{InstrumentId, Price, Timestamp};

/// Ordered, named numeric features derived from one bar window.
///
/// Fields are private; a vector is never mutated after creation. Feature
/// names are shared between vectors produced by the same engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    instrument: InstrumentId,
    timestamp: Timestamp,
    names: Arc<[String]>,
    values: Vec<f64>,
    reference_price: Price,
}

impl FeatureVector {
    /// Builds a vector. `names` and `values` must line up one-to-one.
    pub fn new(
        instrument: InstrumentId,
        timestamp: Timestamp,
        names: Arc<[String]>,
        values: Vec<f64>,
        reference_price: Price,
    ) -> Self {
        debug_assert_eq!(names.len(), values.len());
        Self {
            instrument,
            timestamp,
            names,
            values,
            reference_price,
        }
    }

    pub fn instrument(&self) -> &InstrumentId {
        &self.instrument
    }

    /// Timestamp of the last bar in the window
    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Close of the last bar in the window
    pub fn reference_price(&self) -> Price {
        self.reference_price
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Looks a feature up by name
    pub fn get(&self, name: &str) -> Option<f64> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|idx| self.values[idx])
    }

    /// Iterates `(name, value)` pairs in order
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.names
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().copied())
    }
}
