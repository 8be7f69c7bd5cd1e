// ── Reading domain types ──

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// One physical measurement. Immutable once received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadingPoint {
    pub sensor_name: String,
    /// As received; either `T`-separated or space-separated.
    pub timestamp: String,
    pub value: f64,
}

/// One row of an aligned multi-sensor series.
///
/// `values` holds a key for every requested sensor, in request order.
/// `None` means "no measurement at this timestamp", which is not `0.0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignedEntry {
    pub timestamp: String,
    pub values: IndexMap<String, Option<f64>>,
}

impl AlignedEntry {
    pub fn value(&self, sensor: &str) -> Option<f64> {
        self.values.get(sensor).copied().flatten()
    }
}
