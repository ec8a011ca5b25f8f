//! Layer metadata: the global value range and document count of an index.

use serde::{Deserialize, Serialize};
use tile_cache::Extrema;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayerMeta {
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
    #[serde(default)]
    pub doc_count: Option<u64>,
    /// Field names available for aggregation.
    #[serde(default)]
    pub fields: Vec<String>,
}

impl LayerMeta {
    /// Index-wide range, when the service reported both ends.
    pub fn extrema(&self) -> Option<Extrema> {
        match (self.min, self.max) {
            (Some(min), Some(max)) if min <= max => Some(Extrema::new(min, max)),
            _ => None,
        }
    }
}
