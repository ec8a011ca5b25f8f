//! Value transforms: map a value to [0, 1] against the layer extrema.

use serde::{Deserialize, Serialize};
use tile_cache::Extrema;

/// Ranges narrower than this are treated as flat.
const MIN_RANGE: f64 = 0.001;

/// Steepness of the sigmoid around the middle of the range.
const SIGMOID_GAIN: f64 = 6.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueTransform {
    #[default]
    Linear,
    Log10,
    Sigmoid,
}

impl ValueTransform {
    /// Normalized position of `value` inside `extrema`, in [0, 1].
    ///
    /// An empty range maps everything to 0. A flat range maps its single
    /// value to 1, matching a one-tile layer drawing at full intensity.
    pub fn apply(&self, value: f64, extrema: &Extrema) -> f64 {
        if extrema.is_empty() || !value.is_finite() {
            return 0.0;
        }

        let range = extrema.max - extrema.min;
        if range.abs() < MIN_RANGE {
            return if value >= extrema.min { 1.0 } else { 0.0 };
        }

        let t = match self {
            Self::Linear => (value - extrema.min) / range,
            Self::Log10 => {
                let offset = (value - extrema.min).max(0.0);
                (offset + 1.0).log10() / (range + 1.0).log10()
            }
            Self::Sigmoid => {
                let x = (value - extrema.min) / range * 2.0 - 1.0;
                let s = |x: f64| 1.0 / (1.0 + (-SIGMOID_GAIN * x).exp());
                // Rescale so the range ends land on 0 and 1.
                (s(x) - s(-1.0)) / (s(1.0) - s(-1.0))
            }
        };

        t.clamp(0.0, 1.0)
    }
}
