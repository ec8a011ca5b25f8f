//! Running value range of a layer.
//!
//! Every resolved payload is reduced to a `{min, max}` pair by an
//! [`ExtremaStrategy`]; the tracker widens its range with it and reports
//! whether the range moved. A moved range invalidates every tile already
//! drawn with the old normalization, so the layer redraws everything.

use metrics::counter;
use serde::Serialize;
use tracing::debug;

use crate::payload::DecodedPayload;

/// Value range. Starts at the sentinels `min = +∞`, `max = −∞`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Extrema {
    pub min: f64,
    pub max: f64,
}

impl Extrema {
    pub const EMPTY: Extrema = Extrema {
        min: f64::INFINITY,
        max: f64::NEG_INFINITY,
    };

    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// True while still at the sentinels.
    pub fn is_empty(&self) -> bool {
        self.min > self.max
    }

    pub fn span(&self) -> f64 {
        if self.is_empty() {
            0.0
        } else {
            self.max - self.min
        }
    }

    /// Range of the finite values in `values`, if any.
    pub fn of(values: impl IntoIterator<Item = f64>) -> Option<Self> {
        values
            .into_iter()
            .filter(|v| v.is_finite())
            .fold(None, |acc: Option<Extrema>, v| {
                Some(match acc {
                    Some(e) => Extrema::new(e.min.min(v), e.max.max(v)),
                    None => Extrema::new(v, v),
                })
            })
    }

    /// Smallest range containing both.
    pub fn union(&self, other: &Extrema) -> Extrema {
        Extrema::new(self.min.min(other.min), self.max.max(other.max))
    }
}

impl Default for Extrema {
    fn default() -> Self {
        Self::EMPTY
    }
}

/// Reduces a payload to the range it contributes.
pub trait ExtremaStrategy: Send + Sync {
    /// `None` when the payload carries nothing this strategy measures.
    fn extract(&self, payload: &DecodedPayload) -> Option<Extrema>;
}

/// Heatmap bins; zero bins are empty cells and do not count.
#[derive(Debug, Clone, Copy, Default)]
pub struct BinExtrema;

impl ExtremaStrategy for BinExtrema {
    fn extract(&self, payload: &DecodedPayload) -> Option<Extrema> {
        match payload {
            DecodedPayload::Bins(bins) => Extrema::of(bins.iter().copied().filter(|v| *v != 0.0)),
            DecodedPayload::Terms(_) => None,
        }
    }
}

/// Per-term totals (sum of histogram buckets).
#[derive(Debug, Clone, Copy, Default)]
pub struct BucketSumExtrema;

impl ExtremaStrategy for BucketSumExtrema {
    fn extract(&self, payload: &DecodedPayload) -> Option<Extrema> {
        match payload {
            DecodedPayload::Terms(terms) => Extrema::of(terms.iter().map(|t| t.bucket_sum())),
            DecodedPayload::Bins(_) => None,
        }
    }
}

/// Sentiment balance. Each term contributes its positive and negative
/// counts, so the range is symmetric enough to color both sides.
#[derive(Debug, Clone, Copy, Default)]
pub struct SentimentExtrema;

impl ExtremaStrategy for SentimentExtrema {
    fn extract(&self, payload: &DecodedPayload) -> Option<Extrema> {
        match payload {
            DecodedPayload::Terms(terms) => Extrema::of(
                terms
                    .iter()
                    .filter_map(|t| t.sentiment)
                    .map(|s| {
                        let magnitude = s.positive.max(s.negative);
                        if s.balance() < 0.0 {
                            -magnitude
                        } else {
                            magnitude
                        }
                    }),
            ),
            DecodedPayload::Bins(_) => None,
        }
    }
}

/// Individual histogram buckets across all terms.
#[derive(Debug, Clone, Copy, Default)]
pub struct PeakBucketExtrema;

impl ExtremaStrategy for PeakBucketExtrema {
    fn extract(&self, payload: &DecodedPayload) -> Option<Extrema> {
        match payload {
            DecodedPayload::Terms(terms) => Extrema::of(
                terms
                    .iter()
                    .filter_map(|t| t.histogram.as_deref())
                    .flatten()
                    .copied(),
            ),
            DecodedPayload::Bins(_) => None,
        }
    }
}

/// Result of feeding one payload to the tracker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExtremaUpdate {
    pub changed: bool,
    pub extrema: Extrema,
}

/// Layer-wide range, widened by each resolved payload.
#[derive(Debug)]
pub struct ExtremaTracker<S> {
    strategy: S,
    current: Extrema,
}

impl<S: ExtremaStrategy> ExtremaTracker<S> {
    pub fn new(strategy: S) -> Self {
        Self {
            strategy,
            current: Extrema::EMPTY,
        }
    }

    pub fn current(&self) -> Extrema {
        self.current
    }

    /// Widen with `payload`'s range. The range never narrows, so the first
    /// update after a reset always reports a change.
    pub fn update(&mut self, payload: &DecodedPayload) -> ExtremaUpdate {
        let Some(incoming) = self.strategy.extract(payload) else {
            return ExtremaUpdate {
                changed: false,
                extrema: self.current,
            };
        };

        let widened = self.current.union(&incoming);
        let changed = widened != self.current;
        if changed {
            debug!(
                old_min = self.current.min,
                old_max = self.current.max,
                min = widened.min,
                max = widened.max,
                "Layer extrema widened"
            );
            counter!("tile_extrema_changes_total").increment(1);
            self.current = widened;
        }

        ExtremaUpdate {
            changed,
            extrema: self.current,
        }
    }

    /// Back to the sentinels; called on zoom change.
    pub fn reset(&mut self) {
        self.current = Extrema::EMPTY;
    }
}
