//! Decoded tile payloads.
//!
//! Heatmap tiles arrive as a flat array of bin values, either inline as a
//! JSON number array or downloaded as little-endian `f64` bytes. Term tiles
//! (word clouds, topic histograms) arrive as JSON, either as an array of
//! term objects or as a `term → count` map.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Errors decoding a tile payload.
#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("Invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Binary bin payload length {0} is not a multiple of 8")]
    BinLength(usize),

    #[error("Bin count {0} is not a square grid")]
    NotSquare(usize),

    #[error("Non-finite value in payload at position {0}")]
    NonFinite(usize),

    #[error("Unexpected payload shape: {0}")]
    UnexpectedShape(String),
}

/// Which decoded form a layer expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadFormat {
    Bins,
    Terms,
}

/// Positive/neutral/negative split of a term's occurrences.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Sentiment {
    #[serde(default)]
    pub positive: f64,
    #[serde(default)]
    pub neutral: f64,
    #[serde(default)]
    pub negative: f64,
}

impl Sentiment {
    /// Positive minus negative.
    pub fn balance(&self) -> f64 {
        self.positive - self.negative
    }

    pub fn total(&self) -> f64 {
        self.positive + self.neutral + self.negative
    }
}

/// One term of a term tile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermCount {
    pub term: String,
    pub count: f64,
    /// Per-bucket counts for topic histograms.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub histogram: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<Sentiment>,
}

impl TermCount {
    pub fn new(term: impl Into<String>, count: f64) -> Self {
        Self {
            term: term.into(),
            count,
            histogram: None,
            sentiment: None,
        }
    }

    /// Sum of the histogram buckets, or the plain count when there is none.
    pub fn bucket_sum(&self) -> f64 {
        match &self.histogram {
            Some(buckets) if !buckets.is_empty() => buckets.iter().sum(),
            _ => self.count,
        }
    }
}

/// Body of a term in the map form: either a bare count or an object.
#[derive(Deserialize)]
#[serde(untagged)]
enum TermBody {
    Count(f64),
    Detail {
        #[serde(default)]
        count: f64,
        #[serde(default)]
        histogram: Option<Vec<f64>>,
        #[serde(default)]
        sentiment: Option<Sentiment>,
    },
}

/// A payload ready for extrema extraction and rendering.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedPayload {
    Bins(Vec<f64>),
    Terms(Vec<TermCount>),
}

impl DecodedPayload {
    /// Decode an inline JSON payload.
    pub fn from_json(format: PayloadFormat, value: &Value) -> Result<Self, PayloadError> {
        match format {
            PayloadFormat::Bins => {
                let bins: Vec<f64> = serde_json::from_value(value.clone())?;
                check_bins(&bins)?;
                Ok(Self::Bins(bins))
            }
            PayloadFormat::Terms => decode_terms(value.clone()),
        }
    }

    /// Decode a downloaded payload body.
    pub fn from_bytes(format: PayloadFormat, body: &Bytes) -> Result<Self, PayloadError> {
        match format {
            PayloadFormat::Bins => {
                if body.len() % 8 != 0 {
                    return Err(PayloadError::BinLength(body.len()));
                }
                let bins: Vec<f64> = body
                    .chunks_exact(8)
                    .map(|chunk| {
                        let mut raw = [0u8; 8];
                        raw.copy_from_slice(chunk);
                        f64::from_le_bytes(raw)
                    })
                    .collect();
                check_bins(&bins)?;
                Ok(Self::Bins(bins))
            }
            PayloadFormat::Terms => decode_terms(serde_json::from_slice(body)?),
        }
    }

    pub fn format(&self) -> PayloadFormat {
        match self {
            Self::Bins(_) => PayloadFormat::Bins,
            Self::Terms(_) => PayloadFormat::Terms,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Bins(bins) => bins.iter().all(|v| *v == 0.0),
            Self::Terms(terms) => terms.is_empty(),
        }
    }
}

/// Bins must fill a non-empty square grid with finite values.
fn check_bins(bins: &[f64]) -> Result<(), PayloadError> {
    let side = (bins.len() as f64).sqrt().round() as usize;
    if bins.is_empty() || side * side != bins.len() {
        return Err(PayloadError::NotSquare(bins.len()));
    }
    match bins.iter().position(|v| !v.is_finite()) {
        Some(i) => Err(PayloadError::NonFinite(i)),
        None => Ok(()),
    }
}

/// Terms are ordered by descending count, ties by term.
fn decode_terms(value: Value) -> Result<DecodedPayload, PayloadError> {
    let mut terms = match value {
        Value::Array(_) => serde_json::from_value::<Vec<TermCount>>(value)?,
        Value::Object(map) => map
            .into_iter()
            .map(|(term, body)| {
                Ok(match serde_json::from_value::<TermBody>(body)? {
                    TermBody::Count(count) => TermCount::new(term, count),
                    TermBody::Detail {
                        count,
                        histogram,
                        sentiment,
                    } => TermCount {
                        term,
                        count,
                        histogram,
                        sentiment,
                    },
                })
            })
            .collect::<Result<Vec<_>, PayloadError>>()?,
        other => {
            return Err(PayloadError::UnexpectedShape(format!(
                "expected term array or object, got {}",
                other
            )))
        }
    };

    for (i, term) in terms.iter().enumerate() {
        if !term.count.is_finite() {
            return Err(PayloadError::NonFinite(i));
        }
    }

    terms.sort_by(|a, b| b.count.total_cmp(&a.count).then_with(|| a.term.cmp(&b.term)));
    Ok(DecodedPayload::Terms(terms))
}
