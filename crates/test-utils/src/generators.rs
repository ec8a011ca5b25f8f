//! Payload generators for creating synthetic aggregate tiles.
//!
//! These generators create predictable, verifiable payloads that can be
//! used across the test suite.

use bytes::Bytes;
use serde_json::Value;
use tile_cache::{DecodedPayload, Sentiment, TermCount};

/// Creates a `side × side` bin payload with values `1..=side²`.
///
/// Every bin is non-zero, the first bin holds the minimum and the last the
/// maximum.
///
/// # Example
///
/// ```
/// use test_utils::gradient_bins;
/// use tile_cache::DecodedPayload;
///
/// let DecodedPayload::Bins(bins) = gradient_bins(2) else { unreachable!() };
/// assert_eq!(bins, vec![1.0, 2.0, 3.0, 4.0]);
/// ```
pub fn gradient_bins(side: usize) -> DecodedPayload {
    DecodedPayload::Bins((1..=side * side).map(|v| v as f64).collect())
}

/// Creates a `side × side` bin payload holding `value` everywhere.
pub fn constant_bins(side: usize, value: f64) -> DecodedPayload {
    DecodedPayload::Bins(vec![value; side * side])
}

/// Bin values as an inline JSON payload.
pub fn bins_json(values: &[f64]) -> Value {
    Value::from(values.to_vec())
}

/// Bin values as a downloaded little-endian `f64` body.
pub fn bins_le_bytes(values: &[f64]) -> Bytes {
    let mut raw = Vec::with_capacity(values.len() * 8);
    for v in values {
        raw.extend_from_slice(&v.to_le_bytes());
    }
    Bytes::from(raw)
}

/// Creates a term payload from `(term, count)` pairs, in the given order.
pub fn term_payload(terms: &[(&str, f64)]) -> DecodedPayload {
    DecodedPayload::Terms(
        terms
            .iter()
            .map(|(term, count)| TermCount::new(*term, *count))
            .collect(),
    )
}

/// Creates a topic histogram payload; each term's count is its bucket sum.
pub fn topic_payload(topics: &[(&str, &[f64])]) -> DecodedPayload {
    DecodedPayload::Terms(
        topics
            .iter()
            .map(|(term, buckets)| TermCount {
                term: term.to_string(),
                count: buckets.iter().sum(),
                histogram: Some(buckets.to_vec()),
                sentiment: None,
            })
            .collect(),
    )
}

/// Creates a sentiment-split term payload from `(term, positive, neutral,
/// negative)`.
pub fn sentiment_payload(terms: &[(&str, f64, f64, f64)]) -> DecodedPayload {
    DecodedPayload::Terms(
        terms
            .iter()
            .map(|(term, positive, neutral, negative)| {
                let sentiment = Sentiment {
                    positive: *positive,
                    neutral: *neutral,
                    negative: *negative,
                };
                TermCount {
                    term: term.to_string(),
                    count: sentiment.total(),
                    histogram: None,
                    sentiment: Some(sentiment),
                }
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tile_cache::PayloadFormat;

    #[test]
    fn test_gradient_bins() {
        let DecodedPayload::Bins(bins) = gradient_bins(3) else {
            panic!("expected bins");
        };
        assert_eq!(bins.len(), 9);
        assert_eq!(bins[0], 1.0);
        assert_eq!(bins[8], 9.0);
    }

    #[test]
    fn test_le_bytes_decode_back() {
        let body = bins_le_bytes(&[1.5, 0.0, 3.0, 4.0]);
        assert_eq!(body.len(), 32);
        let decoded = DecodedPayload::from_bytes(PayloadFormat::Bins, &body).unwrap();
        assert_eq!(decoded, DecodedPayload::Bins(vec![1.5, 0.0, 3.0, 4.0]));
    }

    #[test]
    fn test_topic_payload_counts() {
        let DecodedPayload::Terms(terms) = topic_payload(&[("storm", &[1.0, 2.0])]) else {
            panic!("expected terms");
        };
        assert_eq!(terms[0].count, 3.0);
        assert_eq!(terms[0].bucket_sum(), 3.0);
    }
}
