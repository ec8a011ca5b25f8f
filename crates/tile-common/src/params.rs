//! Typed tile request parameters.
//!
//! Each layer kind has its own parameter struct. Parameters become part of
//! the cache key, so they are serialized through [`TileParams::stable_json`]:
//! fields come out in declaration order, absent optionals are omitted,
//! set-like lists are sorted and deduplicated and NaN bounds are dropped.
//! Two semantically identical parameter sets therefore produce the same
//! string no matter how they were assembled.

use serde::{Deserialize, Serialize};

use crate::error::{ProtocolError, ProtocolResult};

/// Largest heatmap resolution the service will bin into.
pub const MAX_RESOLUTION: u32 = 4096;

/// Numeric range restriction on a document field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeFilter {
    pub field: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gte: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lte: Option<f64>,
}

impl RangeFilter {
    pub fn new(field: impl Into<String>, gte: Option<f64>, lte: Option<f64>) -> Self {
        Self {
            field: field.into(),
            gte,
            lte,
        }
    }
}

/// Parameters for binned heatmap tiles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeatmapParams {
    pub x_field: String,
    pub y_field: String,
    pub resolution: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_field: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<RangeFilter>,
}

/// Parameters for word-cloud tiles (most frequent terms).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopTermsParams {
    pub x_field: String,
    pub y_field: String,
    pub term_field: String,
    pub size: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub include: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<RangeFilter>,
}

/// Parameters for per-topic frequency histogram tiles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicFrequencyParams {
    pub x_field: String,
    pub y_field: String,
    pub term_field: String,
    pub topics: Vec<String>,
    pub time_field: String,
    pub interval: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<i64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<RangeFilter>,
}

/// Parameters of a tile request, one variant per layer kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TileParams {
    Heatmap(HeatmapParams),
    TopTerms(TopTermsParams),
    TopicFrequency(TopicFrequencyParams),
}

impl TileParams {
    /// Deterministic serialization used as cache-key material.
    pub fn stable_json(&self) -> ProtocolResult<String> {
        Ok(serde_json::to_string(&self.normalized()?)?)
    }

    /// Validate and bring the parameters into canonical form.
    pub fn normalized(&self) -> ProtocolResult<TileParams> {
        let params = match self {
            TileParams::Heatmap(p) => {
                require("x_field", &p.x_field)?;
                require("y_field", &p.y_field)?;
                if p.resolution == 0 || p.resolution > MAX_RESOLUTION {
                    return Err(ProtocolError::invalid_parameter(
                        "resolution",
                        format!("must be within 1..={}", MAX_RESOLUTION),
                    ));
                }
                TileParams::Heatmap(HeatmapParams {
                    x_field: p.x_field.trim().to_string(),
                    y_field: p.y_field.trim().to_string(),
                    resolution: p.resolution,
                    value_field: non_empty(&p.value_field),
                    filters: normalize_filters(&p.filters)?,
                })
            }
            TileParams::TopTerms(p) => {
                require("x_field", &p.x_field)?;
                require("y_field", &p.y_field)?;
                require("term_field", &p.term_field)?;
                if p.size == 0 {
                    return Err(ProtocolError::invalid_parameter("size", "must be positive"));
                }
                TileParams::TopTerms(TopTermsParams {
                    x_field: p.x_field.trim().to_string(),
                    y_field: p.y_field.trim().to_string(),
                    term_field: p.term_field.trim().to_string(),
                    size: p.size,
                    include: normalize_terms(&p.include),
                    filters: normalize_filters(&p.filters)?,
                })
            }
            TileParams::TopicFrequency(p) => {
                require("x_field", &p.x_field)?;
                require("y_field", &p.y_field)?;
                require("term_field", &p.term_field)?;
                require("time_field", &p.time_field)?;
                require("interval", &p.interval)?;
                let topics = normalize_terms(&p.topics);
                if topics.is_empty() {
                    return Err(ProtocolError::invalid_parameter(
                        "topics",
                        "at least one topic is required",
                    ));
                }
                if let (Some(from), Some(to)) = (p.from, p.to) {
                    if from > to {
                        return Err(ProtocolError::invalid_parameter(
                            "from",
                            "time range start is after its end",
                        ));
                    }
                }
                TileParams::TopicFrequency(TopicFrequencyParams {
                    x_field: p.x_field.trim().to_string(),
                    y_field: p.y_field.trim().to_string(),
                    term_field: p.term_field.trim().to_string(),
                    topics,
                    time_field: p.time_field.trim().to_string(),
                    interval: p.interval.trim().to_string(),
                    from: p.from,
                    to: p.to,
                    filters: normalize_filters(&p.filters)?,
                })
            }
        };
        Ok(params)
    }
}

fn require(field: &str, value: &str) -> ProtocolResult<()> {
    if value.trim().is_empty() {
        return Err(ProtocolError::invalid_parameter(field, "must not be empty"));
    }
    Ok(())
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn normalize_terms(terms: &[String]) -> Vec<String> {
    let mut terms: Vec<String> = terms
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect();
    terms.sort();
    terms.dedup();
    terms
}

fn normalize_bound(field: &str, bound: Option<f64>) -> ProtocolResult<Option<f64>> {
    match bound {
        Some(v) if v.is_nan() => Ok(None),
        Some(v) if v.is_infinite() => Err(ProtocolError::NonFinite(field.to_string())),
        other => Ok(other),
    }
}

fn normalize_filters(filters: &[RangeFilter]) -> ProtocolResult<Vec<RangeFilter>> {
    let mut out = Vec::with_capacity(filters.len());
    for filter in filters {
        let field = filter.field.trim();
        if field.is_empty() {
            continue;
        }
        let gte = normalize_bound(field, filter.gte)?;
        let lte = normalize_bound(field, filter.lte)?;
        if gte.is_none() && lte.is_none() {
            continue;
        }
        out.push(RangeFilter::new(field, gte, lte));
    }

    out.sort_by(|a, b| {
        a.field
            .cmp(&b.field)
            .then(a.gte.partial_cmp(&b.gte).unwrap_or(std::cmp::Ordering::Equal))
            .then(a.lte.partial_cmp(&b.lte).unwrap_or(std::cmp::Ordering::Equal))
    });
    out.dedup();
    Ok(out)
}
