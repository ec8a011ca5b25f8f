//! Common test fixtures for tile streaming tests.
//!
//! This module provides pre-defined requests, parameters and envelopes that
//! represent common scenarios.

use serde_json::Value;
use tile_common::{
    HeatmapParams, RangeFilter, Request, ResponseEnvelope, TileCoord, TileParams, TopTermsParams,
};

/// Index used by fixture requests.
pub const INDEX: &str = "trips";

/// Store used by fixture requests.
pub const STORE: &str = "es";

/// Base URL used by fixture transports.
pub const BASE_URL: &str = "http://agg.test";

/// Heatmap parameters at the given resolution with one range filter.
pub fn heatmap_params(resolution: u32) -> TileParams {
    TileParams::Heatmap(HeatmapParams {
        x_field: "pickup.lon".to_string(),
        y_field: "pickup.lat".to_string(),
        resolution,
        value_field: None,
        filters: vec![RangeFilter::new("fare", Some(0.0), Some(100.0))],
    })
}

/// Top terms parameters for the `hashtags` field.
pub fn top_terms_params(size: u32) -> TileParams {
    TileParams::TopTerms(TopTermsParams {
        x_field: "lon".to_string(),
        y_field: "lat".to_string(),
        term_field: "hashtags".to_string(),
        size,
        include: vec![],
        filters: vec![],
    })
}

/// Heatmap tile request against the fixture index.
pub fn heatmap_request(z: u32, x: u32, y: u32) -> Request {
    Request::tile(INDEX, STORE, TileCoord::new(z, x, y), Some(heatmap_params(16)))
}

/// Echo a wire request back as a successful envelope.
///
/// Returns `None` if `frame` is not a request.
pub fn success_frame(frame: &str, payload: Option<Value>) -> Option<String> {
    let request: Request = serde_json::from_str(frame).ok()?;
    ResponseEnvelope::success_for(&request, payload).to_json().ok()
}

/// Echo a wire request back as a failed envelope.
pub fn failure_frame(frame: &str, error: &str) -> Option<String> {
    let request: Request = serde_json::from_str(frame).ok()?;
    ResponseEnvelope::failure_for(&request, error).to_json().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_frame_echoes_request() {
        let frame = heatmap_request(2, 1, 3).to_wire().unwrap();
        let response = success_frame(&frame, Some(Value::from(vec![1.0]))).unwrap();
        let envelope = ResponseEnvelope::from_json(&response).unwrap();

        assert!(envelope.success);
        assert_eq!(envelope.index, INDEX);
        assert_eq!(envelope.coord, Some(TileCoord::new(2, 1, 3)));
    }

    #[test]
    fn test_failure_frame() {
        let frame = heatmap_request(0, 0, 0).to_wire().unwrap();
        let response = failure_frame(&frame, "shard timeout").unwrap();
        let envelope = ResponseEnvelope::from_json(&response).unwrap();
        assert!(!envelope.success);
        assert_eq!(envelope.error.as_deref(), Some("shard timeout"));
    }

    #[test]
    fn test_non_request_frame() {
        assert!(success_frame("not json", None).is_none());
    }
}
