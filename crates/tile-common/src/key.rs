//! Cache keys and consumer identities.
//!
//! A [`CanonicalKey`] names one fetch target after coordinate wrapping and
//! parameter canonicalization; a [`ConsumerId`] names one on-screen tile
//! instance. Several consumers (world-wrap duplicates) may share one key.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::coord::{RawTileCoord, TileCoord};
use crate::envelope::{Request, RequestKind, ResponseEnvelope};
use crate::error::ProtocolResult;
use crate::params::TileParams;

/// Identifies a unique fetch target. Always embeds the zoom level for tiles.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CanonicalKey(String);

impl CanonicalKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CanonicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifies one visual tile instance by its un-normalized coordinate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConsumerId(String);

impl ConsumerId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConsumerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity key of a raw host coordinate.
pub fn consumer_key(raw: &RawTileCoord) -> ConsumerId {
    ConsumerId(raw.to_string())
}

/// The fields a key is derived from, borrowed from a request or a response.
#[derive(Debug, Clone, Copy)]
pub struct KeyParts<'a> {
    pub kind: RequestKind,
    pub index: &'a str,
    pub store: &'a str,
    pub coord: Option<TileCoord>,
    pub params: Option<&'a TileParams>,
}

impl<'a> From<&'a Request> for KeyParts<'a> {
    fn from(request: &'a Request) -> Self {
        Self {
            kind: request.kind(),
            index: request.index(),
            store: request.store(),
            coord: request.coord(),
            params: request.params(),
        }
    }
}

impl<'a> From<&'a ResponseEnvelope> for KeyParts<'a> {
    fn from(response: &'a ResponseEnvelope) -> Self {
        Self {
            kind: response.kind,
            index: &response.index,
            store: &response.store,
            coord: response.coord,
            params: response.params.as_ref(),
        }
    }
}

/// Strategy for hashing requests and echoed responses into cache keys.
///
/// Both directions must agree: a response echoing a request's fields has to
/// produce the same key as the request itself.
pub trait KeyStrategy: Send + Sync {
    fn key(&self, parts: &KeyParts<'_>) -> ProtocolResult<CanonicalKey>;

    fn request_key(&self, request: &Request) -> ProtocolResult<CanonicalKey> {
        self.key(&KeyParts::from(request))
    }

    fn response_key(&self, response: &ResponseEnvelope) -> ProtocolResult<CanonicalKey> {
        self.key(&KeyParts::from(response))
    }
}

/// `kind:index:store[:z/x/y][:params]`
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultKeyStrategy;

impl KeyStrategy for DefaultKeyStrategy {
    fn key(&self, parts: &KeyParts<'_>) -> ProtocolResult<CanonicalKey> {
        let mut key = format!("{}:{}:{}", parts.kind.as_str(), parts.index, parts.store);
        if let Some(coord) = parts.coord {
            key.push(':');
            key.push_str(&coord.cache_key());
        }
        if let Some(params) = parts.params {
            key.push(':');
            key.push_str(&params.stable_json()?);
        }
        Ok(CanonicalKey(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coord::canonicalize;
    use crate::params::{HeatmapParams, RangeFilter};

    fn params(filters: Vec<RangeFilter>) -> TileParams {
        TileParams::Heatmap(HeatmapParams {
            x_field: "lon".to_string(),
            y_field: "lat".to_string(),
            resolution: 64,
            value_field: None,
            filters,
        })
    }

    #[test]
    fn test_wrapped_duplicates_share_key() {
        let keys = DefaultKeyStrategy;
        let left = canonicalize(&RawTileCoord::new(2, -1, 3)).unwrap();
        let right = canonicalize(&RawTileCoord::new(2, 3, 3)).unwrap();

        let a = keys
            .request_key(&Request::tile("trips", "es", left, Some(params(vec![]))))
            .unwrap();
        let b = keys
            .request_key(&Request::tile("trips", "es", right, Some(params(vec![]))))
            .unwrap();
        assert_eq!(a, b);

        let ca = consumer_key(&RawTileCoord::new(2, -1, 3));
        let cb = consumer_key(&RawTileCoord::new(2, 3, 3));
        assert_ne!(ca, cb);
    }

    #[test]
    fn test_key_embeds_zoom() {
        let keys = DefaultKeyStrategy;
        let a = keys
            .request_key(&Request::tile("trips", "es", TileCoord::new(1, 0, 0), None))
            .unwrap();
        let b = keys
            .request_key(&Request::tile("trips", "es", TileCoord::new(2, 0, 0), None))
            .unwrap();
        assert_ne!(a, b);
        assert_eq!(a.as_str(), "tile:trips:es:1/0/0");
    }

    #[test]
    fn test_response_key_matches_request_key() {
        let keys = DefaultKeyStrategy;
        let request = Request::tile(
            "trips",
            "es",
            TileCoord::new(3, 2, 1),
            Some(params(vec![
                RangeFilter::new("b", Some(1.0), None),
                RangeFilter::new("a", None, Some(2.0)),
            ])),
        );
        let response = ResponseEnvelope::success_for(&request, None);
        assert_eq!(
            keys.request_key(&request).unwrap(),
            keys.response_key(&response).unwrap()
        );
    }

    #[test]
    fn test_meta_key() {
        let key = DefaultKeyStrategy
            .request_key(&Request::meta("trips", "es"))
            .unwrap();
        assert_eq!(key.as_str(), "meta:trips:es");
    }
}
