//! Request and response envelopes exchanged with the aggregation service.
//!
//! Requests travel as JSON text frames. The service echoes the identifying
//! fields of each request (kind, index, store, coordinate, params) in its
//! response, which is how a response is matched back to its request.

use serde::{Deserialize, Serialize};

use crate::coord::TileCoord;
use crate::error::{ProtocolError, ProtocolResult};
use crate::params::TileParams;

/// What is being requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestKind {
    Tile,
    Meta,
}

impl RequestKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestKind::Tile => "tile",
            RequestKind::Meta => "meta",
        }
    }
}

/// A logical request. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    #[serde(rename = "type")]
    kind: RequestKind,
    index: String,
    store: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    coord: Option<TileCoord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    params: Option<TileParams>,
}

impl Request {
    /// Request for a single tile of an index.
    pub fn tile(
        index: impl Into<String>,
        store: impl Into<String>,
        coord: TileCoord,
        params: Option<TileParams>,
    ) -> Self {
        Self {
            kind: RequestKind::Tile,
            index: index.into(),
            store: store.into(),
            coord: Some(coord),
            params,
        }
    }

    /// Request for the metadata of an index.
    pub fn meta(index: impl Into<String>, store: impl Into<String>) -> Self {
        Self {
            kind: RequestKind::Meta,
            index: index.into(),
            store: store.into(),
            coord: None,
            params: None,
        }
    }

    pub fn kind(&self) -> RequestKind {
        self.kind
    }

    pub fn index(&self) -> &str {
        &self.index
    }

    pub fn store(&self) -> &str {
        &self.store
    }

    pub fn coord(&self) -> Option<TileCoord> {
        self.coord
    }

    pub fn params(&self) -> Option<&TileParams> {
        self.params.as_ref()
    }

    /// Serialize into the outbound JSON frame, with params in canonical form.
    pub fn to_wire(&self) -> ProtocolResult<String> {
        if self.kind == RequestKind::Tile && self.coord.is_none() {
            return Err(ProtocolError::MissingCoordinate);
        }
        let params = self.params.as_ref().map(TileParams::normalized).transpose()?;
        let wire = Request {
            params,
            ..self.clone()
        };
        Ok(serde_json::to_string(&wire)?)
    }
}

/// A response frame as sent by the aggregation service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub success: bool,
    #[serde(rename = "type")]
    pub kind: RequestKind,
    pub index: String,
    pub store: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coord: Option<TileCoord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<TileParams>,
    /// Route under which the payload can be downloaded, if not inline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// Inline payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
    /// Error detail when `success` is false.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ResponseEnvelope {
    /// Successful response echoing `request`.
    pub fn success_for(request: &Request, payload: Option<serde_json::Value>) -> Self {
        Self {
            success: true,
            kind: request.kind,
            index: request.index.clone(),
            store: request.store.clone(),
            coord: request.coord,
            params: request.params.clone(),
            endpoint: None,
            payload,
            error: None,
        }
    }

    /// Failed response echoing `request`.
    pub fn failure_for(request: &Request, error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Self::success_for(request, None)
        }
    }

    /// Parse an inbound frame.
    pub fn from_json(text: &str) -> ProtocolResult<Self> {
        let envelope: ResponseEnvelope = serde_json::from_str(text)?;
        if envelope.kind == RequestKind::Tile && envelope.coord.is_none() {
            return Err(ProtocolError::MalformedEnvelope(
                "tile response without coordinate".to_string(),
            ));
        }
        Ok(envelope)
    }

    pub fn to_json(&self) -> ProtocolResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}
