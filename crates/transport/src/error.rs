//! Transport error taxonomy.

use thiserror::Error;

/// Errors delivered to callers awaiting a response.
///
/// Cloneable so that every coalesced waiter receives the same value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// A send was attempted on a closed channel. Requests hitting this are
    /// queued by the transport, so callers never observe it.
    #[error("not connected")]
    NotConnected,

    /// The connection closed while the request was in flight.
    #[error("connection has been lost")]
    ConnectionLost,

    /// The service answered with `success: false`.
    #[error("request failed: {0}")]
    RequestFailed(String),

    /// The request could not be encoded.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl From<tile_common::ProtocolError> for TransportError {
    fn from(err: tile_common::ProtocolError) -> Self {
        TransportError::Protocol(err.to_string())
    }
}
