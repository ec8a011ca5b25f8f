//! Request transport for the aggregation service.
//!
//! A single persistent connection carries every tile and metadata request
//! of a layer. The [`Transport`] correlates responses to requests by cache
//! key, coalesces duplicate requests into one physical send, queues requests
//! while disconnected and replays them once the connection is back.

pub mod config;
pub mod connection;
pub mod error;
pub mod transport;

pub use config::TransportConfig;
pub use connection::{run_websocket, Connection, WebSocketConnection};
pub use error::TransportError;
pub use transport::{Resolved, ResponseFuture, Transport, TransportStats};
