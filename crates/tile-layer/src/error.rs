//! Error types for the layer binding.

use thiserror::Error;

use renderer::{RenderError, TileHandle};
use tile_cache::PayloadError;
use tile_common::ProtocolError;
use transport::TransportError;

/// Why a tile (or the layer metadata) could not be produced.
///
/// None of these are fatal to the layer: a failed tile keeps its
/// placeholder.
#[derive(Debug, Error)]
pub enum TileError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Payload error: {0}")]
    Payload(#[from] PayloadError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Unknown tile handle {0}")]
    UnknownTile(TileHandle),
}

/// Errors loading or validating a [`LayerConfig`](crate::LayerConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}
