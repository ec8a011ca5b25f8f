//! Error types for tile rendering.

use thiserror::Error;

use tile_cache::PayloadFormat;

use crate::backend::TileHandle;

/// Result type for rendering.
pub type RenderResult<T> = Result<T, RenderError>;

/// Errors from drawing or encoding a tile.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Backend draws {expected:?} payloads, got {found:?}")]
    FormatMismatch {
        expected: PayloadFormat,
        found: PayloadFormat,
    },

    #[error("Bin count {0} is not a square number")]
    NotSquare(usize),

    #[error("Pixel buffer holds {actual} bytes, expected {expected}")]
    BufferSize { expected: usize, actual: usize },

    #[error("Encoding failed: {0}")]
    Encode(#[from] std::io::Error),

    #[error("No drawing for tile {0}")]
    UnknownTile(TileHandle),
}
