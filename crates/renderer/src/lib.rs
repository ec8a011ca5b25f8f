//! Draw backends for aggregate tiles.
//!
//! Implements:
//! - Color ramps and value transforms (value → [0, 1] → color)
//! - Raster heatmaps from bin payloads, with PNG encoding
//! - HTML term markup from term payloads
//!
//! Every draw receives the [`BindingContext`] explicitly; there is no
//! process-wide "current" ramp or transform.

pub mod backend;
pub mod error;
pub mod markup;
pub mod png;
pub mod ramp;
pub mod raster;
pub mod transform;

pub use backend::{BindingContext, RenderBackend, TileHandle};
pub use error::{RenderError, RenderResult};
pub use markup::MarkupBackend;
pub use ramp::{Color, ColorRamp};
pub use raster::{RasterBackend, RasterTile};
pub use transform::ValueTransform;
