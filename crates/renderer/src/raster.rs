//! Heatmap rasterization of bin payloads.
//!
//! A bin payload of `n * n` values becomes an `n × n` RGBA image, row-major
//! with the first row at the top of the tile. Zero bins are empty cells and
//! stay transparent.

use std::collections::HashMap;

use tile_cache::{DecodedPayload, Extrema, PayloadFormat};
use tracing::debug;

use crate::backend::{BindingContext, RenderBackend, TileHandle};
use crate::error::{RenderError, RenderResult};
use crate::png;
use crate::ramp::Color;

/// One drawn tile.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterTile {
    pub width: usize,
    pub height: usize,
    /// RGBA pixel data (4 bytes per pixel)
    pub pixels: Vec<u8>,
}

impl RasterTile {
    pub fn pixel(&self, x: usize, y: usize) -> Option<Color> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y * self.width + x) * 4;
        Some(Color::new(
            self.pixels[i],
            self.pixels[i + 1],
            self.pixels[i + 2],
            self.pixels[i + 3],
        ))
    }

    pub fn to_png(&self) -> RenderResult<Vec<u8>> {
        png::encode_rgba(&self.pixels, self.width, self.height)
    }
}

/// Side length of a square bin grid.
fn grid_side(len: usize) -> RenderResult<usize> {
    let side = (len as f64).sqrt().round() as usize;
    if len == 0 || side * side != len {
        return Err(RenderError::NotSquare(len));
    }
    Ok(side)
}

/// Render bins as a heatmap normalized against `extrema`.
pub fn render_bins(
    bins: &[f64],
    ctx: &BindingContext,
    extrema: &Extrema,
) -> RenderResult<RasterTile> {
    let side = grid_side(bins.len())?;
    let mut pixels = vec![0u8; side * side * 4];

    for (idx, value) in bins.iter().enumerate() {
        if *value == 0.0 {
            continue;
        }
        let color = ctx.color_for(*value, extrema);
        let pixel_idx = idx * 4;
        pixels[pixel_idx] = color.r;
        pixels[pixel_idx + 1] = color.g;
        pixels[pixel_idx + 2] = color.b;
        pixels[pixel_idx + 3] = color.a;
    }

    Ok(RasterTile {
        width: side,
        height: side,
        pixels,
    })
}

/// Keeps the latest raster of every tile handle.
#[derive(Debug, Default)]
pub struct RasterBackend {
    tiles: HashMap<TileHandle, RasterTile>,
}

impl RasterBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tile(&self, handle: TileHandle) -> Option<&RasterTile> {
        self.tiles.get(&handle)
    }

    pub fn png(&self, handle: TileHandle) -> RenderResult<Vec<u8>> {
        self.tiles
            .get(&handle)
            .ok_or(RenderError::UnknownTile(handle))?
            .to_png()
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }
}

impl RenderBackend for RasterBackend {
    fn render_tile(
        &mut self,
        ctx: &mut BindingContext,
        tile: TileHandle,
        payload: &DecodedPayload,
        extrema: &Extrema,
    ) -> RenderResult<()> {
        let DecodedPayload::Bins(bins) = payload else {
            return Err(RenderError::FormatMismatch {
                expected: PayloadFormat::Bins,
                found: payload.format(),
            });
        };

        let raster = render_bins(bins, ctx, extrema)?;
        debug!(tile = %tile, side = raster.width, "Rasterized tile");
        self.tiles.insert(tile, raster);
        ctx.record_draw();
        Ok(())
    }

    fn clear_tile(&mut self, tile: TileHandle) {
        self.tiles.remove(&tile);
    }
}
