//! Viewport layout and writing rendered tiles to disk.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use renderer::{MarkupBackend, RasterBackend, RenderBackend, TileHandle};
use tile_common::{world_width, RawTileCoord};

/// A backend whose drawings can be written as files.
pub trait TileOutput: RenderBackend {
    const EXTENSION: &'static str;

    /// File contents of a drawn tile; `None` if it was never drawn.
    fn encode(&self, handle: TileHandle) -> Result<Option<Vec<u8>>>;
}

impl TileOutput for RasterBackend {
    const EXTENSION: &'static str = "png";

    fn encode(&self, handle: TileHandle) -> Result<Option<Vec<u8>>> {
        match self.tile(handle) {
            Some(tile) => Ok(Some(tile.to_png()?)),
            None => Ok(None),
        }
    }
}

impl TileOutput for MarkupBackend {
    const EXTENSION: &'static str = "html";

    fn encode(&self, handle: TileHandle) -> Result<Option<Vec<u8>>> {
        Ok(self.html(handle).map(|fragment| {
            format!(
                "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"></head><body>{}</body></html>\n",
                fragment
            )
            .into_bytes()
        }))
    }
}

/// Every tile of the world at `zoom`, plus the wrapped copy of the last
/// column at `x = -1`.
pub fn viewport(zoom: u32) -> Vec<RawTileCoord> {
    let n = world_width(zoom);
    (0..n)
        .flat_map(|y| (-1..n).map(move |x| RawTileCoord::new(zoom, x, y)))
        .collect()
}

pub fn tile_path(out_dir: &Path, raw: &RawTileCoord, extension: &str) -> PathBuf {
    out_dir.join(format!("{}_{}_{}.{}", raw.z, raw.x, raw.y, extension))
}

/// Write one drawn tile. Returns `None` for tiles that were never drawn.
pub fn write_tile<B: TileOutput>(
    backend: &B,
    handle: TileHandle,
    raw: &RawTileCoord,
    out_dir: &Path,
) -> Result<Option<PathBuf>> {
    let Some(bytes) = backend.encode(handle)? else {
        return Ok(None);
    };
    let path = tile_path(out_dir, raw, B::EXTENSION);
    std::fs::write(&path, bytes).with_context(|| format!("Failed to write {:?}", path))?;
    Ok(Some(path))
}
