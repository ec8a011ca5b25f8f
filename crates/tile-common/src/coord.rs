//! Tile coordinates and world-wrap normalization.
//!
//! The host tiling framework hands out *raw* coordinates: the column may lie
//! outside `0..2^z` when the map is panned across the antimeridian, and the
//! row may be counted from the bottom (TMS) instead of the top (XYZ).
//! Canonical coordinates are always wrapped and always XYZ.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Deepest zoom level that can be addressed.
pub const MAX_ZOOM: u32 = 30;

/// Row origin of a tiling scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TileScheme {
    /// Top-left origin (XYZ / WMTS).
    #[default]
    Xyz,
    /// Bottom-left origin (TMS).
    Tms,
}

/// A coordinate exactly as supplied by the host framework.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RawTileCoord {
    pub z: u32,
    pub x: i64,
    pub y: i64,
    #[serde(default)]
    pub scheme: TileScheme,
}

impl RawTileCoord {
    pub fn new(z: u32, x: i64, y: i64) -> Self {
        Self {
            z,
            x,
            y,
            scheme: TileScheme::Xyz,
        }
    }

    pub fn tms(z: u32, x: i64, y: i64) -> Self {
        Self {
            z,
            x,
            y,
            scheme: TileScheme::Tms,
        }
    }
}

impl fmt::Display for RawTileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scheme = match self.scheme {
            TileScheme::Xyz => "xyz",
            TileScheme::Tms => "tms",
        };
        write!(f, "{}/{}/{}@{}", self.z, self.x, self.y, scheme)
    }
}

/// A canonical (wrapped, top-origin) tile coordinate (z/x/y).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileCoord {
    /// Zoom level
    pub z: u32,
    /// Column (x)
    pub x: u32,
    /// Row (y)
    pub y: u32,
}

impl TileCoord {
    pub fn new(z: u32, x: u32, y: u32) -> Self {
        Self { z, x, y }
    }

    /// Generate a cache key fragment.
    pub fn cache_key(&self) -> String {
        format!("{}/{}/{}", self.z, self.x, self.y)
    }

    /// Re-express this coordinate as a raw XYZ coordinate.
    pub fn to_raw(&self) -> RawTileCoord {
        RawTileCoord::new(self.z, self.x as i64, self.y as i64)
    }

    /// Get the parent tile (zoom - 1).
    pub fn parent(&self) -> Option<TileCoord> {
        if self.z == 0 {
            return None;
        }
        Some(TileCoord {
            z: self.z - 1,
            x: self.x / 2,
            y: self.y / 2,
        })
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.z, self.x, self.y)
    }
}

/// Number of tile columns spanning the world at `zoom`.
pub fn world_width(zoom: u32) -> i64 {
    1i64 << zoom.min(MAX_ZOOM)
}

/// Map a raw host coordinate onto its canonical tile.
///
/// Columns wrap modulo the world width of the coordinate's own zoom level;
/// TMS rows are flipped to XYZ. Returns `None` for rows outside the world or
/// zoom levels deeper than [`MAX_ZOOM`].
///
/// ```
/// use tile_common::{canonicalize, RawTileCoord, TileCoord};
///
/// let wrapped = canonicalize(&RawTileCoord::new(2, -1, 3)).unwrap();
/// assert_eq!(wrapped, TileCoord::new(2, 3, 3));
/// ```
pub fn canonicalize(raw: &RawTileCoord) -> Option<TileCoord> {
    if raw.z > MAX_ZOOM {
        return None;
    }
    let n = world_width(raw.z);
    if raw.y < 0 || raw.y >= n {
        return None;
    }

    let x = raw.x.rem_euclid(n);
    let y = match raw.scheme {
        TileScheme::Xyz => raw.y,
        TileScheme::Tms => n - 1 - raw.y,
    };

    Some(TileCoord::new(raw.z, x as u32, y as u32))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_negative_column() {
        let coord = canonicalize(&RawTileCoord::new(2, -1, 3)).unwrap();
        assert_eq!(coord, TileCoord::new(2, 3, 3));

        let coord = canonicalize(&RawTileCoord::new(2, -5, 0)).unwrap();
        assert_eq!(coord, TileCoord::new(2, 3, 0));
    }

    #[test]
    fn test_wrap_over_bound_column() {
        let coord = canonicalize(&RawTileCoord::new(2, 4, 1)).unwrap();
        assert_eq!(coord, TileCoord::new(2, 0, 1));

        let coord = canonicalize(&RawTileCoord::new(3, 17, 1)).unwrap();
        assert_eq!(coord, TileCoord::new(3, 1, 1));
    }

    #[test]
    fn test_tms_row_flip() {
        let coord = canonicalize(&RawTileCoord::tms(3, 4, 2)).unwrap();
        assert_eq!(coord, TileCoord::new(3, 4, 5));
    }

    #[test]
    fn test_rows_do_not_wrap() {
        assert!(canonicalize(&RawTileCoord::new(2, 0, 4)).is_none());
        assert!(canonicalize(&RawTileCoord::new(2, 0, -1)).is_none());
    }

    #[test]
    fn test_zoom_zero_has_single_tile() {
        for x in -3..3 {
            let coord = canonicalize(&RawTileCoord::new(0, x, 0)).unwrap();
            assert_eq!(coord, TileCoord::new(0, 0, 0));
        }
    }

    #[test]
    fn test_parent() {
        let tile = TileCoord::new(5, 10, 15);
        assert_eq!(tile.parent(), Some(TileCoord::new(4, 5, 7)));
        assert_eq!(TileCoord::new(0, 0, 0).parent(), None);
    }

    #[test]
    fn test_zoom_too_deep() {
        assert!(canonicalize(&RawTileCoord::new(MAX_ZOOM + 1, 0, 0)).is_none());
    }
}
