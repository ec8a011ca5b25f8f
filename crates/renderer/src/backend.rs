//! The draw interface a layer binds to.

use std::fmt;

use tile_cache::{DecodedPayload, Extrema};

use crate::error::RenderResult;
use crate::ramp::ColorRamp;
use crate::transform::ValueTransform;

/// Identity of one host tile slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileHandle(pub u64);

impl fmt::Display for TileHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Draw state handed to every render call.
#[derive(Debug, Clone)]
pub struct BindingContext {
    pub ramp: ColorRamp,
    pub transform: ValueTransform,
    /// Layer opacity in [0, 1], applied to every drawn pixel.
    pub opacity: f64,
    draws: u64,
}

impl BindingContext {
    pub fn new(ramp: ColorRamp, transform: ValueTransform) -> Self {
        Self {
            ramp,
            transform,
            opacity: 1.0,
            draws: 0,
        }
    }

    pub fn with_opacity(mut self, opacity: f64) -> Self {
        self.opacity = opacity.clamp(0.0, 1.0);
        self
    }

    /// Draws since the last [`begin_frame`](Self::begin_frame).
    pub fn draws(&self) -> u64 {
        self.draws
    }

    pub fn begin_frame(&mut self) {
        self.draws = 0;
    }

    /// Called by backends once per completed draw.
    pub fn record_draw(&mut self) {
        self.draws += 1;
    }

    /// Value → color through the transform and ramp, with opacity applied.
    pub fn color_for(&self, value: f64, extrema: &Extrema) -> crate::ramp::Color {
        let mut color = self.ramp.sample(self.transform.apply(value, extrema));
        color.a = (color.a as f64 * self.opacity) as u8;
        color
    }
}

impl Default for BindingContext {
    fn default() -> Self {
        Self::new(ColorRamp::default(), ValueTransform::default())
    }
}

/// A surface tiles are drawn onto.
pub trait RenderBackend: Send {
    /// Draw `payload` into `tile`, normalized against the layer `extrema`.
    /// Replaces any previous drawing of the tile.
    fn render_tile(
        &mut self,
        ctx: &mut BindingContext,
        tile: TileHandle,
        payload: &DecodedPayload,
        extrema: &Extrema,
    ) -> RenderResult<()>;

    /// Forget the drawing of `tile`.
    fn clear_tile(&mut self, tile: TileHandle);
}
