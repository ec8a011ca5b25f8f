//! Tests for the raster and markup backends.

use renderer::{
    BindingContext, Color, ColorRamp, MarkupBackend, RasterBackend, RenderBackend, RenderError,
    TileHandle, ValueTransform,
};
use test_utils::{gradient_bins, term_payload};
use tile_cache::{BinExtrema, ExtremaStrategy, Extrema};

#[test]
fn test_raster_gradient_uses_full_ramp() {
    let payload = gradient_bins(4);
    let extrema = BinExtrema.extract(&payload).unwrap();
    let mut ctx = BindingContext::new(ColorRamp::Viridis, ValueTransform::Linear);
    let mut backend = RasterBackend::new();

    backend
        .render_tile(&mut ctx, TileHandle(1), &payload, &extrema)
        .unwrap();

    let tile = backend.tile(TileHandle(1)).unwrap();
    assert_eq!((tile.width, tile.height), (4, 4));
    assert_eq!(tile.pixel(3, 3), Some(ColorRamp::Viridis.sample(1.0)));
    assert_eq!(tile.pixel(0, 0), Some(ColorRamp::Viridis.sample(0.0)));
}

#[test]
fn test_raster_redraw_with_wider_extrema_darkens() {
    let payload = gradient_bins(2);
    let mut ctx = BindingContext::new(ColorRamp::Greyscale, ValueTransform::Linear);
    let mut backend = RasterBackend::new();

    let own = BinExtrema.extract(&payload).unwrap();
    backend
        .render_tile(&mut ctx, TileHandle(7), &payload, &own)
        .unwrap();
    let before = backend.tile(TileHandle(7)).unwrap().pixel(1, 1).unwrap();

    let wider = own.union(&Extrema::new(own.min, own.max * 10.0));
    backend
        .render_tile(&mut ctx, TileHandle(7), &payload, &wider)
        .unwrap();
    let after = backend.tile(TileHandle(7)).unwrap().pixel(1, 1).unwrap();

    assert_eq!(before, Color::rgb(255, 255, 255));
    assert!(after.r < before.r);
    assert_eq!(ctx.draws(), 2);
    assert_eq!(backend.len(), 1);
}

#[test]
fn test_markup_renders_terms() {
    let payload = term_payload(&[("flood", 12.0), ("<rain>", 4.0)]);
    let mut ctx = BindingContext::new(ColorRamp::Cool, ValueTransform::Log10);
    let mut backend = MarkupBackend::new();

    backend
        .render_tile(&mut ctx, TileHandle(2), &payload, &Extrema::new(4.0, 12.0))
        .unwrap();

    let html = backend.html(TileHandle(2)).unwrap();
    assert!(html.contains(">flood<"));
    assert!(html.contains("&lt;rain&gt;"));
    assert!(html.find("flood").unwrap() < html.find("rain").unwrap());
}

#[test]
fn test_backends_reject_wrong_format() {
    let mut ctx = BindingContext::default();
    let err = MarkupBackend::new()
        .render_tile(&mut ctx, TileHandle(1), &gradient_bins(2), &Extrema::EMPTY)
        .unwrap_err();
    assert!(matches!(err, RenderError::FormatMismatch { .. }));
    assert_eq!(ctx.draws(), 0);
}
