//! HTML markup for term payloads (word clouds and topic lists).

use std::collections::HashMap;
use std::fmt::Write;

use tile_cache::{DecodedPayload, Extrema, PayloadFormat, TermCount};
use tracing::debug;

use crate::backend::{BindingContext, RenderBackend, TileHandle};
use crate::error::{RenderError, RenderResult};

const DEFAULT_MAX_TERMS: usize = 10;
const DEFAULT_MIN_FONT_PX: f64 = 10.0;
const DEFAULT_MAX_FONT_PX: f64 = 32.0;

/// Escape text for an HTML element body or attribute.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// Renders the top terms of a tile as sized, colored spans.
#[derive(Debug)]
pub struct MarkupBackend {
    max_terms: usize,
    min_font_px: f64,
    max_font_px: f64,
    tiles: HashMap<TileHandle, String>,
}

impl Default for MarkupBackend {
    fn default() -> Self {
        Self {
            max_terms: DEFAULT_MAX_TERMS,
            min_font_px: DEFAULT_MIN_FONT_PX,
            max_font_px: DEFAULT_MAX_FONT_PX,
            tiles: HashMap::new(),
        }
    }
}

impl MarkupBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_terms(mut self, max_terms: usize) -> Self {
        self.max_terms = max_terms;
        self
    }

    pub fn with_font_range(mut self, min_px: f64, max_px: f64) -> Self {
        self.min_font_px = min_px;
        self.max_font_px = max_px.max(min_px);
        self
    }

    pub fn html(&self, handle: TileHandle) -> Option<&str> {
        self.tiles.get(&handle).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    /// Terms arrive sorted by count, so the first `max_terms` are the top.
    fn render_terms(&self, terms: &[TermCount], ctx: &BindingContext, extrema: &Extrema) -> String {
        let mut html = String::from("<div class=\"tile-terms\">");
        for term in terms.iter().take(self.max_terms) {
            let value = term.bucket_sum();
            let t = ctx.transform.apply(value, extrema);
            let size = self.min_font_px + (self.max_font_px - self.min_font_px) * t;
            let color = ctx.color_for(value, extrema);
            let _ = write!(
                html,
                "<span class=\"term\" style=\"font-size:{:.0}px;color:{};opacity:{:.2}\">{}</span>",
                size,
                color.to_hex(),
                color.a as f64 / 255.0,
                escape_html(&term.term)
            );
        }
        html.push_str("</div>");
        html
    }
}

impl RenderBackend for MarkupBackend {
    fn render_tile(
        &mut self,
        ctx: &mut BindingContext,
        tile: TileHandle,
        payload: &DecodedPayload,
        extrema: &Extrema,
    ) -> RenderResult<()> {
        let DecodedPayload::Terms(terms) = payload else {
            return Err(RenderError::FormatMismatch {
                expected: PayloadFormat::Terms,
                found: payload.format(),
            });
        };

        let html = self.render_terms(terms, ctx, extrema);
        debug!(tile = %tile, terms = terms.len(), "Rendered term markup");
        self.tiles.insert(tile, html);
        ctx.record_draw();
        Ok(())
    }

    fn clear_tile(&mut self, tile: TileHandle) {
        self.tiles.remove(&tile);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html("<b>\"R&D\"</b>'"),
            "&lt;b&gt;&quot;R&amp;D&quot;&lt;/b&gt;&#39;"
        );
    }

    #[test]
    fn test_font_size_scales_with_count() {
        let backend = MarkupBackend::new().with_font_range(10.0, 30.0);
        let ctx = BindingContext::default();
        let terms = vec![TermCount::new("big", 100.0), TermCount::new("small", 0.0)];
        let html = backend.render_terms(&terms, &ctx, &Extrema::new(0.0, 100.0));

        assert!(html.starts_with("<div class=\"tile-terms\">"));
        assert!(html.contains("font-size:30px;color:#ffffff"));
        assert!(html.contains("font-size:10px;color:#000000"));
        assert!(html.find(">big<").unwrap() < html.find(">small<").unwrap());
    }

    #[test]
    fn test_truncates_to_max_terms() {
        let backend = MarkupBackend::new().with_max_terms(2);
        let terms: Vec<_> = (0..5)
            .map(|i| TermCount::new(format!("t{i}"), (5 - i) as f64))
            .collect();
        let html =
            backend.render_terms(&terms, &BindingContext::default(), &Extrema::new(1.0, 5.0));
        assert_eq!(html.matches("class=\"term\"").count(), 2);
        assert!(!html.contains(">t2<"));
    }
}
