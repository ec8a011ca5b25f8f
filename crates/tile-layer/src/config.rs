//! Layer configuration.
//!
//! A layer is one [`LayerKind`] over one index/store, plus the draw settings
//! it renders with. Configs load from environment variables or a YAML file.

use std::path::Path;

use renderer::{ColorRamp, ValueTransform};
use serde::{Deserialize, Serialize};
use tile_cache::{
    BinExtrema, BucketSumExtrema, DecodedPayload, Extrema, ExtremaStrategy, PayloadFormat,
    PeakBucketExtrema, SentimentExtrema,
};
use tile_common::{HeatmapParams, TileParams, TopTermsParams, TopicFrequencyParams};

use crate::error::ConfigError;

/// What a layer aggregates and how it is measured and drawn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LayerKind {
    /// Binned counts, drawn as a raster.
    Heatmap(HeatmapParams),
    /// Most frequent terms, sized by count.
    WordCloud(TopTermsParams),
    /// Most frequent terms, colored by sentiment balance.
    Sentiment(TopTermsParams),
    /// Per-topic histograms over time.
    TopicHistogram(TopicFrequencyParams),
}

impl LayerKind {
    /// Request parameters for every tile of the layer.
    pub fn params(&self) -> TileParams {
        match self {
            Self::Heatmap(p) => TileParams::Heatmap(p.clone()),
            Self::WordCloud(p) | Self::Sentiment(p) => TileParams::TopTerms(p.clone()),
            Self::TopicHistogram(p) => TileParams::TopicFrequency(p.clone()),
        }
    }

    pub fn payload_format(&self) -> PayloadFormat {
        match self {
            Self::Heatmap(_) => PayloadFormat::Bins,
            _ => PayloadFormat::Terms,
        }
    }

    pub fn extrema_strategy(&self) -> KindExtrema {
        match self {
            Self::Heatmap(_) => KindExtrema::Bins(BinExtrema),
            Self::WordCloud(_) => KindExtrema::BucketSum(BucketSumExtrema),
            Self::Sentiment(_) => KindExtrema::Sentiment(SentimentExtrema),
            Self::TopicHistogram(_) => KindExtrema::PeakBucket(PeakBucketExtrema),
        }
    }

    /// Whether the layer draws rasters (as opposed to markup).
    pub fn is_raster(&self) -> bool {
        self.payload_format() == PayloadFormat::Bins
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Heatmap(_) => "heatmap",
            Self::WordCloud(_) => "word_cloud",
            Self::Sentiment(_) => "sentiment",
            Self::TopicHistogram(_) => "topic_histogram",
        }
    }
}

impl Default for LayerKind {
    fn default() -> Self {
        Self::Heatmap(HeatmapParams {
            x_field: "lon".to_string(),
            y_field: "lat".to_string(),
            resolution: 64,
            value_field: None,
            filters: Vec::new(),
        })
    }
}

/// The extrema strategy matching a [`LayerKind`].
#[derive(Debug, Clone, Copy)]
pub enum KindExtrema {
    Bins(BinExtrema),
    BucketSum(BucketSumExtrema),
    Sentiment(SentimentExtrema),
    PeakBucket(PeakBucketExtrema),
}

impl ExtremaStrategy for KindExtrema {
    fn extract(&self, payload: &DecodedPayload) -> Option<Extrema> {
        match self {
            Self::Bins(s) => s.extract(payload),
            Self::BucketSum(s) => s.extract(payload),
            Self::Sentiment(s) => s.extract(payload),
            Self::PeakBucket(s) => s.extract(payload),
        }
    }
}

fn default_opacity() -> f64 {
    1.0
}

/// Settings of one layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerConfig {
    pub index: String,
    pub store: String,
    #[serde(flatten)]
    pub kind: LayerKind,
    #[serde(default)]
    pub ramp: ColorRamp,
    #[serde(default)]
    pub transform: ValueTransform,
    #[serde(default = "default_opacity")]
    pub opacity: f64,
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self {
            index: "tiles".to_string(),
            store: "primary".to_string(),
            kind: LayerKind::default(),
            ramp: ColorRamp::default(),
            transform: ValueTransform::default(),
            opacity: default_opacity(),
        }
    }
}

impl LayerConfig {
    /// Create from environment variables, falling back to defaults.
    ///
    /// - `TILE_INDEX`
    /// - `TILE_STORE`
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            index: std::env::var("TILE_INDEX").unwrap_or(defaults.index),
            store: std::env::var("TILE_STORE").unwrap_or(defaults.store),
            ..defaults
        }
    }

    /// Load from a YAML file and validate.
    pub fn load_yaml(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config: LayerConfig = serde_yaml::from_str(&content)?;
        config.validate()?;

        tracing::info!(
            path = %path.display(),
            index = %config.index,
            kind = config.kind.name(),
            "Loaded layer config"
        );
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.index.trim().is_empty() || self.store.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "index and store must be non-empty".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.opacity) {
            return Err(ConfigError::Invalid(format!(
                "opacity {} outside [0, 1]",
                self.opacity
            )));
        }
        self.kind
            .params()
            .normalized()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        Ok(())
    }
}
