//! Command line and environment configuration.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use tile_common::{HeatmapParams, TopTermsParams, TopicFrequencyParams};
use tile_layer::{LayerConfig, LayerKind};
use transport::TransportConfig;

/// Deepest zoom the viewer will load a whole world for.
pub const MAX_VIEW_ZOOM: u32 = 6;

#[derive(Parser, Debug, Clone)]
#[command(name = "tile-viewer")]
#[command(about = "Load a zoom level of aggregate tiles and write them to disk")]
pub struct Args {
    /// WebSocket endpoint of the aggregation service
    #[arg(long, env = "TILE_WS_URL")]
    pub url: Option<String>,

    /// Base HTTP URL payloads are downloaded from
    #[arg(long, env = "TILE_BASE_URL")]
    pub base_url: Option<String>,

    /// Index to aggregate
    #[arg(long, env = "TILE_INDEX")]
    pub index: Option<String>,

    /// Store holding the index
    #[arg(long, env = "TILE_STORE")]
    pub store: Option<String>,

    /// Layer kind (ignored when --config is given)
    #[arg(long, value_enum, default_value = "heatmap")]
    pub layer_kind: KindArg,

    /// Longitude field
    #[arg(long, default_value = "lon")]
    pub x_field: String,

    /// Latitude field
    #[arg(long, default_value = "lat")]
    pub y_field: String,

    /// Term field for term layers
    #[arg(long, default_value = "text")]
    pub term_field: String,

    /// Topics for topic histogram layers
    #[arg(long, value_delimiter = ',')]
    pub topics: Vec<String>,

    /// Heatmap bins per tile side
    #[arg(long, default_value = "64")]
    pub resolution: u32,

    /// Zoom level to load
    #[arg(long, default_value = "2")]
    pub zoom: u32,

    /// Directory rendered tiles are written to
    #[arg(long, default_value = "tiles-out")]
    pub out_dir: PathBuf,

    /// Fixed reconnect delay in milliseconds
    #[arg(long, env = "TILE_RETRY_INTERVAL_MS")]
    pub retry_interval_ms: Option<u64>,

    /// Seconds to wait for tiles before writing what arrived
    #[arg(long, default_value = "30")]
    pub wait_secs: u64,

    /// Log level
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// YAML layer configuration
    #[arg(long, env = "TILE_LAYER_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum KindArg {
    Heatmap,
    WordCloud,
    Sentiment,
    TopicHistogram,
}

/// Everything a viewer run needs.
#[derive(Debug, Clone)]
pub struct ViewerConfig {
    pub transport: TransportConfig,
    pub layer: LayerConfig,
    pub zoom: u32,
    pub out_dir: PathBuf,
    pub wait: Duration,
}

impl Args {
    fn layer_kind(&self) -> LayerKind {
        let terms = || TopTermsParams {
            x_field: self.x_field.clone(),
            y_field: self.y_field.clone(),
            term_field: self.term_field.clone(),
            size: 10,
            include: Vec::new(),
            filters: Vec::new(),
        };

        match self.layer_kind {
            KindArg::Heatmap => LayerKind::Heatmap(HeatmapParams {
                x_field: self.x_field.clone(),
                y_field: self.y_field.clone(),
                resolution: self.resolution,
                value_field: None,
                filters: Vec::new(),
            }),
            KindArg::WordCloud => LayerKind::WordCloud(terms()),
            KindArg::Sentiment => LayerKind::Sentiment(terms()),
            KindArg::TopicHistogram => LayerKind::TopicHistogram(TopicFrequencyParams {
                x_field: self.x_field.clone(),
                y_field: self.y_field.clone(),
                term_field: self.term_field.clone(),
                topics: self.topics.clone(),
                time_field: "timestamp".to_string(),
                interval: "day".to_string(),
                from: None,
                to: None,
                filters: Vec::new(),
            }),
        }
    }

    /// Layer file, then environment, then flags; flags win.
    pub fn into_config(self) -> Result<ViewerConfig> {
        if self.zoom > MAX_VIEW_ZOOM {
            bail!("zoom {} exceeds {}", self.zoom, MAX_VIEW_ZOOM);
        }

        let mut transport = TransportConfig::from_env();
        if let Some(url) = &self.url {
            transport.ws_url = url.clone();
        }
        if let Some(base_url) = &self.base_url {
            transport.base_url = base_url.clone();
        }
        if let Some(ms) = self.retry_interval_ms {
            transport.retry_interval = Duration::from_millis(ms);
        }

        let mut layer = match &self.config {
            Some(path) => LayerConfig::load_yaml(path)
                .with_context(|| format!("Failed to load layer config {:?}", path))?,
            None => LayerConfig {
                kind: self.layer_kind(),
                ..LayerConfig::from_env()
            },
        };
        if let Some(index) = &self.index {
            layer.index = index.clone();
        }
        if let Some(store) = &self.store {
            layer.store = store.clone();
        }
        layer.validate().context("Invalid layer configuration")?;

        Ok(ViewerConfig {
            transport,
            layer,
            zoom: self.zoom,
            out_dir: self.out_dir,
            wait: Duration::from_secs(self.wait_secs),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("tile-viewer").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_flags_build_heatmap_layer() {
        let config = parse(&[
            "--url",
            "ws://agg:9000/ws",
            "--index",
            "trips",
            "--store",
            "es",
            "--resolution",
            "32",
            "--retry-interval-ms",
            "250",
        ])
        .into_config()
        .unwrap();

        assert_eq!(config.transport.ws_url, "ws://agg:9000/ws");
        assert_eq!(config.transport.retry_interval, Duration::from_millis(250));
        assert_eq!(config.layer.index, "trips");
        let LayerKind::Heatmap(params) = &config.layer.kind else {
            panic!("expected heatmap");
        };
        assert_eq!(params.resolution, 32);
    }

    #[test]
    fn test_topic_histogram_needs_topics() {
        let err = parse(&["--layer-kind", "topic-histogram"]).into_config();
        assert!(err.is_err());

        let config = parse(&["--layer-kind", "topic-histogram", "--topics", "rain,snow"])
            .into_config()
            .unwrap();
        assert_eq!(config.layer.kind.name(), "topic_histogram");
    }

    #[test]
    fn test_zoom_bound() {
        assert!(parse(&["--zoom", "9"]).into_config().is_err());
    }

    #[test]
    fn test_yaml_file_with_index_override() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "index: tweets\nstore: es\nkind: sentiment\nx_field: lon\ny_field: lat\nterm_field: text\nsize: 5\n"
        )
        .unwrap();
        let path = file.path().to_str().unwrap();

        let config = parse(&["--config", path, "--index", "tweets-2024"])
            .into_config()
            .unwrap();
        assert_eq!(config.layer.index, "tweets-2024");
        assert_eq!(config.layer.kind.name(), "sentiment");
    }
}
