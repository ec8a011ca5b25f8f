//! Layer binding for aggregate tiles.
//!
//! A [`TileLayer`] sits between a tiled map host and the tile pipeline:
//!
//! ```text
//! host load_tile(handle, raw)
//!   → canonicalize → key → TileCache
//!       Ready   → draw now
//!       Pending → wait for the in-flight fetch
//!       Fetch   → Transport::get → (HTTP download) → decode → LayerEvent
//! LayerEvent → resolve entry → ExtremaTracker → redraw one entry or all
//! ```

pub mod config;
pub mod error;
pub mod layer;
pub mod loader;
pub mod meta;

pub use config::{KindExtrema, LayerConfig, LayerKind};
pub use error::{ConfigError, TileError};
pub use layer::{IdleReport, LayerEvent, LoadOutcome, RenderOutcome, TileLayer};
pub use loader::{HttpPayloadLoader, PayloadLoader};
pub use meta::LayerMeta;
