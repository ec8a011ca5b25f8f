//! Common types shared by the tile streaming crates.
//!
//! Covers tile addressing (raw host coordinates vs. canonical wrapped
//! coordinates), the cache keys derived from them, typed request parameters
//! and the JSON envelopes exchanged with the aggregation service.

pub mod coord;
pub mod envelope;
pub mod error;
pub mod key;
pub mod params;

pub use coord::{canonicalize, world_width, RawTileCoord, TileCoord, TileScheme};
pub use envelope::{Request, RequestKind, ResponseEnvelope};
pub use error::{ProtocolError, ProtocolResult};
pub use key::{consumer_key, CanonicalKey, ConsumerId, DefaultKeyStrategy, KeyParts, KeyStrategy};
pub use params::{
    HeatmapParams, RangeFilter, TileParams, TopTermsParams, TopicFrequencyParams,
};
