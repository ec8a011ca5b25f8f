//! Tile cache and extrema tracking for one layer.
//!
//! Provides:
//! - [`TileCache`]: canonical key → entry map whose lifetime is driven by the
//!   on-screen tiles that depend on each entry
//! - [`ExtremaTracker`]: running value range of a layer, used to decide when
//!   a new payload forces a full redraw
//! - [`DecodedPayload`]: the decoded forms of tile payloads

pub mod cache;
pub mod extrema;
pub mod payload;

pub use cache::{CacheStats, EntryState, Lookup, TileCache};
pub use extrema::{
    BinExtrema, BucketSumExtrema, Extrema, ExtremaStrategy, ExtremaTracker, ExtremaUpdate,
    PeakBucketExtrema, SentimentExtrema,
};
pub use payload::{DecodedPayload, PayloadError, PayloadFormat, Sentiment, TermCount};
