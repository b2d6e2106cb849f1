//! Speed Limit Library - Road Segment Matching for Speed Limit Estimation
//!
//! This library estimates the legal speed limit at a GPS location by matching the location
//! against a bundled set of OpenStreetMap-derived road segments, and compares it against the
//! speed reported by the device.
//!
//! # Architecture
//!
//! - **[`RoadSegment`]**: Immutable, validated polyline tagged with a speed limit
//! - **[`SegmentLoader`]**: Parses loosely-typed dataset records into segments, with fallback
//! - **[`SegmentStore`]**: Ordered, read-only collection of segments shared behind an `Arc`
//! - **[`StoreCell`]**: Once-only initialization holder for the store
//! - **[`SpeedLimitMatcher`]**: Nearest-segment lookup with an acceptance threshold
//! - **[`LocationSample`]** / **[`SpeedReading`]**: Device input and the evaluated output
//!
//! # Performance Characteristics
//!
//! - **Load Time**: O(R) per dataset, record parsing parallelized
//! - **Query Time**: O(S×P) where S=segments, P=points per segment (linear scan, no index)
//! - **Memory**: O(S×P)

mod dataset;
mod location;
mod matcher;
mod segment;
mod store;
pub mod utils;

// Public API exports
pub use dataset::{
    LoaderConfig, SegmentLoader, builtin_segments, parse_dataset, parse_maxspeed,
};
pub use location::{LocationSample, SpeedReading, SpeedStatus};
pub use matcher::{MatchResult, MatcherConfig, Nearest, QueryPoint, SpeedLimitMatcher};
pub use segment::{DEFAULT_ROAD_NAME, RoadSegment, SegmentId};
pub use store::{LoadReport, SegmentStore, StoreCell, StoreInfo};

/// Error types for the data module
#[derive(Debug, thiserror::Error)]
pub enum DataError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("Invalid record #{index}: {reason}")]
    InvalidRecord { index: usize, reason: String },

    #[error("Duplicate segment id: {0}")]
    DuplicateId(SegmentId),

    #[error("Invalid speed limit: {0}")]
    InvalidSpeedLimit(f64),

    #[error("Dataset is not a JSON array")]
    NotAnArray,
}

pub type Result<T> = std::result::Result<T, DataError>;
