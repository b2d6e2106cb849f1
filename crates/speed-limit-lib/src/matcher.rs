//! Nearest-segment matching
//!
//! Given a query point, the matcher scans every segment in the store, measures the distance
//! from the point to the segment's polyline and keeps the closest one. The closest segment
//! is only trusted when it lies within the configured acceptance threshold; otherwise the
//! lookup reports "no match" with a default speed limit.

use crate::{LocationSample, RoadSegment, SegmentStore, utils};
use geo::Coord;
use std::sync::Arc;

/// Configuration for the matcher
#[derive(Debug, Clone, PartialEq)]
pub struct MatcherConfig {
    /// Maximum distance (km) between the query point and a segment for a match
    pub max_distance_km: f64,
    /// Speed limit (km/h) reported when no segment matches
    pub default_speed_limit_kmh: f64,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            max_distance_km: 0.05,
            default_speed_limit_kmh: 60.0,
        }
    }
}

/// A location to look up, in WGS84 degrees
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueryPoint {
    pub longitude: f64,
    pub latitude: f64,
}

impl QueryPoint {
    pub fn new(longitude: f64, latitude: f64) -> Self {
        Self {
            longitude,
            latitude,
        }
    }

    /// Check if the point has valid coordinates
    #[inline]
    pub fn is_valid(&self) -> bool {
        utils::is_valid_wgs84(self.longitude, self.latitude)
    }

    #[inline]
    fn coord(&self) -> Coord<f64> {
        Coord {
            x: self.longitude,
            y: self.latitude,
        }
    }
}

/// The closest segment to a point, regardless of threshold
#[derive(Debug, Clone)]
pub struct Nearest {
    /// Position of the segment in the store
    pub index: usize,
    pub segment: Arc<RoadSegment>,
    pub distance_km: f64,
}

/// Outcome of a lookup
#[derive(Debug, Clone)]
pub struct MatchResult {
    /// Speed limit of the matched segment, or the configured default
    pub speed_limit_kmh: f64,
    /// The matched segment, `None` when nothing is within the threshold
    pub segment: Option<Arc<RoadSegment>>,
    /// Distance to the nearest segment, matched or not; infinite if nothing was measured
    pub distance_km: f64,
}

impl MatchResult {
    fn no_match(default_speed_limit_kmh: f64, distance_km: f64) -> Self {
        Self {
            speed_limit_kmh: default_speed_limit_kmh,
            segment: None,
            distance_km,
        }
    }

    #[inline]
    pub fn is_match(&self) -> bool {
        self.segment.is_some()
    }

    /// Name of the matched road, if any
    #[inline]
    pub fn road_name(&self) -> Option<&str> {
        self.segment.as_deref().map(RoadSegment::name)
    }
}

/// Looks up the speed limit at a location
///
/// Cheap to clone and safe to share between threads: the store is immutable and lookups
/// never mutate anything.
#[derive(Debug, Clone)]
pub struct SpeedLimitMatcher {
    store: Arc<SegmentStore>,
    config: MatcherConfig,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl SpeedLimitMatcher {
    /// Create a new matcher over the given store
    pub fn new(store: Arc<SegmentStore>, config: MatcherConfig) -> Self {
        Self { store, config }
    }

    /// Get a reference to the configuration
    #[inline]
    pub fn config(&self) -> &MatcherConfig {
        &self.config
    }

    /// Get a reference to the store
    #[inline]
    pub fn store(&self) -> &Arc<SegmentStore> {
        &self.store
    }

    /// Find the segment closest to `point`
    ///
    /// Segments whose distance cannot be computed are skipped with a warning. Ties go to the
    /// segment that comes first in the store. Returns `None` for an invalid point or when no
    /// segment could be measured.
    pub fn nearest(&self, point: &QueryPoint) -> Option<Nearest> {
        if !point.is_valid() {
            return None;
        }

        let query = point.coord();
        let mut best: Option<(usize, f64)> = None;
        for (index, segment) in self.store.iter().enumerate() {
            let distance_km = match utils::point_to_polyline_km(query, segment.geometry()) {
                Ok(distance_km) => distance_km,
                Err(e) => {
                    tracing::warn!("Skipping segment {} for this lookup: {e}", segment.id());
                    continue;
                }
            };
            if best.is_none_or(|(_, best_km)| distance_km < best_km) {
                best = Some((index, distance_km));
            }
        }

        let (index, distance_km) = best?;
        Some(Nearest {
            index,
            segment: self.store.get(index)?.clone(),
            distance_km,
        })
    }

    /// Look up the speed limit at `point`
    ///
    /// Always returns a well-formed result: invalid points and empty stores produce a
    /// "no match" with infinite distance.
    pub fn lookup(&self, point: &QueryPoint) -> MatchResult {
        match self.nearest(point) {
            Some(nearest) if nearest.distance_km <= self.config.max_distance_km => {
                tracing::trace!(
                    "Matched {} ({}) at {:.1} m",
                    nearest.segment.name(),
                    nearest.segment.id(),
                    nearest.distance_km * 1000.0
                );
                MatchResult {
                    speed_limit_kmh: nearest.segment.speed_limit_kmh(),
                    segment: Some(nearest.segment),
                    distance_km: nearest.distance_km,
                }
            }
            Some(nearest) => {
                MatchResult::no_match(self.config.default_speed_limit_kmh, nearest.distance_km)
            }
            None => MatchResult::no_match(self.config.default_speed_limit_kmh, f64::INFINITY),
        }
    }

    /// Look up the speed limit at a location sample's position
    ///
    /// Samples without coordinates produce a "no match" with infinite distance.
    pub fn lookup_sample(&self, sample: &LocationSample) -> MatchResult {
        match sample.query_point() {
            Some(point) => self.lookup(&point),
            None => MatchResult::no_match(self.config.default_speed_limit_kmh, f64::INFINITY),
        }
    }
}
