//! Road segment storage
//!
//! This module provides the `RoadSegment` struct: a validated, named polyline tagged with
//! a speed limit, plus precomputed metadata like bounding box and length.

use crate::{DataError, Result, utils};
use geo::{BoundingRect, LineString, Rect};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Name given to segments whose record carries no name
pub const DEFAULT_ROAD_NAME: &str = "Unnamed Road";

/// Identifier of a road segment, stable across loads of the same dataset
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SegmentId {
    Numeric(i64),
    Text(String),
}

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SegmentId::Numeric(id) => write!(f, "{id}"),
            SegmentId::Text(id) => f.write_str(id),
        }
    }
}

impl From<i64> for SegmentId {
    fn from(id: i64) -> Self {
        SegmentId::Numeric(id)
    }
}

impl From<i32> for SegmentId {
    fn from(id: i32) -> Self {
        SegmentId::Numeric(i64::from(id))
    }
}

impl From<String> for SegmentId {
    fn from(id: String) -> Self {
        SegmentId::Text(id)
    }
}

impl From<&str> for SegmentId {
    fn from(id: &str) -> Self {
        SegmentId::Text(id.to_string())
    }
}

/// A stretch of road: named polyline with a speed limit
#[derive(Clone, Debug, PartialEq)]
pub struct RoadSegment {
    id: SegmentId,
    name: String,
    road_type: Option<String>,
    /// Speed limit in km/h, always positive and finite
    speed_limit_kmh: f64,
    /// Ordered (lon, lat) coordinates, at least two
    geometry: LineString<f64>,
    tags: BTreeMap<String, String>,
    /// Precomputed bounding box in (lon, lat) degrees
    bounding_box: Rect<f64>,
    /// Cached length in kilometers (computed once during construction)
    cached_length_km: f64,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl RoadSegment {
    /// Create a new segment, validating geometry and speed limit
    ///
    /// # Arguments
    /// * `id` - Stable identifier
    /// * `name` - Road name, `None` falls back to [`DEFAULT_ROAD_NAME`]
    /// * `speed_limit_kmh` - Positive speed limit in km/h
    /// * `geometry` - (lon, lat) polyline with at least two valid coordinates
    ///
    /// # Returns
    /// The segment on success, or an error if the geometry or speed limit is unusable
    pub fn new(
        id: impl Into<SegmentId>,
        name: Option<String>,
        speed_limit_kmh: f64,
        geometry: LineString<f64>,
    ) -> Result<Self> {
        if !speed_limit_kmh.is_finite() || speed_limit_kmh <= 0.0 {
            return Err(DataError::InvalidSpeedLimit(speed_limit_kmh));
        }
        if geometry.0.len() < 2 {
            return Err(DataError::InvalidGeometry(format!(
                "segment needs at least 2 points, got {}",
                geometry.0.len()
            )));
        }
        if let Some(bad) = geometry
            .0
            .iter()
            .find(|c| !utils::is_valid_wgs84(c.x, c.y))
        {
            return Err(DataError::InvalidGeometry(format!(
                "coordinate out of range: ({}, {})",
                bad.x, bad.y
            )));
        }
        if geometry.0.windows(2).all(|pair| pair[0] == pair[1]) {
            return Err(DataError::InvalidGeometry(
                "segment has zero length".to_string(),
            ));
        }

        let bounding_box = geometry
            .bounding_rect()
            .ok_or_else(|| DataError::InvalidGeometry("empty geometry".to_string()))?;
        let cached_length_km = utils::polyline_length_km(&geometry);

        Ok(Self {
            id: id.into(),
            name: name
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_ROAD_NAME.to_string()),
            road_type: None,
            speed_limit_kmh,
            geometry,
            tags: BTreeMap::new(),
            bounding_box,
            cached_length_km,
        })
    }

    /// Attach a road classification (e.g. `residential`)
    pub fn with_road_type(mut self, road_type: impl Into<String>) -> Self {
        self.road_type = Some(road_type.into());
        self
    }

    /// Attach auxiliary tags
    pub fn with_tags(mut self, tags: BTreeMap<String, String>) -> Self {
        self.tags = tags;
        self
    }

    #[inline]
    pub fn id(&self) -> &SegmentId {
        &self.id
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn road_type(&self) -> Option<&str> {
        self.road_type.as_deref()
    }

    /// Speed limit in km/h
    #[inline]
    pub fn speed_limit_kmh(&self) -> f64 {
        self.speed_limit_kmh
    }

    /// The polyline, x = longitude and y = latitude
    #[inline]
    pub fn geometry(&self) -> &LineString<f64> {
        &self.geometry
    }

    #[inline]
    pub fn tags(&self) -> &BTreeMap<String, String> {
        &self.tags
    }

    /// Get the bounding box in (lon, lat) degrees
    #[inline]
    pub fn bounding_box(&self) -> Rect<f64> {
        self.bounding_box
    }

    /// Number of points in the polyline
    #[inline]
    pub fn point_count(&self) -> usize {
        self.geometry.0.len()
    }

    /// Length of the polyline in kilometers
    ///
    /// This is O(1) as the value is cached during construction.
    #[inline]
    pub fn length_km(&self) -> f64 {
        self.cached_length_km
    }

    /// Canonical dataset record for this segment
    ///
    /// Loading the returned value yields a segment equal to `self`.
    pub fn to_record(&self) -> serde_json::Value {
        let coordinates: Vec<[f64; 2]> = self.geometry.0.iter().map(|c| [c.x, c.y]).collect();
        let mut record = serde_json::json!({
            "id": self.id,
            "name": self.name,
            "speedLimit": self.speed_limit_kmh,
            "geometry": coordinates,
        });
        if let Some(road_type) = &self.road_type {
            record["roadType"] = serde_json::Value::from(road_type.as_str());
        }
        if !self.tags.is_empty() {
            record["tags"] = serde_json::json!(self.tags);
        }
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_geometry() -> LineString<f64> {
        // A few test points (around London)
        LineString::from(vec![
            (-0.1278, 51.5074),
            (-0.1276, 51.5076),
            (-0.1274, 51.5078),
        ])
    }

    #[test]
    fn test_segment_creation() {
        let segment =
            RoadSegment::new(1, Some("Strand".to_string()), 30.0, create_test_geometry()).unwrap();

        assert_eq!(segment.id(), &SegmentId::Numeric(1));
        assert_eq!(segment.name(), "Strand");
        assert_eq!(segment.speed_limit_kmh(), 30.0);
        assert_eq!(segment.point_count(), 3);
        assert!(segment.road_type().is_none());
        assert!(segment.tags().is_empty());
    }

    #[test]
    fn test_default_name() {
        let segment = RoadSegment::new("a", None, 30.0, create_test_geometry()).unwrap();
        assert_eq!(segment.name(), DEFAULT_ROAD_NAME);

        let blank = RoadSegment::new("b", Some("  ".to_string()), 30.0, create_test_geometry())
            .unwrap();
        assert_eq!(blank.name(), DEFAULT_ROAD_NAME);

        let padded = RoadSegment::new(
            "c",
            Some("  Main Street ".to_string()),
            30.0,
            create_test_geometry(),
        )
        .unwrap();
        assert_eq!(padded.name(), "  Main Street ");
    }

    #[test]
    fn test_single_point_fails() {
        let geometry = LineString::from(vec![(-0.1278, 51.5074)]);
        let result = RoadSegment::new(1, None, 30.0, geometry);
        assert!(matches!(result, Err(DataError::InvalidGeometry(_))));
    }

    #[test]
    fn test_zero_length_fails() {
        let geometry = LineString::from(vec![(0.0, 0.0), (0.0, 0.0)]);
        let result = RoadSegment::new(4, None, 50.0, geometry);
        assert!(matches!(result, Err(DataError::InvalidGeometry(_))));

        // Repeated vertices are fine as long as the line goes somewhere
        let geometry = LineString::from(vec![(0.0, 0.0), (0.0, 0.0), (0.0, 0.001)]);
        assert!(RoadSegment::new(4, None, 50.0, geometry).is_ok());
    }

    #[test]
    fn test_out_of_range_coordinate_fails() {
        let geometry = LineString::from(vec![(-0.1278, 51.5074), (200.0, 51.5)]);
        assert!(RoadSegment::new(1, None, 30.0, geometry).is_err());
    }

    #[test]
    fn test_invalid_speed_limit_fails() {
        for speed in [0.0, -10.0, f64::NAN, f64::INFINITY] {
            let result = RoadSegment::new(1, None, speed, create_test_geometry());
            assert!(matches!(result, Err(DataError::InvalidSpeedLimit(_))));
        }
    }

    #[test]
    fn test_bounding_box() {
        let segment = RoadSegment::new(1, None, 30.0, create_test_geometry()).unwrap();
        let bbox = segment.bounding_box();
        assert!((bbox.min().x - -0.1278).abs() < 1e-12);
        assert!((bbox.max().y - 51.5078).abs() < 1e-12);
        assert!(bbox.width() > 0.0);
        assert!(bbox.height() > 0.0);
    }

    #[test]
    fn test_length_km() {
        let segment = RoadSegment::new(1, None, 30.0, create_test_geometry()).unwrap();
        // The test points are very close together, a few tens of meters
        assert!(segment.length_km() > 0.0);
        assert!(segment.length_km() < 1.0);
    }

    #[test]
    fn test_segment_id_display() {
        assert_eq!(SegmentId::Numeric(42).to_string(), "42");
        assert_eq!(SegmentId::from("way/42").to_string(), "way/42");
    }

    #[test]
    fn test_segment_id_serde_untagged() {
        let numeric: SegmentId = serde_json::from_str("42").unwrap();
        assert_eq!(numeric, SegmentId::Numeric(42));
        let text: SegmentId = serde_json::from_str("\"way/42\"").unwrap();
        assert_eq!(text, SegmentId::Text("way/42".to_string()));
    }

    #[test]
    fn test_to_record() {
        let mut tags = BTreeMap::new();
        tags.insert("highway".to_string(), "residential".to_string());
        let segment = RoadSegment::new(7, Some("Strand".to_string()), 30.0, create_test_geometry())
            .unwrap()
            .with_road_type("residential")
            .with_tags(tags);

        let record = segment.to_record();
        assert_eq!(record["id"], 7);
        assert_eq!(record["name"], "Strand");
        assert_eq!(record["speedLimit"], 30.0);
        assert_eq!(record["roadType"], "residential");
        assert_eq!(record["tags"]["highway"], "residential");
        assert_eq!(record["geometry"].as_array().unwrap().len(), 3);
        assert_eq!(record["geometry"][0][0], -0.1278);
    }
}
