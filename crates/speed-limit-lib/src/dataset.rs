//! Dataset loading and validation
//!
//! The bundled dataset is a JSON array of loosely-typed segment records produced offline from
//! OpenStreetMap. This module turns it into validated [`RoadSegment`]s: geometry in any of the
//! accepted shapes is normalized to a single `LineString`, the speed limit is resolved from
//! explicit values, OSM tags, road type defaults or a configured fallback, and anything that
//! still does not conform is skipped. A load that yields nothing usable falls back to a small
//! built-in set, so the resulting store is never empty.

use crate::utils::MPH_TO_KMH;
use crate::{DataError, LoadReport, Result, RoadSegment, SegmentId, SegmentStore};
use geo::{Coord, LineString};
use once_cell::sync::Lazy;
use rayon::prelude::*;
use regex::Regex;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

/// Number with optional unit, e.g. `50`, `30 mph`, `80 km/h`
static SPEED_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*(mph|km/h|kmh|kph)?").expect("speed pattern is valid")
});

/// Configuration for resolving speed limits while loading
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// Speed limit (km/h) used when neither tags nor road type give one
    pub default_speed_limit_kmh: f64,
    /// Default speed limit (km/h) per OSM `highway` classification
    pub road_type_speeds: BTreeMap<String, f64>,
    /// Tag keys consulted in order for an explicit limit
    pub speed_tag_keys: Vec<String>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        let road_type_speeds = [
            ("motorway", 120.0),
            ("motorway_link", 80.0),
            ("trunk", 100.0),
            ("trunk_link", 70.0),
            ("primary", 80.0),
            ("primary_link", 60.0),
            ("secondary", 60.0),
            ("secondary_link", 50.0),
            ("tertiary", 50.0),
            ("tertiary_link", 40.0),
            ("unclassified", 50.0),
            ("residential", 30.0),
            ("living_street", 20.0),
            ("service", 20.0),
        ]
        .into_iter()
        .map(|(road_type, speed)| (road_type.to_string(), speed))
        .collect();

        Self {
            default_speed_limit_kmh: 60.0,
            road_type_speeds,
            speed_tag_keys: vec![
                "maxspeed".to_string(),
                "maxspeed:forward".to_string(),
                "maxspeed:backward".to_string(),
            ],
        }
    }
}

/// Parse an OSM `maxspeed`-style value into km/h
///
/// Extracts the first number; a `mph` unit converts to km/h. Values without digits
/// (`none`, `signals`, `walk`) and zero yield `None`.
pub fn parse_maxspeed(value: &str) -> Option<f64> {
    let captures = SPEED_PATTERN.captures(value)?;
    let number: f64 = captures.get(1)?.as_str().parse().ok()?;
    let kmh = match captures.get(2) {
        Some(unit) if unit.as_str().eq_ignore_ascii_case("mph") => number * MPH_TO_KMH,
        _ => number,
    };
    (kmh.is_finite() && kmh > 0.0).then_some(kmh)
}

/// A dataset record as found on disk, before validation
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRecord {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default, alias = "road_type")]
    road_type: Option<String>,
    #[serde(default)]
    highway: Option<String>,
    #[serde(default, alias = "speed_limit")]
    speed_limit: Option<Value>,
    #[serde(default)]
    maxspeed: Option<Value>,
    #[serde(default)]
    geometry: Option<RawGeometry>,
    #[serde(default)]
    tags: Option<Map<String, Value>>,
}

/// Accepted geometry shapes
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawGeometry {
    /// `[[lon, lat], ...]` or Overpass `[{"lat": .., "lon": ..}, ...]`
    Coordinates(Vec<RawCoord>),
    /// `{"type": "LineString", "coordinates": [[lon, lat], ...]}`
    GeoJson {
        #[serde(rename = "type")]
        kind: String,
        coordinates: Vec<RawCoord>,
    },
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawCoord {
    Position(Vec<f64>),
    LatLon { lat: f64, lon: f64 },
}

impl RawCoord {
    fn into_coord(self) -> Option<Coord<f64>> {
        match self {
            // Extra elements (elevation) are ignored
            RawCoord::Position(values) if values.len() >= 2 => Some(Coord {
                x: values[0],
                y: values[1],
            }),
            RawCoord::Position(_) => None,
            RawCoord::LatLon { lat, lon } => Some(Coord { x: lon, y: lat }),
        }
    }
}

impl RawGeometry {
    fn into_line_string(self) -> Result<LineString<f64>> {
        let coordinates = match self {
            RawGeometry::Coordinates(coordinates) => coordinates,
            RawGeometry::GeoJson { kind, coordinates } if kind == "LineString" => coordinates,
            RawGeometry::GeoJson { kind, .. } => {
                return Err(DataError::InvalidGeometry(format!(
                    "unsupported geometry type '{kind}'"
                )));
            }
        };

        coordinates
            .into_iter()
            .enumerate()
            .map(|(i, raw)| {
                raw.into_coord().ok_or_else(|| {
                    DataError::InvalidGeometry(format!("coordinate #{i} has fewer than 2 values"))
                })
            })
            .collect::<Result<Vec<_>>>()
            .map(LineString::new)
    }
}

fn segment_id(value: Option<&Value>, index: usize) -> Result<SegmentId> {
    match value {
        None | Some(Value::Null) => Ok(SegmentId::Text(format!("record-{index}"))),
        Some(Value::Number(n)) => n.as_i64().map(SegmentId::Numeric).ok_or_else(|| {
            DataError::InvalidRecord {
                index,
                reason: format!("id {n} is not an integer"),
            }
        }),
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(SegmentId::Text(s.clone())),
        Some(other) => Err(DataError::InvalidRecord {
            index,
            reason: format!("unsupported id {other}"),
        }),
    }
}

fn speed_from_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|speed| speed.is_finite() && *speed > 0.0),
        Value::String(s) => parse_maxspeed(s),
        _ => None,
    }
}

fn tags_to_strings(tags: Map<String, Value>) -> BTreeMap<String, String> {
    tags.into_iter()
        .filter_map(|(key, value)| match value {
            Value::Null => None,
            Value::String(s) => Some((key, s)),
            other => Some((key, other.to_string())),
        })
        .collect()
}

/// Segments shipped with the library, used when the dataset yields nothing
///
/// They cover the area around the Android emulator's default location
/// (Mountain View, CA, 37.4220 N / -122.0841 W).
pub fn builtin_segments() -> Vec<RoadSegment> {
    let defaults: [(&str, &str, &str, f64, &[(f64, f64)]); 3] = [
        (
            "builtin-amphitheatre-parkway",
            "Amphitheatre Parkway",
            "secondary",
            56.0,
            &[
                (-122.0900, 37.4245),
                (-122.0860, 37.4228),
                (-122.0841, 37.4220),
                (-122.0800, 37.4205),
            ],
        ),
        (
            "builtin-charleston-road",
            "Charleston Road",
            "tertiary",
            40.0,
            &[(-122.0950, 37.4195), (-122.0870, 37.4200), (-122.0800, 37.4185)],
        ),
        (
            "builtin-bayshore-freeway",
            "Bayshore Freeway",
            "motorway",
            105.0,
            &[(-122.0990, 37.4150), (-122.0850, 37.4115), (-122.0700, 37.4080)],
        ),
    ];

    defaults
        .into_iter()
        .filter_map(|(id, name, road_type, speed, points)| {
            let geometry = LineString::from(points.to_vec());
            match RoadSegment::new(id, Some(name.to_string()), speed, geometry) {
                Ok(segment) => Some(segment.with_road_type(road_type)),
                Err(e) => {
                    tracing::error!("Built-in segment {id} is invalid: {e}");
                    None
                }
            }
        })
        .collect()
}

/// Turns raw dataset input into a [`SegmentStore`]
#[derive(Debug, Clone, Default)]
pub struct SegmentLoader {
    config: LoaderConfig,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl SegmentLoader {
    /// Create a new loader with the given configuration
    pub fn new(config: LoaderConfig) -> Self {
        Self { config }
    }

    /// Get a reference to the configuration
    #[inline]
    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Validate a single record
    ///
    /// # Arguments
    /// * `index` - Position of the record in the dataset (used for generated ids and errors)
    /// * `value` - The raw JSON record
    pub fn parse_record(&self, index: usize, value: &Value) -> Result<RoadSegment> {
        let raw = RawRecord::deserialize(value).map_err(|e| DataError::InvalidRecord {
            index,
            reason: e.to_string(),
        })?;

        let id = segment_id(raw.id.as_ref(), index)?;
        let tags = raw.tags.map(tags_to_strings).unwrap_or_default();
        let name = raw.name.or_else(|| tags.get("name").cloned());
        let road_type = raw
            .road_type
            .or(raw.highway)
            .or_else(|| tags.get("highway").cloned());

        let geometry = raw
            .geometry
            .ok_or_else(|| DataError::InvalidRecord {
                index,
                reason: "missing geometry".to_string(),
            })?
            .into_line_string()
            .map_err(|e| DataError::InvalidRecord {
                index,
                reason: e.to_string(),
            })?;

        let speed_limit = raw
            .speed_limit
            .as_ref()
            .and_then(speed_from_value)
            .or_else(|| raw.maxspeed.as_ref().and_then(speed_from_value))
            .or_else(|| {
                self.config
                    .speed_tag_keys
                    .iter()
                    .find_map(|key| tags.get(key).and_then(|v| parse_maxspeed(v)))
            })
            .or_else(|| {
                road_type
                    .as_deref()
                    .and_then(|t| self.config.road_type_speeds.get(t).copied())
            })
            .unwrap_or(self.config.default_speed_limit_kmh);

        let mut segment = RoadSegment::new(id, name, speed_limit, geometry)
            .map_err(|e| DataError::InvalidRecord {
                index,
                reason: e.to_string(),
            })?
            .with_tags(tags);
        if let Some(road_type) = road_type {
            segment = segment.with_road_type(road_type);
        }
        Ok(segment)
    }

    /// Validate all records, keeping dataset order
    ///
    /// Invalid records and records repeating an earlier id are skipped with a warning.
    /// Returns the accepted segments and the number of skipped records.
    pub fn parse_records(&self, records: &[Value]) -> (Vec<RoadSegment>, usize) {
        #[cfg(feature = "profiling")]
        profiling::scope!("loader::parse_records");

        // Parsing is independent per record; collect keeps the input order
        let parsed: Vec<Result<RoadSegment>> = records
            .par_iter()
            .enumerate()
            .map(|(index, value)| self.parse_record(index, value))
            .collect();

        let mut seen = HashSet::with_capacity(parsed.len());
        let mut segments = Vec::with_capacity(parsed.len());
        let mut skipped = 0;
        for result in parsed {
            match result {
                Ok(segment) if seen.insert(segment.id().clone()) => segments.push(segment),
                Ok(segment) => {
                    tracing::warn!(
                        "Skipping record: {}",
                        DataError::DuplicateId(segment.id().clone())
                    );
                    skipped += 1;
                }
                Err(e) => {
                    tracing::warn!("Skipping record: {e}");
                    skipped += 1;
                }
            }
        }
        (segments, skipped)
    }

    /// Build a store from already-parsed JSON records
    pub fn load_records(&self, records: &[Value]) -> SegmentStore {
        let (segments, skipped) = self.parse_records(records);
        if segments.is_empty() {
            return self.fallback(
                records.len(),
                skipped,
                format!("none of {} records were usable", records.len()),
            );
        }

        tracing::info!(
            "Loaded {} road segments ({} skipped)",
            segments.len(),
            skipped
        );
        let report = LoadReport {
            total_records: records.len(),
            accepted: segments.len(),
            skipped,
            fallback_reason: None,
        };
        SegmentStore::new(segments, report)
    }

    /// Build a store from dataset JSON text
    pub fn load_str(&self, json: &str) -> SegmentStore {
        match parse_dataset(json) {
            Ok(records) => self.load_records(&records),
            Err(e) => self.fallback(0, 0, format!("dataset is unreadable: {e}")),
        }
    }

    /// Build a store from a dataset file
    pub fn load_path(&self, path: impl AsRef<Path>) -> SegmentStore {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(json) => self.load_str(&json),
            Err(e) => self.load_builtin(format!("cannot read dataset {}: {e}", path.display())),
        }
    }

    /// Build a store from the built-in segments only
    pub fn load_builtin(&self, reason: impl Into<String>) -> SegmentStore {
        self.fallback(0, 0, reason.into())
    }

    /// Build a store from the built-in segments
    fn fallback(&self, total_records: usize, skipped: usize, reason: String) -> SegmentStore {
        tracing::warn!("Using built-in road segments: {reason}");
        let segments = builtin_segments();
        let report = LoadReport {
            total_records,
            accepted: 0,
            skipped,
            fallback_reason: Some(reason),
        };
        SegmentStore::new(segments, report)
    }
}

/// Parse dataset text into its top-level records
pub fn parse_dataset(json: &str) -> Result<Vec<Value>> {
    match serde_json::from_str::<Value>(json)? {
        Value::Array(records) => Ok(records),
        _ => Err(DataError::NotAnArray),
    }
}
