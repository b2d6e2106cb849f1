//! Device location samples and the readings evaluated from them

use crate::{MatchResult, QueryPoint, SegmentId, utils};
use serde::{Deserialize, Serialize};

/// A location update as reported by the device
///
/// Every field is optional: providers routinely deliver fixes without speed, and the
/// occasional update without coordinates.
///
/// The speed may arrive as `speed_mps`, `speedOverGround` or `speed`; when several are
/// present the first one in that order wins.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawLocationSample")]
pub struct LocationSample {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Speed over ground in m/s
    pub speed_mps: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

#[derive(Deserialize)]
struct RawLocationSample {
    #[serde(default)]
    latitude: Option<f64>,
    #[serde(default)]
    longitude: Option<f64>,
    #[serde(default)]
    speed_mps: Option<f64>,
    #[serde(default, rename = "speedOverGround")]
    speed_over_ground: Option<f64>,
    #[serde(default)]
    speed: Option<f64>,
    #[serde(default)]
    timestamp: Option<String>,
}

impl From<RawLocationSample> for LocationSample {
    fn from(raw: RawLocationSample) -> Self {
        Self {
            latitude: raw.latitude,
            longitude: raw.longitude,
            speed_mps: raw.speed_mps.or(raw.speed_over_ground).or(raw.speed),
            timestamp: raw.timestamp,
        }
    }
}

impl LocationSample {
    pub fn new(latitude: f64, longitude: f64, speed_mps: Option<f64>) -> Self {
        Self {
            latitude: Some(latitude),
            longitude: Some(longitude),
            speed_mps,
            timestamp: None,
        }
    }

    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = Some(timestamp.into());
        self
    }

    /// Speed in whole km/h, `None` when unknown
    #[inline]
    pub fn speed_kmh(&self) -> Option<u32> {
        self.speed_mps.and_then(utils::mps_to_kmh_rounded)
    }

    /// The position to look up, if the sample has one
    #[inline]
    pub fn query_point(&self) -> Option<QueryPoint> {
        Some(QueryPoint::new(self.longitude?, self.latitude?))
    }
}

/// How the device speed compares to the speed limit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeedStatus {
    /// The device did not report a speed
    Unknown,
    WithinLimit,
    OverLimit,
}

/// A sample evaluated against the matched speed limit
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpeedReading {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    pub speed_kmh: Option<u32>,
    pub speed_limit_kmh: f64,
    pub road_name: Option<String>,
    pub segment_id: Option<SegmentId>,
    /// Serialized as `null` when infinite
    pub distance_km: f64,
    pub status: SpeedStatus,
}

impl SpeedReading {
    /// Evaluate `sample` against the outcome of its lookup
    ///
    /// The device is over the limit when its speed exceeds the limit by more than
    /// `tolerance_kmh`. When nothing matched, the result's default limit applies.
    pub fn evaluate(sample: &LocationSample, result: &MatchResult, tolerance_kmh: f64) -> Self {
        let speed_kmh = sample.speed_kmh();
        let status = match speed_kmh {
            None => SpeedStatus::Unknown,
            Some(speed) if f64::from(speed) > result.speed_limit_kmh + tolerance_kmh => {
                SpeedStatus::OverLimit
            }
            Some(_) => SpeedStatus::WithinLimit,
        };

        Self {
            timestamp: sample.timestamp.clone(),
            speed_kmh,
            speed_limit_kmh: result.speed_limit_kmh,
            road_name: result.road_name().map(str::to_string),
            segment_id: result.segment.as_ref().map(|s| s.id().clone()),
            distance_km: result.distance_km,
            status,
        }
    }

    #[inline]
    pub fn is_over_limit(&self) -> bool {
        self.status == SpeedStatus::OverLimit
    }
}
