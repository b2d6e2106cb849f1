//! Utility functions for coordinate validation, distances and unit conversions

use crate::{DataError, Result};
use geo::{Closest, ClosestPoint, Coord, Distance, Euclidean, LineString, Point};

/// Mean Earth radius in kilometers (IUGG)
pub const EARTH_RADIUS_KM: f64 = 6371.0088;

/// Kilometers per hour in one meter per second
pub const MPS_TO_KMH: f64 = 3.6;

/// Kilometers per hour in one mile per hour
pub const MPH_TO_KMH: f64 = 1.609344;

/// Check if a (longitude, latitude) pair is a usable WGS84 coordinate
#[inline(always)]
pub fn is_valid_wgs84(lon: f64, lat: f64) -> bool {
    lon.is_finite()
        && lat.is_finite()
        && (-180.0..=180.0).contains(&lon)
        && (-90.0..=90.0).contains(&lat)
}

/// Wrap a longitude difference into [-180, 180] degrees
#[inline(always)]
fn wrap_delta_lon(delta: f64) -> f64 {
    let wrapped = (delta + 180.0).rem_euclid(360.0) - 180.0;
    // rem_euclid maps +180 to -180, keep the sign of the input for that edge
    if wrapped == -180.0 && delta > 0.0 {
        180.0
    } else {
        wrapped
    }
}

/// Project a WGS84 coordinate onto a local equirectangular plane centered on `origin`
///
/// # Arguments
/// * `origin` - Plane origin as (lon, lat) in degrees
/// * `coord` - Coordinate to project as (lon, lat) in degrees
///
/// # Returns
/// A `Coord<f64>` with x (east) and y (north) in kilometers relative to `origin`
#[inline(always)]
pub fn project_local_km(origin: Coord<f64>, coord: Coord<f64>) -> Coord<f64> {
    let cos_lat = origin.y.to_radians().cos();
    Coord {
        x: wrap_delta_lon(coord.x - origin.x).to_radians() * cos_lat * EARTH_RADIUS_KM,
        y: (coord.y - origin.y).to_radians() * EARTH_RADIUS_KM,
    }
}

/// Shortest distance in kilometers from `point` to any edge of `line`
///
/// Both arguments use (lon, lat) degrees. The polyline is projected onto a plane centered
/// on `point`, so the result is the perpendicular distance to the nearest edge (or the
/// distance to the nearest vertex when the foot of the perpendicular falls outside every
/// edge). Accurate to well under a percent at the distances used for matching.
pub fn point_to_polyline_km(point: Coord<f64>, line: &LineString<f64>) -> Result<f64> {
    if line.0.len() < 2 {
        return Err(DataError::InvalidGeometry(format!(
            "polyline has {} point(s), need at least 2",
            line.0.len()
        )));
    }

    let mut projected = Vec::with_capacity(line.0.len());
    for coord in &line.0 {
        if !is_valid_wgs84(coord.x, coord.y) {
            return Err(DataError::InvalidGeometry(format!(
                "coordinate out of range: ({}, {})",
                coord.x, coord.y
            )));
        }
        projected.push(project_local_km(point, *coord));
    }

    let origin = Point::new(0.0, 0.0);
    let projected = LineString::new(projected);
    match projected.closest_point(&origin) {
        Closest::Intersection(_) => Ok(0.0),
        Closest::SinglePoint(closest) => Ok(Euclidean.distance(origin, closest)),
        // Every edge has zero length, the line collapses to its vertices
        Closest::Indeterminate => projected
            .points()
            .map(|vertex| Euclidean.distance(origin, vertex))
            .min_by(f64::total_cmp)
            .ok_or_else(|| {
                DataError::InvalidGeometry("closest point is indeterminate".to_string())
            }),
    }
}

/// Haversine distance in kilometers between two (lon, lat) coordinates
#[inline]
pub fn haversine_km(a: Coord<f64>, b: Coord<f64>) -> f64 {
    let lat1 = a.y.to_radians();
    let lat2 = b.y.to_radians();
    let delta_lat = (b.y - a.y).to_radians();
    let delta_lon = (b.x - a.x).to_radians();

    let h = (delta_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_KM * c
}

/// Total haversine length of a polyline in kilometers
pub fn polyline_length_km(line: &LineString<f64>) -> f64 {
    line.lines().map(|l| haversine_km(l.start, l.end)).sum()
}

/// Convert a speed over ground in m/s to whole km/h, rounding to nearest
///
/// Returns `None` for negative or non-finite input (providers report those when the
/// speed is unknown).
#[inline]
pub fn mps_to_kmh_rounded(speed_mps: f64) -> Option<u32> {
    if !speed_mps.is_finite() || speed_mps < 0.0 {
        return None;
    }
    Some((speed_mps * MPS_TO_KMH).round() as u32)
}
