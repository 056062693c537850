//! Geographic utilities: great-circle distance and bounding boxes.

use geo::{BoundingRect, Coord, LineString};

use crate::{Bounds, GpsPoint};

/// Mean Earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance between two points in meters.
pub fn haversine_distance(p1: &GpsPoint, p2: &GpsPoint) -> f64 {
    let lat1 = p1.latitude.to_radians();
    let lat2 = p2.latitude.to_radians();
    let dlat = (p2.latitude - p1.latitude).to_radians();
    let dlng = (p2.longitude - p1.longitude).to_radians();

    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_M * c
}

/// Total length of a GPS track in meters.
pub fn track_distance(points: &[GpsPoint]) -> f64 {
    points
        .windows(2)
        .map(|pair| haversine_distance(&pair[0], &pair[1]))
        .sum()
}

/// Bounding box of the valid points in a track.
///
/// Returns `None` if the track has no valid points.
pub fn bounding_box(points: &[GpsPoint]) -> Option<Bounds> {
    let line: LineString = points
        .iter()
        .filter(|p| p.is_valid())
        .map(|p| Coord {
            x: p.longitude,
            y: p.latitude,
        })
        .collect();

    line.bounding_rect().map(|rect| Bounds {
        min_lat: rect.min().y,
        max_lat: rect.max().y,
        min_lng: rect.min().x,
        max_lng: rect.max().x,
    })
}
