//! # Run History
//!
//! Visibility engine for maps showing many uploaded GPS tracks.
//!
//! This library provides:
//! - A catalog of tracks bucketed by activity type (derived from track names)
//! - Orthogonal filters: master switch, per-type flags and a date window
//! - Batch load coordination for asynchronous, out-of-order parsing
//! - Viewport fitting over the visible tracks
//! - A synchronous event bus announcing every state change
//!
//! Parsing track files, drawing the map and drawing the date slider are left
//! to collaborators: the parser hands over [`ParsedTrack`]s and the map
//! implements [`MapSurface`].
//!
//! ## Quick Start
//!
//! ```rust
//! use run_history::{GpsPoint, HeadlessMap, OverlayHandle, ParsedTrack, TrackSession};
//!
//! let mut session = TrackSession::new(HeadlessMap::new());
//! session.begin_batch(2).unwrap();
//!
//! let points = vec![GpsPoint::new(51.5074, -0.1278), GpsPoint::new(51.5090, -0.1300)];
//! let run = ParsedTrack::from_points("Run 05/01/2020", OverlayHandle(1), points.clone(), 900_000);
//! let ride = ParsedTrack::from_points("Ride 05/02/2020", OverlayHandle(2), points, 600_000);
//! session.on_track_parsed(run).unwrap();
//! session.on_track_parsed(ride).unwrap();
//!
//! let visible = session.set_type("Ride", false).unwrap();
//! assert_eq!(visible.len(), 1);
//! ```

use serde::{Deserialize, Serialize};

// Unified error handling
pub mod error;
pub use error::{OptionExt, Result, TrackError};

// Session configuration
pub mod config;
pub use config::SessionConfig;

// Geographic utilities (distance, bounds)
pub mod geo_utils;

// Activity type/date extraction from track names
pub mod naming;
pub use naming::ActivityInfo;

// Track registry and activity-type buckets
pub mod catalog;
pub use catalog::{ActivityTypeBucket, Registration, Track, TrackCatalog, TrackId, TrackSummary};

// Master/type/date filters
pub mod filter;
pub use filter::{DateWindow, FilterState, VisibleSet};

// Batch load counting
pub mod loader;
pub use loader::{BatchStatus, LoadBatch, LoadCoordinator};

// Viewport fitting over visible tracks
pub mod viewport;
pub use viewport::{compute_visible_bounds, FitRegion, ViewportFitter};

// Publish/subscribe
pub mod events;
pub use events::{EventBus, SessionEvent, SessionEventKind, SubscriptionId, Topic};

// Info popups
pub mod popup;
pub use popup::{PopupContent, PopupSet};

// Map collaborator
pub mod map;
pub use map::{HeadlessMap, MapCall, MapSurface};

// Session facade
pub mod session;
pub use session::{SessionSnapshot, SessionStats, SharedSession, TrackSession};

// ============================================================================
// Core Types
// ============================================================================

/// A GPS coordinate with latitude and longitude.
///
/// # Example
/// ```
/// use run_history::GpsPoint;
/// let point = GpsPoint::new(51.5074, -0.1278); // London
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GpsPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GpsPoint {
    /// Create a new GPS point.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Check if the point has valid coordinates.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
    }
}

/// Bounding box of a track or group of tracks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl Bounds {
    /// Create bounds from GPS points, ignoring invalid ones.
    pub fn from_points(points: &[GpsPoint]) -> Option<Self> {
        geo_utils::bounding_box(points)
    }

    /// Smallest bounds containing both `self` and `other`.
    pub fn union(&self, other: &Bounds) -> Bounds {
        Bounds {
            min_lat: self.min_lat.min(other.min_lat),
            max_lat: self.max_lat.max(other.max_lat),
            min_lng: self.min_lng.min(other.min_lng),
            max_lng: self.max_lng.max(other.max_lng),
        }
    }
}

/// Opaque reference to a renderable layer owned by the map collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OverlayHandle(pub u64);

/// A track as delivered by the parsing collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedTrack {
    /// Display name, e.g. "Run 05/01/2020"
    pub name: String,
    /// Layer the map will draw for this track
    pub overlay: OverlayHandle,
    /// Moving time in milliseconds
    pub moving_time_ms: u64,
    /// Moving pace in milliseconds per kilometer
    pub moving_pace_ms_per_km: u64,
    /// Total distance in meters
    pub distance_m: f64,
    pub points: Vec<GpsPoint>,
    /// Bounding box; derived from `points` at registration when `None`
    pub bounds: Option<Bounds>,
}

impl ParsedTrack {
    /// Build a parsed track from raw points, computing distance, pace and bounds.
    pub fn from_points(
        name: impl Into<String>,
        overlay: OverlayHandle,
        points: Vec<GpsPoint>,
        moving_time_ms: u64,
    ) -> Self {
        let distance_m = geo_utils::track_distance(&points);
        let moving_pace_ms_per_km = if distance_m > 0.0 {
            (moving_time_ms as f64 / (distance_m / 1000.0)).round() as u64
        } else {
            0
        };

        Self {
            name: name.into(),
            overlay,
            moving_time_ms,
            moving_pace_ms_per_km,
            distance_m,
            bounds: Bounds::from_points(&points),
            points,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_route() -> Vec<GpsPoint> {
        vec![
            GpsPoint::new(51.5074, -0.1278),
            GpsPoint::new(51.5080, -0.1290),
            GpsPoint::new(51.5090, -0.1300),
            GpsPoint::new(51.5100, -0.1310),
            GpsPoint::new(51.5110, -0.1320),
        ]
    }

    #[test]
    fn test_gps_point_validation() {
        assert!(GpsPoint::new(51.5074, -0.1278).is_valid());
        assert!(!GpsPoint::new(91.0, 0.0).is_valid());
        assert!(!GpsPoint::new(0.0, 181.0).is_valid());
        assert!(!GpsPoint::new(f64::NAN, 0.0).is_valid());
    }

    #[test]
    fn test_bounds_union() {
        let a = Bounds {
            min_lat: 1.0,
            max_lat: 2.0,
            min_lng: 10.0,
            max_lng: 11.0,
        };
        let b = Bounds {
            min_lat: 1.5,
            max_lat: 3.0,
            min_lng: 9.0,
            max_lng: 10.5,
        };
        let u = a.union(&b);
        assert_eq!(
            u,
            Bounds {
                min_lat: 1.0,
                max_lat: 3.0,
                min_lng: 9.0,
                max_lng: 11.0,
            }
        );
        assert_eq!(b.union(&a), u);
        assert_eq!(a.union(&a), a);
    }

    #[test]
    fn test_parsed_track_from_points() {
        let track = ParsedTrack::from_points("Run", OverlayHandle(1), sample_route(), 120_000);

        assert!(track.distance_m > 0.0);
        assert!(track.moving_pace_ms_per_km > 0);
        let bounds = track.bounds.unwrap();
        assert_eq!(bounds.min_lat, 51.5074);
        assert_eq!(bounds.max_lat, 51.5110);
        assert_eq!(bounds.min_lng, -0.1320);
        assert_eq!(bounds.max_lng, -0.1278);
    }

    #[test]
    fn test_parsed_track_without_points() {
        let track = ParsedTrack::from_points("Run", OverlayHandle(1), vec![], 120_000);
        assert_eq!(track.distance_m, 0.0);
        assert_eq!(track.moving_pace_ms_per_km, 0);
        assert!(track.bounds.is_none());
    }
}
