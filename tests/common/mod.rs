//! Shared helpers for integration tests.

#![allow(dead_code)]

use chrono::NaiveDate;
use run_history::{GpsPoint, HeadlessMap, OverlayHandle, ParsedTrack, TrackSession};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// A short straight track starting at (`lat`, `lng`), ~1.1km north.
pub fn parsed_at(name: &str, overlay: u64, lat: f64, lng: f64) -> ParsedTrack {
    let points: Vec<GpsPoint> = (0..10)
        .map(|i| GpsPoint::new(lat + i as f64 * 0.001, lng))
        .collect();
    ParsedTrack::from_points(name, OverlayHandle(overlay), points, 360_000)
}

pub fn parsed(name: &str, overlay: u64) -> ParsedTrack {
    parsed_at(name, overlay, 51.5 + overlay as f64 * 0.1, -0.12)
}

/// New session with every named track loaded in one batch, in order.
pub fn session_with(names: &[&str]) -> TrackSession<HeadlessMap> {
    init_logging();
    let mut session = TrackSession::new(HeadlessMap::new());
    session.begin_batch(names.len()).unwrap();
    for (i, name) in names.iter().enumerate() {
        session.on_track_parsed(parsed(name, i as u64)).unwrap();
    }
    session
}

/// Raw names of the visible tracks, in registration order.
pub fn visible_names(session: &TrackSession<HeadlessMap>) -> Vec<String> {
    session
        .visible_tracks()
        .iter()
        .map(|id| session.track(id).unwrap().raw_name.clone())
        .collect()
}
