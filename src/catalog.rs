//! # Track Catalog
//!
//! Registry of every track loaded in a session. Tracks are appended in
//! registration order and never removed; hiding is the filter's job.
//!
//! Each track is assigned to exactly one activity-type bucket. Buckets are
//! created lazily the first time a type is seen and kept for the rest of the
//! session, even if every track in them is filtered out.

use std::collections::HashMap;
use std::fmt;

use chrono::NaiveDate;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::filter::DateWindow;
use crate::naming::ActivityInfo;
use crate::{Bounds, OverlayHandle, ParsedTrack};

/// Session-unique track identifier, assigned in registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TrackId(pub u32);

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Summary statistics reported by the parsing collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackSummary {
    /// Distance in meters
    pub distance_m: f64,
    /// Moving time in milliseconds
    pub moving_time_ms: u64,
    /// Moving pace in milliseconds per kilometer
    pub moving_pace_ms_per_km: u64,
}

/// A registered track.
///
/// `activity_type` and `activity_date` are derived once from the raw name at
/// registration. Visibility is not stored here; it is always recomputed from
/// the filter state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Track {
    pub id: TrackId,
    pub raw_name: String,
    pub activity_type: String,
    /// `None` if the name carried no parseable date (never excluded by date filtering)
    pub activity_date: Option<NaiveDate>,
    /// Renderable layer owned by the map collaborator
    pub overlay: OverlayHandle,
    /// Geographic extent, `None` for tracks without valid points
    pub bounds: Option<Bounds>,
    pub summary: TrackSummary,
}

/// All tracks sharing an activity type, in registration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityTypeBucket {
    pub activity_type: String,
    pub track_ids: Vec<TrackId>,
}

/// Result of registering a parsed track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub track_id: TrackId,
    pub activity_type: String,
    /// True if this track opened a new activity-type bucket
    pub created_bucket: bool,
}

/// Registry of loaded tracks and their activity-type buckets.
#[derive(Debug, Clone, Default)]
pub struct TrackCatalog {
    tracks: Vec<Track>,
    buckets: Vec<ActivityTypeBucket>,
    bucket_index: HashMap<String, usize>,
}

impl TrackCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a parsed track, deriving its type and date from the name.
    ///
    /// `date_formats` are the chrono formats tried on the name's date token.
    pub fn register<S: AsRef<str>>(
        &mut self,
        parsed: ParsedTrack,
        date_formats: &[S],
    ) -> Registration {
        let info = ActivityInfo::from_name(&parsed.name, date_formats);
        let id = TrackId(self.tracks.len() as u32);
        let bounds = parsed.bounds.or_else(|| Bounds::from_points(&parsed.points));

        let created_bucket = match self.bucket_index.get(&info.activity_type) {
            Some(&idx) => {
                self.buckets[idx].track_ids.push(id);
                false
            }
            None => {
                self.bucket_index
                    .insert(info.activity_type.clone(), self.buckets.len());
                self.buckets.push(ActivityTypeBucket {
                    activity_type: info.activity_type.clone(),
                    track_ids: vec![id],
                });
                info!(
                    "[TrackCatalog] New activity type '{}' ({} types)",
                    info.activity_type,
                    self.buckets.len()
                );
                true
            }
        };

        debug!(
            "[TrackCatalog] Registered {} '{}' as {} on {:?}",
            id, parsed.name, info.activity_type, info.activity_date
        );

        self.tracks.push(Track {
            id,
            raw_name: parsed.name,
            activity_type: info.activity_type.clone(),
            activity_date: info.activity_date,
            overlay: parsed.overlay,
            bounds,
            summary: TrackSummary {
                distance_m: parsed.distance_m,
                moving_time_ms: parsed.moving_time_ms,
                moving_pace_ms_per_km: parsed.moving_pace_ms_per_km,
            },
        });

        Registration {
            track_id: id,
            activity_type: info.activity_type,
            created_bucket,
        }
    }

    /// All tracks in registration order.
    pub fn all_tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// Get a track by id.
    pub fn get(&self, id: TrackId) -> Option<&Track> {
        self.tracks.get(id.0 as usize)
    }

    /// Get the number of tracks.
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Buckets in order of first sighting.
    pub fn buckets(&self) -> &[ActivityTypeBucket] {
        &self.buckets
    }

    /// Get the bucket for an activity type.
    pub fn bucket(&self, activity_type: &str) -> Option<&ActivityTypeBucket> {
        self.bucket_index
            .get(activity_type)
            .map(|&idx| &self.buckets[idx])
    }

    /// Activity types in order of first sighting.
    pub fn activity_types(&self) -> impl Iterator<Item = &str> {
        self.buckets.iter().map(|b| b.activity_type.as_str())
    }

    /// Earliest and latest activity date over all dated tracks.
    ///
    /// Returns `None` if no track has a date.
    pub fn date_bounds(&self) -> Option<DateWindow> {
        let mut dates = self.tracks.iter().filter_map(|t| t.activity_date);
        let first = dates.next()?;
        let (min, max) = dates.fold((first, first), |(lo, hi), d| (lo.min(d), hi.max(d)));
        Some(DateWindow { min, max })
    }
}
