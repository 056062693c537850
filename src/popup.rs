//! Track info popups.
//!
//! The session decides which popups are open; drawing them is the map's job.
//! [`PopupSet`] is the record of what is currently open, so any number of
//! popups can be open at once without reaching into the map's internals.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::catalog::{Track, TrackId};

/// Text shown in a track's info popup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PopupContent {
    pub title: String,
    /// `HH:MM:SS`
    pub duration: String,
    /// e.g. `12.3km`
    pub distance: String,
    /// `MM:SS min/km`
    pub pace: String,
}

impl PopupContent {
    pub fn for_track(track: &Track) -> Self {
        let duration = split_millis(track.summary.moving_time_ms);
        let pace = split_millis(track.summary.moving_pace_ms_per_km);

        Self {
            title: track.raw_name.clone(),
            duration: format!(
                "{:02}:{:02}:{:02}",
                duration.hours, duration.minutes, duration.seconds
            ),
            distance: format!("{:.1}km", track.summary.distance_m / 1000.0),
            // Pace hours are dropped; anything slower than 60 min/km wraps
            pace: format!("{:02}:{:02} min/km", pace.minutes, pace.seconds),
        }
    }
}

struct Hms {
    hours: u64,
    minutes: u64,
    seconds: u64,
}

fn split_millis(ms: u64) -> Hms {
    let total_seconds = ms / 1000;
    Hms {
        hours: total_seconds / 3600,
        minutes: (total_seconds / 60) % 60,
        seconds: total_seconds % 60,
    }
}

/// Difference between the open set before and after a sync.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PopupDelta {
    pub opened: Vec<TrackId>,
    pub closed: Vec<TrackId>,
}

impl PopupDelta {
    pub fn is_empty(&self) -> bool {
        self.opened.is_empty() && self.closed.is_empty()
    }
}

/// Set of currently open info popups.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PopupSet {
    open: BTreeSet<TrackId>,
}

impl PopupSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open popups, ascending by id.
    pub fn open_ids(&self) -> Vec<TrackId> {
        self.open.iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.open.len()
    }

    pub fn is_empty(&self) -> bool {
        self.open.is_empty()
    }

    /// Make the open set equal `target`, returning what changed.
    pub fn sync<I>(&mut self, target: I) -> PopupDelta
    where
        I: IntoIterator<Item = TrackId>,
    {
        let target: BTreeSet<TrackId> = target.into_iter().collect();
        let delta = PopupDelta {
            opened: target.difference(&self.open).copied().collect(),
            closed: self.open.difference(&target).copied().collect(),
        };
        self.open = target;
        delta
    }
}
