//! # Filter State
//!
//! Three orthogonal filters decide whether a track is shown:
//! - a master switch,
//! - a per-activity-type flag,
//! - an inclusive date window.
//!
//! With the master switch off nothing is visible, whatever the other two say.
//! With it on, a track is visible iff its type flag is set and its date (if it
//! has one) lies inside the window, or no window is set yet. Undated tracks
//! are never excluded by the window.
//!
//! Turning the master switch back on restores the per-type flags exactly as
//! they were. [`FilterState::select_all`] is the separate operation that
//! forces every flag (and the master switch) on.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::catalog::{Track, TrackCatalog, TrackId};
use crate::error::{Result, TrackError};

/// Inclusive date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateWindow {
    pub min: NaiveDate,
    pub max: NaiveDate,
}

impl DateWindow {
    /// Create a window, rejecting `min > max`.
    pub fn new(min: NaiveDate, max: NaiveDate) -> Result<Self> {
        if min > max {
            return Err(TrackError::InvalidDateWindow { min, max });
        }
        Ok(Self { min, max })
    }

    /// Check if a date lies inside the window (inclusive).
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.min <= date && date <= self.max
    }
}

/// Ids of the visible tracks, in registration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisibleSet(Vec<TrackId>);

impl VisibleSet {
    pub fn ids(&self) -> &[TrackId] {
        &self.0
    }

    pub fn contains(&self, id: TrackId) -> bool {
        // Ids are pushed in ascending order
        self.0.binary_search(&id).is_ok()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = TrackId> + '_ {
        self.0.iter().copied()
    }
}

/// Current filter settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterState {
    master_enabled: bool,
    type_enabled: BTreeMap<String, bool>,
    date_window: Option<DateWindow>,
}

impl Default for FilterState {
    fn default() -> Self {
        Self::new(true)
    }
}

impl FilterState {
    /// Create filter state with the given master switch and no types or window.
    pub fn new(master_enabled: bool) -> Self {
        Self {
            master_enabled,
            type_enabled: BTreeMap::new(),
            date_window: None,
        }
    }

    // ========================================================================
    // Mutators
    // ========================================================================

    /// Add a flag for a newly sighted activity type. Existing flags are kept.
    pub fn register_type(&mut self, activity_type: &str, enabled: bool) {
        self.type_enabled
            .entry(activity_type.to_string())
            .or_insert(enabled);
    }

    /// Flip the master switch. Per-type flags and the date window are untouched.
    pub fn set_master(&mut self, enabled: bool) {
        self.master_enabled = enabled;
    }

    /// Set the flag for a known activity type.
    pub fn set_type(&mut self, activity_type: &str, enabled: bool) -> Result<()> {
        match self.type_enabled.get_mut(activity_type) {
            Some(flag) => {
                *flag = enabled;
                Ok(())
            }
            None => Err(TrackError::UnknownActivityType {
                activity_type: activity_type.to_string(),
            }),
        }
    }

    /// Turn every type flag and the master switch on.
    pub fn select_all(&mut self) {
        self.master_enabled = true;
        for flag in self.type_enabled.values_mut() {
            *flag = true;
        }
    }

    /// Set the inclusive date window. Rejects `min > max` without changing state.
    pub fn set_date_window(&mut self, min: NaiveDate, max: NaiveDate) -> Result<()> {
        self.date_window = Some(DateWindow::new(min, max)?);
        Ok(())
    }

    /// Remove the date window; no track is excluded by date afterwards.
    pub fn clear_date_window(&mut self) {
        self.date_window = None;
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn master_enabled(&self) -> bool {
        self.master_enabled
    }

    /// Flag for an activity type, `None` if the type was never registered.
    pub fn type_enabled(&self, activity_type: &str) -> Option<bool> {
        self.type_enabled.get(activity_type).copied()
    }

    /// All type flags, sorted by type.
    pub fn type_flags(&self) -> &BTreeMap<String, bool> {
        &self.type_enabled
    }

    pub fn date_window(&self) -> Option<DateWindow> {
        self.date_window
    }

    /// Whether a track passes all filters.
    pub fn is_visible(&self, track: &Track) -> bool {
        if !self.master_enabled {
            return false;
        }
        if !self.type_enabled(&track.activity_type).unwrap_or(false) {
            return false;
        }
        match (self.date_window, track.activity_date) {
            (Some(window), Some(date)) => window.contains(date),
            _ => true,
        }
    }

    /// Visible tracks of a catalog, in registration order.
    pub fn visible_set(&self, catalog: &TrackCatalog) -> VisibleSet {
        VisibleSet(
            catalog
                .all_tracks()
                .iter()
                .filter(|t| self.is_visible(t))
                .map(|t| t.id)
                .collect(),
        )
    }
}
