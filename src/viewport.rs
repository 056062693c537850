//! # Viewport Fitter
//!
//! Derives the region the map should show from the currently visible tracks.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::catalog::TrackCatalog;
use crate::filter::FilterState;
use crate::map::MapSurface;
use crate::Bounds;

/// Region covering the visible tracks.
///
/// `Empty` means nothing is visible (or no visible track has bounds); a fit
/// on `Empty` is a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum FitRegion {
    Empty,
    Region(Bounds),
}

impl FitRegion {
    pub fn bounds(&self) -> Option<Bounds> {
        match self {
            FitRegion::Empty => None,
            FitRegion::Region(b) => Some(*b),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, FitRegion::Empty)
    }
}

/// Union of the bounds of every visible track.
pub fn compute_visible_bounds(catalog: &TrackCatalog, filter: &FilterState) -> FitRegion {
    catalog
        .all_tracks()
        .iter()
        .filter(|t| filter.is_visible(t))
        .filter_map(|t| t.bounds)
        .reduce(|acc, b| acc.union(&b))
        .map_or(FitRegion::Empty, FitRegion::Region)
}

/// Keeps the map viewport fitted to the visible tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewportFitter {
    pub auto_fit: bool,
    pub animate: bool,
}

impl Default for ViewportFitter {
    fn default() -> Self {
        Self {
            auto_fit: true,
            animate: true,
        }
    }
}

impl ViewportFitter {
    pub fn new(auto_fit: bool, animate: bool) -> Self {
        Self { auto_fit, animate }
    }

    /// Fit the map to the visible tracks if auto-fit is on.
    ///
    /// Returns the bounds that were fitted, or `None` when auto-fit is off or
    /// nothing is visible.
    pub fn maybe_fit<M: MapSurface + ?Sized>(
        &self,
        catalog: &TrackCatalog,
        filter: &FilterState,
        map: &mut M,
    ) -> Option<Bounds> {
        if !self.auto_fit {
            return None;
        }
        self.fit(compute_visible_bounds(catalog, filter), map)
    }

    /// Fit the map to `region`, skipping empty regions.
    pub fn fit<M: MapSurface + ?Sized>(&self, region: FitRegion, map: &mut M) -> Option<Bounds> {
        let bounds = region.bounds()?;
        debug!(
            "[ViewportFitter] Fitting to lat {:.4}..{:.4}, lng {:.4}..{:.4}",
            bounds.min_lat, bounds.max_lat, bounds.min_lng, bounds.max_lng
        );
        map.fit_bounds(&bounds, self.animate);
        Some(bounds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use crate::map::HeadlessMap;
    use crate::{GpsPoint, OverlayHandle, ParsedTrack};

    fn add(catalog: &mut TrackCatalog, filter: &mut FilterState, name: &str, lat: f64, lng: f64) {
        let points = vec![GpsPoint::new(lat, lng), GpsPoint::new(lat + 0.01, lng + 0.01)];
        let reg = catalog.register(
            ParsedTrack::from_points(name, OverlayHandle(catalog.len() as u64), points, 60_000),
            &SessionConfig::default().date_formats,
        );
        filter.register_type(&reg.activity_type, true);
    }

    #[test]
    fn test_no_visible_tracks_is_empty() {
        let catalog = TrackCatalog::new();
        let filter = FilterState::new(true);
        assert_eq!(compute_visible_bounds(&catalog, &filter), FitRegion::Empty);
    }

    #[test]
    fn test_single_track_bounds_unchanged() {
        let mut catalog = TrackCatalog::new();
        let mut filter = FilterState::new(true);
        add(&mut catalog, &mut filter, "Run", 51.5, -0.1);

        let expected = catalog.all_tracks()[0].bounds.unwrap();
        assert_eq!(
            compute_visible_bounds(&catalog, &filter),
            FitRegion::Region(expected)
        );
    }

    #[test]
    fn test_union_skips_hidden_tracks() {
        let mut catalog = TrackCatalog::new();
        let mut filter = FilterState::new(true);
        add(&mut catalog, &mut filter, "Run", 51.5, -0.1);
        add(&mut catalog, &mut filter, "Ride", 48.8, 2.3);
        add(&mut catalog, &mut filter, "Swim", 40.7, -74.0);
        filter.set_type("Swim", false).unwrap();

        let bounds = compute_visible_bounds(&catalog, &filter).bounds().unwrap();
        assert_eq!(bounds.min_lat, 48.8);
        assert_eq!(bounds.max_lat, 51.5 + 0.01);
        assert_eq!(bounds.min_lng, -0.1);
        assert_eq!(bounds.max_lng, 2.3 + 0.01);
    }

    #[test]
    fn test_maybe_fit_respects_toggle_and_empty() {
        let mut catalog = TrackCatalog::new();
        let mut filter = FilterState::new(true);
        let mut map = HeadlessMap::new();
        add(&mut catalog, &mut filter, "Run", 51.5, -0.1);

        let off = ViewportFitter::new(false, true);
        assert!(off.maybe_fit(&catalog, &filter, &mut map).is_none());
        assert_eq!(map.fit_count(), 0);

        let on = ViewportFitter::default();
        assert!(on.maybe_fit(&catalog, &filter, &mut map).is_some());
        assert_eq!(map.fit_count(), 1);

        filter.set_master(false);
        assert!(on.maybe_fit(&catalog, &filter, &mut map).is_none());
        assert_eq!(map.fit_count(), 1);
    }
}
