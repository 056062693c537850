//! # Track Session
//!
//! Owns every piece of state for one map page: the catalog, the filters, the
//! load coordinator, the viewport fitter and the open popups, plus the map
//! collaborator they drive.
//!
//! ## Update cycle
//!
//! Every public mutator runs as one step:
//! 1. mutate state (or return `Err` with nothing changed),
//! 2. recompute the visible set,
//! 3. attach/detach overlays to match it,
//! 4. refit the viewport (if auto-fit is on),
//! 5. open/close info popups,
//! 6. publish the resulting [`SessionEvent`]s.
//!
//! Events are published only after steps 1-5 are done, so no subscriber can
//! observe a half-applied change. When the session is wrapped in a
//! [`SharedSession`], publishing is postponed until the session borrow is
//! released, so a subscriber may start the next mutation itself; starting one
//! while another is still running fails with [`TrackError::ReentrantMutation`].

use std::cell::RefCell;
use std::rc::Rc;

use chrono::NaiveDate;
use log::{debug, info, warn};
use serde::Serialize;

use crate::catalog::{ActivityTypeBucket, Track, TrackCatalog, TrackId};
use crate::config::SessionConfig;
use crate::error::{OptionExt, Result, TrackError};
use crate::events::{EventBus, SessionEvent};
use crate::filter::{DateWindow, FilterState, VisibleSet};
use crate::loader::{BatchStatus, LoadBatch, LoadCoordinator};
use crate::map::MapSurface;
use crate::popup::{PopupContent, PopupSet};
use crate::viewport::{compute_visible_bounds, FitRegion, ViewportFitter};
use crate::ParsedTrack;

// ============================================================================
// Track Session
// ============================================================================

/// Visibility engine for the tracks shown on one map.
pub struct TrackSession<M: MapSurface> {
    // Core state
    catalog: TrackCatalog,
    filter: FilterState,
    loader: LoadCoordinator,
    popups: PopupSet,

    // Derived state
    visible: VisibleSet,
    date_bounds: Option<DateWindow>,

    // Presentation
    fitter: ViewportFitter,
    show_track_info: bool,
    map: M,

    // Notification
    bus: Rc<EventBus<SessionEvent>>,
    outbox: Vec<SessionEvent>,
    defer_events: bool,

    config: SessionConfig,
}

impl<M: MapSurface> TrackSession<M> {
    /// Create a session with default configuration.
    pub fn new(map: M) -> Self {
        let config = SessionConfig::default();
        Self {
            catalog: TrackCatalog::new(),
            filter: FilterState::new(config.show_tracks_on_init),
            loader: LoadCoordinator::new(),
            popups: PopupSet::new(),
            visible: VisibleSet::default(),
            date_bounds: None,
            fitter: ViewportFitter::new(config.auto_fit, config.animate_fit),
            show_track_info: config.show_track_info,
            map,
            bus: Rc::new(EventBus::new()),
            outbox: Vec::new(),
            defer_events: false,
            config,
        }
    }

    /// Create a session with custom configuration.
    pub fn with_config(map: M, config: SessionConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            filter: FilterState::new(config.show_tracks_on_init),
            fitter: ViewportFitter::new(config.auto_fit, config.animate_fit),
            show_track_info: config.show_track_info,
            config,
            ..Self::new(map)
        })
    }

    /// End the session, handing the map back.
    pub fn into_map(self) -> M {
        info!("[TrackSession] Closed with {} tracks", self.catalog.len());
        self.map
    }

    // ========================================================================
    // Loading
    // ========================================================================

    /// Announce an upload of `expected` files.
    ///
    /// Fails with `BatchInProgress` while a previous batch is still loading.
    pub fn begin_batch(&mut self, expected: usize) -> Result<()> {
        self.loader.begin_batch(expected)
    }

    /// Register a track delivered by the parsing collaborator.
    ///
    /// Parses of one batch may finish in any order. The last one finalizes the
    /// date bounds, resets the date window to them, refits the viewport and
    /// publishes `BatchComplete`.
    pub fn on_track_parsed(&mut self, parsed: ParsedTrack) -> Result<TrackId> {
        if !self.loader.is_loading() {
            warn!("[TrackSession] Ignoring '{}': no batch in progress", parsed.name);
            return Err(TrackError::NoActiveBatch);
        }

        let overlay = parsed.overlay;
        let name = parsed.name.clone();
        let registration = self.catalog.register(parsed, &self.config.date_formats);

        self.map.add_legend_entry(overlay, &name);

        if registration.created_bucket {
            let enabled = self.config.show_tracks_on_init;
            self.filter.register_type(&registration.activity_type, enabled);
            self.emit(SessionEvent::ActivityTypeAdded {
                activity_type: registration.activity_type.clone(),
                enabled,
            });
        }
        self.emit(SessionEvent::TrackRegistered {
            track_id: registration.track_id,
            name,
        });

        match self.loader.record_completion()? {
            BatchStatus::Pending { .. } => self.recompute(false),
            BatchStatus::Complete { count } => {
                self.finalize_date_bounds();
                self.recompute(true);
                self.emit(SessionEvent::BatchComplete { track_count: count });
            }
        }

        self.flush();
        Ok(registration.track_id)
    }

    /// Compute the date range over all tracks and open the window to it.
    fn finalize_date_bounds(&mut self) {
        self.date_bounds = self.catalog.date_bounds();
        match self.date_bounds {
            Some(bounds) => {
                info!("[TrackSession] Date bounds {} .. {}", bounds.min, bounds.max);
                // Bounds come from the catalog, so min <= max always holds
                if let Err(e) = self.filter.set_date_window(bounds.min, bounds.max) {
                    warn!("[TrackSession] Could not apply date bounds: {}", e);
                }
            }
            None => debug!("[TrackSession] No dated tracks, date window left unset"),
        }
        self.emit(SessionEvent::DateBoundsChanged {
            bounds: self.date_bounds,
        });
    }

    // ========================================================================
    // Filters
    // ========================================================================

    /// Turn the master switch on or off.
    ///
    /// Switching it back on restores each type's previous flag.
    pub fn set_master(&mut self, enabled: bool) -> Result<VisibleSet> {
        self.filter.set_master(enabled);
        Ok(self.commit())
    }

    /// Show or hide one activity type.
    pub fn set_type(&mut self, activity_type: &str, enabled: bool) -> Result<VisibleSet> {
        self.filter.set_type(activity_type, enabled)?;
        Ok(self.commit())
    }

    /// Turn on the master switch and every activity type at once.
    pub fn select_all(&mut self) -> Result<VisibleSet> {
        self.filter.select_all();
        Ok(self.commit())
    }

    /// Restrict visible tracks to an inclusive date range.
    pub fn set_date_window(&mut self, min: NaiveDate, max: NaiveDate) -> Result<VisibleSet> {
        self.filter.set_date_window(min, max)?;
        Ok(self.commit())
    }

    /// Remove the date restriction.
    pub fn clear_date_window(&mut self) -> Result<VisibleSet> {
        self.filter.clear_date_window();
        Ok(self.commit())
    }

    /// Feed a date-range slider's `valuesChanging` event into the filter.
    pub fn on_date_values_changing(
        &mut self,
        min: NaiveDate,
        max: NaiveDate,
    ) -> Result<VisibleSet> {
        self.set_date_window(min, max)
    }

    // ========================================================================
    // Presentation toggles
    // ========================================================================

    /// Enable or disable auto-fit. Enabling it fits immediately.
    pub fn set_auto_fit(&mut self, enabled: bool) {
        self.fitter.auto_fit = enabled;
        if enabled {
            self.refit();
        }
        self.flush();
    }

    /// Show or hide info popups for the visible tracks.
    pub fn set_show_track_info(&mut self, show: bool) {
        self.show_track_info = show;
        self.sync_popups();
        self.flush();
    }

    /// Fit the viewport to the visible tracks now, regardless of auto-fit.
    ///
    /// Returns the fitted region, `Empty` (and no map call) if nothing is visible.
    pub fn fit_to_visible(&mut self) -> FitRegion {
        let region = compute_visible_bounds(&self.catalog, &self.filter);
        if let Some(bounds) = self.fitter.fit(region, &mut self.map) {
            self.emit(SessionEvent::ViewportFitted { bounds });
        }
        self.flush();
        region
    }

    // ========================================================================
    // Update cycle
    // ========================================================================

    /// Run the recompute cycle after a filter change and publish.
    fn commit(&mut self) -> VisibleSet {
        self.recompute(true);
        self.flush();
        self.visible.clone()
    }

    /// Recompute visibility and bring the map in line with it.
    fn recompute(&mut self, refit: bool) {
        let visible = self.filter.visible_set(&self.catalog);
        self.sync_overlays(&visible);

        if visible != self.visible {
            debug!(
                "[TrackSession] {} of {} tracks visible",
                visible.len(),
                self.catalog.len()
            );
            self.visible = visible;
            self.emit(SessionEvent::VisibilityChanged {
                visible: self.visible.ids().to_vec(),
            });
        }

        if refit {
            self.refit();
        }
        self.sync_popups();
    }

    fn sync_overlays(&mut self, visible: &VisibleSet) {
        for track in self.catalog.all_tracks() {
            let want = visible.contains(track.id);
            let have = self.map.has_overlay(track.overlay);
            if want && !have {
                self.map.add_overlay(track.overlay);
            } else if !want && have {
                self.map.remove_overlay(track.overlay);
            }
        }
    }

    fn refit(&mut self) {
        if let Some(bounds) = self.fitter.maybe_fit(&self.catalog, &self.filter, &mut self.map) {
            self.emit(SessionEvent::ViewportFitted { bounds });
        }
    }

    /// Popups are open exactly for visible tracks while track info is on.
    fn sync_popups(&mut self) {
        let target: Vec<TrackId> = if self.show_track_info {
            self.visible.ids().to_vec()
        } else {
            Vec::new()
        };

        let delta = self.popups.sync(target);
        if delta.is_empty() {
            return;
        }

        for id in &delta.closed {
            if let Some(track) = self.catalog.get(*id) {
                self.map.close_popup(track.overlay);
            }
        }
        for id in &delta.opened {
            if let Some(track) = self.catalog.get(*id) {
                self.map.open_popup(track.overlay, &PopupContent::for_track(track));
            }
        }

        self.emit(SessionEvent::PopupsChanged {
            open: self.popups.open_ids(),
        });
    }

    fn emit(&mut self, event: SessionEvent) {
        self.outbox.push(event);
    }

    /// Publish queued events unless a [`SharedSession`] publishes them.
    fn flush(&mut self) {
        if self.defer_events {
            return;
        }
        for event in self.take_events() {
            self.bus.publish(event);
        }
    }

    fn take_events(&mut self) -> Vec<SessionEvent> {
        std::mem::take(&mut self.outbox)
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// All tracks in registration order.
    pub fn tracks(&self) -> &[Track] {
        self.catalog.all_tracks()
    }

    pub fn track(&self, id: TrackId) -> Result<&Track> {
        self.catalog.get(id).ok_or_unknown_track(id)
    }

    /// Currently visible tracks, in registration order.
    pub fn visible_tracks(&self) -> &VisibleSet {
        &self.visible
    }

    /// Whether a track passes the current filters.
    pub fn is_visible(&self, id: TrackId) -> Result<bool> {
        Ok(self.filter.is_visible(self.track(id)?))
    }

    /// Activity-type buckets in order of first sighting.
    pub fn activity_types(&self) -> &[ActivityTypeBucket] {
        self.catalog.buckets()
    }

    /// Date range of the tracks, as of the last completed batch.
    pub fn date_bounds(&self) -> Option<DateWindow> {
        self.date_bounds
    }

    pub fn filter(&self) -> &FilterState {
        &self.filter
    }

    pub fn catalog(&self) -> &TrackCatalog {
        &self.catalog
    }

    pub fn current_batch(&self) -> Option<LoadBatch> {
        self.loader.current_batch()
    }

    pub fn auto_fit(&self) -> bool {
        self.fitter.auto_fit
    }

    pub fn show_track_info(&self) -> bool {
        self.show_track_info
    }

    pub fn open_popups(&self) -> Vec<TrackId> {
        self.popups.open_ids()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn map(&self) -> &M {
        &self.map
    }

    /// Event bus the session publishes on.
    pub fn events(&self) -> Rc<EventBus<SessionEvent>> {
        Rc::clone(&self.bus)
    }

    // ========================================================================
    // Export
    // ========================================================================

    /// Serializable view of the whole session.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            tracks: self.catalog.all_tracks().to_vec(),
            activity_types: self.catalog.buckets().to_vec(),
            filter: self.filter.clone(),
            date_bounds: self.date_bounds,
            visible: self.visible.ids().to_vec(),
            open_popups: self.popups.open_ids(),
            loading: self.loader.current_batch(),
            auto_fit: self.fitter.auto_fit,
            show_track_info: self.show_track_info,
        }
    }

    /// Session snapshot as JSON.
    pub fn snapshot_json(&self) -> String {
        serde_json::to_string(&self.snapshot()).unwrap_or_else(|_| "{}".to_string())
    }

    /// Session statistics.
    pub fn stats(&self) -> SessionStats {
        SessionStats {
            track_count: self.catalog.len() as u32,
            activity_type_count: self.catalog.buckets().len() as u32,
            visible_count: self.visible.len() as u32,
            open_popup_count: self.popups.len() as u32,
            completed_batches: self.loader.completed_batches(),
        }
    }
}

/// Serializable view of a session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub tracks: Vec<Track>,
    pub activity_types: Vec<ActivityTypeBucket>,
    pub filter: FilterState,
    pub date_bounds: Option<DateWindow>,
    pub visible: Vec<TrackId>,
    pub open_popups: Vec<TrackId>,
    pub loading: Option<LoadBatch>,
    pub auto_fit: bool,
    pub show_track_info: bool,
}

/// Session statistics for monitoring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStats {
    pub track_count: u32,
    pub activity_type_count: u32,
    pub visible_count: u32,
    pub open_popup_count: u32,
    pub completed_batches: u64,
}

// ============================================================================
// Shared Session
// ============================================================================

/// A session shared between event handlers on one thread.
///
/// Events produced by a mutation are published after the session borrow is
/// released, so handlers may call back into the session.
pub struct SharedSession<M: MapSurface> {
    inner: Rc<RefCell<TrackSession<M>>>,
    bus: Rc<EventBus<SessionEvent>>,
}

impl<M: MapSurface> Clone for SharedSession<M> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
            bus: Rc::clone(&self.bus),
        }
    }
}

impl<M: MapSurface> SharedSession<M> {
    pub fn new(mut session: TrackSession<M>) -> Self {
        session.defer_events = true;
        let bus = session.events();
        Self {
            inner: Rc::new(RefCell::new(session)),
            bus,
        }
    }

    /// Run a mutation, then publish the events it produced.
    ///
    /// Fails with `ReentrantMutation` if called from inside another mutation.
    pub fn with_session<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut TrackSession<M>) -> R,
    {
        let (result, events) = {
            let mut session = self.inner.try_borrow_mut().map_err(|_| {
                warn!("[TrackSession] Rejected re-entrant mutation");
                TrackError::ReentrantMutation
            })?;
            let result = f(&mut session);
            (result, session.take_events())
        };

        for event in events {
            self.bus.publish(event);
        }
        Ok(result)
    }

    /// Like [`with_session`](Self::with_session) for fallible mutations.
    pub fn update<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut TrackSession<M>) -> Result<R>,
    {
        self.with_session(f)?
    }

    /// Read session state.
    ///
    /// Fails with `ReentrantMutation` if a mutation is running.
    pub fn read<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&TrackSession<M>) -> R,
    {
        let session = self
            .inner
            .try_borrow()
            .map_err(|_| TrackError::ReentrantMutation)?;
        Ok(f(&session))
    }

    pub fn events(&self) -> Rc<EventBus<SessionEvent>> {
        Rc::clone(&self.bus)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{SessionEventKind, Topic};
    use crate::map::HeadlessMap;
    use crate::{GpsPoint, OverlayHandle};

    fn parsed(name: &str, overlay: u64, lat: f64) -> ParsedTrack {
        ParsedTrack::from_points(
            name,
            OverlayHandle(overlay),
            vec![GpsPoint::new(lat, -0.12), GpsPoint::new(lat + 0.01, -0.11)],
            1_800_000,
        )
    }

    fn load(session: &mut TrackSession<HeadlessMap>, names: &[&str]) {
        session.begin_batch(names.len()).unwrap();
        for (i, name) in names.iter().enumerate() {
            session
                .on_track_parsed(parsed(name, i as u64, 50.0 + i as f64))
                .unwrap();
        }
    }

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, m, d).unwrap()
    }

    #[test]
    fn test_track_without_batch_is_rejected() {
        let mut session = TrackSession::new(HeadlessMap::new());
        let result = session.on_track_parsed(parsed("Run 05/01/2020", 0, 50.0));
        assert_eq!(result, Err(TrackError::NoActiveBatch));
        assert!(session.tracks().is_empty());
    }

    #[test]
    fn test_batch_completion_finalizes_dates_and_fits() {
        let mut session = TrackSession::new(HeadlessMap::new());
        load(&mut session, &["Run 05/10/2020", "Ride 05/02/2020"]);

        assert_eq!(
            session.date_bounds(),
            Some(DateWindow {
                min: date(5, 2),
                max: date(5, 10)
            })
        );
        assert_eq!(session.filter().date_window(), session.date_bounds());
        assert_eq!(session.visible_tracks().len(), 2);
        assert_eq!(session.map().fit_count(), 1);
        assert_eq!(session.map().attached().len(), 2);
        assert_eq!(session.map().legend().len(), 2);
    }

    #[test]
    fn test_hidden_on_init() {
        let config = SessionConfig {
            show_tracks_on_init: false,
            ..SessionConfig::default()
        };
        let mut session = TrackSession::with_config(HeadlessMap::new(), config).unwrap();
        load(&mut session, &["Run 05/01/2020"]);

        assert!(session.visible_tracks().is_empty());
        assert!(session.map().attached().is_empty());
        // Nothing visible: no fit
        assert_eq!(session.map().fit_count(), 0);
    }

    #[test]
    fn test_set_type_unknown_leaves_state() {
        let mut session = TrackSession::new(HeadlessMap::new());
        load(&mut session, &["Run 05/01/2020"]);
        session.map.clear_calls();

        let result = session.set_type("Kayak", false);
        assert!(matches!(result, Err(TrackError::UnknownActivityType { .. })));
        assert!(session.map().calls().is_empty());
    }

    #[test]
    fn test_events_published_after_cycle() {
        let mut session = TrackSession::new(HeadlessMap::new());
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        session
            .events()
            .subscribe_all(move |e: &SessionEvent| sink.borrow_mut().push(e.clone()));

        load(&mut session, &["Run 05/01/2020", "Run 05/03/2020"]);

        let events = seen.borrow();
        let kinds: Vec<SessionEventKind> = events.iter().map(|e| e.kind()).collect();
        assert_eq!(
            kinds.iter().filter(|k| **k == SessionEventKind::ActivityTypeAdded).count(),
            1
        );
        assert_eq!(
            kinds.iter().filter(|k| **k == SessionEventKind::BatchComplete).count(),
            1
        );
        assert_eq!(kinds.last(), Some(&SessionEventKind::BatchComplete));
    }

    #[test]
    fn test_auto_fit_toggle() {
        let mut session = TrackSession::new(HeadlessMap::new());
        session.set_auto_fit(false);
        load(&mut session, &["Run 05/01/2020"]);
        assert_eq!(session.map().fit_count(), 0);

        session.set_auto_fit(true);
        assert_eq!(session.map().fit_count(), 1);
    }

    #[test]
    fn test_fit_to_visible_empty_is_noop() {
        let mut session = TrackSession::new(HeadlessMap::new());
        assert_eq!(session.fit_to_visible(), FitRegion::Empty);
        assert_eq!(session.map().fit_count(), 0);
    }

    #[test]
    fn test_popups_follow_visibility() {
        let mut session = TrackSession::new(HeadlessMap::new());
        load(&mut session, &["Run 05/01/2020", "Ride 05/02/2020"]);

        session.set_show_track_info(true);
        assert_eq!(session.open_popups(), vec![TrackId(0), TrackId(1)]);
        assert_eq!(session.map().open_popup_count(), 2);

        session.set_type("Ride", false).unwrap();
        assert_eq!(session.open_popups(), vec![TrackId(0)]);
        assert!(session.map().popup(OverlayHandle(1)).is_none());

        session.set_show_track_info(false);
        assert!(session.open_popups().is_empty());
        assert_eq!(session.map().open_popup_count(), 0);
    }

    #[test]
    fn test_shared_session_rejects_reentrancy() {
        let shared = SharedSession::new(TrackSession::new(HeadlessMap::new()));
        let inner = shared.clone();

        let nested = shared
            .with_session(|_| inner.with_session(|s| s.set_master(false)))
            .unwrap();
        assert_eq!(nested.unwrap_err(), TrackError::ReentrantMutation);
    }

    #[test]
    fn test_shared_session_handler_can_mutate() {
        let shared = SharedSession::new(TrackSession::new(HeadlessMap::new()));
        let handle = shared.clone();
        let result = Rc::new(RefCell::new(None));
        let sink = Rc::clone(&result);

        // Hide rides as soon as the type shows up
        shared
            .events()
            .subscribe(SessionEventKind::ActivityTypeAdded, move |e: &SessionEvent| {
                if let SessionEvent::ActivityTypeAdded { activity_type, .. } = e {
                    if activity_type == "Ride" {
                        *sink.borrow_mut() = Some(handle.update(|s| s.set_type("Ride", false)));
                    }
                }
            });

        shared.update(|s| s.begin_batch(2)).unwrap();
        shared
            .update(|s| s.on_track_parsed(parsed("Run 05/01/2020", 0, 50.0)))
            .unwrap();
        shared
            .update(|s| s.on_track_parsed(parsed("Ride 05/02/2020", 1, 51.0)))
            .unwrap();

        assert!(matches!(*result.borrow(), Some(Ok(_))));
        let visible = shared.read(|s| s.visible_tracks().ids().to_vec()).unwrap();
        assert_eq!(visible, vec![TrackId(0)]);
    }

    #[test]
    fn test_snapshot_json() {
        let mut session = TrackSession::new(HeadlessMap::new());
        load(&mut session, &["Run 05/01/2020"]);

        let json: serde_json::Value = serde_json::from_str(&session.snapshot_json()).unwrap();
        assert_eq!(json["tracks"][0]["activity_type"], "Run");
        assert_eq!(json["tracks"][0]["activity_date"], "2020-05-01");
        assert_eq!(json["visible"][0], 0);
        assert_eq!(json["auto_fit"], true);
    }

    #[test]
    fn test_stats() {
        let mut session = TrackSession::new(HeadlessMap::new());
        load(&mut session, &["Run 05/01/2020", "Ride 05/02/2020", "Run"]);
        session.set_type("Run", false).unwrap();

        assert_eq!(
            session.stats(),
            SessionStats {
                track_count: 3,
                activity_type_count: 2,
                visible_count: 1,
                open_popup_count: 0,
                completed_batches: 1,
            }
        );
    }
}
