//! Map-rendering collaborator.
//!
//! The session drives the map through [`MapSurface`]; it never inspects the
//! map beyond asking whether an overlay is attached. [`HeadlessMap`] keeps
//! the same state in memory for headless sessions and tests.

use std::collections::{BTreeMap, BTreeSet};

use crate::popup::PopupContent;
use crate::{Bounds, OverlayHandle};

/// Operations the session needs from a map renderer.
pub trait MapSurface {
    /// Attach an overlay to the map.
    fn add_overlay(&mut self, overlay: OverlayHandle);

    /// Detach an overlay from the map.
    fn remove_overlay(&mut self, overlay: OverlayHandle);

    /// Check if an overlay is currently attached.
    fn has_overlay(&self, overlay: OverlayHandle) -> bool;

    /// Move the viewport to show `bounds`.
    fn fit_bounds(&mut self, bounds: &Bounds, animate: bool);

    /// List an overlay under `name` in the map's overlay legend.
    fn add_legend_entry(&mut self, overlay: OverlayHandle, name: &str);

    /// Show an info popup anchored to an overlay.
    fn open_popup(&mut self, overlay: OverlayHandle, content: &PopupContent);

    /// Close the info popup of an overlay.
    fn close_popup(&mut self, overlay: OverlayHandle);
}

/// A call made on a [`HeadlessMap`], in order.
#[derive(Debug, Clone, PartialEq)]
pub enum MapCall {
    AddOverlay(OverlayHandle),
    RemoveOverlay(OverlayHandle),
    FitBounds { bounds: Bounds, animate: bool },
    AddLegendEntry { overlay: OverlayHandle, name: String },
    OpenPopup(OverlayHandle),
    ClosePopup(OverlayHandle),
}

/// In-memory map with no rendering.
#[derive(Debug, Clone, Default)]
pub struct HeadlessMap {
    attached: BTreeSet<OverlayHandle>,
    legend: Vec<(OverlayHandle, String)>,
    popups: BTreeMap<OverlayHandle, PopupContent>,
    last_fit: Option<Bounds>,
    calls: Vec<MapCall>,
}

impl HeadlessMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attached overlays, ascending.
    pub fn attached(&self) -> Vec<OverlayHandle> {
        self.attached.iter().copied().collect()
    }

    pub fn legend(&self) -> &[(OverlayHandle, String)] {
        &self.legend
    }

    pub fn popup(&self, overlay: OverlayHandle) -> Option<&PopupContent> {
        self.popups.get(&overlay)
    }

    pub fn open_popup_count(&self) -> usize {
        self.popups.len()
    }

    /// Bounds of the most recent fit.
    pub fn last_fit(&self) -> Option<Bounds> {
        self.last_fit
    }

    pub fn calls(&self) -> &[MapCall] {
        &self.calls
    }

    /// Number of fits performed so far.
    pub fn fit_count(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, MapCall::FitBounds { .. }))
            .count()
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }
}

impl MapSurface for HeadlessMap {
    fn add_overlay(&mut self, overlay: OverlayHandle) {
        self.attached.insert(overlay);
        self.calls.push(MapCall::AddOverlay(overlay));
    }

    fn remove_overlay(&mut self, overlay: OverlayHandle) {
        self.attached.remove(&overlay);
        self.calls.push(MapCall::RemoveOverlay(overlay));
    }

    fn has_overlay(&self, overlay: OverlayHandle) -> bool {
        self.attached.contains(&overlay)
    }

    fn fit_bounds(&mut self, bounds: &Bounds, animate: bool) {
        self.last_fit = Some(*bounds);
        self.calls.push(MapCall::FitBounds {
            bounds: *bounds,
            animate,
        });
    }

    fn add_legend_entry(&mut self, overlay: OverlayHandle, name: &str) {
        self.legend.push((overlay, name.to_string()));
        self.calls.push(MapCall::AddLegendEntry {
            overlay,
            name: name.to_string(),
        });
    }

    fn open_popup(&mut self, overlay: OverlayHandle, content: &PopupContent) {
        self.popups.insert(overlay, content.clone());
        self.calls.push(MapCall::OpenPopup(overlay));
    }

    fn close_popup(&mut self, overlay: OverlayHandle) {
        self.popups.remove(&overlay);
        self.calls.push(MapCall::ClosePopup(overlay));
    }
}
