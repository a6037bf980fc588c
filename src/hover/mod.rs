//! Hover synchronization for the media panel.
//!
//! Tracks which item is active (hovered, or pinned from outside), keeps the
//! rectangle the overlay should anchor to, and reports every accepted
//! transition to a listener synchronously.

use tracing::{debug, trace};

use crate::models::{HoverTarget, Rect};

/// The hovered or pinned item and where it sits on screen.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivePoint {
    pub rect: Rect,
    pub key: String,
    pub seq_key: String,
}

impl From<HoverTarget> for ActivePoint {
    fn from(target: HoverTarget) -> Self {
        Self {
            rect: target.rect,
            key: target.key,
            seq_key: target.seq_key,
        }
    }
}

/// Externally controlled pin. While `active`, pointer movement does not
/// move the active point.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FocusedState {
    pub active: bool,
    pub key: Option<String>,
}

impl FocusedState {
    pub fn pinned(key: impl Into<String>) -> Self {
        Self {
            active: true,
            key: Some(key.into()),
        }
    }
}

/// What the listener is told.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ActivePointChange<'a> {
    Entered(&'a ActivePoint),
    Cleared,
}

impl ActivePointChange<'_> {
    pub fn key(&self) -> Option<&str> {
        match self {
            Self::Entered(point) => Some(&point.key),
            Self::Cleared => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoverState {
    Idle,
    Active,
}

/// Receives every accepted active point transition, synchronously.
pub trait ActivePointListener {
    fn on_active_point_change(&mut self, change: ActivePointChange<'_>, pinned: bool);
}

impl<F> ActivePointListener for F
where
    F: FnMut(ActivePointChange<'_>, bool),
{
    fn on_active_point_change(&mut self, change: ActivePointChange<'_>, pinned: bool) {
        self(change, pinned)
    }
}

pub type ActivePointCallback = Box<dyn ActivePointListener + Send>;

/// Live geometry of rendered items.
pub trait GeometrySource {
    /// Current bounding rectangle of the item with `key`, if it is rendered.
    fn bounding_rect(&self, key: &str) -> Option<Rect>;
}

impl<F> GeometrySource for F
where
    F: Fn(&str) -> Option<Rect>,
{
    fn bounding_rect(&self, key: &str) -> Option<Rect> {
        self(key)
    }
}

pub struct HoverSyncController {
    active_point: Option<ActivePoint>,
    /// Rectangle the overlay anchors to, refreshed from live geometry.
    display_rect: Option<Rect>,
    focused: FocusedState,
    geometry: Box<dyn GeometrySource + Send>,
    listener: Option<ActivePointCallback>,
}

impl HoverSyncController {
    pub fn new<G>(geometry: G) -> Self
    where
        G: GeometrySource + Send + 'static,
    {
        Self {
            active_point: None,
            display_rect: None,
            focused: FocusedState::default(),
            geometry: Box::new(geometry),
            listener: None,
        }
    }

    pub fn with_listener<L>(mut self, listener: L) -> Self
    where
        L: FnMut(ActivePointChange<'_>, bool) + Send + 'static,
    {
        self.listener = Some(Box::new(listener));
        self
    }

    pub fn set_listener(&mut self, listener: Option<ActivePointCallback>) {
        self.listener = listener;
    }

    /// Pointer entered a tracked item. Returns true if the active point moved.
    pub fn on_pointer_enter(&mut self, target: HoverTarget) -> bool {
        if self.focused.active {
            trace!(key = %target.key, "Hover ignored while pinned");
            return false;
        }
        if self
            .active_point
            .as_ref()
            .is_some_and(|point| point.key == target.key)
        {
            return false;
        }

        debug!(key = %target.key, seq_key = %target.seq_key, "Active point entered");
        self.active_point = Some(ActivePoint::from(target));
        self.notify(false);
        self.refresh_display_rect();
        true
    }

    /// Pointer is over something that is not a tracked item. Returns true if
    /// an active point was cleared.
    ///
    /// Nothing is reported while already idle, so the listener sees each
    /// clear exactly once.
    pub fn on_pointer_leave_all(&mut self) -> bool {
        if self.focused.active || self.active_point.is_none() {
            return false;
        }

        debug!("Active point cleared");
        self.active_point = None;
        self.display_rect = None;
        self.notify(false);
        true
    }

    /// Close the overlay.
    pub fn close(&mut self) -> bool {
        self.on_pointer_leave_all()
    }

    /// Re-read the active item's rectangle from live geometry. The rectangle
    /// captured on hover goes stale once the list scrolls or resizes.
    pub fn refresh_display_rect(&mut self) {
        self.display_rect = self.active_point.as_ref().map(|point| {
            match self.geometry.bounding_rect(&point.key) {
                Some(rect) if !rect.is_empty() => rect,
                _ => point.rect,
            }
        });
    }

    pub fn set_focused_state(&mut self, focused: FocusedState) {
        if focused != self.focused {
            debug!(active = focused.active, key = ?focused.key, "Focused state changed");
        }
        self.focused = focused;
    }

    fn notify(&mut self, pinned: bool) {
        let Some(listener) = self.listener.as_mut() else {
            return;
        };
        match self.active_point.as_ref() {
            Some(point) => {
                listener.on_active_point_change(ActivePointChange::Entered(point), pinned)
            }
            None => listener.on_active_point_change(ActivePointChange::Cleared, pinned),
        }
    }

    pub fn state(&self) -> HoverState {
        if self.active_point.is_some() {
            HoverState::Active
        } else {
            HoverState::Idle
        }
    }

    pub fn active_point(&self) -> Option<&ActivePoint> {
        self.active_point.as_ref()
    }

    pub fn display_rect(&self) -> Option<Rect> {
        self.display_rect
    }

    pub fn focused_state(&self) -> &FocusedState {
        &self.focused
    }
}


#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use parking_lot::RwLock;

    use super::testing::{recording_listener, target};
    use super::*;

    fn no_geometry(_: &str) -> Option<Rect> {
        None
    }

    fn r(top: f64) -> Rect {
        Rect::from_origin(0.0, top, 100.0, 100.0)
    }

    #[test]
    fn test_enter_notifies_and_sets_rect() {
        let (listener, calls) = recording_listener();
        let mut hover = HoverSyncController::new(no_geometry).with_listener(listener);

        assert!(hover.on_pointer_enter(target("x", r(10.0))));
        assert_eq!(hover.state(), HoverState::Active);
        assert_eq!(hover.active_point().unwrap().seq_key, "seq-x");
        assert_eq!(hover.display_rect(), Some(r(10.0)));
        assert_eq!(*calls.lock(), vec![(Some("x".to_string()), false)]);
    }

    #[test]
    fn test_reentering_same_item_is_silent() {
        let (listener, calls) = recording_listener();
        let mut hover = HoverSyncController::new(no_geometry).with_listener(listener);

        hover.on_pointer_enter(target("a", r(0.0)));
        assert!(!hover.on_pointer_enter(target("a", r(0.0))));
        assert_eq!(calls.lock().len(), 1);
    }

    #[test]
    fn test_moving_between_items_skips_leave() {
        let (listener, calls) = recording_listener();
        let mut hover = HoverSyncController::new(no_geometry).with_listener(listener);

        hover.on_pointer_enter(target("a", r(0.0)));
        hover.on_pointer_enter(target("b", r(100.0)));
        assert_eq!(
            *calls.lock(),
            vec![(Some("a".to_string()), false), (Some("b".to_string()), false)]
        );
        assert_eq!(hover.active_point().unwrap().key, "b");
    }

    #[test]
    fn test_enter_then_leave() {
        let (listener, calls) = recording_listener();
        let mut hover = HoverSyncController::new(no_geometry).with_listener(listener);

        hover.on_pointer_enter(target("x", r(0.0)));
        assert!(hover.on_pointer_leave_all());

        assert_eq!(hover.state(), HoverState::Idle);
        assert_eq!(hover.display_rect(), None);
        assert_eq!(
            *calls.lock(),
            vec![(Some("x".to_string()), false), (None, false)]
        );
    }

    #[test]
    fn test_leave_while_idle_is_silent() {
        let (listener, calls) = recording_listener();
        let mut hover = HoverSyncController::new(no_geometry).with_listener(listener);

        assert!(!hover.close());
        assert!(calls.lock().is_empty());
    }

    #[test]
    fn test_pinned_suppresses_everything() {
        let (listener, calls) = recording_listener();
        let mut hover = HoverSyncController::new(no_geometry).with_listener(listener);

        hover.on_pointer_enter(target("a", r(0.0)));
        hover.set_focused_state(FocusedState::pinned("a"));

        assert!(!hover.on_pointer_enter(target("b", r(100.0))));
        assert!(!hover.on_pointer_leave_all());
        assert_eq!(calls.lock().len(), 1);
        assert_eq!(hover.active_point().unwrap().key, "a");

        hover.set_focused_state(FocusedState::default());
        assert!(hover.on_pointer_enter(target("b", r(100.0))));
        assert_eq!(calls.lock().len(), 2);
    }

    #[test]
    fn test_display_rect_uses_live_geometry() {
        let layout: Arc<RwLock<HashMap<String, Rect>>> = Arc::new(RwLock::new(HashMap::new()));
        layout.write().insert("a".into(), r(50.0));
        let live = Arc::clone(&layout);
        let mut hover =
            HoverSyncController::new(move |key: &str| live.read().get(key).copied());

        // Hover captured a stale rect; the live one wins.
        hover.on_pointer_enter(target("a", r(0.0)));
        assert_eq!(hover.display_rect(), Some(r(50.0)));

        layout.write().insert("a".into(), r(20.0));
        hover.refresh_display_rect();
        assert_eq!(hover.display_rect(), Some(r(20.0)));

        // Item scrolled out of the rendered window.
        layout.write().remove("a");
        hover.refresh_display_rect();
        assert_eq!(hover.display_rect(), Some(r(0.0)));
    }

    #[derive(Default)]
    struct DetailPanel {
        shown: Vec<String>,
        closed: usize,
    }

    struct DetailPanelSink(Arc<RwLock<DetailPanel>>);

    impl ActivePointListener for DetailPanelSink {
        fn on_active_point_change(&mut self, change: ActivePointChange<'_>, _pinned: bool) {
            let mut panel = self.0.write();
            match change {
                ActivePointChange::Entered(point) => panel.shown.push(point.seq_key.clone()),
                ActivePointChange::Cleared => panel.closed += 1,
            }
        }
    }

    #[test]
    fn test_listener_trait_object() {
        let detail = Arc::new(RwLock::new(DetailPanel::default()));
        let mut hover = HoverSyncController::new(no_geometry);
        hover.set_listener(Some(Box::new(DetailPanelSink(Arc::clone(&detail)))));

        hover.on_pointer_enter(target("a", r(0.0)));
        hover.on_pointer_leave_all();
        hover.set_listener(None);
        hover.on_pointer_enter(target("b", r(0.0)));

        assert_eq!(detail.read().shown, vec!["seq-a".to_string()]);
        assert_eq!(detail.read().closed, 1);
    }

    #[test]
    fn test_listener_panic_propagates_after_state_change() {
        let mut hover = HoverSyncController::new(no_geometry).with_listener(
            |change: ActivePointChange<'_>, _pinned: bool| {
                if change.key() == Some("boom") {
                    panic!("detail panel failed");
                }
            },
        );

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            hover.on_pointer_enter(target("boom", r(0.0)));
        }));

        assert!(result.is_err());
        assert_eq!(hover.active_point().unwrap().key, "boom");
        // The rect is refreshed after notifying, so the panic left it unset.
        assert_eq!(hover.display_rect(), None);
    }

    #[test]
    fn test_no_listener_is_fine() {
        let mut hover = HoverSyncController::new(no_geometry);
        assert!(hover.on_pointer_enter(target("a", r(0.0))));
        assert!(hover.on_pointer_leave_all());
    }
}
