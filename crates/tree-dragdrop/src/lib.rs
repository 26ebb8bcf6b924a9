//! Tree DragDrop Utilities
//!
//! Framework-free drag-and-drop session tracking for tree views.
//! Uses a movement threshold to distinguish click from drag.
//!
//! The session is generic over the id type of the rows (`T`) and over the
//! payload captured when the drag starts (`P`). The payload is fixed for the
//! lifetime of one drag; it is handed back on release and dropped on cancel.

use std::fmt;
use std::time::Duration;

use web_time::Instant;

/// Movement threshold in pixels to start dragging
pub const DRAG_THRESHOLD_PX: f64 = 5.0;

/// How long after a drag ends its trailing click is swallowed
pub const CLICK_SUPPRESS_WINDOW: Duration = Duration::from_millis(100);

/// Pointer position in CSS pixels
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Whether the pointer moved far enough from `start` to count as a drag
pub fn exceeds_threshold(start: Point, current: Point, threshold: f64) -> bool {
    (current.x - start.x).abs() > threshold || (current.y - start.y).abs() > threshold
}

/// A drag that has started
#[derive(Clone, Debug, PartialEq)]
struct ActiveDrag<T, P> {
    source: T,
    payload: P,
    target: Option<T>,
}

/// DnD state for one tree view
#[derive(Clone, Debug)]
pub struct DndState<T, P> {
    threshold: f64,
    /// Pending item id (press but not yet dragging) with start position
    pending: Option<(T, Point)>,
    dragging: Option<ActiveDrag<T, P>>,
    /// When the last drag ended (drop, release or cancel)
    ended_at: Option<Instant>,
}

impl<T, P> Default for DndState<T, P> {
    fn default() -> Self {
        Self::new(DRAG_THRESHOLD_PX)
    }
}

impl<T, P> DndState<T, P> {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            pending: None,
            dragging: None,
            ended_at: None,
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn is_dragging(&self) -> bool {
        self.dragging.is_some()
    }

    /// Payload of the drag in progress
    pub fn payload(&self) -> Option<&P> {
        self.dragging.as_ref().map(|d| &d.payload)
    }

    /// Discard any pending or active drag without a drop
    pub fn cancel(&mut self, now: Instant) -> bool {
        self.pending = None;
        let was_dragging = self.dragging.take().is_some();
        if was_dragging {
            log::debug!("[DND] Drag cancelled");
            self.ended_at = Some(now);
        }
        was_dragging
    }

    /// Whether a click at `now` is the one the platform fires right after a
    /// drag ends. Consumes the end marker either way.
    ///
    /// That click lands on the drag origin; callers check this first and
    /// swallow it. Clicks later than [`CLICK_SUPPRESS_WINDOW`] pass.
    pub fn take_just_ended(&mut self, now: Instant) -> bool {
        self.ended_at
            .take()
            .is_some_and(|at| now.saturating_duration_since(at) <= CLICK_SUPPRESS_WINDOW)
    }
}

impl<T, P> DndState<T, P>
where
    T: Copy + PartialEq + fmt::Debug,
{
    /// Record a pending drag for a primary-button press on `source`
    pub fn press(&mut self, source: T, at: Point) {
        if self.dragging.is_none() {
            self.ended_at = None;
            self.pending = Some((source, at));
        }
    }

    /// Pointer moved. Returns the pending source once the threshold is crossed;
    /// the caller then captures the payload and calls [`DndState::begin`].
    pub fn motion(&mut self, at: Point) -> Option<T> {
        if self.dragging.is_some() {
            return None;
        }
        let (source, start) = self.pending?;
        if exceeds_threshold(start, at, self.threshold) {
            self.pending = None;
            Some(source)
        } else {
            None
        }
    }

    /// Start dragging `source` with its payload. Ignored if a drag is already
    /// running, so the first captured payload wins.
    pub fn begin(&mut self, source: T, payload: P) -> bool {
        if self.dragging.is_some() {
            return false;
        }
        log::debug!("[DND] Drag start: source={:?}", source);
        self.pending = None;
        self.dragging = Some(ActiveDrag {
            source,
            payload,
            target: None,
        });
        true
    }

    pub fn source(&self) -> Option<T> {
        self.dragging.as_ref().map(|d| d.source)
    }

    pub fn drop_target(&self) -> Option<T> {
        self.dragging.as_ref().and_then(|d| d.target)
    }

    /// Pointer entered a row. `accepts` is the caller's verdict on whether the
    /// row takes this payload; the drag source never accepts itself.
    pub fn enter(&mut self, target: T, accepts: bool) {
        if let Some(drag) = self.dragging.as_mut() {
            drag.target = (accepts && drag.source != target).then_some(target);
        }
    }

    /// Pointer left the current target
    pub fn leave(&mut self) {
        if let Some(drag) = self.dragging.as_mut() {
            drag.target = None;
        }
    }

    /// Pointer released. Yields the payload and target when the release
    /// completes a drop; otherwise the drag is discarded.
    pub fn release(&mut self, now: Instant) -> Option<(P, T)> {
        self.pending = None;
        let drag = self.dragging.take()?;
        self.ended_at = Some(now);
        match drag.target {
            Some(target) => {
                log::debug!("[DND] Drop: source={:?}, target={:?}", drag.source, target);
                Some((drag.payload, target))
            }
            None => {
                log::debug!("[DND] Released outside any target: source={:?}", drag.source);
                None
            }
        }
    }
}
