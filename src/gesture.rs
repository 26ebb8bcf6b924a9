//! Gesture Disambiguator
//!
//! Per-item state machine turning raw touch / click / context-menu events into
//! one user intent. Touch and pointer devices do not distinguish "long press"
//! from "right click" natively, so the machine remembers whether the current
//! interaction stream started with a touch and how long the touch was held.
//!
//! # States
//!
//! | state              | meaning                                               |
//! |--------------------|-------------------------------------------------------|
//! | `Idle`             | no touch in progress; clicks are pointer clicks       |
//! | `TouchedDown`      | finger down, long-press timer running                 |
//! | `LongPressPending` | finger still down, threshold already elapsed          |
//! | `LongPressFired`   | released after the threshold; next click toggles      |
//! | `TapReleased`      | released before the threshold; next click opens       |
//!
//! # Transitions
//!
//! | state                          | input            | next               | gesture          |
//! |--------------------------------|------------------|--------------------|------------------|
//! | any                            | touchstart       | `TouchedDown`      | -                |
//! | `TouchedDown`                  | poll ≥ threshold | `LongPressPending` | -                |
//! | `TouchedDown`                  | touchend < thr.  | `TapReleased`      | -                |
//! | `TouchedDown`                  | touchend ≥ thr.  | `LongPressFired`   | -                |
//! | `LongPressPending`             | touchend         | `LongPressFired`   | -                |
//! | any touch state                | touchcancel      | `Idle`             | -                |
//! | any                            | modified click   | `Idle`             | platform default |
//! | any                            | click, custom    | `Idle`             | custom handler   |
//! | `LongPressFired` / `Pending`   | click            | `Idle`             | toggle select    |
//! | `TapReleased` / `TouchedDown`  | click            | `Idle`             | open             |
//! | `Idle`                         | click            | `Idle`             | open if expandable, else toggle |
//! | any touch state                | contextmenu      | `Idle`             | toggle select    |
//! | `Idle`                         | contextmenu      | `Idle`             | open menu at point |
//!
//! Time is passed in explicitly so the machine is testable without a clock.
//!
//! Drag start is not an outcome of this machine. Pointer and touch movement
//! past the drag threshold is tracked by the drag session
//! ([`tree_dragdrop::DndState`]); when a drag begins the item's machine is
//! reset, so a touch that turned into a drag never fires a long press.

use std::time::Duration;

use bitflags::bitflags;
use web_time::Instant;

use crate::models::Point;

/// Lower bound for the long-press threshold
pub const MIN_LONG_PRESS: Duration = Duration::from_millis(500);

bitflags! {
    /// Keyboard modifiers held during a click
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Modifiers: u8 {
        const SHIFT = 0b0001;
        const CTRL  = 0b0010;
        const ALT   = 0b0100;
        const META  = 0b1000;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MouseButton {
    #[default]
    Primary,
    Auxiliary,
    Secondary,
    Other(i16),
}

impl MouseButton {
    /// From the DOM `MouseEvent.button` value
    pub fn from_dom(button: i16) -> Self {
        match button {
            0 => MouseButton::Primary,
            1 => MouseButton::Auxiliary,
            2 => MouseButton::Secondary,
            other => MouseButton::Other(other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Click {
    pub button: MouseButton,
    pub modifiers: Modifiers,
    pub at: Point,
}

impl Click {
    pub fn primary(at: Point) -> Self {
        Self {
            at,
            ..Default::default()
        }
    }

    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    pub fn with_button(mut self, button: MouseButton) -> Self {
        self.button = button;
        self
    }

    /// New tab / new window semantics belong to the platform
    pub fn wants_platform_default(&self) -> bool {
        !self.modifiers.is_empty() || self.button != MouseButton::Primary
    }
}

/// Raw input delivered to one item
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerInput {
    TouchStart,
    TouchEnd,
    TouchCancel,
    Click(Click),
    DoubleClick,
    ContextMenu(Point),
}

/// Where the item is rendered and who handles its clicks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClickContext {
    /// Rendered inside an expandable tree (a click opens instead of selecting)
    pub expandable: bool,
    /// The caller supplied its own click handler
    pub custom_handler: bool,
}

/// Resolved user intent
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Gesture {
    Open,
    ToggleSelect,
    ContextMenu(Point),
    PlatformDefault,
    Custom,
    Ignored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GestureState {
    #[default]
    Idle,
    TouchedDown {
        since: Instant,
    },
    LongPressPending,
    LongPressFired,
    TapReleased,
}

impl GestureState {
    /// The current interaction stream started with a touch
    pub fn is_touch(&self) -> bool {
        !matches!(self, GestureState::Idle)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GestureConfig {
    /// Hold duration that turns a touch into a long press (default: 500ms)
    pub long_press_threshold: Duration,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            long_press_threshold: MIN_LONG_PRESS,
        }
    }
}

impl GestureConfig {
    pub fn with_long_press(threshold: Duration) -> Self {
        Self {
            long_press_threshold: threshold.max(MIN_LONG_PRESS),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct GestureMachine {
    config: GestureConfig,
    state: GestureState,
}

impl GestureMachine {
    pub fn new(config: GestureConfig) -> Self {
        Self {
            config,
            state: GestureState::Idle,
        }
    }

    pub fn state(&self) -> GestureState {
        self.state
    }

    pub fn reset(&mut self) {
        self.state = GestureState::Idle;
    }

    /// Advance the long-press timer. Returns true when the threshold was just
    /// crossed with the finger still down.
    pub fn poll(&mut self, now: Instant) -> bool {
        if let GestureState::TouchedDown { since } = self.state {
            if now.duration_since(since) >= self.config.long_press_threshold {
                log::debug!("[GESTURE] Long press recognized");
                self.state = GestureState::LongPressPending;
                return true;
            }
        }
        false
    }

    pub fn handle(&mut self, input: PointerInput, ctx: ClickContext, now: Instant) -> Gesture {
        match input {
            PointerInput::TouchStart => {
                self.state = GestureState::TouchedDown { since: now };
                Gesture::Ignored
            }
            PointerInput::TouchEnd => {
                self.poll(now);
                self.state = match self.state {
                    GestureState::TouchedDown { .. } => GestureState::TapReleased,
                    GestureState::LongPressPending => GestureState::LongPressFired,
                    other => other,
                };
                Gesture::Ignored
            }
            PointerInput::TouchCancel => {
                self.reset();
                Gesture::Ignored
            }
            PointerInput::Click(click) => self.on_click(click, ctx, now),
            PointerInput::DoubleClick => {
                self.reset();
                if ctx.custom_handler {
                    Gesture::Ignored
                } else {
                    Gesture::Open
                }
            }
            PointerInput::ContextMenu(at) => {
                self.poll(now);
                let touch = self.state.is_touch();
                self.reset();
                if touch {
                    // long press / hard touch
                    Gesture::ToggleSelect
                } else {
                    Gesture::ContextMenu(at)
                }
            }
        }
    }

    fn on_click(&mut self, click: Click, ctx: ClickContext, now: Instant) -> Gesture {
        self.poll(now);
        let state = self.state;
        self.reset();

        if click.wants_platform_default() {
            return Gesture::PlatformDefault;
        }
        if ctx.custom_handler {
            return Gesture::Custom;
        }
        match state {
            GestureState::LongPressFired | GestureState::LongPressPending => Gesture::ToggleSelect,
            GestureState::TapReleased | GestureState::TouchedDown { .. } => Gesture::Open,
            GestureState::Idle if ctx.expandable => Gesture::Open,
            GestureState::Idle => Gesture::ToggleSelect,
        }
    }
}
