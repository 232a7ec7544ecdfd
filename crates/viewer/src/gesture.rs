//! Pointer event interpretation.
//!
//! Turns raw pointer events from the host into scroll, fling, zoom and tap
//! intents. The interpreter has no clock of its own: every event carries the
//! host timestamp, and delayed single taps are released by [`GestureInterpreter::poll`].

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;

/// Velocity is measured over this trailing window of samples
const VELOCITY_WINDOW: Duration = Duration::from_millis(100);

/// Kind of pointer event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerKind {
    /// First pointer touched down
    Down,
    /// Another pointer touched down while one is already down
    PointerDown,
    Move,
    /// A non-last pointer lifted
    PointerUp,
    /// The last pointer lifted
    Up,
    /// The host took the gesture away
    Cancel,
}

/// Raw pointer event in view coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerEvent {
    pub kind: PointerKind,
    pub id: u64,
    pub x: f32,
    pub y: f32,
    /// Monotonic host timestamp
    pub time: Duration,
}

impl PointerEvent {
    pub fn new(kind: PointerKind, id: u64, x: f32, y: f32, time: Duration) -> Self {
        Self {
            kind,
            id,
            x,
            y,
            time,
        }
    }

    pub fn down(x: f32, y: f32, time: Duration) -> Self {
        Self::new(PointerKind::Down, 0, x, y, time)
    }

    pub fn moved(x: f32, y: f32, time: Duration) -> Self {
        Self::new(PointerKind::Move, 0, x, y, time)
    }

    pub fn up(x: f32, y: f32, time: Duration) -> Self {
        Self::new(PointerKind::Up, 0, x, y, time)
    }

    pub fn cancel(time: Duration) -> Self {
        Self::new(PointerKind::Cancel, 0, 0.0, 0.0, time)
    }
}

/// Gesture thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GestureConfig {
    /// Distance a pointer travels before a press turns into a scroll
    /// Default: 8.0
    pub touch_slop: f32,

    /// Maximum delay between two taps of a double tap
    /// Default: 300ms
    pub double_tap_timeout_ms: u64,

    /// Maximum distance between two taps of a double tap
    /// Default: 100.0
    pub double_tap_slop: f32,

    /// Slower releases end without a fling, in pixels per second
    /// Default: 50.0
    pub min_fling_velocity: f32,

    /// Fling velocity cap, in pixels per second
    /// Default: 8000.0
    pub max_fling_velocity: f32,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            touch_slop: 8.0,
            double_tap_timeout_ms: 300,
            double_tap_slop: 100.0,
            min_fling_velocity: 50.0,
            max_fling_velocity: 8000.0,
        }
    }
}

impl GestureConfig {
    pub fn double_tap_timeout(&self) -> Duration {
        Duration::from_millis(self.double_tap_timeout_ms)
    }
}

/// What the user meant, in view coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Intent {
    /// A first pointer went down; running animations should stop
    Down,
    Press { x: f32, y: f32 },
    CancelPress,
    ScrollBegin,
    /// Offset change; positive moves the document content up and left
    Scroll { dx: f32, dy: f32 },
    ScrollEnd,
    /// Pointer velocity at release, in pixels per second
    Fling { vx: f32, vy: f32 },
    DoubleTap { x: f32, y: f32 },
    ZoomBegin,
    Zoom { factor: f32, px: f32, py: f32 },
    ZoomEnd,
    /// Single tap confirmed once no second tap followed
    Click { x: f32, y: f32 },
}

#[derive(Debug, Clone, Copy)]
struct Touch {
    x: f32,
    y: f32,
    time: Duration,
}

/// Pointer event state machine
#[derive(Debug, Clone, Default)]
pub struct GestureInterpreter {
    config: GestureConfig,
    pointers: Vec<(u64, f32, f32)>,
    down: Option<Touch>,
    last: (f32, f32),
    samples: VecDeque<Touch>,
    still_down: bool,
    pressed: bool,
    scrolling: bool,
    scaling: bool,
    span: f32,
    double_tapping: bool,
    /// Set after a pinch so the remaining pointer neither scrolls nor taps
    consumed: bool,
    last_tap: Option<Touch>,
    pending_click: Option<Touch>,
}

impl GestureInterpreter {
    pub fn new(config: GestureConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &GestureConfig {
        &self.config
    }

    pub fn is_scrolling(&self) -> bool {
        self.scrolling
    }

    pub fn is_scaling(&self) -> bool {
        self.scaling
    }

    /// Feed one pointer event
    pub fn handle(&mut self, event: PointerEvent) -> Vec<Intent> {
        let mut intents = Vec::new();
        match event.kind {
            PointerKind::Down => self.on_down(event, &mut intents),
            PointerKind::PointerDown => self.on_pointer_down(event, &mut intents),
            PointerKind::Move => self.on_move(event, &mut intents),
            PointerKind::PointerUp => self.on_pointer_up(event, &mut intents),
            PointerKind::Up => self.on_up(event, &mut intents),
            PointerKind::Cancel => self.on_cancel(&mut intents),
        }
        intents
    }

    /// Release a single tap whose double tap window has passed
    pub fn poll(&mut self, now: Duration) -> Vec<Intent> {
        let mut intents = Vec::new();
        if self.still_down {
            return intents;
        }
        if let Some(tap) = self.pending_click {
            if now >= tap.time + self.config.double_tap_timeout() {
                self.pending_click = None;
                self.pressed = false;
                intents.push(Intent::Click { x: tap.x, y: tap.y });
            }
        }
        intents
    }

    fn on_down(&mut self, event: PointerEvent, intents: &mut Vec<Intent>) {
        let touch = Touch {
            x: event.x,
            y: event.y,
            time: event.time,
        };
        let double_tap = self.is_double_tap(&touch);

        if let Some(tap) = self.pending_click.take() {
            if !double_tap {
                intents.push(Intent::Click { x: tap.x, y: tap.y });
            }
        }

        self.pointers.clear();
        self.pointers.push((event.id, event.x, event.y));
        self.down = Some(touch);
        self.last = (event.x, event.y);
        self.samples.clear();
        self.samples.push_back(touch);
        self.still_down = true;
        self.scrolling = false;
        self.scaling = false;
        self.consumed = false;

        intents.push(Intent::Down);
        intents.push(Intent::Press {
            x: event.x,
            y: event.y,
        });
        self.pressed = true;

        self.double_tapping = double_tap;
        if double_tap {
            self.last_tap = None;
            self.cancel_press(intents);
            intents.push(Intent::DoubleTap {
                x: event.x,
                y: event.y,
            });
        }
    }

    fn is_double_tap(&self, touch: &Touch) -> bool {
        let Some(tap) = self.last_tap else {
            return false;
        };
        if touch.time.saturating_sub(tap.time) > self.config.double_tap_timeout() {
            return false;
        }
        let (dx, dy) = (touch.x - tap.x, touch.y - tap.y);
        dx * dx + dy * dy <= self.config.double_tap_slop * self.config.double_tap_slop
    }

    fn cancel_press(&mut self, intents: &mut Vec<Intent>) {
        if self.pressed {
            self.pressed = false;
            intents.push(Intent::CancelPress);
        }
    }

    fn on_pointer_down(&mut self, event: PointerEvent, intents: &mut Vec<Intent>) {
        self.pointers.retain(|(id, _, _)| *id != event.id);
        self.pointers.push((event.id, event.x, event.y));
        if self.pointers.len() < 2 || self.scaling {
            return;
        }

        self.cancel_press(intents);
        if self.scrolling {
            self.scrolling = false;
            intents.push(Intent::ScrollEnd);
        }
        self.double_tapping = false;
        self.last_tap = None;
        self.scaling = true;
        self.consumed = true;
        self.span = self.focus_and_span().2;
        intents.push(Intent::ZoomBegin);
    }

    fn on_pointer_up(&mut self, event: PointerEvent, intents: &mut Vec<Intent>) {
        self.pointers.retain(|(id, _, _)| *id != event.id);
        if self.scaling && self.pointers.len() < 2 {
            self.scaling = false;
            intents.push(Intent::ZoomEnd);
        }
    }

    /// Midpoint and distance of the first two pointers
    fn focus_and_span(&self) -> (f32, f32, f32) {
        match self.pointers.as_slice() {
            [(_, x0, y0), (_, x1, y1), ..] => {
                let (dx, dy) = (x1 - x0, y1 - y0);
                ((x0 + x1) / 2.0, (y0 + y1) / 2.0, (dx * dx + dy * dy).sqrt())
            }
            [(_, x, y)] => (*x, *y, 0.0),
            [] => (0.0, 0.0, 0.0),
        }
    }

    fn on_move(&mut self, event: PointerEvent, intents: &mut Vec<Intent>) {
        let primary = self.pointers.first().map(|(id, _, _)| *id);
        if let Some(pointer) = self.pointers.iter_mut().find(|(id, _, _)| *id == event.id) {
            pointer.1 = event.x;
            pointer.2 = event.y;
        }

        if self.scaling {
            let (px, py, span) = self.focus_and_span();
            if self.span > 0.0 && span > 0.0 && span != self.span {
                intents.push(Intent::Zoom {
                    factor: span / self.span,
                    px,
                    py,
                });
            }
            self.span = span;
            return;
        }

        if primary != Some(event.id) || self.double_tapping || self.consumed || !self.still_down {
            return;
        }
        let Some(down) = self.down else {
            return;
        };

        self.samples.push_back(Touch {
            x: event.x,
            y: event.y,
            time: event.time,
        });
        while self
            .samples
            .front()
            .is_some_and(|sample| event.time.saturating_sub(sample.time) > VELOCITY_WINDOW)
        {
            self.samples.pop_front();
        }

        if self.scrolling {
            let (dx, dy) = (self.last.0 - event.x, self.last.1 - event.y);
            self.last = (event.x, event.y);
            if dx != 0.0 || dy != 0.0 {
                intents.push(Intent::Scroll { dx, dy });
            }
            return;
        }

        let (dx, dy) = (down.x - event.x, down.y - event.y);
        let distance = (dx * dx + dy * dy).sqrt();
        if distance <= self.config.touch_slop {
            return;
        }

        self.scrolling = true;
        self.last_tap = None;
        self.last = (event.x, event.y);
        self.cancel_press(intents);
        intents.push(Intent::ScrollBegin);

        // Swallow the slop so scrolling starts from where it was detected
        let travel = distance - self.config.touch_slop;
        intents.push(Intent::Scroll {
            dx: dx * travel / distance,
            dy: dy * travel / distance,
        });
    }

    fn on_up(&mut self, event: PointerEvent, intents: &mut Vec<Intent>) {
        let touch = Touch {
            x: event.x,
            y: event.y,
            time: event.time,
        };

        if self.scaling {
            self.scaling = false;
            intents.push(Intent::ZoomEnd);
        } else if self.double_tapping {
            self.cancel_press(intents);
        } else if self.scrolling {
            intents.push(Intent::ScrollEnd);
            self.cancel_press(intents);
            self.samples.push_back(touch);
            let (vx, vy) = self.velocity();
            let min = self.config.min_fling_velocity;
            if vx.abs() > min || vy.abs() > min {
                intents.push(Intent::Fling { vx, vy });
            }
        } else if !self.consumed && self.pressed {
            let down = self.down.unwrap_or(touch);
            self.last_tap = Some(touch);
            if event.time >= down.time + self.config.double_tap_timeout() {
                self.pressed = false;
                intents.push(Intent::Click {
                    x: down.x,
                    y: down.y,
                });
            } else {
                self.pending_click = Some(down);
            }
        } else {
            self.cancel_press(intents);
        }

        self.still_down = false;
        self.scrolling = false;
        self.double_tapping = false;
        self.consumed = false;
        self.pointers.clear();
    }

    fn on_cancel(&mut self, intents: &mut Vec<Intent>) {
        self.cancel_press(intents);
        if self.scrolling {
            intents.push(Intent::ScrollEnd);
        }
        if self.scaling {
            intents.push(Intent::ZoomEnd);
        }
        let config = std::mem::take(&mut self.config);
        *self = Self::new(config);
    }

    /// Pointer velocity over the trailing sample window
    fn velocity(&self) -> (f32, f32) {
        let (Some(first), Some(last)) = (self.samples.front(), self.samples.back()) else {
            return (0.0, 0.0);
        };
        let dt = last.time.saturating_sub(first.time).as_secs_f32();
        if dt <= 0.0 {
            return (0.0, 0.0);
        }
        let max = self.config.max_fling_velocity;
        (
            ((last.x - first.x) / dt).clamp(-max, max),
            ((last.y - first.y) / dt).clamp(-max, max),
        )
    }
}
