//! Time driven viewport animations: smooth move, zoom and fling.
//!
//! The host drives everything through [`Animator::advance`] with a
//! monotonic timestamp. An animation starts on the first tick after it was
//! created, so creation never needs a clock.

use crate::viewport::OffsetBounds;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Interpolation curve for move and zoom animations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Easing {
    Linear,
    #[default]
    Decelerate,
}

impl Easing {
    /// Map linear progress in `[0, 1]` onto the curve
    pub fn apply(self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Easing::Linear => t,
            Easing::Decelerate => 1.0 - (1.0 - t) * (1.0 - t),
        }
    }
}

/// Animation tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimationConfig {
    /// Duration of smooth moves and animated zooms
    /// Default: 500ms
    pub duration_ms: u64,

    /// Curve for smooth moves and animated zooms
    pub easing: Easing,

    /// Fraction of fling velocity kept per 1/60s
    /// Default: 0.92
    pub fling_decay: f32,

    /// Fling stops below this speed, in pixels per second
    /// Default: 30.0
    pub fling_stop_velocity: f32,
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            duration_ms: 500,
            easing: Easing::Decelerate,
            fling_decay: 0.92,
            fling_stop_velocity: 30.0,
        }
    }
}

impl AnimationConfig {
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }
}

/// One change produced by [`Animator::advance`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AnimationStep {
    /// Move the viewport to this offset
    Move { x: i32, y: i32 },
    /// A smooth move or fling ended
    MoveFinished,
    /// Set the interactive scale, pivoting on (`px`, `py`) in the view
    Zoom { scale: f32, px: f32, py: f32 },
    /// An animated zoom reached its target
    ZoomFinished,
}

#[derive(Debug, Clone, Copy, Default)]
struct Clock {
    started: Option<Duration>,
}

impl Clock {
    /// Linear progress, starting the clock on the first call
    fn progress(&mut self, now: Duration, duration: Duration) -> f32 {
        let started = *self.started.get_or_insert(now);
        if duration.is_zero() {
            return 1.0;
        }
        let elapsed = now.saturating_sub(started);
        (elapsed.as_secs_f32() / duration.as_secs_f32()).min(1.0)
    }
}

#[derive(Debug, Clone, Copy)]
struct MoveAnimation {
    clock: Clock,
    from: (i32, i32),
    to: (i32, i32),
}

#[derive(Debug, Clone, Copy)]
struct ZoomAnimation {
    clock: Clock,
    from: f32,
    to: f32,
    px: f32,
    py: f32,
}

#[derive(Debug, Clone, Copy)]
struct Fling {
    last: Option<Duration>,
    x: f32,
    y: f32,
    vx: f32,
    vy: f32,
    bounds: OffsetBounds,
}

/// Runs at most one move, one zoom and one fling
#[derive(Debug, Clone, Default)]
pub struct Animator {
    config: AnimationConfig,
    movement: Option<MoveAnimation>,
    zoom: Option<ZoomAnimation>,
    fling: Option<Fling>,
}

fn lerp(from: f32, to: f32, t: f32) -> f32 {
    from + (to - from) * t
}

impl Animator {
    pub fn new(config: AnimationConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &AnimationConfig {
        &self.config
    }

    /// Animate the offset from `from` to `to`, replacing a running move
    ///
    /// Returns false if there is nothing to animate.
    pub fn start_move(&mut self, from: (i32, i32), to: (i32, i32)) -> bool {
        if from == to {
            self.movement = None;
            return false;
        }
        self.movement = Some(MoveAnimation {
            clock: Clock::default(),
            from,
            to,
        });
        true
    }

    /// Animate the interactive scale from `from` to `to` around a view point
    pub fn start_zoom(&mut self, from: f32, to: f32, px: f32, py: f32) {
        self.zoom = Some(ZoomAnimation {
            clock: Clock::default(),
            from,
            to,
            px,
            py,
        });
    }

    /// Start a fling from offset (`x`, `y`) with a pointer velocity
    ///
    /// The pointer velocity is in view pixels per second; the offset moves
    /// the opposite way. Returns false when the document is already pinned
    /// against the bounds in the fling direction on both axes.
    pub fn start_fling(&mut self, x: i32, y: i32, vx: f32, vy: f32, bounds: OffsetBounds) -> bool {
        let horizontal = if vx < 0.0 {
            x < bounds.max_x
        } else {
            x > bounds.min_x
        };
        let vertical = if vy < 0.0 {
            y < bounds.max_y
        } else {
            y > bounds.min_y
        };
        if !horizontal && !vertical {
            return false;
        }

        self.fling = Some(Fling {
            last: None,
            x: x as f32,
            y: y as f32,
            vx: -vx,
            vy: -vy,
            bounds,
        });
        true
    }

    pub fn is_moving(&self) -> bool {
        self.movement.is_some()
    }

    pub fn is_zooming(&self) -> bool {
        self.zoom.is_some()
    }

    pub fn is_flinging(&self) -> bool {
        self.fling.is_some()
    }

    pub fn is_running(&self) -> bool {
        self.is_moving() || self.is_zooming() || self.is_flinging()
    }

    /// Returns true if a move was running
    pub fn stop_move(&mut self) -> bool {
        self.movement.take().is_some()
    }

    /// Returns true if a zoom was running
    pub fn stop_zoom(&mut self) -> bool {
        self.zoom.take().is_some()
    }

    /// Returns true if a fling was running
    pub fn stop_fling(&mut self) -> bool {
        self.fling.take().is_some()
    }

    /// Advance every running animation to `now`
    pub fn advance(&mut self, now: Duration) -> Vec<AnimationStep> {
        let mut steps = Vec::new();
        self.advance_zoom(now, &mut steps);
        self.advance_move(now, &mut steps);
        self.advance_fling(now, &mut steps);
        steps
    }

    fn advance_move(&mut self, now: Duration, steps: &mut Vec<AnimationStep>) {
        let duration = self.config.duration();
        let easing = self.config.easing;
        let Some(movement) = self.movement.as_mut() else {
            return;
        };

        let t = movement.clock.progress(now, duration);
        let eased = easing.apply(t);
        let x = lerp(movement.from.0 as f32, movement.to.0 as f32, eased).round() as i32;
        let y = lerp(movement.from.1 as f32, movement.to.1 as f32, eased).round() as i32;
        steps.push(AnimationStep::Move { x, y });

        if t >= 1.0 {
            self.movement = None;
            steps.push(AnimationStep::MoveFinished);
        }
    }

    fn advance_zoom(&mut self, now: Duration, steps: &mut Vec<AnimationStep>) {
        let duration = self.config.duration();
        let easing = self.config.easing;
        let Some(zoom) = self.zoom.as_mut() else {
            return;
        };

        let t = zoom.clock.progress(now, duration);
        steps.push(AnimationStep::Zoom {
            scale: lerp(zoom.from, zoom.to, easing.apply(t)),
            px: zoom.px,
            py: zoom.py,
        });

        if t >= 1.0 {
            self.zoom = None;
            steps.push(AnimationStep::ZoomFinished);
        }
    }

    fn advance_fling(&mut self, now: Duration, steps: &mut Vec<AnimationStep>) {
        let decay = self.config.fling_decay;
        let stop = self.config.fling_stop_velocity;
        let Some(fling) = self.fling.as_mut() else {
            return;
        };

        let Some(last) = fling.last else {
            fling.last = Some(now);
            return;
        };
        let dt = now.saturating_sub(last).as_secs_f32();
        if dt <= 0.0 {
            return;
        }
        fling.last = Some(now);

        fling.x += fling.vx * dt;
        fling.y += fling.vy * dt;
        let factor = decay.powf(dt * 60.0);
        fling.vx *= factor;
        fling.vy *= factor;

        let bounds = fling.bounds;
        let x = fling.x.clamp(bounds.min_x as f32, bounds.max_x as f32);
        let y = fling.y.clamp(bounds.min_y as f32, bounds.max_y as f32);
        if x != fling.x {
            fling.x = x;
            fling.vx = 0.0;
        }
        if y != fling.y {
            fling.y = y;
            fling.vy = 0.0;
        }

        steps.push(AnimationStep::Move {
            x: x.round() as i32,
            y: y.round() as i32,
        });

        if fling.vx.abs() < stop && fling.vy.abs() < stop {
            self.fling = None;
            steps.push(AnimationStep::MoveFinished);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    fn bounds() -> OffsetBounds {
        OffsetBounds {
            min_x: 0,
            max_x: 1000,
            min_y: 0,
            max_y: 5000,
        }
    }

    #[test]
    fn test_easing() {
        assert_eq!(Easing::Linear.apply(0.25), 0.25);
        assert_eq!(Easing::Decelerate.apply(0.0), 0.0);
        assert_eq!(Easing::Decelerate.apply(1.0), 1.0);
        assert!(Easing::Decelerate.apply(0.5) > 0.5);
        assert_eq!(Easing::Decelerate.apply(3.0), 1.0);
    }

    #[test]
    fn test_move_runs_for_duration() {
        let mut animator = Animator::new(AnimationConfig::default());
        assert!(animator.start_move((0, 0), (100, 200)));

        assert_eq!(animator.advance(ms(1000)), vec![AnimationStep::Move { x: 0, y: 0 }]);
        let steps = animator.advance(ms(1250));
        assert_eq!(steps, vec![AnimationStep::Move { x: 75, y: 150 }]);

        let steps = animator.advance(ms(1500));
        assert_eq!(
            steps,
            vec![AnimationStep::Move { x: 100, y: 200 }, AnimationStep::MoveFinished]
        );
        assert!(!animator.is_running());
    }

    #[test]
    fn test_move_to_same_offset_does_nothing() {
        let mut animator = Animator::default();
        assert!(!animator.start_move((5, 5), (5, 5)));
        assert!(animator.advance(ms(10)).is_empty());
    }

    #[test]
    fn test_zero_duration_finishes_on_first_tick() {
        let config = AnimationConfig {
            duration_ms: 0,
            ..AnimationConfig::default()
        };
        let mut animator = Animator::new(config);
        animator.start_zoom(1.0, 2.0, 10.0, 20.0);
        let steps = animator.advance(ms(0));
        assert_eq!(
            steps,
            vec![
                AnimationStep::Zoom {
                    scale: 2.0,
                    px: 10.0,
                    py: 20.0
                },
                AnimationStep::ZoomFinished
            ]
        );
    }

    #[test]
    fn test_zoom_linear_progress() {
        let config = AnimationConfig {
            easing: Easing::Linear,
            ..AnimationConfig::default()
        };
        let mut animator = Animator::new(config);
        animator.start_zoom(1.0, 3.0, 0.0, 0.0);
        animator.advance(ms(0));
        let steps = animator.advance(ms(250));
        assert_eq!(
            steps,
            vec![AnimationStep::Zoom {
                scale: 2.0,
                px: 0.0,
                py: 0.0
            }]
        );
    }

    #[test]
    fn test_stop_reports_running_animation() {
        let mut animator = Animator::default();
        animator.start_zoom(1.0, 2.0, 0.0, 0.0);
        assert!(animator.stop_zoom());
        assert!(!animator.stop_zoom());
        assert!(!animator.stop_move());
        assert!(!animator.stop_fling());
    }

    #[test]
    fn test_fling_moves_against_pointer_and_decays() {
        let mut animator = Animator::default();
        assert!(animator.start_fling(500, 500, 0.0, -3000.0, bounds()));

        assert!(animator.advance(ms(0)).is_empty());
        let steps = animator.advance(ms(100));
        let AnimationStep::Move { x, y } = steps[0] else {
            panic!("expected a move, got {steps:?}");
        };
        assert_eq!(x, 500);
        assert_eq!(y, 800);

        let mut last = y;
        let mut finished = false;
        for frame in 7..400 {
            for step in animator.advance(ms(frame * 16)) {
                match step {
                    AnimationStep::Move { y, .. } => {
                        assert!(y >= last);
                        last = y;
                    }
                    AnimationStep::MoveFinished => finished = true,
                    other => panic!("unexpected step {other:?}"),
                }
            }
            if finished {
                break;
            }
        }
        assert!(finished);
        assert!(!animator.is_flinging());
    }

    #[test]
    fn test_fling_stops_at_bounds() {
        let mut animator = Animator::default();
        assert!(animator.start_fling(0, 4900, 0.0, -100_000.0, bounds()));
        animator.advance(ms(0));
        let steps = animator.advance(ms(100));
        assert_eq!(
            steps,
            vec![AnimationStep::Move { x: 0, y: 5000 }, AnimationStep::MoveFinished]
        );
    }

    #[test]
    fn test_fling_rejected_when_pinned() {
        let mut animator = Animator::default();
        // Pointer moves down and right, so the offset would go below zero
        assert!(!animator.start_fling(0, 0, 500.0, 500.0, bounds()));
        assert!(animator.start_fling(0, 10, 500.0, 500.0, bounds()));
    }
}
