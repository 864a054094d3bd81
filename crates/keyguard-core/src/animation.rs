//! Time-driven value animations for scrim alphas
//!
//! An animation interpolates a single `f32` from `from` to `to` over a
//! duration, after an optional start delay. It is advanced explicitly with
//! the current uptime; nothing here owns a timer.

use std::time::Duration;

/// Easing curve applied to the linear play fraction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Interpolator {
    /// Identity
    Linear,
    /// Quadratic ease-out, `1 - (1 - x)^2`
    #[default]
    Decelerate,
    /// Cubic Bézier (0, 0) (0.7, 1) used when fading the keyguard away
    KeyguardFadeOut,
}

impl Interpolator {
    /// Map a play fraction in `[0, 1]` to an eased fraction
    pub fn interpolate(self, x: f32) -> f32 {
        let x = x.clamp(0.0, 1.0);
        match self {
            Interpolator::Linear => x,
            Interpolator::Decelerate => 1.0 - (1.0 - x) * (1.0 - x),
            Interpolator::KeyguardFadeOut => cubic_bezier(0.0, 0.0, 0.7, 1.0, x),
        }
    }
}

/// Evaluate a unit cubic Bézier easing curve at `x`.
///
/// Solves `bx(t) = x` by bisection; bx is monotonic for control points in
/// `[0, 1]`.
fn cubic_bezier(x1: f32, y1: f32, x2: f32, y2: f32, x: f32) -> f32 {
    fn axis(p1: f32, p2: f32, t: f32) -> f32 {
        let u = 1.0 - t;
        3.0 * u * u * t * p1 + 3.0 * u * t * t * p2 + t * t * t
    }

    let (mut lo, mut hi) = (0.0f32, 1.0f32);
    let mut t = x;
    for _ in 0..32 {
        let bx = axis(x1, x2, t);
        if (bx - x).abs() < 1e-6 {
            break;
        }
        if bx < x {
            lo = t;
        } else {
            hi = t;
        }
        t = (lo + hi) / 2.0;
    }
    axis(y1, y2, t)
}

/// Identity of a started animation.
///
/// Handles are never reused, so a retained handle tells whether an animation
/// was restarted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AnimationHandle(pub u64);

/// Result of advancing an animation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnimationStep {
    /// Value to apply, or `None` while the start delay is still running
    pub value: Option<f32>,
    /// Whether the animation reached its end value
    pub finished: bool,
}

/// A single running interpolation
#[derive(Debug, Clone, PartialEq)]
pub struct ValueAnimation {
    handle: AnimationHandle,
    from: f32,
    to: f32,
    started_at: Duration,
    delay: Duration,
    duration: Duration,
    interpolator: Interpolator,
    play_offset: Duration,
}

impl ValueAnimation {
    /// Start an animation at `started_at`
    pub fn new(
        handle: AnimationHandle,
        from: f32,
        to: f32,
        started_at: Duration,
        delay: Duration,
        duration: Duration,
        interpolator: Interpolator,
    ) -> Self {
        Self {
            handle,
            from,
            to,
            started_at,
            delay,
            duration,
            interpolator,
            play_offset: Duration::ZERO,
        }
    }

    /// Handle identifying this animation
    pub fn handle(&self) -> AnimationHandle {
        self.handle
    }

    /// Start value
    pub fn from(&self) -> f32 {
        self.from
    }

    /// End value
    pub fn to(&self) -> f32 {
        self.to
    }

    /// Total duration, excluding the delay
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Start delay
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Easing curve
    pub fn interpolator(&self) -> Interpolator {
        self.interpolator
    }

    /// Jump the play position forward, e.g. to skip a frame that was already
    /// rendered
    pub fn skip(&mut self, amount: Duration) {
        self.play_offset += amount;
    }

    /// Replace both keyframes while keeping the play position
    pub fn retarget(&mut self, from: f32, to: f32) {
        self.from = from;
        self.to = to;
    }

    /// Linear play fraction at `now`, or `None` during the start delay
    pub fn fraction_at(&self, now: Duration) -> Option<f32> {
        let elapsed = now.saturating_sub(self.started_at) + self.play_offset;
        if elapsed < self.delay {
            return None;
        }
        let played = elapsed - self.delay;
        if self.duration.is_zero() {
            return Some(1.0);
        }
        Some((played.as_secs_f32() / self.duration.as_secs_f32()).min(1.0))
    }

    /// Value at `now`, or `None` during the start delay
    pub fn value_at(&self, now: Duration) -> Option<f32> {
        self.fraction_at(now)
            .map(|f| self.from + (self.to - self.from) * self.interpolator.interpolate(f))
    }

    /// Advance to `now`
    pub fn step(&self, now: Duration) -> AnimationStep {
        match self.fraction_at(now) {
            Some(f) => AnimationStep {
                value: Some(self.from + (self.to - self.from) * self.interpolator.interpolate(f)),
                finished: f >= 1.0,
            },
            None => AnimationStep {
                value: None,
                finished: false,
            },
        }
    }
}
