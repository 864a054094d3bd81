//! Scrim alpha computation and animation
//!
//! Three overlays are driven from one flag vector: the scrim behind the
//! notification panel, the scrim in front of it, and the heads-up scrim.
//! Setters only record state and schedule an update; the recomputation runs
//! on the next [`ScrimAnimator::on_frame`], so several setter calls within a
//! frame collapse into one pass.

use std::collections::HashMap;
use std::f32::consts::PI;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::animation::{AnimationHandle, Interpolator, ValueAnimation};
use crate::clock::Clock;
use crate::config::{ScrimConfig, TimingConfig};
use crate::frame::FrameQueue;
use crate::shell::ScrimSurface;
use crate::types::Action;
use crate::unlock::UnlockMethodCache;

/// Scrim identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrimTarget {
    Behind,
    InFront,
    HeadsUp,
}

impl ScrimTarget {
    /// Animation advance order
    pub const ALL: [ScrimTarget; 3] = [
        ScrimTarget::Behind,
        ScrimTarget::InFront,
        ScrimTarget::HeadsUp,
    ];
}

/// In-flight animation of one scrim
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunningAnimation {
    pub handle: AnimationHandle,
    pub target_alpha: f32,
}

/// The overlays the animator draws into
#[derive(Clone)]
pub struct ScrimSurfaces {
    pub behind: Rc<dyn ScrimSurface>,
    pub in_front: Rc<dyn ScrimSurface>,
    pub heads_up: Rc<dyn ScrimSurface>,
}

impl ScrimSurfaces {
    fn get(&self, target: ScrimTarget) -> &Rc<dyn ScrimSurface> {
        match target {
            ScrimTarget::Behind => &self.behind,
            ScrimTarget::InFront => &self.in_front,
            ScrimTarget::HeadsUp => &self.heads_up,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScrimTask {
    Update,
}

/// Behind-scrim alpha for the shade pulled over unlocked content
pub fn normal_behind_alpha(panel_expansion: f32, behind_alpha: f32) -> f32 {
    // Starts 20% of the way down the screen
    let frac = panel_expansion * 1.2 - 0.2;
    if frac <= 0.0 {
        return 0.0;
    }
    let frac = frac.min(1.0);
    let k = 1.0 - 0.5 * (1.0 - (PI * (1.0 - frac).powi(2)).cos());
    k * behind_alpha
}

pub struct ScrimAnimator {
    surfaces: ScrimSurfaces,
    unlock: Rc<UnlockMethodCache>,
    clock: Rc<dyn Clock>,
    config: ScrimConfig,
    timing: TimingConfig,

    animations: HashMap<ScrimTarget, ValueAnimation>,
    next_handle: u64,
    tasks: FrameQueue<ScrimTask>,

    keyguard_showing: bool,
    bouncer_showing: bool,
    wake_and_unlocking: bool,
    dozing: bool,
    expanding: bool,
    darken_while_dragging: bool,
    force_hide_scrims: bool,
    skip_first_frame: bool,
    dont_animate_bouncer_changes: bool,
    animate_change: bool,
    animate_keyguard_fading_out: bool,
    backdrop_visible: bool,

    panel_expansion: f32,
    duration_override: Option<Duration>,
    animation_delay: Duration,
    on_animation_finished: Option<Action>,

    doze_in_front_alpha: f32,
    doze_behind_alpha: f32,
    current_in_front_alpha: f32,
    current_behind_alpha: f32,
    current_heads_up_alpha: f32,

    pinned_heads_up_count: usize,
    top_heads_up_drag_amount: f32,
    dragged_heads_up: Option<String>,
}

impl fmt::Debug for ScrimAnimator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScrimAnimator")
            .field("keyguard_showing", &self.keyguard_showing)
            .field("bouncer_showing", &self.bouncer_showing)
            .field("panel_expansion", &self.panel_expansion)
            .field("in_front", &self.current_in_front_alpha)
            .field("behind", &self.current_behind_alpha)
            .field("heads_up", &self.current_heads_up_alpha)
            .field("animations", &self.animations.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ScrimAnimator {
    pub fn new(
        surfaces: ScrimSurfaces,
        unlock: Rc<UnlockMethodCache>,
        clock: Rc<dyn Clock>,
        config: ScrimConfig,
        timing: TimingConfig,
    ) -> Self {
        let mut scrim = Self {
            surfaces,
            unlock,
            clock,
            config,
            timing,
            animations: HashMap::new(),
            next_handle: 1,
            tasks: FrameQueue::new(),
            keyguard_showing: false,
            bouncer_showing: false,
            wake_and_unlocking: false,
            dozing: false,
            expanding: false,
            darken_while_dragging: false,
            force_hide_scrims: false,
            skip_first_frame: false,
            dont_animate_bouncer_changes: false,
            animate_change: false,
            animate_keyguard_fading_out: false,
            backdrop_visible: false,
            panel_expansion: 0.0,
            duration_override: None,
            animation_delay: Duration::ZERO,
            on_animation_finished: None,
            doze_in_front_alpha: 0.0,
            doze_behind_alpha: 0.0,
            current_in_front_alpha: 0.0,
            current_behind_alpha: 0.0,
            current_heads_up_alpha: 1.0,
            pinned_heads_up_count: 0,
            top_heads_up_drag_amount: 0.0,
            dragged_heads_up: None,
        };
        scrim.update_heads_up_scrim(false);
        scrim
    }

    // State setters

    pub fn set_keyguard_showing(&mut self, showing: bool) {
        self.keyguard_showing = showing;
        self.schedule_update();
    }

    /// The user started dragging the panel
    pub fn on_tracking_started(&mut self) {
        self.expanding = true;
        self.darken_while_dragging = !self.unlock.can_skip_bouncer();
    }

    pub fn on_tracking_finished(&mut self) {
        self.expanding = false;
    }

    pub fn set_panel_expansion(&mut self, fraction: f32) {
        if self.panel_expansion == fraction {
            return;
        }
        self.panel_expansion = fraction;
        self.schedule_update();
        if self.pinned_heads_up_count != 0 {
            self.update_heads_up_scrim(false);
        }
    }

    pub fn set_bouncer_showing(&mut self, showing: bool) {
        self.bouncer_showing = showing;
        self.animate_change = !self.expanding && !self.dont_animate_bouncer_changes;
        self.schedule_update();
    }

    /// Cover everything with an opaque scrim until the fade-out reveals it
    pub fn set_wake_and_unlocking(&mut self) {
        self.wake_and_unlocking = true;
        self.schedule_update();
    }

    /// Fade both scrims out; `on_finished` runs exactly once, when the fade
    /// ends or is aborted
    pub fn animate_keyguard_fading_out(
        &mut self,
        delay: Duration,
        duration: Duration,
        on_finished: Option<Action>,
        skip_first_frame: bool,
    ) {
        if let Some(previous) = self.on_animation_finished.take() {
            debug!("Replacing pending fade-out completion; running it first");
            previous();
        }
        debug!(
            "Keyguard fading out: delay {:?}, duration {:?}, skip first frame {}",
            delay, duration, skip_first_frame
        );
        self.wake_and_unlocking = false;
        self.animate_keyguard_fading_out = true;
        self.duration_override = Some(duration);
        self.animation_delay = delay;
        self.animate_change = true;
        self.skip_first_frame = skip_first_frame;
        self.on_animation_finished = on_finished;
        self.schedule_update();
        // The update must start the fade now, not on the next frame
        self.run_update();
    }

    /// Abort the fade-out, running its completion if it has not run yet
    pub fn abort_keyguard_fading_out(&mut self) {
        if self.animate_keyguard_fading_out || self.on_animation_finished.is_some() {
            debug!("Keyguard fade-out aborted");
            self.end_animate_keyguard_fading_out(true);
        }
    }

    pub fn animate_going_to_full_shade(&mut self, delay: Duration, duration: Duration) {
        self.duration_override = Some(duration);
        self.animation_delay = delay;
        self.animate_change = true;
        self.schedule_update();
    }

    pub fn set_dozing(&mut self, dozing: bool) {
        if self.dozing != dozing {
            self.dozing = dozing;
            self.schedule_update();
        }
    }

    pub fn set_doze_front_alpha(&mut self, alpha: f32) {
        self.doze_in_front_alpha = alpha;
        self.update_scrim_color(ScrimTarget::InFront);
    }

    pub fn set_doze_behind_alpha(&mut self, alpha: f32) {
        self.doze_behind_alpha = alpha;
        self.update_scrim_color(ScrimTarget::Behind);
    }

    pub fn force_hide_scrims(&mut self, hide: bool) {
        self.force_hide_scrims = hide;
        self.animate_change = false;
        self.schedule_update();
    }

    /// Snap, rather than animate, bouncer changes until the next frame
    pub fn dont_animate_bouncer_changes_until_next_frame(&mut self) {
        self.dont_animate_bouncer_changes = true;
    }

    /// The behind scrim may draw in "src" mode only while no backdrop is
    /// visible
    pub fn set_backdrop_visible(&mut self, visible: bool) {
        self.backdrop_visible = visible;
        let as_src = !visible && self.config.scrim_src_enabled;
        self.surfaces.behind.set_draw_as_src(as_src);
    }

    // Heads-up notifications

    pub fn on_heads_up_pinned(&mut self, _key: &str) {
        self.pinned_heads_up_count += 1;
        self.update_heads_up_scrim(true);
    }

    pub fn on_heads_up_unpinned(&mut self, key: &str) {
        self.pinned_heads_up_count = self.pinned_heads_up_count.saturating_sub(1);
        if self.dragged_heads_up.as_deref() == Some(key) {
            self.dragged_heads_up = None;
            self.top_heads_up_drag_amount = 0.0;
        }
        self.update_heads_up_scrim(true);
    }

    pub fn set_top_heads_up_drag_amount(&mut self, key: Option<&str>, amount: f32) {
        self.top_heads_up_drag_amount = amount;
        self.dragged_heads_up = key.map(str::to_string);
        self.update_heads_up_scrim(false);
    }

    /// Heads-up scrim alpha for the current pin count, drag and expansion
    pub fn heads_up_alpha(&self) -> f32 {
        let alpha = match self.pinned_heads_up_count {
            0 => 0.0,
            1 => 1.0 - self.top_heads_up_drag_amount,
            _ => 1.0,
        };
        alpha * (1.0 - self.panel_expansion).max(0.0)
    }

    // Frame driving

    /// Advance animations, then run a pending update
    pub fn on_frame(&mut self) {
        let now = self.clock.uptime();
        for target in ScrimTarget::ALL {
            let step = match self.animations.get(&target) {
                Some(anim) => anim.step(now),
                None => continue,
            };
            if let Some(value) = step.value {
                self.set_current_alpha(target, value);
                self.update_scrim_color(target);
            }
            if step.finished {
                trace!("Scrim animation {:?} finished", target);
                self.animations.remove(&target);
                self.on_animation_end();
            }
        }

        if !self.tasks.drain_due(now).is_empty() {
            self.run_update();
        }
    }

    fn schedule_update(&mut self) {
        if self.tasks.post(ScrimTask::Update, self.clock.uptime()) {
            trace!("Scrim update scheduled");
        }
    }

    fn run_update(&mut self) {
        self.tasks.cancel(ScrimTask::Update);
        self.dont_animate_bouncer_changes = false;
        self.update_scrims();
        self.duration_override = None;
        self.animation_delay = Duration::ZERO;
        self.skip_first_frame = false;
        // Always report completion, even when no animation was started
        self.end_animate_keyguard_fading_out(false);
    }

    fn update_scrims(&mut self) {
        if self.animate_keyguard_fading_out || self.force_hide_scrims {
            self.set_in_front_target(0.0);
            self.set_behind_target(0.0);
        } else if self.wake_and_unlocking {
            if self.dozing {
                self.set_in_front_target(0.0);
                self.set_behind_target(1.0);
            } else {
                self.set_in_front_target(1.0);
                self.set_behind_target(0.0);
            }
        } else if !self.keyguard_showing && !self.bouncer_showing {
            let behind = normal_behind_alpha(self.panel_expansion, self.config.behind_alpha);
            self.set_behind_target(behind);
            self.set_in_front_target(0.0);
        } else {
            self.update_scrim_keyguard();
        }
        self.animate_change = false;
    }

    fn update_scrim_keyguard(&mut self) {
        let fraction = self.panel_expansion.clamp(0.0, 1.0);
        if self.expanding && self.darken_while_dragging {
            let front = (1.0 - fraction).powf(0.8);
            let behind = fraction.powf(0.8);
            self.set_in_front_target(front * self.config.in_front_alpha);
            self.set_behind_target(behind * self.config.behind_alpha_keyguard);
        } else if self.bouncer_showing {
            self.set_in_front_target(self.config.in_front_alpha);
            self.set_behind_target(0.0);
        } else {
            let floor = self.config.behind_alpha_unlocking;
            self.set_in_front_target(0.0);
            self.set_behind_target(fraction * (self.config.behind_alpha_keyguard - floor) + floor);
        }
    }

    fn set_behind_target(&mut self, alpha: f32) {
        self.set_scrim_target(ScrimTarget::Behind, alpha);
    }

    fn set_in_front_target(&mut self, alpha: f32) {
        self.set_scrim_target(ScrimTarget::InFront, alpha);
        let clickable = alpha != 0.0 && !self.dozing;
        self.surfaces.in_front.set_clickable(clickable);
    }

    fn set_scrim_target(&mut self, target: ScrimTarget, alpha: f32) {
        if let Some(running_to) = self.animations.get(&target).map(ValueAnimation::to) {
            if running_to == alpha {
                return;
            }
            self.cancel_animation(target);
        }
        if self.animate_change {
            self.start_animation(target, alpha);
        } else {
            self.set_current_alpha(target, alpha);
            self.update_scrim_color(target);
        }
    }

    fn start_animation(&mut self, target: ScrimTarget, alpha: f32) {
        let handle = AnimationHandle(self.next_handle);
        self.next_handle += 1;
        let interpolator = if self.animate_keyguard_fading_out {
            Interpolator::KeyguardFadeOut
        } else {
            Interpolator::Decelerate
        };
        let mut anim = ValueAnimation::new(
            handle,
            self.current_alpha(target),
            alpha,
            self.clock.uptime(),
            self.animation_delay,
            self.duration_override
                .unwrap_or_else(|| self.timing.scrim_animation()),
            interpolator,
        );
        if self.skip_first_frame {
            anim.skip(self.timing.skip_first_frame());
        }
        trace!(
            "Scrim animation {:?} {:?}: {} -> {}",
            handle,
            target,
            anim.from(),
            alpha
        );
        self.animations.insert(target, anim);
    }

    fn cancel_animation(&mut self, target: ScrimTarget) {
        if self.animations.remove(&target).is_some() {
            trace!("Scrim animation {:?} cancelled", target);
            self.on_animation_end();
        }
    }

    /// Shared bookkeeping for finished and cancelled animations
    fn on_animation_end(&mut self) {
        if !self.animate_keyguard_fading_out {
            self.finish_fade_if_idle();
        }
    }

    fn end_animate_keyguard_fading_out(&mut self, force: bool) {
        self.animate_keyguard_fading_out = false;
        if force {
            if let Some(done) = self.on_animation_finished.take() {
                done();
            }
        } else {
            self.finish_fade_if_idle();
        }
    }

    fn finish_fade_if_idle(&mut self) {
        if self.is_animating(ScrimTarget::InFront) || self.is_animating(ScrimTarget::Behind) {
            return;
        }
        if let Some(done) = self.on_animation_finished.take() {
            debug!("Keyguard fade-out finished");
            done();
        }
    }

    fn update_heads_up_scrim(&mut self, animate: bool) {
        let alpha = self.heads_up_alpha();
        let mut anim_end = None;
        if let Some(running_to) = self.animations.get(&ScrimTarget::HeadsUp).map(ValueAnimation::to) {
            if animate || alpha == self.current_heads_up_alpha {
                self.cancel_animation(ScrimTarget::HeadsUp);
            } else {
                anim_end = Some(running_to);
            }
        }
        if alpha == self.current_heads_up_alpha || Some(alpha) == anim_end {
            return;
        }

        if animate {
            self.start_animation(ScrimTarget::HeadsUp, alpha);
        } else if let Some(end) = anim_end {
            // Shift the running animation so it ends at the new value
            // without jumping
            let now = self.clock.uptime();
            let value = self.animations.get_mut(&ScrimTarget::HeadsUp).and_then(|anim| {
                let from = anim.from() + (alpha - end);
                anim.retarget(from, alpha);
                anim.value_at(now)
            });
            if let Some(value) = value {
                self.set_current_alpha(ScrimTarget::HeadsUp, value);
                self.update_scrim_color(ScrimTarget::HeadsUp);
            }
        } else {
            self.set_current_alpha(ScrimTarget::HeadsUp, alpha);
            self.update_scrim_color(ScrimTarget::HeadsUp);
        }
    }

    fn current_alpha(&self, target: ScrimTarget) -> f32 {
        match target {
            ScrimTarget::Behind => self.current_behind_alpha,
            ScrimTarget::InFront => self.current_in_front_alpha,
            ScrimTarget::HeadsUp => self.current_heads_up_alpha,
        }
    }

    fn set_current_alpha(&mut self, target: ScrimTarget, alpha: f32) {
        match target {
            ScrimTarget::Behind => self.current_behind_alpha = alpha,
            ScrimTarget::InFront => self.current_in_front_alpha = alpha,
            ScrimTarget::HeadsUp => self.current_heads_up_alpha = alpha.clamp(0.0, 1.0),
        }
    }

    fn update_scrim_color(&self, target: ScrimTarget) {
        self.surfaces.get(target).set_alpha(self.composited_alpha(target));
    }

    // Accessors

    /// Alpha as drawn: the base alpha blended with the doze floor
    pub fn composited_alpha(&self, target: ScrimTarget) -> f32 {
        let base = self.current_alpha(target);
        let doze = match target {
            ScrimTarget::Behind => self.doze_behind_alpha,
            ScrimTarget::InFront => self.doze_in_front_alpha,
            ScrimTarget::HeadsUp => return base,
        };
        1.0 - (1.0 - base) * (1.0 - doze)
    }

    pub fn current_behind_alpha(&self) -> f32 {
        self.current_behind_alpha
    }

    pub fn current_in_front_alpha(&self) -> f32 {
        self.current_in_front_alpha
    }

    pub fn current_heads_up_alpha(&self) -> f32 {
        self.current_heads_up_alpha
    }

    pub fn doze_behind_alpha(&self) -> f32 {
        self.doze_behind_alpha
    }

    pub fn doze_front_alpha(&self) -> f32 {
        self.doze_in_front_alpha
    }

    pub fn panel_expansion(&self) -> f32 {
        self.panel_expansion
    }

    pub fn pinned_heads_up_count(&self) -> usize {
        self.pinned_heads_up_count
    }

    pub fn is_animating(&self, target: ScrimTarget) -> bool {
        self.animations.contains_key(&target)
    }

    pub fn running_animation(&self, target: ScrimTarget) -> Option<RunningAnimation> {
        self.animations.get(&target).map(|anim| RunningAnimation {
            handle: anim.handle(),
            target_alpha: anim.to(),
        })
    }

    pub fn is_update_pending(&self) -> bool {
        self.tasks.is_pending(ScrimTask::Update)
    }

    /// A fade-out completion has not run yet
    pub fn is_keyguard_fading_out(&self) -> bool {
        self.on_animation_finished.is_some()
    }

    pub fn is_keyguard_showing(&self) -> bool {
        self.keyguard_showing
    }

    pub fn is_bouncer_showing(&self) -> bool {
        self.bouncer_showing
    }

    pub fn is_dozing(&self) -> bool {
        self.dozing
    }

    pub fn is_backdrop_visible(&self) -> bool {
        self.backdrop_visible
    }
}
