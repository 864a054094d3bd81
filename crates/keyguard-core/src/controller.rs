//! Presentation controller
//!
//! Top-level state machine for the lock screen. It owns the bouncer and the
//! scrim animator, reacts to power and lifecycle events, and drives the
//! shell collaborators. Every transition ends in [`PresentationController::update_states`],
//! a diff of the previous and current [`StateSnapshot`] that only emits side
//! effects for values that actually changed.

use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, trace};

use crate::bouncer::BouncerPresenter;
use crate::clock::Clock;
use crate::config::TimingConfig;
use crate::frame::FrameQueue;
use crate::scrim::ScrimAnimator;
use crate::shell::Shell;
use crate::types::{Action, KeyEvent, UnlockMode, UserId};

/// Controller flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct PresentationState {
    /// The lock screen is requested to be visible
    pub showing: bool,
    /// A foreground surface covers the lock screen
    pub occluded: bool,
    /// Cached from the last state update
    pub bouncer_showing: bool,
    /// Cached from the last state update
    pub bouncer_dismissible: bool,
    pub device_interactive: bool,
    pub device_will_wake_up: bool,
    pub screen_turned_on: bool,
    /// The wake-and-unlock fade waits for the screen to turn on
    pub defer_scrim_fade_out: bool,
}

/// Coarse state derived from the flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PresentationPhase {
    Hidden,
    ShowingUnoccluded,
    BouncerShowing,
    ShowingOccluded,
    FadingAway,
}

/// Values compared between two state updates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StateSnapshot {
    pub showing: bool,
    pub occluded: bool,
    pub bouncer_showing: bool,
    pub bouncer_dismissible: bool,
}

impl StateSnapshot {
    fn back_enabled(&self) -> bool {
        self.bouncer_dismissible || !self.showing
    }

    fn nav_bar_visible(&self) -> bool {
        !(self.showing && !self.occluded) || self.bouncer_showing
    }

    fn keyguard_visible(&self) -> bool {
        self.showing && !self.occluded
    }
}

/// Side effects required to move from one snapshot to the next.
/// `None` means unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StateUpdate {
    pub back_disabled: Option<bool>,
    pub nav_bar_visible: Option<bool>,
    pub bouncer_showing: Option<bool>,
    pub keyguard_visible: Option<bool>,
}

impl StateUpdate {
    /// Diff two snapshots; with no previous snapshot every value is emitted
    pub fn diff(prev: Option<&StateSnapshot>, cur: &StateSnapshot) -> Self {
        fn changed<T: PartialEq + Copy>(prev: Option<T>, cur: T) -> Option<T> {
            match prev {
                Some(p) if p == cur => None,
                _ => Some(cur),
            }
        }

        Self {
            back_disabled: changed(prev.map(|p| p.back_enabled()), cur.back_enabled()).map(|e| !e),
            nav_bar_visible: changed(prev.map(StateSnapshot::nav_bar_visible), cur.nav_bar_visible()),
            bouncer_showing: changed(prev.map(|p| p.bouncer_showing), cur.bouncer_showing),
            keyguard_visible: changed(prev.map(StateSnapshot::keyguard_visible), cur.keyguard_visible()),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Launch transition step waiting for the shell's callbacks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LaunchStep {
    /// Occlusion requested during the launch
    Occlude,
    /// Hide requested during the launch; nothing applied yet
    Hide,
    /// Hide fade started; waiting for the launch to finish fading
    HideFading,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ControllerTask {
    ShowNavigationBar,
}

pub struct PresentationController {
    shell: Shell,
    bouncer: BouncerPresenter,
    scrim: ScrimAnimator,
    clock: Rc<dyn Clock>,
    timing: TimingConfig,
    state: PresentationState,
    last: Option<StateSnapshot>,
    after_gone_action: Option<Action>,
    launch: Option<LaunchStep>,
    tasks: FrameQueue<ControllerTask>,
}

impl fmt::Debug for PresentationController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PresentationController")
            .field("state", &self.state)
            .field("launch", &self.launch)
            .field("bouncer", &self.bouncer)
            .field("scrim", &self.scrim)
            .finish()
    }
}

impl PresentationController {
    pub fn new(
        shell: Shell,
        bouncer: BouncerPresenter,
        scrim: ScrimAnimator,
        clock: Rc<dyn Clock>,
        timing: TimingConfig,
    ) -> Self {
        Self {
            shell,
            bouncer,
            scrim,
            clock,
            timing,
            state: PresentationState::default(),
            last: None,
            after_gone_action: None,
            launch: None,
            tasks: FrameQueue::new(),
        }
    }

    /// Show the lock screen
    pub fn show(&mut self) {
        debug!("Showing keyguard");
        self.state.showing = true;
        self.state.defer_scrim_fade_out = false;
        match self.launch {
            Some(LaunchStep::Hide) => self.launch = None,
            Some(LaunchStep::HideFading) => {
                // The launch fade has no completion to clear the window flag
                self.launch = None;
                self.shell.window.set_keyguard_fading_away(false);
            }
            Some(LaunchStep::Occlude) | None => {}
        }
        self.shell.window.set_keyguard_showing(true);
        self.scrim.abort_keyguard_fading_out();
        self.reset();
    }

    /// Re-derive what the lock screen shows from the current flags
    pub fn reset(&mut self) {
        if self.state.showing {
            if self.state.occluded {
                self.hide_keyguard_content();
                self.shell.status_bar.stop_waiting_for_keyguard_exit();
                self.bouncer.hide(false);
            } else {
                self.show_bouncer_or_keyguard();
            }
            self.shell.state_sink.on_keyguard_reset();
        }
        self.update_states();
    }

    fn show_bouncer_or_keyguard(&mut self) {
        if self.bouncer.needs_fullscreen_bouncer() {
            // The lock content may already be showing
            self.hide_keyguard_content();
            self.bouncer.show(true);
        } else {
            self.show_keyguard_content();
            self.bouncer.hide(false);
            self.bouncer.prepare();
        }
    }

    fn show_keyguard_content(&mut self) {
        self.shell.status_bar.show_keyguard();
        self.scrim.set_keyguard_showing(true);
    }

    fn hide_keyguard_content(&mut self) -> bool {
        let staying = self.shell.status_bar.hide_keyguard();
        self.scrim.set_keyguard_showing(false);
        staying
    }

    fn show_bouncer(&mut self) {
        if self.state.showing {
            self.bouncer.show(false);
        }
        self.update_states();
    }

    /// Show the bouncer if the device is or is about to be interactive
    pub fn dismiss(&mut self) {
        if self.state.device_interactive || self.state.device_will_wake_up {
            self.show_bouncer();
        }
    }

    /// Show the bouncer with an action to run after authentication.
    ///
    /// With `after_keyguard_gone` the action runs once the keyguard is fully
    /// gone instead of on dismissal.
    pub fn dismiss_with_action(
        &mut self,
        action: Action,
        cancel: Option<Action>,
        after_keyguard_gone: bool,
    ) {
        if self.state.showing {
            if after_keyguard_gone {
                self.bouncer.show(false);
                self.after_gone_action = Some(action);
            } else {
                self.bouncer.show_with_dismiss_action(action, cancel);
            }
        }
        self.update_states();
    }

    pub fn verify_unlock(&mut self) {
        self.dismiss();
    }

    pub fn set_occluded(&mut self, occluded: bool) {
        if occluded && !self.state.occluded && self.state.showing {
            if self.launch == Some(LaunchStep::Occlude) {
                return;
            }
            if self.shell.status_bar.is_in_launch_transition() {
                debug!("Deferring occlusion until the launch transition fades");
                self.launch = Some(LaunchStep::Occlude);
                self.shell.status_bar.fade_keyguard_after_launch_transition(true);
                return;
            }
        }
        if !occluded && self.launch == Some(LaunchStep::Occlude) {
            self.launch = None;
        }
        self.state.occluded = occluded;
        self.shell.window.set_keyguard_occluded(occluded);
        self.reset();
    }

    fn apply_deferred_occlusion(&mut self) {
        debug!("Applying deferred occlusion");
        self.state.occluded = true;
        self.shell.window.set_keyguard_occluded(true);
        self.reset();
    }

    /// Hide the lock screen.
    ///
    /// `start_time` is when the window manager starts its unlock animation,
    /// on the controller's clock. The scrim fade starts slightly earlier.
    pub fn hide(&mut self, start_time: Duration, fadeout_duration: Duration) {
        self.state.showing = false;
        self.state.bouncer_showing = false;
        if self.launch == Some(LaunchStep::Occlude) {
            self.launch = None;
        }
        let now = self.clock.uptime();
        let delay = start_time.saturating_sub(now + self.timing.hide_timing_correction());

        if self.shell.status_bar.is_in_launch_transition() {
            self.hide_after_launch_transition();
            return;
        }

        if self.shell.fingerprint.mode() == UnlockMode::WakeAndUnlockPulsing {
            self.hide_while_pulsing(start_time);
        } else {
            self.hide_standard(start_time, delay, fadeout_duration);
        }
        self.shell.window.set_keyguard_showing(false);
        self.bouncer.hide(true);
        self.shell.mediator.keyguard_gone();
        self.run_after_gone_action();
        self.update_states();
    }

    /// Wait for the launch transition; the shell reports back through
    /// [`Self::on_launch_transition_before_fading`] and
    /// [`Self::on_launch_transition_faded`]
    fn hide_after_launch_transition(&mut self) {
        debug!("Hiding keyguard after launch transition");
        self.launch = Some(LaunchStep::Hide);
        self.shell.status_bar.fade_keyguard_after_launch_transition(true);
    }

    fn hide_while_pulsing(&mut self, start_time: Duration) {
        let duration = self.timing.pulsing_fade_out();
        debug!("Hiding keyguard while pulsing over {:?}", duration);
        self.shell.fingerprint.start_keyguard_fading_away();
        self.shell
            .status_bar
            .set_keyguard_fading_away(start_time, Duration::ZERO, duration);
        self.shell.window.set_keyguard_fading_away(true);
        self.shell.status_bar.fade_keyguard_while_pulsing();
        self.scrim.set_keyguard_showing(false);

        let status_bar = Rc::clone(&self.shell.status_bar);
        self.animate_scrim_fading_out(
            Duration::ZERO,
            duration,
            Some(Box::new(move || {
                status_bar.hide_keyguard();
            })),
            false,
        );
    }

    fn hide_standard(&mut self, start_time: Duration, delay: Duration, duration: Duration) {
        self.shell.fingerprint.start_keyguard_fading_away();
        self.shell
            .status_bar
            .set_keyguard_fading_away(start_time, delay, duration);

        let staying = self.hide_keyguard_content();
        if staying {
            debug!("Keyguard hidden into the full shade");
            self.scrim.animate_going_to_full_shade(delay, duration);
            self.shell.status_bar.finish_keyguard_fading_away();
            return;
        }

        self.shell.window.set_keyguard_fading_away(true);
        if self.shell.fingerprint.mode() == UnlockMode::WakeAndUnlock {
            if self.state.screen_turned_on {
                debug!("Wake and unlock with the screen on");
                self.animate_scrim_fading_out(
                    Duration::ZERO,
                    self.timing.wake_and_unlock_fade_out(),
                    None,
                    true,
                );
            } else {
                debug!("Deferring scrim fade-out until the screen turns on");
                self.state.defer_scrim_fade_out = true;
            }
        } else {
            debug!("Hiding keyguard: delay {:?}, duration {:?}", delay, duration);
            self.animate_scrim_fading_out(delay, duration, None, false);
        }
    }

    fn animate_scrim_fading_out(
        &mut self,
        delay: Duration,
        duration: Duration,
        end: Option<Action>,
        skip_first_frame: bool,
    ) {
        let window = Rc::clone(&self.shell.window);
        let status_bar = Rc::clone(&self.shell.status_bar);
        let fingerprint = Rc::clone(&self.shell.fingerprint);
        self.scrim.animate_keyguard_fading_out(
            delay,
            duration,
            Some(Box::new(move || {
                if let Some(end) = end {
                    end();
                }
                window.set_keyguard_fading_away(false);
                status_bar.finish_keyguard_fading_away();
                fingerprint.finish_keyguard_fading_away();
                window.trim_memory();
            })),
            skip_first_frame,
        );
    }

    fn run_after_gone_action(&mut self) {
        if let Some(action) = self.after_gone_action.take() {
            debug!("Running after-keyguard-gone action");
            action();
        }
    }

    /// The launch transition is about to fade the keyguard
    pub fn on_launch_transition_before_fading(&mut self) {
        match self.launch {
            Some(LaunchStep::Occlude) => {
                self.launch = None;
                self.apply_deferred_occlusion();
            }
            Some(LaunchStep::Hide) => {
                self.launch = Some(LaunchStep::HideFading);
                self.start_launch_fade();
            }
            Some(LaunchStep::HideFading) | None => {
                trace!("No launch step waiting for the pre-fade callback");
            }
        }
    }

    /// The launch transition finished fading the keyguard
    pub fn on_launch_transition_faded(&mut self) {
        match self.launch.take() {
            Some(LaunchStep::Occlude) => self.apply_deferred_occlusion(),
            Some(LaunchStep::Hide) => {
                self.start_launch_fade();
                self.finish_launch_hide();
            }
            Some(LaunchStep::HideFading) => self.finish_launch_hide(),
            None => trace!("No launch step waiting for the fade callback"),
        }
    }

    fn start_launch_fade(&mut self) {
        self.shell.window.set_keyguard_showing(false);
        self.shell.window.set_keyguard_fading_away(true);
        self.bouncer.hide(true);
        self.update_states();
        self.scrim.animate_keyguard_fading_out(
            self.timing.launch_fade_start_delay(),
            self.timing.launch_fade_duration(),
            None,
            false,
        );
    }

    fn finish_launch_hide(&mut self) {
        self.hide_keyguard_content();
        self.shell.window.set_keyguard_fading_away(false);
        self.shell.mediator.keyguard_gone();
        self.run_after_gone_action();
    }

    /// Run the bouncer's disappear animation, or `on_finished` right away if
    /// the bouncer is not showing
    pub fn start_pre_hide_animation(&mut self, on_finished: Option<Action>) {
        if self.bouncer.is_showing() {
            self.bouncer.start_pre_hide_animation(on_finished);
        } else if let Some(action) = on_finished {
            action();
        }
    }

    // Power and screen events

    pub fn on_started_going_to_sleep(&mut self) {
        self.shell.status_bar.on_started_going_to_sleep();
    }

    pub fn on_finished_going_to_sleep(&mut self) {
        self.state.device_interactive = false;
        self.shell.status_bar.on_finished_going_to_sleep();
        self.bouncer.on_screen_turned_off();
    }

    pub fn on_started_waking_up(&mut self) {
        self.state.device_interactive = true;
        self.state.device_will_wake_up = false;
        self.shell.status_bar.on_started_waking_up();
    }

    pub fn on_screen_turning_on(&mut self) {
        self.shell.status_bar.on_screen_turning_on();
    }

    pub fn on_screen_turned_on(&mut self) {
        self.state.screen_turned_on = true;
        if self.state.defer_scrim_fade_out {
            self.state.defer_scrim_fade_out = false;
            debug!("Screen on; running deferred scrim fade-out");
            self.animate_scrim_fading_out(
                Duration::ZERO,
                self.timing.wake_and_unlock_fade_out(),
                None,
                true,
            );
            self.update_states();
        }
        self.shell.status_bar.on_screen_turned_on();
    }

    pub fn on_screen_turned_off(&mut self) {
        self.state.screen_turned_on = false;
    }

    pub fn notify_device_wake_up_requested(&mut self) {
        self.state.device_will_wake_up = !self.state.device_interactive;
    }

    // Input

    /// Back closes a showing bouncer
    pub fn on_back_pressed(&mut self) -> bool {
        if !self.bouncer.is_showing() {
            return false;
        }
        self.shell.status_bar.end_affordance_launch();
        self.reset();
        true
    }

    pub fn on_menu_pressed(&mut self) -> bool {
        if !self.state.showing {
            return false;
        }
        let consumed = self.bouncer.on_menu_pressed();
        if consumed {
            self.update_states();
        }
        consumed
    }

    pub fn intercept_media_key(&mut self, event: &KeyEvent) -> bool {
        self.bouncer.intercept_media_key(event)
    }

    // Shell passthroughs

    pub fn set_needs_input(&mut self, needs_input: bool) {
        self.shell.window.set_keyguard_needs_input(needs_input);
    }

    /// The app behind the keyguard drew; wait for the panel collapse first
    pub fn on_activity_drawn(&mut self) {
        let mediator = Rc::clone(&self.shell.mediator);
        if self.shell.status_bar.is_collapsing() {
            self.shell
                .status_bar
                .add_post_collapse_action(Box::new(move || mediator.ready_for_keyguard_done()));
        } else {
            mediator.ready_for_keyguard_done();
        }
    }

    pub fn should_disable_window_animations_for_unlock(&self) -> bool {
        self.shell.status_bar.is_in_launch_transition()
    }

    pub fn is_going_to_notification_shade(&self) -> bool {
        self.shell.status_bar.is_going_to_notification_shade()
    }

    pub fn is_input_restricted(&self) -> bool {
        self.shell.mediator.is_input_restricted()
    }

    pub fn keyguard_going_away(&mut self) {
        self.shell.status_bar.keyguard_going_away();
    }

    pub fn animate_collapse_panels(&mut self, speed_up_factor: f32) {
        self.shell.status_bar.animate_collapse_panels(speed_up_factor);
    }

    pub fn notify_keyguard_authenticated(&mut self, strong_auth: bool) {
        self.bouncer.notify_keyguard_authenticated(strong_auth);
    }

    pub fn show_bouncer_message(&mut self, message: &str, color: u32) {
        self.bouncer.show_message(message, color);
    }

    pub fn on_strong_auth_state_changed(&mut self) {
        self.bouncer.on_strong_auth_state_changed();
    }

    // State

    fn nav_bar_show_delay(&self) -> Duration {
        if self.shell.status_bar.is_keyguard_fading_away() {
            self.shell.status_bar.keyguard_fading_away_delay()
        } else {
            // Not going away, so the bar shows because the bouncer appears
            self.timing.nav_bar_show_delay_bouncer()
        }
    }

    fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            showing: self.state.showing,
            occluded: self.state.occluded,
            bouncer_showing: self.state.showing && self.bouncer.is_showing(),
            bouncer_dismissible: !self.bouncer.is_fullscreen_bouncer(),
        }
    }

    /// Push changed derived state to the collaborators
    pub fn update_states(&mut self) {
        let snapshot = self.snapshot();
        let update = StateUpdate::diff(self.last.as_ref(), &snapshot);
        if !update.is_empty() {
            trace!("State update {:?}", update);
        }

        if let Some(disabled) = update.back_disabled {
            self.shell.window.set_back_disabled(disabled);
        }

        if let Some(visible) = update.nav_bar_visible {
            if self.shell.status_bar.has_navigation_bar() {
                if visible {
                    let delay = self.nav_bar_show_delay();
                    if delay.is_zero() {
                        self.shell.status_bar.set_navigation_bar_visible(true);
                    } else {
                        let due = self.clock.uptime() + delay;
                        self.tasks.post_delayed(ControllerTask::ShowNavigationBar, due);
                    }
                } else {
                    self.tasks.cancel(ControllerTask::ShowNavigationBar);
                    self.shell.status_bar.set_navigation_bar_visible(false);
                }
            }
        }

        if let Some(showing) = update.bouncer_showing {
            self.shell.window.set_bouncer_showing(showing);
            self.shell.status_bar.set_bouncer_showing(showing);
            self.scrim.set_bouncer_showing(showing);
        }

        if let Some(visible) = update.keyguard_visible {
            self.shell.state_sink.on_keyguard_visibility_changed(visible);
        }

        if let Some(showing) = update.bouncer_showing {
            self.shell.state_sink.on_keyguard_bouncer_changed(showing);
        }

        self.state.bouncer_showing = snapshot.bouncer_showing;
        self.state.bouncer_dismissible = snapshot.bouncer_dismissible;
        self.last = Some(snapshot);
        self.shell.status_bar.on_keyguard_states_updated();
    }

    /// Run one rendering pass: delayed controller work, the bouncer's
    /// deferred show, then scrim animations and updates
    pub fn on_frame(&mut self) {
        for task in self.tasks.drain_due(self.clock.uptime()) {
            match task {
                ControllerTask::ShowNavigationBar => {
                    self.shell.status_bar.set_navigation_bar_visible(true)
                }
            }
        }
        self.bouncer.on_frame();
        self.scrim.on_frame();
    }

    // Accessors

    pub fn state(&self) -> PresentationState {
        self.state
    }

    pub fn phase(&self) -> PresentationPhase {
        if !self.state.showing {
            let fading = self.scrim.is_keyguard_fading_out()
                || self.state.defer_scrim_fade_out
                || self.launch.is_some();
            if fading {
                PresentationPhase::FadingAway
            } else {
                PresentationPhase::Hidden
            }
        } else if self.state.occluded {
            PresentationPhase::ShowingOccluded
        } else if self.state.bouncer_showing {
            PresentationPhase::BouncerShowing
        } else {
            PresentationPhase::ShowingUnoccluded
        }
    }

    pub fn pending_launch_step(&self) -> Option<LaunchStep> {
        self.launch
    }

    pub fn has_after_gone_action(&self) -> bool {
        self.after_gone_action.is_some()
    }

    pub fn is_showing(&self) -> bool {
        self.state.showing
    }

    pub fn is_occluded(&self) -> bool {
        self.state.occluded
    }

    pub fn is_screen_turned_on(&self) -> bool {
        self.state.screen_turned_on
    }

    pub fn is_bouncer_showing(&self) -> bool {
        self.bouncer.is_showing()
    }

    /// Whether a credential is required; see [`BouncerPresenter::is_secure`]
    pub fn is_secure(&self) -> bool {
        self.bouncer.is_secure()
    }

    pub fn is_secure_for_user(&self, user: UserId) -> bool {
        self.bouncer.is_secure() || self.shell.trust.is_secure(user)
    }

    pub fn bouncer(&self) -> &BouncerPresenter {
        &self.bouncer
    }

    pub fn bouncer_mut(&mut self) -> &mut BouncerPresenter {
        &mut self.bouncer
    }

    pub fn scrim(&self) -> &ScrimAnimator {
        &self.scrim
    }

    pub fn scrim_mut(&mut self) -> &mut ScrimAnimator {
        &mut self.scrim
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KeyguardConfig;
    use crate::mock::MockRig;
    use crate::types::SecurityMode;
    use std::cell::Cell;

    fn rig() -> MockRig {
        let rig = MockRig::new(&KeyguardConfig::default());
        rig.widgets.state.borrow_mut().security_mode = SecurityMode::Pin;
        rig
    }

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    fn snapshot(showing: bool, occluded: bool, bouncer: bool, dismissible: bool) -> StateSnapshot {
        StateSnapshot {
            showing,
            occluded,
            bouncer_showing: bouncer,
            bouncer_dismissible: dismissible,
        }
    }

    #[test]
    fn test_first_diff_emits_everything() {
        let update = StateUpdate::diff(None, &snapshot(true, false, false, true));
        assert_eq!(update.back_disabled, Some(false));
        assert_eq!(update.nav_bar_visible, Some(false));
        assert_eq!(update.bouncer_showing, Some(false));
        assert_eq!(update.keyguard_visible, Some(true));
    }

    #[test]
    fn test_diff_only_reports_changes() {
        let prev = snapshot(true, false, false, true);
        assert!(StateUpdate::diff(Some(&prev), &prev).is_empty());

        let update = StateUpdate::diff(Some(&prev), &snapshot(true, false, true, false));
        assert_eq!(update.back_disabled, Some(true));
        assert_eq!(update.nav_bar_visible, Some(true));
        assert_eq!(update.bouncer_showing, Some(true));
        assert_eq!(update.keyguard_visible, None);
    }

    #[test]
    fn test_show_displays_lock_content() {
        let mut rig = rig();
        rig.controller.show();

        assert!(rig.controller.is_showing());
        assert_eq!(rig.controller.phase(), PresentationPhase::ShowingUnoccluded);
        assert!(rig.shell.has("window.set_keyguard_showing(true)"));
        assert!(rig.shell.has("status_bar.show_keyguard"));
        assert!(rig.shell.has("sink.on_keyguard_reset"));
        assert!(rig.shell.has("status_bar.set_navigation_bar_visible(false)"));
        assert!(rig.shell.has("sink.on_keyguard_visibility_changed(true)"));
        assert!(!rig.controller.is_bouncer_showing());
        assert!(rig.controller.scrim().is_keyguard_showing());
    }

    #[test]
    fn test_show_twice_is_idempotent() {
        let mut rig = rig();
        rig.controller.show();
        let state = rig.controller.state();
        rig.shell.clear_calls();

        rig.controller.show();
        assert_eq!(rig.controller.state(), state);
        assert_eq!(rig.shell.count("status_bar.set_navigation_bar_visible(false)"), 0);
        assert_eq!(rig.shell.count("window.set_back_disabled(false)"), 0);
        assert_eq!(rig.shell.count("sink.on_keyguard_visibility_changed(true)"), 0);
    }

    #[test]
    fn test_dismiss_requires_interactive_device() {
        let mut rig = rig();
        rig.controller.show();
        rig.controller.dismiss();
        assert!(!rig.controller.is_bouncer_showing());

        rig.controller.notify_device_wake_up_requested();
        rig.controller.dismiss();
        assert!(rig.controller.is_bouncer_showing());
        assert_eq!(rig.controller.phase(), PresentationPhase::BouncerShowing);
        assert!(rig.shell.has("window.set_bouncer_showing(true)"));
        assert!(rig.shell.has("sink.on_keyguard_bouncer_changed(true)"));
    }

    #[test]
    fn test_bouncer_delays_navigation_bar() {
        let mut rig = rig();
        rig.controller.show();
        rig.controller.on_started_waking_up();
        rig.controller.dismiss();

        rig.controller.on_frame();
        assert_eq!(rig.shell.navigation_bar_visible.get(), Some(false));
        assert!(rig.controller.bouncer().state().visible);

        rig.run_for(ms(320));
        assert_eq!(rig.shell.navigation_bar_visible.get(), Some(true));
    }

    #[test]
    fn test_fullscreen_bouncer_replaces_lock_content() {
        let mut rig = rig();
        rig.widgets.state.borrow_mut().security_mode = SecurityMode::SimPuk;
        rig.controller.show();

        assert!(rig.shell.has("status_bar.hide_keyguard"));
        assert!(!rig.shell.has("status_bar.show_keyguard"));
        assert!(rig.controller.is_bouncer_showing());
        assert!(rig.shell.has("window.set_back_disabled(true)"));
        assert!(!rig.controller.state().bouncer_dismissible);
    }

    #[test]
    fn test_occluded_hides_lock_content() {
        let mut rig = rig();
        rig.controller.show();
        rig.shell.clear_calls();

        rig.controller.set_occluded(true);
        assert_eq!(rig.controller.phase(), PresentationPhase::ShowingOccluded);
        assert!(rig.shell.has("window.set_keyguard_occluded(true)"));
        assert!(rig.shell.has("status_bar.hide_keyguard"));
        assert!(rig.shell.has("status_bar.stop_waiting_for_keyguard_exit"));
        assert!(rig.shell.has("sink.on_keyguard_visibility_changed(false)"));

        rig.controller.set_occluded(false);
        assert_eq!(rig.controller.phase(), PresentationPhase::ShowingUnoccluded);
    }

    #[test]
    fn test_occlusion_waits_for_launch_transition() {
        let mut rig = rig();
        rig.shell.in_launch_transition.set(true);
        rig.controller.show();

        rig.controller.set_occluded(true);
        assert!(!rig.controller.is_occluded());
        assert_eq!(rig.controller.pending_launch_step(), Some(LaunchStep::Occlude));
        assert!(rig.shell.has("status_bar.fade_keyguard_after_launch_transition(true)"));
        assert!(!rig.shell.has("window.set_keyguard_occluded(true)"));

        rig.controller.on_launch_transition_before_fading();
        assert!(rig.controller.is_occluded());
        assert_eq!(rig.shell.count("window.set_keyguard_occluded(true)"), 1);

        rig.controller.on_launch_transition_faded();
        assert_eq!(rig.shell.count("window.set_keyguard_occluded(true)"), 1);
        assert_eq!(rig.controller.pending_launch_step(), None);
    }

    #[test]
    fn test_deferred_occlusion_flips_navigation_bar_once() {
        let mut rig = rig();
        rig.controller.show();
        rig.shell.in_launch_transition.set(true);
        rig.shell.clear_calls();

        rig.controller.set_occluded(true);
        rig.controller.on_launch_transition_before_fading();
        rig.controller.on_launch_transition_faded();
        rig.run_for(ms(1000));

        assert_eq!(rig.shell.count("status_bar.set_navigation_bar_visible(true)"), 1);
        assert_eq!(rig.shell.count("status_bar.set_navigation_bar_visible(false)"), 0);
    }

    #[test]
    fn test_show_during_launch_fade_clears_fading_away() {
        let mut rig = rig();
        rig.controller.show();
        rig.shell.in_launch_transition.set(true);
        let now = rig.now();
        rig.controller.hide(now, ms(300));
        rig.controller.on_launch_transition_before_fading();
        assert_eq!(rig.controller.pending_launch_step(), Some(LaunchStep::HideFading));
        assert_eq!(rig.shell.count("window.set_keyguard_fading_away(true)"), 1);

        rig.controller.show();
        rig.controller.on_launch_transition_faded();
        rig.shell.in_launch_transition.set(false);
        rig.run_for(ms(1000));

        assert_eq!(rig.shell.count("window.set_keyguard_fading_away(false)"), 1);
        assert!(!rig.shell.has("mediator.keyguard_gone"));
        assert!(rig.controller.state().showing);
        assert_eq!(rig.controller.pending_launch_step(), None);
    }

    #[test]
    fn test_unoccluding_cancels_deferred_occlusion() {
        let mut rig = rig();
        rig.shell.in_launch_transition.set(true);
        rig.controller.show();
        rig.controller.set_occluded(true);
        rig.controller.set_occluded(false);

        rig.controller.on_launch_transition_before_fading();
        assert!(!rig.controller.is_occluded());
        assert!(!rig.shell.has("window.set_keyguard_occluded(true)"));
    }

    #[test]
    fn test_hide_fades_scrims_with_corrected_delay() {
        let mut rig = rig();
        rig.controller.show();
        let start = rig.now() + ms(100);
        rig.controller.hide(start, ms(300));

        let fading = format!("status_bar.set_keyguard_fading_away({}, 52, 300)", start.as_millis());
        assert!(rig.shell.has(&fading), "{:?}", rig.shell.calls());
        assert!(rig.shell.has("fingerprint.start_keyguard_fading_away"));
        assert!(rig.shell.has("window.set_keyguard_fading_away(true)"));
        assert!(rig.shell.has("mediator.keyguard_gone"));
        assert!(!rig.controller.bouncer().state().root_attached);
        assert_eq!(rig.controller.phase(), PresentationPhase::FadingAway);

        let window_off = rig.shell.position("window.set_keyguard_showing(false)").unwrap();
        let gone = rig.shell.position("mediator.keyguard_gone").unwrap();
        assert!(window_off < gone);

        rig.run_for(ms(400));
        assert_eq!(rig.shell.count("window.trim_memory"), 1);
        assert!(rig.shell.has("window.set_keyguard_fading_away(false)"));
        assert!(rig.shell.has("fingerprint.finish_keyguard_fading_away"));
        assert_eq!(rig.controller.phase(), PresentationPhase::Hidden);
    }

    #[test]
    fn test_hide_into_full_shade() {
        let mut rig = rig();
        rig.shell.keyguard_stays.set(true);
        rig.controller.show();
        let now = rig.now();
        rig.controller.hide(now, ms(300));

        assert!(rig.shell.has("status_bar.finish_keyguard_fading_away"));
        assert!(!rig.shell.has("window.set_keyguard_fading_away(true)"));
        assert!(rig.shell.has("mediator.keyguard_gone"));
        assert!(!rig.controller.scrim().is_keyguard_fading_out());
    }

    #[test]
    fn test_wake_and_unlock_waits_for_screen() {
        let mut rig = rig();
        rig.shell.unlock_mode.set(UnlockMode::WakeAndUnlock);
        rig.controller.show();
        let now = rig.now();
        rig.controller.hide(now, ms(300));

        assert!(rig.controller.state().defer_scrim_fade_out);
        assert_eq!(rig.controller.phase(), PresentationPhase::FadingAway);
        rig.run_for(ms(500));
        assert!(!rig.shell.has("window.trim_memory"));

        rig.controller.on_screen_turned_on();
        assert!(!rig.controller.state().defer_scrim_fade_out);
        assert!(rig.controller.scrim().is_keyguard_fading_out());
        rig.run_for(ms(300));
        assert_eq!(rig.shell.count("window.trim_memory"), 1);
    }

    #[test]
    fn test_wake_and_unlock_with_screen_on_fades_at_once() {
        let mut rig = rig();
        rig.shell.unlock_mode.set(UnlockMode::WakeAndUnlock);
        rig.controller.on_screen_turned_on();
        rig.controller.show();
        let now = rig.now();
        rig.controller.hide(now, ms(300));

        assert!(!rig.controller.state().defer_scrim_fade_out);
        rig.run_for(ms(250));
        assert_eq!(rig.shell.count("window.trim_memory"), 1);
    }

    #[test]
    fn test_pulsing_hide_uses_fixed_duration() {
        let mut rig = rig();
        rig.shell.unlock_mode.set(UnlockMode::WakeAndUnlockPulsing);
        rig.controller.show();
        rig.shell.clear_calls();
        let start = rig.now();
        rig.controller.hide(start, ms(1000));

        let fading = format!("status_bar.set_keyguard_fading_away({}, 0, 240)", start.as_millis());
        assert!(rig.shell.has(&fading));
        assert!(rig.shell.has("status_bar.fade_keyguard_while_pulsing"));
        assert!(!rig.shell.has("status_bar.hide_keyguard"));

        rig.run_for(ms(260));
        assert_eq!(rig.shell.count("status_bar.hide_keyguard"), 1);
        assert_eq!(rig.shell.count("window.trim_memory"), 1);

        // Scrims settle on the unlocked shade, not back on the keyguard floor
        rig.run_for(ms(500));
        assert_eq!(rig.behind.alpha.get(), 0.0);
        assert_eq!(rig.in_front.alpha.get(), 0.0);
    }

    #[test]
    fn test_hide_during_launch_transition_chains_callbacks() {
        let mut rig = rig();
        rig.shell.in_launch_transition.set(true);
        rig.controller.show();
        let ran = Rc::new(Cell::new(false));
        let r = Rc::clone(&ran);
        rig.controller.on_started_waking_up();
        rig.controller.dismiss_with_action(Box::new(move || r.set(true)), None, true);
        rig.shell.clear_calls();

        let now = rig.now();

        rig.controller.hide(now, ms(300));
        assert!(!rig.controller.is_showing());
        assert_eq!(rig.controller.pending_launch_step(), Some(LaunchStep::Hide));
        assert!(!rig.shell.has("mediator.keyguard_gone"));
        assert!(!rig.shell.has("window.set_keyguard_showing(false)"));

        rig.controller.on_launch_transition_before_fading();
        assert!(rig.shell.has("window.set_keyguard_showing(false)"));
        assert!(rig.shell.has("window.set_keyguard_fading_away(true)"));
        assert!(!rig.controller.bouncer().state().root_attached);
        assert!(!ran.get());

        rig.controller.on_launch_transition_faded();
        assert!(rig.shell.has("mediator.keyguard_gone"));
        assert!(rig.shell.has("status_bar.hide_keyguard"));
        assert!(ran.get());
        assert_eq!(rig.controller.pending_launch_step(), None);
    }

    #[test]
    fn test_faded_without_pre_fade_runs_both_steps() {
        let mut rig = rig();
        rig.shell.in_launch_transition.set(true);
        rig.controller.show();
        let now = rig.now();
        rig.controller.hide(now, ms(300));

        rig.controller.on_launch_transition_faded();
        assert_eq!(rig.shell.count("window.set_keyguard_showing(false)"), 1);
        assert_eq!(rig.shell.count("mediator.keyguard_gone"), 1);
    }

    #[test]
    fn test_after_gone_action_runs_on_hide() {
        let mut rig = rig();
        rig.controller.show();
        rig.controller.on_started_waking_up();
        let ran = Rc::new(Cell::new(0));
        let r = Rc::clone(&ran);
        rig.controller.dismiss_with_action(Box::new(move || r.set(r.get() + 1)), None, true);
        assert!(rig.controller.has_after_gone_action());
        assert!(rig.controller.is_bouncer_showing());

        let now = rig.now();

        rig.controller.hide(now, ms(300));
        assert_eq!(ran.get(), 1);
        assert!(!rig.controller.has_after_gone_action());
    }

    #[test]
    fn test_show_aborts_running_fade() {
        let mut rig = rig();
        rig.controller.show();
        let now = rig.now();
        rig.controller.hide(now + ms(200), ms(300));
        assert!(rig.controller.scrim().is_keyguard_fading_out());

        rig.controller.show();
        assert_eq!(rig.shell.count("window.trim_memory"), 1);
        rig.run_for(ms(600));
        assert_eq!(rig.shell.count("window.trim_memory"), 1);
        assert_eq!(rig.controller.phase(), PresentationPhase::ShowingUnoccluded);
    }

    #[test]
    fn test_back_closes_bouncer() {
        let mut rig = rig();
        rig.controller.show();
        assert!(!rig.controller.on_back_pressed());

        rig.controller.on_started_waking_up();
        rig.controller.dismiss();
        assert!(rig.controller.on_back_pressed());
        assert!(!rig.controller.is_bouncer_showing());
        assert!(rig.shell.has("status_bar.end_affordance_launch"));
    }

    #[test]
    fn test_menu_ignored_when_hidden() {
        let mut rig = rig();
        rig.widgets.state.borrow_mut().handle_menu = true;
        assert!(!rig.controller.on_menu_pressed());

        rig.controller.show();
        assert!(rig.controller.on_menu_pressed());
        assert!(rig.controller.state().bouncer_showing);
    }

    #[test]
    fn test_sleep_pauses_visible_bouncer() {
        let mut rig = rig();
        rig.controller.show();
        rig.controller.on_started_waking_up();
        rig.controller.dismiss();
        rig.controller.on_frame();

        rig.controller.on_started_going_to_sleep();
        rig.controller.on_finished_going_to_sleep();
        assert!(!rig.controller.state().device_interactive);
        assert_eq!(rig.widgets.count("widget.on_pause"), 1);
    }

    #[test]
    fn test_activity_drawn_waits_for_collapse() {
        let mut rig = rig();
        rig.shell.collapsing.set(true);
        rig.controller.on_activity_drawn();
        assert!(!rig.shell.has("mediator.ready_for_keyguard_done"));

        rig.shell.run_post_collapse_actions();
        assert!(rig.shell.has("mediator.ready_for_keyguard_done"));
    }

    #[test]
    fn test_pre_hide_runs_immediately_without_bouncer() {
        let mut rig = rig();
        rig.controller.show();
        let ran = Rc::new(Cell::new(false));
        let r = Rc::clone(&ran);
        rig.controller.start_pre_hide_animation(Some(Box::new(move || r.set(true))));
        assert!(ran.get());
        assert_eq!(rig.widgets.count("widget.start_disappear_animation"), 0);
    }

    #[test]
    fn test_secure_for_user_consults_trust() {
        let mut rig = rig();
        rig.widgets.state.borrow_mut().security_mode = SecurityMode::None;
        rig.controller.show();
        assert!(!rig.controller.is_secure());
        assert!(!rig.controller.is_secure_for_user(UserId(5)));

        rig.shell.secure_users.borrow_mut().insert(UserId(5));
        assert!(rig.controller.is_secure_for_user(UserId(5)));
    }
}
