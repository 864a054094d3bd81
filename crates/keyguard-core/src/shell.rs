//! Collaborator interfaces
//!
//! The presentation core never draws anything and never talks to the window
//! manager or the trust subsystem directly. Each of those concerns sits behind
//! a trait here so the shell (or a test double) can plug in its own
//! implementation.
//!
//! All methods take `&self`: collaborators live on the coordination thread and
//! manage their own interior state.

use std::rc::Rc;
use std::time::Duration;

use crate::types::{Action, KeyEvent, PromptReason, SecurityMode, UnlockMode, UserId};

/// Signals from the trust and security subsystem
pub trait TrustSource {
    /// The user whose session is in the foreground
    fn current_user(&self) -> UserId;

    /// Whether the user configured a secure credential
    fn is_secure(&self, user: UserId) -> bool;

    /// Whether trust agents or face unlock currently allow skipping the
    /// challenge
    fn user_can_skip_bouncer(&self, user: UserId) -> bool;

    /// Whether a trust agent manages the user
    fn user_trust_is_managed(&self, user: UserId) -> bool;

    /// Whether the user is currently trusted
    fn user_has_trust(&self, user: UserId) -> bool;

    /// Whether a passive face check is running for the user
    fn is_face_unlock_running(&self, user: UserId) -> bool;

    /// Whether a fingerprint may unlock the device right now
    fn is_unlocking_with_fingerprint_allowed(&self) -> bool;
}

/// The authentication challenge widget hosted by the bouncer
pub trait ChallengeWidget {
    /// Reset to the primary security method
    fn show_primary_security_screen(&mut self);

    /// Try to dismiss without user input; returns true if it succeeded
    fn dismiss(&mut self) -> bool;

    fn on_resume(&mut self);

    fn on_pause(&mut self);

    fn show_prompt_reason(&mut self, reason: PromptReason);

    fn show_message(&mut self, message: &str, color: u32);

    fn start_appear_animation(&mut self);

    /// Start the disappear animation; `on_finished` runs exactly once when it
    /// ends
    fn start_disappear_animation(&mut self, on_finished: Action);

    /// Attach a one-shot action to run when the user authenticates
    fn set_on_dismiss_action(&mut self, action: Action, cancel: Option<Action>);

    /// Drop the dismiss action, running its cancel action if one was given
    fn cancel_dismiss_action(&mut self);

    /// Clear transient input state
    fn clean_up(&mut self);

    /// Security method that will be used, resolved fresh
    fn security_mode(&self) -> SecurityMode;

    /// Security method currently displayed
    fn current_security_mode(&self) -> SecurityMode;

    fn handle_back_key(&mut self) -> bool;

    fn handle_menu_key(&mut self) -> bool;

    fn intercept_media_key(&mut self, event: &KeyEvent) -> bool;

    /// Authentication already happened elsewhere; finish the challenge
    fn finish(&mut self, strong_auth: bool);

    fn request_focus(&mut self);

    /// Accessibility announcement after the widget becomes visible
    fn announce_window_state_changed(&mut self) {}
}

/// Builds fresh challenge widgets for the bouncer
pub trait WidgetFactory {
    fn create(&self) -> Box<dyn ChallengeWidget>;
}

/// One dimming overlay
pub trait ScrimSurface {
    /// Apply the composited alpha
    fn set_alpha(&self, alpha: f32);

    fn set_clickable(&self, _clickable: bool) {}

    fn set_draw_as_src(&self, _as_src: bool) {}
}

/// The status bar and notification panel
pub trait StatusBar {
    fn show_keyguard(&self);

    /// Hide the lock content; returns true if the shade stays open (going to
    /// the full notification shade)
    fn hide_keyguard(&self) -> bool;

    fn stop_waiting_for_keyguard_exit(&self);

    fn on_started_going_to_sleep(&self);

    fn on_finished_going_to_sleep(&self);

    fn on_started_waking_up(&self);

    fn on_screen_turning_on(&self);

    fn on_screen_turned_on(&self);

    /// Whether an affordance launch animation is in progress
    fn is_in_launch_transition(&self) -> bool;

    /// Ask the shell to report launch transition progress through
    /// `PresentationController::on_launch_transition_before_fading` and
    /// `on_launch_transition_faded`
    fn fade_keyguard_after_launch_transition(&self, with_before_fading: bool);

    fn set_keyguard_fading_away(&self, start_time: Duration, delay: Duration, duration: Duration);

    fn is_keyguard_fading_away(&self) -> bool;

    fn keyguard_fading_away_delay(&self) -> Duration;

    fn fade_keyguard_while_pulsing(&self);

    fn finish_keyguard_fading_away(&self);

    fn set_bouncer_showing(&self, showing: bool);

    fn end_affordance_launch(&self);

    fn has_navigation_bar(&self) -> bool;

    fn set_navigation_bar_visible(&self, visible: bool);

    fn on_keyguard_states_updated(&self);

    fn is_collapsing(&self) -> bool;

    fn add_post_collapse_action(&self, action: Action);

    fn is_going_to_notification_shade(&self) -> bool;

    fn keyguard_going_away(&self);

    fn animate_collapse_panels(&self, speed_up_factor: f32);
}

/// Window flags for the status bar window hosting the keyguard
pub trait WindowController {
    fn set_keyguard_showing(&self, showing: bool);

    fn set_keyguard_occluded(&self, occluded: bool);

    fn set_keyguard_fading_away(&self, fading: bool);

    fn set_keyguard_needs_input(&self, needs_input: bool);

    fn set_bouncer_showing(&self, showing: bool);

    fn set_back_disabled(&self, disabled: bool);

    /// Release UI resources after the keyguard is gone
    fn trim_memory(&self);
}

/// Fingerprint unlock flow
pub trait FingerprintUnlock {
    fn mode(&self) -> UnlockMode;

    fn start_keyguard_fading_away(&self);

    fn finish_keyguard_fading_away(&self);
}

/// The keyguard service driving the controller
pub trait ViewMediator {
    /// The keyguard is fully gone
    fn keyguard_gone(&self);

    /// The app behind the keyguard drew its first frame
    fn ready_for_keyguard_done(&self);

    fn bouncer_prompt_reason(&self) -> PromptReason;

    fn is_input_restricted(&self) -> bool;
}

/// Consumer of derived keyguard state (trust and fingerprint services)
pub trait KeyguardStateSink {
    fn on_keyguard_visibility_changed(&self, showing: bool);

    fn on_keyguard_bouncer_changed(&self, bouncer: bool);

    fn on_keyguard_reset(&self);
}

/// Collaborators handed to the presentation controller
#[derive(Clone)]
pub struct Shell {
    pub status_bar: Rc<dyn StatusBar>,
    pub window: Rc<dyn WindowController>,
    pub fingerprint: Rc<dyn FingerprintUnlock>,
    pub mediator: Rc<dyn ViewMediator>,
    pub state_sink: Rc<dyn KeyguardStateSink>,
    pub trust: Rc<dyn TrustSource>,
}
