//! Recording collaborators for tests and the simulator
//!
//! [`MockShell`] implements every shell trait, answers queries from plain
//! `Cell`s and records each side-effecting call as a string such as
//! `window.set_keyguard_showing(true)`. [`MockRig`] wires a full
//! [`PresentationController`] to these mocks on a manual clock.

use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::rc::Rc;
use std::time::Duration;

use tracing::debug;

use crate::bouncer::BouncerPresenter;
use crate::clock::{Clock, ManualClock};
use crate::config::KeyguardConfig;
use crate::controller::PresentationController;
use crate::scrim::{ScrimAnimator, ScrimSurfaces};
use crate::shell::{
    ChallengeWidget, FingerprintUnlock, KeyguardStateSink, ScrimSurface, Shell, StatusBar,
    TrustSource, ViewMediator, WidgetFactory, WindowController,
};
use crate::types::{Action, KeyEvent, PromptReason, SecurityMode, UnlockMode, UserId};
use crate::unlock::UnlockMethodCache;

type CallLog = Rc<RefCell<Vec<String>>>;

fn record(log: &CallLog, call: String) {
    debug!(target: "keyguard_core::mock", "{}", call);
    log.borrow_mut().push(call);
}

fn count_in(log: &CallLog, call: &str) -> usize {
    log.borrow().iter().filter(|c| c.as_str() == call).count()
}

/// Every shell collaborator in one recording object
pub struct MockShell {
    log: CallLog,

    pub user: Cell<UserId>,
    pub secure: Cell<bool>,
    pub secure_users: RefCell<HashSet<UserId>>,
    pub can_skip: Cell<bool>,
    pub trust_managed: Cell<bool>,
    pub trusted: Cell<bool>,
    pub face_running: Cell<bool>,
    pub fingerprint_allowed: Cell<bool>,

    pub in_launch_transition: Cell<bool>,
    /// Returned by `hide_keyguard`: the shade stays open
    pub keyguard_stays: Cell<bool>,
    pub keyguard_fading_away: Cell<bool>,
    pub fading_away_delay: Cell<Duration>,
    pub has_navigation_bar: Cell<bool>,
    pub navigation_bar_visible: Cell<Option<bool>>,
    pub collapsing: Cell<bool>,
    pub going_to_shade: Cell<bool>,
    pub post_collapse_actions: RefCell<Vec<Action>>,

    pub unlock_mode: Cell<UnlockMode>,
    pub prompt_reason: Cell<PromptReason>,
    pub input_restricted: Cell<bool>,
}

impl MockShell {
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            log: Rc::new(RefCell::new(Vec::new())),
            user: Cell::new(UserId::OWNER),
            secure: Cell::new(false),
            secure_users: RefCell::new(HashSet::new()),
            can_skip: Cell::new(false),
            trust_managed: Cell::new(false),
            trusted: Cell::new(false),
            face_running: Cell::new(false),
            fingerprint_allowed: Cell::new(false),
            in_launch_transition: Cell::new(false),
            keyguard_stays: Cell::new(false),
            keyguard_fading_away: Cell::new(false),
            fading_away_delay: Cell::new(Duration::ZERO),
            has_navigation_bar: Cell::new(true),
            navigation_bar_visible: Cell::new(None),
            collapsing: Cell::new(false),
            going_to_shade: Cell::new(false),
            post_collapse_actions: RefCell::new(Vec::new()),
            unlock_mode: Cell::new(UnlockMode::None),
            prompt_reason: Cell::new(PromptReason::None),
            input_restricted: Cell::new(false),
        })
    }

    /// Build a [`Shell`] whose collaborators all point at this mock
    pub fn shell(self: &Rc<Self>) -> Shell {
        Shell {
            status_bar: self.clone(),
            window: self.clone(),
            fingerprint: self.clone(),
            mediator: self.clone(),
            state_sink: self.clone(),
            trust: self.clone(),
        }
    }

    fn record(&self, call: impl Into<String>) {
        record(&self.log, call.into());
    }

    pub fn calls(&self) -> Vec<String> {
        self.log.borrow().clone()
    }

    /// Number of recorded calls equal to `call`
    pub fn count(&self, call: &str) -> usize {
        count_in(&self.log, call)
    }

    pub fn has(&self, call: &str) -> bool {
        self.count(call) > 0
    }

    /// Position of the first call equal to `call`
    pub fn position(&self, call: &str) -> Option<usize> {
        self.log.borrow().iter().position(|c| c == call)
    }

    pub fn clear_calls(&self) {
        self.log.borrow_mut().clear();
    }

    /// Run and drop queued post-collapse actions
    pub fn run_post_collapse_actions(&self) {
        let actions: Vec<Action> = self.post_collapse_actions.borrow_mut().drain(..).collect();
        for action in actions {
            action();
        }
    }
}

impl TrustSource for MockShell {
    fn current_user(&self) -> UserId {
        self.user.get()
    }

    fn is_secure(&self, user: UserId) -> bool {
        self.secure.get() || self.secure_users.borrow().contains(&user)
    }

    fn user_can_skip_bouncer(&self, _user: UserId) -> bool {
        self.can_skip.get()
    }

    fn user_trust_is_managed(&self, _user: UserId) -> bool {
        self.trust_managed.get()
    }

    fn user_has_trust(&self, _user: UserId) -> bool {
        self.trusted.get()
    }

    fn is_face_unlock_running(&self, _user: UserId) -> bool {
        self.face_running.get()
    }

    fn is_unlocking_with_fingerprint_allowed(&self) -> bool {
        self.fingerprint_allowed.get()
    }
}

impl StatusBar for MockShell {
    fn show_keyguard(&self) {
        self.record("status_bar.show_keyguard");
    }

    fn hide_keyguard(&self) -> bool {
        self.record("status_bar.hide_keyguard");
        self.keyguard_stays.get()
    }

    fn stop_waiting_for_keyguard_exit(&self) {
        self.record("status_bar.stop_waiting_for_keyguard_exit");
    }

    fn on_started_going_to_sleep(&self) {
        self.record("status_bar.on_started_going_to_sleep");
    }

    fn on_finished_going_to_sleep(&self) {
        self.record("status_bar.on_finished_going_to_sleep");
    }

    fn on_started_waking_up(&self) {
        self.record("status_bar.on_started_waking_up");
    }

    fn on_screen_turning_on(&self) {
        self.record("status_bar.on_screen_turning_on");
    }

    fn on_screen_turned_on(&self) {
        self.record("status_bar.on_screen_turned_on");
    }

    fn is_in_launch_transition(&self) -> bool {
        self.in_launch_transition.get()
    }

    fn fade_keyguard_after_launch_transition(&self, with_before_fading: bool) {
        self.record(format!(
            "status_bar.fade_keyguard_after_launch_transition({})",
            with_before_fading
        ));
    }

    fn set_keyguard_fading_away(&self, start_time: Duration, delay: Duration, duration: Duration) {
        self.record(format!(
            "status_bar.set_keyguard_fading_away({}, {}, {})",
            start_time.as_millis(),
            delay.as_millis(),
            duration.as_millis()
        ));
        self.keyguard_fading_away.set(true);
        self.fading_away_delay.set(delay);
    }

    fn is_keyguard_fading_away(&self) -> bool {
        self.keyguard_fading_away.get()
    }

    fn keyguard_fading_away_delay(&self) -> Duration {
        self.fading_away_delay.get()
    }

    fn fade_keyguard_while_pulsing(&self) {
        self.record("status_bar.fade_keyguard_while_pulsing");
    }

    fn finish_keyguard_fading_away(&self) {
        self.record("status_bar.finish_keyguard_fading_away");
        self.keyguard_fading_away.set(false);
    }

    fn set_bouncer_showing(&self, showing: bool) {
        self.record(format!("status_bar.set_bouncer_showing({})", showing));
    }

    fn end_affordance_launch(&self) {
        self.record("status_bar.end_affordance_launch");
    }

    fn has_navigation_bar(&self) -> bool {
        self.has_navigation_bar.get()
    }

    fn set_navigation_bar_visible(&self, visible: bool) {
        self.record(format!("status_bar.set_navigation_bar_visible({})", visible));
        self.navigation_bar_visible.set(Some(visible));
    }

    fn on_keyguard_states_updated(&self) {
        self.record("status_bar.on_keyguard_states_updated");
    }

    fn is_collapsing(&self) -> bool {
        self.collapsing.get()
    }

    fn add_post_collapse_action(&self, action: Action) {
        self.record("status_bar.add_post_collapse_action");
        self.post_collapse_actions.borrow_mut().push(action);
    }

    fn is_going_to_notification_shade(&self) -> bool {
        self.going_to_shade.get()
    }

    fn keyguard_going_away(&self) {
        self.record("status_bar.keyguard_going_away");
    }

    fn animate_collapse_panels(&self, speed_up_factor: f32) {
        self.record(format!("status_bar.animate_collapse_panels({})", speed_up_factor));
    }
}

impl WindowController for MockShell {
    fn set_keyguard_showing(&self, showing: bool) {
        self.record(format!("window.set_keyguard_showing({})", showing));
    }

    fn set_keyguard_occluded(&self, occluded: bool) {
        self.record(format!("window.set_keyguard_occluded({})", occluded));
    }

    fn set_keyguard_fading_away(&self, fading: bool) {
        self.record(format!("window.set_keyguard_fading_away({})", fading));
    }

    fn set_keyguard_needs_input(&self, needs_input: bool) {
        self.record(format!("window.set_keyguard_needs_input({})", needs_input));
    }

    fn set_bouncer_showing(&self, showing: bool) {
        self.record(format!("window.set_bouncer_showing({})", showing));
    }

    fn set_back_disabled(&self, disabled: bool) {
        self.record(format!("window.set_back_disabled({})", disabled));
    }

    fn trim_memory(&self) {
        self.record("window.trim_memory");
    }
}

impl FingerprintUnlock for MockShell {
    fn mode(&self) -> UnlockMode {
        self.unlock_mode.get()
    }

    fn start_keyguard_fading_away(&self) {
        self.record("fingerprint.start_keyguard_fading_away");
    }

    fn finish_keyguard_fading_away(&self) {
        self.record("fingerprint.finish_keyguard_fading_away");
    }
}

impl ViewMediator for MockShell {
    fn keyguard_gone(&self) {
        self.record("mediator.keyguard_gone");
    }

    fn ready_for_keyguard_done(&self) {
        self.record("mediator.ready_for_keyguard_done");
    }

    fn bouncer_prompt_reason(&self) -> PromptReason {
        self.prompt_reason.get()
    }

    fn is_input_restricted(&self) -> bool {
        self.input_restricted.get()
    }
}

impl KeyguardStateSink for MockShell {
    fn on_keyguard_visibility_changed(&self, showing: bool) {
        self.record(format!("sink.on_keyguard_visibility_changed({})", showing));
    }

    fn on_keyguard_bouncer_changed(&self, bouncer: bool) {
        self.record(format!("sink.on_keyguard_bouncer_changed({})", bouncer));
    }

    fn on_keyguard_reset(&self) {
        self.record("sink.on_keyguard_reset");
    }
}

/// Behaviour shared by every widget a [`MockWidgetFactory`] creates
#[derive(Debug, Clone, Default)]
pub struct MockWidgetState {
    pub security_mode: SecurityMode,
    /// `dismiss()` succeeds without a challenge
    pub dismiss_succeeds: bool,
    pub handle_back: bool,
    pub handle_menu: bool,
    pub intercept_media: bool,
}

/// Factory producing recording challenge widgets
pub struct MockWidgetFactory {
    pub state: Rc<RefCell<MockWidgetState>>,
    log: CallLog,
    created: Cell<usize>,
}

impl MockWidgetFactory {
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            state: Rc::new(RefCell::new(MockWidgetState::default())),
            log: Rc::new(RefCell::new(Vec::new())),
            created: Cell::new(0),
        })
    }

    /// Number of widgets created so far
    pub fn created(&self) -> usize {
        self.created.get()
    }

    pub fn calls(&self) -> Vec<String> {
        self.log.borrow().clone()
    }

    pub fn count(&self, call: &str) -> usize {
        count_in(&self.log, call)
    }

    pub fn clear_calls(&self) {
        self.log.borrow_mut().clear();
    }
}

impl WidgetFactory for MockWidgetFactory {
    fn create(&self) -> Box<dyn ChallengeWidget> {
        self.created.set(self.created.get() + 1);
        record(&self.log, "widget.create".to_string());
        Box::new(MockWidget {
            state: Rc::clone(&self.state),
            log: Rc::clone(&self.log),
            dismiss_action: None,
            cancel_action: None,
        })
    }
}

struct MockWidget {
    state: Rc<RefCell<MockWidgetState>>,
    log: CallLog,
    dismiss_action: Option<Action>,
    cancel_action: Option<Action>,
}

impl MockWidget {
    fn record(&self, call: impl Into<String>) {
        record(&self.log, call.into());
    }

    fn run_dismiss_action(&mut self) {
        self.cancel_action = None;
        if let Some(action) = self.dismiss_action.take() {
            action();
        }
    }
}

impl ChallengeWidget for MockWidget {
    fn show_primary_security_screen(&mut self) {
        self.record("widget.show_primary_security_screen");
    }

    fn dismiss(&mut self) -> bool {
        self.record("widget.dismiss");
        let succeeds = self.state.borrow().dismiss_succeeds;
        if succeeds {
            self.run_dismiss_action();
        }
        succeeds
    }

    fn on_resume(&mut self) {
        self.record("widget.on_resume");
    }

    fn on_pause(&mut self) {
        self.record("widget.on_pause");
    }

    fn show_prompt_reason(&mut self, reason: PromptReason) {
        self.record(format!("widget.show_prompt_reason({:?})", reason));
    }

    fn show_message(&mut self, message: &str, color: u32) {
        self.record(format!("widget.show_message({}, {:#x})", message, color));
    }

    fn start_appear_animation(&mut self) {
        self.record("widget.start_appear_animation");
    }

    fn start_disappear_animation(&mut self, on_finished: Action) {
        self.record("widget.start_disappear_animation");
        on_finished();
    }

    fn set_on_dismiss_action(&mut self, action: Action, cancel: Option<Action>) {
        self.record("widget.set_on_dismiss_action");
        if let Some(previous_cancel) = self.cancel_action.take() {
            previous_cancel();
        }
        self.dismiss_action = Some(action);
        self.cancel_action = cancel;
    }

    fn cancel_dismiss_action(&mut self) {
        self.record("widget.cancel_dismiss_action");
        self.dismiss_action = None;
        if let Some(cancel) = self.cancel_action.take() {
            cancel();
        }
    }

    fn clean_up(&mut self) {
        self.record("widget.clean_up");
    }

    fn security_mode(&self) -> SecurityMode {
        self.state.borrow().security_mode
    }

    fn current_security_mode(&self) -> SecurityMode {
        self.state.borrow().security_mode
    }

    fn handle_back_key(&mut self) -> bool {
        self.record("widget.handle_back_key");
        self.state.borrow().handle_back
    }

    fn handle_menu_key(&mut self) -> bool {
        self.record("widget.handle_menu_key");
        self.state.borrow().handle_menu
    }

    fn intercept_media_key(&mut self, event: &KeyEvent) -> bool {
        self.record(format!("widget.intercept_media_key({})", event.key_code));
        self.state.borrow().intercept_media
    }

    fn finish(&mut self, strong_auth: bool) {
        self.record(format!("widget.finish({})", strong_auth));
        self.run_dismiss_action();
    }

    fn request_focus(&mut self) {
        self.record("widget.request_focus");
    }

    fn announce_window_state_changed(&mut self) {
        self.record("widget.announce_window_state_changed");
    }
}

/// Scrim surface remembering the last values applied
pub struct MockScrimSurface {
    pub alpha: Cell<f32>,
    pub clickable: Cell<bool>,
    pub as_src: Cell<bool>,
}

impl MockScrimSurface {
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            alpha: Cell::new(0.0),
            clickable: Cell::new(false),
            as_src: Cell::new(false),
        })
    }
}

impl ScrimSurface for MockScrimSurface {
    fn set_alpha(&self, alpha: f32) {
        self.alpha.set(alpha);
    }

    fn set_clickable(&self, clickable: bool) {
        self.clickable.set(clickable);
    }

    fn set_draw_as_src(&self, as_src: bool) {
        self.as_src.set(as_src);
    }
}

/// Frame interval used by [`MockRig::frames`]
pub const FRAME: Duration = Duration::from_millis(16);

/// A presentation controller wired to recording collaborators
pub struct MockRig {
    pub clock: Rc<ManualClock>,
    pub shell: Rc<MockShell>,
    pub widgets: Rc<MockWidgetFactory>,
    pub behind: Rc<MockScrimSurface>,
    pub in_front: Rc<MockScrimSurface>,
    pub heads_up: Rc<MockScrimSurface>,
    pub unlock: Rc<UnlockMethodCache>,
    pub controller: PresentationController,
}

impl MockRig {
    /// Build a rig; the clock starts at 100 s of uptime
    pub fn new(config: &KeyguardConfig) -> Self {
        Self::with_shell(config, MockShell::new(), MockWidgetFactory::new())
    }

    /// Build a rig around pre-configured mocks
    pub fn with_shell(
        config: &KeyguardConfig,
        shell: Rc<MockShell>,
        widgets: Rc<MockWidgetFactory>,
    ) -> Self {
        let clock = Rc::new(ManualClock::starting_at(Duration::from_secs(100)));
        let behind = MockScrimSurface::new();
        let in_front = MockScrimSurface::new();
        let heads_up = MockScrimSurface::new();
        let unlock = Rc::new(UnlockMethodCache::new(shell.clone()));

        let bouncer = BouncerPresenter::new(widgets.clone(), shell.clone(), clock.clone());
        let scrim = ScrimAnimator::new(
            ScrimSurfaces {
                behind: behind.clone(),
                in_front: in_front.clone(),
                heads_up: heads_up.clone(),
            },
            Rc::clone(&unlock),
            clock.clone(),
            config.scrim,
            config.timing,
        );
        let controller =
            PresentationController::new(shell.shell(), bouncer, scrim, clock.clone(), config.timing);

        Self {
            clock,
            shell,
            widgets,
            behind,
            in_front,
            heads_up,
            unlock,
            controller,
        }
    }

    /// Current uptime
    pub fn now(&self) -> Duration {
        self.clock.uptime()
    }

    /// Run `count` frames, advancing the clock by [`FRAME`] before each
    pub fn frames(&mut self, count: usize) {
        for _ in 0..count {
            self.clock.advance(FRAME);
            self.controller.on_frame();
        }
    }

    /// Advance by at least `duration`, running a frame every [`FRAME`]
    pub fn run_for(&mut self, duration: Duration) {
        let frames = duration.as_millis().div_ceil(FRAME.as_millis());
        self.frames(frames as usize);
    }
}
