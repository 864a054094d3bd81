//! Bouncer (authentication challenge) lifecycle
//!
//! The presenter owns the challenge widget. The widget is created lazily on
//! first use, rebuilt by [`BouncerPresenter::reset`] and released by
//! `hide(true)`. Showing is split across two rendering passes: `show` only
//! schedules the work and the next [`BouncerPresenter::on_frame`] commits it.

use std::fmt;
use std::rc::Rc;

use serde::Serialize;
use tracing::{debug, trace};

use crate::clock::Clock;
use crate::frame::FrameQueue;
use crate::shell::{ChallengeWidget, ViewMediator, WidgetFactory};
use crate::types::{Action, KeyEvent, PromptReason, SecurityMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BouncerTask {
    Show,
}

struct BouncerView {
    widget: Box<dyn ChallengeWidget>,
    visible: bool,
}

/// Observable bouncer state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct BouncerState {
    /// The challenge widget exists
    pub root_attached: bool,
    /// The widget is visible
    pub visible: bool,
    /// A show is scheduled but not yet committed
    pub showing_soon: bool,
    /// Cached reason shown when the bouncer appears
    pub prompt_reason: PromptReason,
    /// A dismiss action was attached and has not been cancelled
    pub dismiss_action_pending: bool,
}

pub struct BouncerPresenter {
    factory: Rc<dyn WidgetFactory>,
    mediator: Rc<dyn ViewMediator>,
    clock: Rc<dyn Clock>,
    view: Option<BouncerView>,
    showing_soon: bool,
    prompt_reason: PromptReason,
    dismiss_action_pending: bool,
    tasks: FrameQueue<BouncerTask>,
}

impl fmt::Debug for BouncerPresenter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BouncerPresenter")
            .field("state", &self.state())
            .finish()
    }
}

impl BouncerPresenter {
    pub fn new(
        factory: Rc<dyn WidgetFactory>,
        mediator: Rc<dyn ViewMediator>,
        clock: Rc<dyn Clock>,
    ) -> Self {
        Self {
            factory,
            mediator,
            clock,
            view: None,
            showing_soon: false,
            prompt_reason: PromptReason::None,
            dismiss_action_pending: false,
            tasks: FrameQueue::new(),
        }
    }

    /// Show the bouncer.
    ///
    /// If the widget can dismiss silently (no credential) nothing is shown.
    /// Otherwise the show is committed on the next frame.
    pub fn show(&mut self, reset_security_selection: bool) {
        let showing_soon = self.showing_soon;
        let view = self.ensure_view();
        if reset_security_selection {
            view.widget.show_primary_security_screen();
        }
        if view.visible || showing_soon {
            trace!("Bouncer already showing");
            return;
        }

        if view.widget.dismiss() {
            debug!("Bouncer dismissed without challenge");
            return;
        }

        self.showing_soon = true;
        self.tasks.post(BouncerTask::Show, self.clock.uptime());
        debug!("Bouncer show scheduled");
    }

    /// Attach a one-shot action to run after successful authentication, then
    /// show
    pub fn show_with_dismiss_action(&mut self, action: Action, cancel: Option<Action>) {
        self.ensure_view().widget.set_on_dismiss_action(action, cancel);
        self.dismiss_action_pending = true;
        self.show(false);
    }

    /// Hide the bouncer, releasing the widget if `destroy_view` is set
    pub fn hide(&mut self, destroy_view: bool) {
        self.cancel_show();
        if let Some(view) = self.view.as_mut() {
            view.widget.cancel_dismiss_action();
            view.widget.clean_up();
        }
        self.dismiss_action_pending = false;

        if destroy_view {
            self.remove_view();
        } else if let Some(view) = self.view.as_mut() {
            view.visible = false;
        }
        debug!("Bouncer hidden (destroyed: {})", destroy_view);
    }

    /// Rebuild the widget from scratch
    pub fn reset(&mut self) {
        self.cancel_show();
        self.inflate_view();
    }

    /// Make sure the widget exists and refresh the prompt reason
    pub fn prepare(&mut self) {
        let was_initialized = self.view.is_some();
        let view = self.ensure_view();
        if was_initialized {
            view.widget.show_primary_security_screen();
        }
        self.prompt_reason = self.mediator.bouncer_prompt_reason();
    }

    /// Whether the security method about to be used is fullscreen-only.
    /// Creates the widget if needed.
    pub fn needs_fullscreen_bouncer(&mut self) -> bool {
        self.ensure_view().widget.security_mode().is_fullscreen()
    }

    /// Whether the currently displayed security method is fullscreen-only
    pub fn is_fullscreen_bouncer(&self) -> bool {
        self.view
            .as_ref()
            .map(|v| v.widget.current_security_mode().is_fullscreen())
            .unwrap_or(false)
    }

    /// Whether a credential is required.
    ///
    /// Resolving the security mode can be slow; avoid calling this on hot
    /// paths.
    pub fn is_secure(&self) -> bool {
        self.view
            .as_ref()
            .map(|v| v.widget.security_mode() != SecurityMode::None)
            .unwrap_or(true)
    }

    pub fn on_back_pressed(&mut self) -> bool {
        self.view
            .as_mut()
            .map(|v| v.widget.handle_back_key())
            .unwrap_or(false)
    }

    pub fn on_menu_pressed(&mut self) -> bool {
        let view = self.ensure_view();
        if !view.widget.handle_menu_key() {
            return false;
        }
        // Show it in case it is secure; otherwise it gets dismissed anyway
        view.visible = true;
        view.widget.request_focus();
        view.widget.on_resume();
        true
    }

    pub fn intercept_media_key(&mut self, event: &KeyEvent) -> bool {
        self.ensure_view().widget.intercept_media_key(event)
    }

    /// Run the disappear animation; `on_finished` runs right away when there
    /// is no widget
    pub fn start_pre_hide_animation(&mut self, on_finished: Option<Action>) {
        match (self.view.as_mut(), on_finished) {
            (Some(view), Some(action)) => view.widget.start_disappear_animation(action),
            (Some(view), None) => view.widget.start_disappear_animation(Box::new(|| {})),
            (None, Some(action)) => action(),
            (None, None) => {}
        }
    }

    /// Authentication succeeded outside the widget
    pub fn notify_keyguard_authenticated(&mut self, strong_auth: bool) {
        self.ensure_view().widget.finish(strong_auth);
    }

    /// Pause the widget, but only while it is visible
    pub fn on_screen_turned_off(&mut self) {
        if let Some(view) = self.view.as_mut() {
            if view.visible {
                view.widget.on_pause();
            }
        }
    }

    /// Showing, or about to show on the next frame
    pub fn is_showing(&self) -> bool {
        self.showing_soon || self.view.as_ref().map(|v| v.visible).unwrap_or(false)
    }

    pub fn show_prompt_reason(&mut self, reason: PromptReason) {
        if let Some(view) = self.view.as_mut() {
            view.widget.show_prompt_reason(reason);
        }
    }

    pub fn show_message(&mut self, message: &str, color: u32) {
        if let Some(view) = self.view.as_mut() {
            view.widget.show_message(message, color);
        }
    }

    pub fn on_strong_auth_state_changed(&mut self) {
        self.prompt_reason = self.mediator.bouncer_prompt_reason();
    }

    /// Run work scheduled for this frame
    pub fn on_frame(&mut self) {
        for task in self.tasks.drain_due(self.clock.uptime()) {
            match task {
                BouncerTask::Show => self.commit_show(),
            }
        }
    }

    pub fn has_pending_frame_work(&self) -> bool {
        !self.tasks.is_empty()
    }

    pub fn state(&self) -> BouncerState {
        BouncerState {
            root_attached: self.view.is_some(),
            visible: self.view.as_ref().map(|v| v.visible).unwrap_or(false),
            showing_soon: self.showing_soon,
            prompt_reason: self.prompt_reason,
            dismiss_action_pending: self.dismiss_action_pending,
        }
    }

    fn commit_show(&mut self) {
        let reason = self.prompt_reason;
        if let Some(view) = self.view.as_mut() {
            view.visible = true;
            view.widget.on_resume();
            view.widget.show_prompt_reason(reason);
            view.widget.start_appear_animation();
            view.widget.announce_window_state_changed();
        }
        self.showing_soon = false;
        debug!("Bouncer show committed");
    }

    fn cancel_show(&mut self) {
        self.tasks.cancel(BouncerTask::Show);
        self.showing_soon = false;
    }

    fn ensure_view(&mut self) -> &mut BouncerView {
        let factory = &self.factory;
        self.view.get_or_insert_with(|| {
            trace!("Creating challenge widget");
            BouncerView {
                widget: factory.create(),
                visible: false,
            }
        })
    }

    fn inflate_view(&mut self) {
        self.remove_view();
        trace!("Creating challenge widget");
        self.view = Some(BouncerView {
            widget: self.factory.create(),
            visible: false,
        });
    }

    fn remove_view(&mut self) {
        if self.view.take().is_some() {
            self.dismiss_action_pending = false;
            trace!("Challenge widget released");
        }
    }
}
