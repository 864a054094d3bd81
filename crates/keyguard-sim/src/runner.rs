//! Script runner
//!
//! A [`Simulation`] owns a [`MockRig`] and replays script steps against it.
//! Between steps the clock advances in frame-sized increments so scrim
//! animations and deferred tasks progress exactly as they would on device.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use keyguard_core::mock::{MockRig, MockShell, MockWidgetFactory, FRAME};
use keyguard_core::{
    BouncerState, Clock, KeyEvent, KeyguardConfig, PresentationPhase, PresentationState,
    ScrimTarget, TrustEvent, UnlockMethodState,
};

use crate::script::{Script, Setup, SimEvent, Step};

/// Time the runner keeps producing frames after the last step
pub const SETTLE_TIME: Duration = Duration::from_millis(1000);

/// Calls produced by one step, or by the frames preceding it
#[derive(Debug, Clone, Serialize)]
pub struct TranscriptEntry {
    pub at_ms: u64,
    pub label: String,
    pub calls: Vec<String>,
}

/// Scrim alphas as last applied to the surfaces
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ScrimSummary {
    pub behind: f32,
    pub in_front: f32,
    pub heads_up: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct FinalState {
    pub phase: PresentationPhase,
    pub presentation: PresentationState,
    pub bouncer: BouncerState,
    pub unlock: UnlockMethodState,
    pub scrim: ScrimSummary,
    pub navigation_bar_visible: Option<bool>,
}

/// Result of a simulation run
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub script: String,
    pub generated_at: DateTime<Utc>,
    pub steps: usize,
    pub duration_ms: u64,
    pub transcript: Vec<TranscriptEntry>,
    pub final_state: FinalState,
}

impl Report {
    pub fn to_json(&self) -> keyguard_core::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Script: {}", self.script)?;
        writeln!(f, "Generated: {}", self.generated_at.to_rfc3339())?;
        writeln!(f)?;
        for entry in &self.transcript {
            writeln!(f, "[{:>6} ms] {}", entry.at_ms, entry.label)?;
            for call in &entry.calls {
                writeln!(f, "             {}", call)?;
            }
        }
        let state = &self.final_state;
        writeln!(f)?;
        writeln!(f, "Phase:      {:?}", state.phase)?;
        writeln!(f, "Showing:    {}", state.presentation.showing)?;
        writeln!(f, "Occluded:   {}", state.presentation.occluded)?;
        writeln!(f, "Bouncer:    {}", state.bouncer.visible)?;
        writeln!(
            f,
            "Scrims:     behind {:.3}, in front {:.3}, heads-up {:.3}",
            state.scrim.behind, state.scrim.in_front, state.scrim.heads_up
        )?;
        match state.navigation_bar_visible {
            Some(visible) => writeln!(f, "Nav bar:    {}", visible),
            None => writeln!(f, "Nav bar:    untouched"),
        }
    }
}

pub struct Simulation {
    rig: MockRig,
    origin: Duration,
    transcript: Vec<TranscriptEntry>,
    shell_seen: usize,
    widget_seen: usize,
}

impl Simulation {
    /// Build a rig configured from `setup`
    pub fn new(config: &KeyguardConfig, setup: &Setup) -> Self {
        let shell = MockShell::new();
        shell.secure.set(setup.secure);
        shell.can_skip.set(setup.can_skip_bouncer);
        shell.has_navigation_bar.set(setup.has_navigation_bar);
        shell.unlock_mode.set(setup.unlock_mode);
        shell.in_launch_transition.set(setup.in_launch_transition);

        let widgets = MockWidgetFactory::new();
        {
            let mut state = widgets.state.borrow_mut();
            state.security_mode = setup.security_mode;
            state.dismiss_succeeds = setup.dismiss_without_challenge;
        }

        let rig = MockRig::with_shell(config, shell, widgets);
        let origin = rig.now();
        let mut sim = Self {
            rig,
            origin,
            transcript: Vec::new(),
            shell_seen: 0,
            widget_seen: 0,
        };

        if setup.interactive {
            sim.rig.controller.on_started_waking_up();
        }
        if setup.screen_on {
            sim.rig.controller.on_screen_turned_on();
        }
        sim.record("setup");
        sim
    }

    /// Milliseconds since the simulation started
    pub fn elapsed_ms(&self) -> u64 {
        (self.rig.now() - self.origin).as_millis() as u64
    }

    pub fn rig(&self) -> &MockRig {
        &self.rig
    }

    pub fn transcript(&self) -> &[TranscriptEntry] {
        &self.transcript
    }

    /// Run a whole script without pacing
    pub fn run(mut self, script: &Script) -> Report {
        info!("Running script '{}'", script.display_name());
        for step in &script.steps {
            while self.elapsed_ms() < step.at_ms {
                self.frame_toward(step.at_ms);
            }
            self.record("frames");
            self.apply_step(step);
        }
        let settle_until = self.elapsed_ms() + SETTLE_TIME.as_millis() as u64;
        while self.elapsed_ms() < settle_until {
            self.frame_toward(settle_until);
        }
        self.record("settle");
        self.finish(script)
    }

    /// Run a whole script, producing frames at wall-clock pace
    pub async fn run_realtime(mut self, script: &Script) -> Report {
        info!("Running script '{}' in real time", script.display_name());
        let mut interval = tokio::time::interval(FRAME);
        for step in &script.steps {
            while self.elapsed_ms() < step.at_ms {
                interval.tick().await;
                self.frame_toward(step.at_ms);
            }
            self.record("frames");
            self.apply_step(step);
        }
        let settle_until = self.elapsed_ms() + SETTLE_TIME.as_millis() as u64;
        while self.elapsed_ms() < settle_until {
            interval.tick().await;
            self.frame_toward(settle_until);
        }
        self.record("settle");
        self.finish(script)
    }

    /// Advance by one frame, or less if `target_ms` is closer
    fn frame_toward(&mut self, target_ms: u64) {
        let remaining = target_ms.saturating_sub(self.elapsed_ms());
        let step = Duration::from_millis(remaining).min(FRAME);
        self.rig.clock.advance(step);
        self.rig.controller.on_frame();
    }

    pub fn apply_step(&mut self, step: &Step) {
        debug!("{} ms: {}", step.at_ms, step.event.label());
        self.apply(&step.event);
        self.record(&step.event.label());
    }

    /// Send one event to the controller
    pub fn apply(&mut self, event: &SimEvent) {
        let controller = &mut self.rig.controller;
        match event {
            SimEvent::Show => controller.show(),
            SimEvent::Hide {
                start_offset_ms,
                fadeout_ms,
            } => {
                let start = self.rig.clock.uptime() + Duration::from_millis(*start_offset_ms);
                controller.hide(start, Duration::from_millis(*fadeout_ms));
            }
            SimEvent::Reset => controller.reset(),
            SimEvent::Dismiss => controller.dismiss(),
            SimEvent::SetOccluded { occluded } => controller.set_occluded(*occluded),
            SimEvent::BackPressed => {
                let handled = controller.on_back_pressed();
                debug!("Back handled: {}", handled);
            }
            SimEvent::MenuPressed => {
                let handled = controller.on_menu_pressed();
                debug!("Menu handled: {}", handled);
            }
            SimEvent::MediaKey { key_code } => {
                let handled = controller.intercept_media_key(&KeyEvent::down(*key_code));
                debug!("Media key handled: {}", handled);
            }
            SimEvent::StartedGoingToSleep => controller.on_started_going_to_sleep(),
            SimEvent::FinishedGoingToSleep => controller.on_finished_going_to_sleep(),
            SimEvent::StartedWakingUp => {
                controller.on_started_waking_up();
                self.rig.unlock.handle_event(TrustEvent::StartedWakingUp);
            }
            SimEvent::ScreenTurningOn => controller.on_screen_turning_on(),
            SimEvent::ScreenTurnedOn => controller.on_screen_turned_on(),
            SimEvent::ScreenTurnedOff => controller.on_screen_turned_off(),
            SimEvent::WakeUpRequested => controller.notify_device_wake_up_requested(),
            SimEvent::LaunchTransition { active } => {
                self.rig.shell.in_launch_transition.set(*active)
            }
            SimEvent::LaunchBeforeFading => controller.on_launch_transition_before_fading(),
            SimEvent::LaunchFaded => controller.on_launch_transition_faded(),
            SimEvent::UnlockMode { mode } => self.rig.shell.unlock_mode.set(*mode),
            SimEvent::SecurityMode { mode } => {
                self.rig.widgets.state.borrow_mut().security_mode = *mode
            }
            SimEvent::TrustChanged { can_skip_bouncer } => {
                self.rig.shell.can_skip.set(*can_skip_bouncer);
                let user = self.rig.shell.user.get();
                self.rig.unlock.handle_event(TrustEvent::TrustChanged { user });
            }
            SimEvent::NotifyAuthenticated { strong_auth } => {
                controller.notify_keyguard_authenticated(*strong_auth)
            }
            SimEvent::ActivityDrawn => {
                controller.on_activity_drawn();
                self.rig.shell.run_post_collapse_actions();
            }
            SimEvent::PanelExpansion { fraction } => {
                controller.scrim_mut().set_panel_expansion(*fraction)
            }
            SimEvent::TrackingStarted => controller.scrim_mut().on_tracking_started(),
            SimEvent::TrackingFinished => controller.scrim_mut().on_tracking_finished(),
            SimEvent::Dozing { dozing } => controller.scrim_mut().set_dozing(*dozing),
            SimEvent::DozeAlpha { front, behind } => {
                let scrim = controller.scrim_mut();
                if let Some(alpha) = front {
                    scrim.set_doze_front_alpha(*alpha);
                }
                if let Some(alpha) = behind {
                    scrim.set_doze_behind_alpha(*alpha);
                }
            }
            SimEvent::WakeAndUnlocking => controller.scrim_mut().set_wake_and_unlocking(),
            SimEvent::HeadsUpPinned { key } => controller.scrim_mut().on_heads_up_pinned(key),
            SimEvent::HeadsUpUnpinned { key } => controller.scrim_mut().on_heads_up_unpinned(key),
            SimEvent::HeadsUpDrag { key, amount } => controller
                .scrim_mut()
                .set_top_heads_up_drag_amount(key.as_deref(), *amount),
        }
    }

    /// Collect calls made since the previous entry
    fn record(&mut self, label: &str) {
        let shell_calls = self.rig.shell.calls();
        let widget_calls = self.rig.widgets.calls();
        let mut calls: Vec<String> = shell_calls[self.shell_seen..].to_vec();
        calls.extend_from_slice(&widget_calls[self.widget_seen..]);
        self.shell_seen = shell_calls.len();
        self.widget_seen = widget_calls.len();

        if calls.is_empty() && label == "frames" {
            return;
        }
        self.transcript.push(TranscriptEntry {
            at_ms: self.elapsed_ms(),
            label: label.to_string(),
            calls,
        });
    }

    /// Snapshot the current controller state
    pub fn final_state(&self) -> FinalState {
        let controller = &self.rig.controller;
        FinalState {
            phase: controller.phase(),
            presentation: controller.state(),
            bouncer: controller.bouncer().state(),
            unlock: self.rig.unlock.state(),
            scrim: ScrimSummary {
                behind: controller.scrim().composited_alpha(ScrimTarget::Behind),
                in_front: controller.scrim().composited_alpha(ScrimTarget::InFront),
                heads_up: controller.scrim().composited_alpha(ScrimTarget::HeadsUp),
            },
            navigation_bar_visible: self.rig.shell.navigation_bar_visible.get(),
        }
    }

    fn finish(self, script: &Script) -> Report {
        let final_state = self.final_state();
        info!(
            "Script '{}' finished in phase {:?}",
            script.display_name(),
            final_state.phase
        );
        Report {
            script: script.display_name().to_string(),
            generated_at: Utc::now(),
            steps: script.steps.len(),
            duration_ms: self.elapsed_ms(),
            transcript: self.transcript,
            final_state,
        }
    }
}
