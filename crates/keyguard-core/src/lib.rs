//! Keyguard Core - Lock-screen presentation state machine
//!
//! This crate coordinates what the lock screen shows and how it animates:
//! - Caching whether the bouncer can be skipped for the active user
//! - Bouncer (authentication challenge) lifecycle
//! - Scrim alpha computation and animation
//! - The presentation controller reacting to power and lifecycle events
//!
//! Everything runs on a single coordination thread. Work that must wait for
//! the next rendering pass goes through a [`FrameQueue`] and is drained by
//! [`PresentationController::on_frame`].
//!
//! # Optional Features
//!
//! - `mock` - Recording collaborators for tests and the simulator

pub mod animation;
pub mod bouncer;
pub mod clock;
pub mod config;
pub mod controller;
pub mod error;
pub mod frame;
pub mod monitor;
pub mod scrim;
pub mod shell;
pub mod types;
pub mod unlock;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use animation::{AnimationHandle, Interpolator, ValueAnimation};
pub use bouncer::{BouncerPresenter, BouncerState};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{KeyguardConfig, ScrimConfig, TimingConfig};
pub use controller::{
    LaunchStep, PresentationController, PresentationPhase, PresentationState, StateSnapshot,
    StateUpdate,
};
pub use error::{KeyguardError, Result};
pub use frame::FrameQueue;
pub use monitor::{CallbackId, KeyguardMonitor};
pub use scrim::{RunningAnimation, ScrimAnimator, ScrimSurfaces, ScrimTarget};
pub use shell::{
    ChallengeWidget, FingerprintUnlock, KeyguardStateSink, ScrimSurface, Shell, StatusBar,
    TrustSource, ViewMediator, WidgetFactory, WindowController,
};
pub use types::{Action, KeyAction, KeyEvent, PromptReason, SecurityMode, UnlockMode, UserId};
pub use unlock::{ListenerId, TrustEvent, UnlockMethodCache, UnlockMethodState};
