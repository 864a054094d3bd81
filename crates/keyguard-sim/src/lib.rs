//! Keyguard simulator
//!
//! Replays a TOML script of timed lifecycle and hardware events through a
//! [`keyguard_core::PresentationController`] wired to recording
//! collaborators, and reports every collaborator call together with the
//! final presentation state.

pub mod runner;
pub mod script;

pub use runner::{FinalState, Report, ScrimSummary, Simulation, TranscriptEntry};
pub use script::{Script, Setup, SimEvent, Step};
