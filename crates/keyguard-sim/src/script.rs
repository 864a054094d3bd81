//! Simulation scripts
//!
//! ```toml
//! name = "unlock with pin"
//!
//! [setup]
//! security_mode = "pin"
//! interactive = true
//!
//! [[step]]
//! at_ms = 0
//! event = "show"
//!
//! [[step]]
//! at_ms = 500
//! event = "hide"
//! fadeout_ms = 300
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use keyguard_core::{KeyguardError, Result, SecurityMode, UnlockMode};

/// A parsed script
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Script {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub setup: Setup,

    #[serde(default, rename = "step")]
    pub steps: Vec<Step>,
}

/// Initial collaborator state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Setup {
    /// A secure credential is configured
    pub secure: bool,
    /// Security method reported by the challenge widget
    pub security_mode: SecurityMode,
    /// The challenge dismisses itself without user input
    pub dismiss_without_challenge: bool,
    pub can_skip_bouncer: bool,
    pub interactive: bool,
    pub screen_on: bool,
    pub has_navigation_bar: bool,
    pub unlock_mode: UnlockMode,
    pub in_launch_transition: bool,
}

impl Default for Setup {
    fn default() -> Self {
        Self {
            secure: false,
            security_mode: SecurityMode::None,
            dismiss_without_challenge: false,
            can_skip_bouncer: false,
            interactive: true,
            screen_on: true,
            has_navigation_bar: true,
            unlock_mode: UnlockMode::None,
            in_launch_transition: false,
        }
    }
}

/// One timed event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// Milliseconds since the start of the run
    pub at_ms: u64,

    #[serde(flatten)]
    pub event: SimEvent,
}

fn default_fadeout_ms() -> u64 {
    300
}

/// Events a script can send
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SimEvent {
    Show,
    Hide {
        /// Window manager start time, relative to the step time
        #[serde(default)]
        start_offset_ms: u64,
        #[serde(default = "default_fadeout_ms")]
        fadeout_ms: u64,
    },
    Reset,
    Dismiss,
    SetOccluded {
        occluded: bool,
    },
    BackPressed,
    MenuPressed,
    MediaKey {
        key_code: u32,
    },
    StartedGoingToSleep,
    FinishedGoingToSleep,
    StartedWakingUp,
    ScreenTurningOn,
    ScreenTurnedOn,
    ScreenTurnedOff,
    WakeUpRequested,
    LaunchTransition {
        active: bool,
    },
    LaunchBeforeFading,
    LaunchFaded,
    UnlockMode {
        mode: UnlockMode,
    },
    SecurityMode {
        mode: SecurityMode,
    },
    TrustChanged {
        can_skip_bouncer: bool,
    },
    NotifyAuthenticated {
        #[serde(default)]
        strong_auth: bool,
    },
    ActivityDrawn,
    PanelExpansion {
        fraction: f32,
    },
    TrackingStarted,
    TrackingFinished,
    Dozing {
        dozing: bool,
    },
    DozeAlpha {
        #[serde(default)]
        front: Option<f32>,
        #[serde(default)]
        behind: Option<f32>,
    },
    WakeAndUnlocking,
    HeadsUpPinned {
        key: String,
    },
    HeadsUpUnpinned {
        key: String,
    },
    HeadsUpDrag {
        #[serde(default)]
        key: Option<String>,
        amount: f32,
    },
}

impl SimEvent {
    /// Short label for transcripts
    pub fn label(&self) -> String {
        match self {
            SimEvent::Hide {
                start_offset_ms,
                fadeout_ms,
            } => format!("hide(+{} ms, {} ms)", start_offset_ms, fadeout_ms),
            SimEvent::SetOccluded { occluded } => format!("set_occluded({})", occluded),
            SimEvent::MediaKey { key_code } => format!("media_key({})", key_code),
            SimEvent::LaunchTransition { active } => format!("launch_transition({})", active),
            SimEvent::UnlockMode { mode } => format!("unlock_mode({:?})", mode),
            SimEvent::SecurityMode { mode } => format!("security_mode({:?})", mode),
            SimEvent::TrustChanged { can_skip_bouncer } => {
                format!("trust_changed(can_skip_bouncer: {})", can_skip_bouncer)
            }
            SimEvent::NotifyAuthenticated { strong_auth } => {
                format!("notify_authenticated({})", strong_auth)
            }
            SimEvent::PanelExpansion { fraction } => format!("panel_expansion({})", fraction),
            SimEvent::Dozing { dozing } => format!("dozing({})", dozing),
            SimEvent::DozeAlpha { front, behind } => {
                format!("doze_alpha(front: {:?}, behind: {:?})", front, behind)
            }
            SimEvent::HeadsUpPinned { key } => format!("heads_up_pinned({})", key),
            SimEvent::HeadsUpUnpinned { key } => format!("heads_up_unpinned({})", key),
            SimEvent::HeadsUpDrag { key, amount } => {
                format!("heads_up_drag({:?}, {})", key.as_deref(), amount)
            }
            other => format!("{:?}", other),
        }
    }
}

impl Script {
    /// Parse and validate TOML script text
    pub fn parse(text: &str) -> Result<Self> {
        let script: Script =
            toml::from_str(text).map_err(|e| KeyguardError::Script(e.to_string()))?;
        script.validate()?;
        Ok(script)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::parse(&text)
    }

    fn validate(&self) -> Result<()> {
        let mut last = 0;
        for (i, step) in self.steps.iter().enumerate() {
            if step.at_ms < last {
                return Err(KeyguardError::Script(format!(
                    "step {} at {} ms is earlier than the previous step at {} ms",
                    i + 1,
                    step.at_ms,
                    last
                )));
            }
            last = step.at_ms;
        }
        Ok(())
    }

    /// Time of the last step
    pub fn duration_ms(&self) -> u64 {
        self.steps.last().map(|s| s.at_ms).unwrap_or(0)
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("unnamed")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_parse_script() {
        let script = Script::parse(
            r#"
            name = "pin unlock"

            [setup]
            security_mode = "pin"
            screen_on = false

            [[step]]
            at_ms = 0
            event = "show"

            [[step]]
            at_ms = 100
            event = "set_occluded"
            occluded = true

            [[step]]
            at_ms = 400
            event = "hide"
            fadeout_ms = 250
            "#,
        )
        .unwrap();

        assert_eq!(script.display_name(), "pin unlock");
        assert_eq!(script.setup.security_mode, SecurityMode::Pin);
        assert!(!script.setup.screen_on);
        assert!(script.setup.has_navigation_bar);
        assert_eq!(script.steps.len(), 3);
        assert_eq!(script.steps[1].event, SimEvent::SetOccluded { occluded: true });
        assert_eq!(
            script.steps[2].event,
            SimEvent::Hide {
                start_offset_ms: 0,
                fadeout_ms: 250
            }
        );
        assert_eq!(script.duration_ms(), 400);
    }

    #[test]
    fn test_empty_script_is_valid() {
        let script = Script::parse("").unwrap();
        assert!(script.steps.is_empty());
        assert_eq!(script.setup, Setup::default());
    }

    #[rstest]
    #[case("[[step]]\nat_ms = 0\nevent = \"explode\"\n")]
    #[case("[[step]]\nat_ms = 0\nevent = \"set_occluded\"\n")]
    #[case("[[step]]\nat_ms = 50\nevent = \"show\"\n[[step]]\nat_ms = 10\nevent = \"reset\"\n")]
    fn test_invalid_scripts(#[case] text: &str) {
        assert!(matches!(Script::parse(text), Err(KeyguardError::Script(_))));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("drag.toml");
        std::fs::write(
            &path,
            "[[step]]\nat_ms = 10\nevent = \"heads_up_drag\"\namount = 0.25\n",
        )
        .unwrap();

        let script = Script::load(&path).unwrap();
        assert_eq!(
            script.steps[0].event,
            SimEvent::HeadsUpDrag {
                key: None,
                amount: 0.25
            }
        );

        let missing = Script::load(&dir.path().join("missing.toml"));
        assert!(matches!(missing, Err(KeyguardError::Io(_))));
    }

    #[test]
    fn test_labels() {
        assert_eq!(SimEvent::Show.label(), "Show");
        assert_eq!(
            SimEvent::PanelExpansion { fraction: 0.5 }.label(),
            "panel_expansion(0.5)"
        );
    }

    #[test]
    fn test_parse_doze_alpha_with_one_side() {
        let script = Script::parse(
            r#"
            [[step]]
            at_ms = 0
            event = "doze_alpha"
            behind = 1.0

            [[step]]
            at_ms = 5
            event = "wake_and_unlocking"
            "#,
        )
        .unwrap();
        assert_eq!(
            script.steps[0].event,
            SimEvent::DozeAlpha {
                front: None,
                behind: Some(1.0)
            }
        );
        assert_eq!(script.steps[1].event, SimEvent::WakeAndUnlocking);
    }
}
