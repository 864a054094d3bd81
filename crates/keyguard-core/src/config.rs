//! Timing and scrim configuration
//!
//! Defaults reproduce the tuned platform values. A config file may override
//! any subset; missing fields fall back to the defaults.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{KeyguardError, Result};

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeyguardConfig {
    /// Transition timings
    #[serde(default)]
    pub timing: TimingConfig,

    /// Scrim alpha levels
    #[serde(default)]
    pub scrim: ScrimConfig,
}

/// Transition timings, in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Default scrim animation length
    pub scrim_animation_ms: u64,

    /// How much earlier than the window manager's start time the fade begins
    pub hide_timing_correction_ms: u64,

    /// Navigation bar delay when it appears because the bouncer appeared.
    /// Keep in sync with the challenge widgets' appear animations.
    pub nav_bar_show_delay_bouncer_ms: u64,

    /// Scrim fade-out after a wake-and-unlock
    pub wake_and_unlock_fade_out_ms: u64,

    /// Scrim fade-out after a wake-and-unlock from a pulsing ambient display
    pub pulsing_fade_out_ms: u64,

    /// Start delay of the fade that follows a launch transition
    pub launch_fade_start_delay_ms: u64,

    /// Length of the fade that follows a launch transition
    pub launch_fade_duration_ms: u64,

    /// Play time skipped when a frame was already advanced
    pub skip_first_frame_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            scrim_animation_ms: 220,
            hide_timing_correction_ms: 48,
            nav_bar_show_delay_bouncer_ms: 320,
            wake_and_unlock_fade_out_ms: 200,
            pulsing_fade_out_ms: 240,
            launch_fade_start_delay_ms: 100,
            launch_fade_duration_ms: 300,
            skip_first_frame_ms: 16,
        }
    }
}

impl TimingConfig {
    pub fn scrim_animation(&self) -> Duration {
        Duration::from_millis(self.scrim_animation_ms)
    }

    pub fn hide_timing_correction(&self) -> Duration {
        Duration::from_millis(self.hide_timing_correction_ms)
    }

    pub fn nav_bar_show_delay_bouncer(&self) -> Duration {
        Duration::from_millis(self.nav_bar_show_delay_bouncer_ms)
    }

    pub fn wake_and_unlock_fade_out(&self) -> Duration {
        Duration::from_millis(self.wake_and_unlock_fade_out_ms)
    }

    pub fn pulsing_fade_out(&self) -> Duration {
        Duration::from_millis(self.pulsing_fade_out_ms)
    }

    pub fn launch_fade_start_delay(&self) -> Duration {
        Duration::from_millis(self.launch_fade_start_delay_ms)
    }

    pub fn launch_fade_duration(&self) -> Duration {
        Duration::from_millis(self.launch_fade_duration_ms)
    }

    pub fn skip_first_frame(&self) -> Duration {
        Duration::from_millis(self.skip_first_frame_ms)
    }
}

/// Scrim alpha levels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrimConfig {
    /// Behind scrim with the shade fully open over unlocked content
    pub behind_alpha: f32,

    /// Behind scrim on the keyguard
    pub behind_alpha_keyguard: f32,

    /// Behind scrim floor while the keyguard is being swiped away
    pub behind_alpha_unlocking: f32,

    /// Front scrim while the bouncer is showing
    pub in_front_alpha: f32,

    /// Whether the behind scrim may draw in "src" mode when no backdrop is
    /// visible
    pub scrim_src_enabled: bool,
}

impl Default for ScrimConfig {
    fn default() -> Self {
        Self {
            behind_alpha: 0.62,
            behind_alpha_keyguard: 0.45,
            behind_alpha_unlocking: 0.2,
            in_front_alpha: 0.75,
            scrim_src_enabled: true,
        }
    }
}

impl KeyguardConfig {
    /// Load from a JSON (`.json`) or TOML file and validate
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Self = if is_json(path) {
            serde_json::from_str(&contents)?
        } else {
            toml::from_str(&contents)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Load, falling back to defaults if the file is missing or invalid
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        Self::load(path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load config {:?}: {}", path, e);
            Self::default()
        })
    }

    /// Save as JSON or TOML depending on the file extension
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = if is_json(path) {
            serde_json::to_string_pretty(self)?
        } else {
            self.to_toml()?
        };
        fs::write(path, contents)?;
        tracing::debug!("Saved config to {:?}", path);
        Ok(())
    }

    /// Render as TOML
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check ranges and ordering of the configured values
    pub fn validate(&self) -> Result<()> {
        let s = &self.scrim;
        for (name, alpha) in [
            ("behind_alpha", s.behind_alpha),
            ("behind_alpha_keyguard", s.behind_alpha_keyguard),
            ("behind_alpha_unlocking", s.behind_alpha_unlocking),
            ("in_front_alpha", s.in_front_alpha),
        ] {
            if !(0.0..=1.0).contains(&alpha) {
                return Err(KeyguardError::Config(format!(
                    "{} must be within [0, 1], got {}",
                    name, alpha
                )));
            }
        }
        if s.behind_alpha_unlocking > s.behind_alpha_keyguard {
            return Err(KeyguardError::Config(
                "behind_alpha_unlocking must not exceed behind_alpha_keyguard".to_string(),
            ));
        }
        if self.timing.scrim_animation_ms == 0 {
            return Err(KeyguardError::Config(
                "scrim_animation_ms must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

fn is_json(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some("json")
}
