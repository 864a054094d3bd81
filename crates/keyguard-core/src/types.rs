//! Shared value types

use serde::{Deserialize, Serialize};

/// One-shot action executed on the coordination thread
pub type Action = Box<dyn FnOnce()>;

/// Identifier of a device user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub u32);

impl UserId {
    /// The device owner
    pub const OWNER: UserId = UserId(0);
}

/// Security method configured for the challenge widget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityMode {
    /// Not yet resolved
    Invalid,
    /// No credential; the lock screen can be swiped away
    #[default]
    None,
    /// Unlock pattern
    Pattern,
    /// Alphanumeric password
    Password,
    /// Numeric PIN
    Pin,
    /// SIM card PIN
    SimPin,
    /// SIM card PUK
    SimPuk,
}

impl SecurityMode {
    /// Whether this method must occupy the whole screen before any lock
    /// content is shown
    pub fn is_fullscreen(self) -> bool {
        matches!(self, SecurityMode::SimPin | SecurityMode::SimPuk)
    }
}

/// Why the bouncer asks the user to authenticate again
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptReason {
    /// No specific reason
    #[default]
    None,
    /// Device restarted
    Restart,
    /// Strong authentication timed out
    Timeout,
    /// Device policy requires it
    DeviceAdmin,
    /// The user asked for a lockdown
    UserRequest,
}

/// Fingerprint unlock mode reported when the keyguard is hidden
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnlockMode {
    /// No fingerprint-driven transition
    #[default]
    None,
    /// Authenticated while the screen was off; wake and unlock at once
    WakeAndUnlock,
    /// Authenticated while the ambient display was pulsing
    WakeAndUnlockPulsing,
    /// Authentication requires the bouncer
    ShowBouncer,
    /// Only wake the device
    OnlyWake,
    /// Unlock while the screen is already on
    Unlock,
    /// Dismiss a showing bouncer
    DismissBouncer,
}

/// Direction of a key event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyAction {
    /// Key pressed
    Down,
    /// Key released
    Up,
}

/// Key event routed to the challenge widget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyEvent {
    /// Platform key code
    pub key_code: u32,
    /// Press or release
    pub action: KeyAction,
}

impl KeyEvent {
    /// Create a key-down event
    pub fn down(key_code: u32) -> Self {
        Self {
            key_code,
            action: KeyAction::Down,
        }
    }

    /// Create a key-up event
    pub fn up(key_code: u32) -> Self {
        Self {
            key_code,
            action: KeyAction::Up,
        }
    }
}
