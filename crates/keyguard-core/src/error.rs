//! Error types for the keyguard core
//!
//! The state machine itself never fails; these errors come from loading
//! configuration and parsing simulator scripts.

use thiserror::Error;

/// Result type alias for keyguard operations
pub type Result<T> = std::result::Result<T, KeyguardError>;

/// Errors that can occur outside the state machine proper
#[derive(Debug, Error)]
pub enum KeyguardError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration failed validation
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed event script
    #[error("Script error: {0}")]
    Script(String),
}

impl From<serde_json::Error> for KeyguardError {
    fn from(e: serde_json::Error) -> Self {
        KeyguardError::Serialization(e.to_string())
    }
}

impl From<toml::de::Error> for KeyguardError {
    fn from(e: toml::de::Error) -> Self {
        KeyguardError::Serialization(e.to_string())
    }
}

impl From<toml::ser::Error> for KeyguardError {
    fn from(e: toml::ser::Error) -> Self {
        KeyguardError::Serialization(e.to_string())
    }
}
