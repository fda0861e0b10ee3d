//! # Error Types
//!
//! Custom error types for Joylink using `thiserror`.

use thiserror::Error;

/// Session stage an error belongs to.
///
/// Setup failures happen before the transmitter or the input mapper start.
/// Steady-state failures end a running session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Setup,
    SteadyState,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Setup => f.write_str("setup"),
            Stage::SteadyState => f.write_str("steady-state"),
        }
    }
}

/// Main error type for Joylink
#[derive(Debug, Error)]
pub enum JoylinkError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TCP connection to the drone could not be established
    #[error("Failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// No joystick device found during auto-detection
    #[error("No joystick found under /dev/input")]
    JoystickNotFound,

    /// Joystick device could not be opened or configured
    #[error("Joystick error: {0}")]
    Joystick(String),

    /// Writing a frame to the drone failed
    #[error("Transmission failed: {0}")]
    Transmission(String),

    /// Joystick became unreadable mid-session
    #[error("Input source failed: {0}")]
    InputSource(String),

    /// User confirmation could not be read
    #[error("Confirmation failed: {0}")]
    Confirmation(String),

    /// Malformed control frame
    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl JoylinkError {
    /// Returns the session stage this error is attributed to.
    #[must_use]
    pub fn stage(&self) -> Stage {
        match self {
            JoylinkError::Config(_)
            | JoylinkError::Io(_)
            | JoylinkError::Connect { .. }
            | JoylinkError::JoystickNotFound
            | JoylinkError::Joystick(_) => Stage::Setup,
            JoylinkError::Transmission(_)
            | JoylinkError::InputSource(_)
            | JoylinkError::Confirmation(_)
            | JoylinkError::Protocol(_) => Stage::SteadyState,
        }
    }
}

/// Result type alias for Joylink
pub type Result<T> = std::result::Result<T, JoylinkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setup_errors_are_setup_stage() {
        assert_eq!(JoylinkError::JoystickNotFound.stage(), Stage::Setup);
        let err = JoylinkError::Connect {
            addr: "192.168.1.1:8888".to_string(),
            source: std::io::Error::from(std::io::ErrorKind::ConnectionRefused),
        };
        assert_eq!(err.stage(), Stage::Setup);
        assert!(err.to_string().contains("192.168.1.1:8888"));
    }

    #[test]
    fn test_runtime_errors_are_steady_state() {
        assert_eq!(
            JoylinkError::Transmission("broken pipe".into()).stage(),
            Stage::SteadyState
        );
        assert_eq!(
            JoylinkError::InputSource("gone".into()).stage(),
            Stage::SteadyState
        );
    }

    #[test]
    fn test_stage_display() {
        assert_eq!(Stage::Setup.to_string(), "setup");
        assert_eq!(Stage::SteadyState.to_string(), "steady-state");
    }
}
