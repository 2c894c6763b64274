//! Structured error types for deskpilot
//!
//! Distinguishes validation failures, automation failures and protocol
//! errors so the transport layer can decide what to surface upstream.

use std::path::PathBuf;
use thiserror::Error;

/// Primary error type for deskpilot operations
#[derive(Error, Debug)]
pub enum AgentError {
    /// Malformed command envelope; rejected before any execution
    #[error("invalid command: {message}")]
    Validation { message: String },

    /// Canonical envelope carried a type this agent does not know.
    /// Signals a protocol/version skew and is allowed to propagate.
    #[error("unknown command type: {command_type}")]
    UnknownCommandType { command_type: String },

    /// Keymap file missing or unparseable; fatal at startup
    #[error("keymap load failed: {path}: {reason}")]
    KeymapLoad { path: PathBuf, reason: String },

    /// Underlying window query or activation call failed.
    /// A window simply not existing is never an error.
    #[error("window backend failure: {message}")]
    WindowBackend { message: String },

    /// App launch request could not be issued
    #[error("launch failed for '{app}': {reason}")]
    LaunchFailed { app: String, reason: String },

    /// Keystroke injection failure
    #[error("input injection failed: {message}")]
    Input { message: String },

    /// Clipboard access failure during paste-based text entry
    #[error("clipboard failure: {0}")]
    Clipboard(String),

    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AgentError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Protocol errors indicate version skew between the remote side and
    /// this agent; they must reach the caller instead of being folded
    /// into a `success=false` result.
    pub fn is_protocol_error(&self) -> bool {
        matches!(self, Self::UnknownCommandType { .. })
    }

    /// Errors that abort startup rather than a single command.
    pub fn is_startup_fatal(&self) -> bool {
        matches!(self, Self::KeymapLoad { .. } | Self::InvalidConfig { .. })
    }
}

/// Result type alias using AgentError
pub type Result<T> = std::result::Result<T, AgentError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_error_classification() {
        let err = AgentError::UnknownCommandType {
            command_type: "resize_window".to_string(),
        };
        assert!(err.is_protocol_error());

        let err = AgentError::validation("payload missing");
        assert!(!err.is_protocol_error());
    }

    #[test]
    fn test_startup_fatal_classification() {
        let err = AgentError::KeymapLoad {
            path: "keymaps/vscode.yaml".into(),
            reason: "no such file".to_string(),
        };
        assert!(err.is_startup_fatal());
        assert!(!AgentError::Clipboard("denied".to_string()).is_startup_fatal());
    }
}
