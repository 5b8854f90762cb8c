//! Error types for CLI operations.

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Payload given to `decode` is not usable
    #[error("Invalid payload: {message}")]
    InvalidPayload { message: String },

    /// Simulation parameters out of range
    #[error("Invalid simulation: {message}")]
    InvalidSimulation { message: String },

    /// Operator console line not understood
    #[error("Unknown console command '{input}': {message}")]
    Console { input: String, message: String },
}

impl CliError {
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    pub fn invalid_payload(message: impl Into<String>) -> Self {
        Self::InvalidPayload {
            message: message.into(),
        }
    }

    pub fn invalid_simulation(message: impl Into<String>) -> Self {
        Self::InvalidSimulation {
            message: message.into(),
        }
    }

    pub fn console(input: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Console {
            input: input.into(),
            message: message.into(),
        }
    }
}
