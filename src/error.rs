//! Error types and handling for Aethon
//!
//! This module defines the error types used throughout the application,
//! providing consistent error handling and reporting.

use thiserror::Error;

/// Result type alias for Aethon operations
pub type Result<T> = std::result::Result<T, AethonError>;

/// Main error type for Aethon
#[derive(Debug, Error)]
pub enum AethonError {
    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Serialization/deserialization errors
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// File I/O errors
    #[error("I/O error: {message}")]
    Io { message: String },

    /// Network-related errors
    #[error("Network error: {message}")]
    Network { message: String },

    /// API integration errors (Rivian, Enphase, Hubitat)
    #[error("API error: {message}")]
    Api { message: String },

    /// Authentication/authorization errors
    #[error("Authentication error: {message}")]
    Auth { message: String },

    /// Validation errors
    #[error("Validation error: {field} - {message}")]
    Validation { field: String, message: String },

    /// Generic errors with context
    #[error("Error: {message}")]
    Generic { message: String },
}

impl AethonError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        AethonError::Config {
            message: message.into(),
        }
    }

    /// Create a new I/O error
    pub fn io<S: Into<String>>(message: S) -> Self {
        AethonError::Io {
            message: message.into(),
        }
    }

    /// Create a new network error
    pub fn network<S: Into<String>>(message: S) -> Self {
        AethonError::Network {
            message: message.into(),
        }
    }

    /// Create a new API error
    pub fn api<S: Into<String>>(message: S) -> Self {
        AethonError::Api {
            message: message.into(),
        }
    }

    /// Create a new auth error
    pub fn auth<S: Into<String>>(message: S) -> Self {
        AethonError::Auth {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(field: S, message: S) -> Self {
        AethonError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a new generic error
    pub fn generic<S: Into<String>>(message: S) -> Self {
        AethonError::Generic {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for AethonError {
    fn from(err: std::io::Error) -> Self {
        AethonError::io(err.to_string())
    }
}

impl From<serde_yaml::Error> for AethonError {
    fn from(err: serde_yaml::Error) -> Self {
        AethonError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for AethonError {
    fn from(err: serde_json::Error) -> Self {
        AethonError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<reqwest::Error> for AethonError {
    fn from(err: reqwest::Error) -> Self {
        AethonError::network(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = AethonError::config("test config error");
        assert!(matches!(err, AethonError::Config { .. }));

        let err = AethonError::api("test api error");
        assert!(matches!(err, AethonError::Api { .. }));

        let err = AethonError::validation("field", "test validation error");
        assert!(matches!(err, AethonError::Validation { .. }));
    }

    #[test]
    fn test_error_display() {
        let err = AethonError::config("test error");
        let error_string = format!("{}", err);
        assert_eq!(error_string, "Configuration error: test error");

        let err = AethonError::validation("test_field", "invalid value");
        let error_string = format!("{}", err);
        assert_eq!(error_string, "Validation error: test_field - invalid value");
    }
}
