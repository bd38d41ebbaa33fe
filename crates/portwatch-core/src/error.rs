//! Core error types for Portwatch.
//!
//! Subsystem crates define their own error enums; this module holds the
//! errors shared by the data model and the configuration layer.

use thiserror::Error;

/// Central error type for shared Portwatch operations.
#[derive(Error, Debug)]
pub enum PortwatchError {
    /// Configuration errors (file loading, parsing, validation)
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Validation errors (invalid input, constraints)
    #[error("validation error: {0}")]
    Validation(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to determine config directory path
    #[error("could not determine config directory (XDG base directories not available)")]
    NoConfigDir,

    /// Failed to parse TOML
    #[error("failed to parse config TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Failed to parse a JSON credential list
    #[error("failed to parse credentials for {field}: {source}")]
    Credentials {
        /// Environment variable or config field holding the credentials
        field: String,
        /// Underlying JSON error
        source: serde_json::Error,
    },

    /// I/O error reading config
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration value
    #[error("invalid config value for {field}: {reason}")]
    InvalidValue {
        /// Field name
        field: String,
        /// Reason for invalidity
        reason: String,
    },
}

/// Result type alias using `PortwatchError`.
pub type Result<T> = std::result::Result<T, PortwatchError>;

/// Result type alias for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PortwatchError::Validation("empty target".to_string());
        assert_eq!(err.to_string(), "validation error: empty target");

        let err = ConfigError::InvalidValue {
            field: "scanning.batch_size".to_string(),
            reason: "must be greater than zero".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "invalid config value for scanning.batch_size: must be greater than zero"
        );
    }

    #[test]
    fn test_error_from_config() {
        let config_err = ConfigError::NoConfigDir;
        let err: PortwatchError = config_err.into();
        assert!(matches!(err, PortwatchError::Config(_)));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "test");
        let err: PortwatchError = io_err.into();
        assert!(matches!(err, PortwatchError::Io(_)));
    }
}
