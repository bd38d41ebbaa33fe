//! Error types for the enrichment subsystem.

use thiserror::Error;

/// Errors that can occur while enriching a host.
#[derive(Error, Debug)]
pub enum EnrichError {
    /// Address is private, loopback or otherwise not worth a lookup
    #[error("address {ip} is not globally routable")]
    NotRoutable {
        /// Offending address
        ip: String,
    },

    /// Value is not an IP address
    #[error("invalid IP address: {0}")]
    InvalidAddress(String),

    /// Provider rejected the request due to rate limiting
    #[error("rate limit exceeded for {provider}")]
    RateLimited {
        /// Provider name
        provider: String,
    },

    /// API error with status code
    #[error("API error ({provider}): status {status}")]
    ApiError {
        /// Provider name
        provider: String,
        /// HTTP status code
        status: u16,
    },

    /// Provider answered with an error payload
    #[error("provider error ({provider}): {message}")]
    ProviderError {
        /// Provider name
        provider: String,
        /// Error message
        message: String,
    },

    /// Unsupported provider configured
    #[error("unsupported enrichment provider: {0}")]
    UnsupportedProvider(String),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Timeout error
    #[error("lookup timed out after {seconds}s")]
    Timeout {
        /// Timeout duration in seconds
        seconds: u64,
    },
}

/// Result type alias for enrichment operations.
pub type Result<T> = std::result::Result<T, EnrichError>;
