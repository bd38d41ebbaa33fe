//! Portwatch Core - Foundation crate for the Portwatch scan exporter.
//!
//! This crate provides the shared data model, error handling and configuration
//! management that all other Portwatch crates depend on.
//!
//! # Modules
//!
//! - [`error`] - Central error types using thiserror
//! - [`config`] - TOML-based configuration with environment overrides
//! - [`types`] - Shared domain types (`Target`, `ScanFinding`, `BatchOutcome`, `RunStats`, `EnrichmentRecord`)
//!
//! # Example
//!
//! ```rust
//! use portwatch_core::{AppConfig, Target};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::default();
//! assert_eq!(config.scanning.batch_size, 50);
//!
//! let target = Target::new(" 8.8.8.8 ")?;
//! assert_eq!(target.as_str(), "8.8.8.8");
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod config;
pub mod error;
pub mod types;

// Re-export commonly used types
pub use config::{
    AppConfig, AwsAccount, AzureAccount, EnrichmentConfig, ExporterConfig, ScanningConfig,
    TargetSourceKind, TargetsConfig,
};
pub use error::{ConfigError, ConfigResult, PortwatchError, Result};
pub use types::{
    BatchOutcome, ConnectionType, EnrichmentRecord, Protocol, RunStats, ScanFinding, Target,
};
