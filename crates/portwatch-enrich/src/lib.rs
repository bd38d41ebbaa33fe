//! Portwatch Enrich - network-intelligence metadata for discovered hosts.
//!
//! This crate attaches ISP, ASN and location data to host IPs and infers a
//! coarse connection type from the provider's names.
//!
//! # Example
//!
//! ```rust,ignore
//! use portwatch_enrich::{EnrichmentCache, IpApiProvider};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let provider = Arc::new(IpApiProvider::new(None, Duration::from_secs(10))?);
//! let cache = EnrichmentCache::new(provider, Duration::from_secs(86_400), Duration::from_secs(10));
//!
//! let record = cache.lookup("8.8.8.8").await?;
//! println!("{} -> {}", record.isp, record.connection_type);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod cache;
pub mod classify;
pub mod error;
pub mod provider;

// Re-export commonly used types
pub use cache::{CacheStats, CachedEntry, Clock, EnrichmentCache, SystemClock};
pub use classify::{classify, classify_parts};
pub use error::{EnrichError, Result};
pub use provider::{from_config, EnrichmentProvider, IpApiProvider, ProviderRecord};
