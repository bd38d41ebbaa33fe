//! Portwatch Metrics - Published scan metrics
//!
//! The [`MetricsRegistry`] holds one immutable [`MetricsSnapshot`] per
//! completed cycle and renders it in the Prometheus text exposition format:
//!
//! - `nmap_scan_results` / `nmap_scan_results_geoip` gauges, value = port
//! - `nmap_scan_stats_info` info record
//! - `nmap_target_count` and `nmap_scan_duration_seconds` gauges
//! - `nmap_successful_scans_total` and `nmap_failed_scans_total` counters

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_panics_doc)]

pub mod exposition;
pub mod registry;

pub use exposition::{escape_label_value, render, CONTENT_TYPE};
pub use registry::{MetricsRegistry, MetricsSnapshot};
