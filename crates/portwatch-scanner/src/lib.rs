//! Portwatch Scanner - Batch scanning and scan cycle coordination
//!
//! - [`nmap`]: the [`PortScanner`] trait and the nmap child-process adapter
//! - [`parser`]: nmap grepable output parser
//! - [`scheduler`]: fixed-size batches under a concurrency limit
//! - [`coordinator`]: one full cycle from target fetch to metric publication

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod coordinator;
pub mod error;
pub mod nmap;
pub mod parser;
pub mod scheduler;

pub use coordinator::{
    merge_outcomes, CycleCounters, CyclePhase, ExporterContext, MergedResults, ScanCoordinator,
};
pub use error::{CycleError, Result, ScanError};
pub use nmap::{BatchScan, NmapScanner, PortScanner};
pub use parser::{parse_grepable, GrepableHost, GrepablePort};
pub use scheduler::{partition, BatchScheduler};
