//! Shared types used across Portwatch.
//!
//! This module defines the cycle-scoped scan data (targets, findings, batch
//! outcomes, run statistics) and the long-lived enrichment records.

use crate::error::PortwatchError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;
use std::time::Duration;

/// A host address to be scanned: an IP address or a hostname.
///
/// Targets are ordered so a set of them batches the same way every time.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Target(String);

impl Target {
    /// Create a new `Target`, trimming surrounding whitespace.
    ///
    /// # Errors
    /// Returns error if the value is empty or contains inner whitespace.
    pub fn new(value: impl Into<String>) -> Result<Self, PortwatchError> {
        let value = value.into();
        let trimmed = value.trim();

        if trimmed.is_empty() {
            return Err(PortwatchError::Validation(
                "invalid target: must not be empty".to_string(),
            ));
        }

        if trimmed.chars().any(char::is_whitespace) {
            return Err(PortwatchError::Validation(format!(
                "invalid target: must not contain whitespace, got '{trimmed}'"
            )));
        }

        Ok(Self(trimmed.to_string()))
    }

    /// Get the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parse the target as an IP address, if it is one.
    #[must_use]
    pub fn ip(&self) -> Option<IpAddr> {
        self.0.parse().ok()
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Transport protocol of a discovered service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// TCP
    Tcp,
    /// UDP
    Udp,
    /// SCTP
    Sctp,
}

impl Protocol {
    /// Label value used in published metrics.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Tcp => "tcp",
            Self::Udp => "udp",
            Self::Sctp => "sctp",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Protocol {
    type Err = PortwatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tcp" => Ok(Self::Tcp),
            "udp" => Ok(Self::Udp),
            "sctp" => Ok(Self::Sctp),
            other => Err(PortwatchError::Validation(format!(
                "unknown protocol '{other}'"
            ))),
        }
    }
}

/// One open service discovered on one host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanFinding {
    /// Address the scanner reported the service on
    pub host: String,
    /// Target string that produced this host (equals `host` for IP targets)
    pub target: String,
    /// Transport protocol
    pub protocol: Protocol,
    /// Port number
    pub port: u16,
    /// Service name (e.g. "http")
    pub name: String,
    /// Detected product, empty when unknown
    pub product: String,
}

impl ScanFinding {
    /// Identity of the finding for merge purposes.
    #[must_use]
    pub fn key(&self) -> (String, Protocol, u16) {
        (self.host.clone(), self.protocol, self.port)
    }
}

/// Result of scanning one batch of targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Position of the batch within the cycle
    pub index: usize,
    /// Targets that made up the batch
    pub targets: Vec<Target>,
    /// Findings reported for the batch (empty when failed)
    pub findings: Vec<ScanFinding>,
    /// Hosts the scanner reported as up
    pub hosts_up: usize,
    /// Error message if the batch failed
    pub error: Option<String>,
}

impl BatchOutcome {
    /// Build a successful outcome.
    #[must_use]
    pub fn success(
        index: usize,
        targets: Vec<Target>,
        findings: Vec<ScanFinding>,
        hosts_up: usize,
    ) -> Self {
        Self {
            index,
            targets,
            findings,
            hosts_up,
            error: None,
        }
    }

    /// Build a failed outcome; failed batches never carry findings.
    #[must_use]
    pub fn failure(index: usize, targets: Vec<Target>, error: impl Into<String>) -> Self {
        Self {
            index,
            targets,
            findings: Vec::new(),
            hosts_up: 0,
            error: Some(error.into()),
        }
    }

    /// Whether the batch completed without error.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Statistics of one completed scan cycle.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RunStats {
    /// Number of targets obtained from the target source
    pub target_count: usize,
    /// Time from the start of target fetching to publication
    pub elapsed: Duration,
    /// Hosts reported up by successful batches
    pub hosts_up: usize,
    /// Scanned hosts not reported up
    pub hosts_down: usize,
    /// Hosts submitted for scanning
    pub total_hosts: usize,
    /// Batches that completed
    pub successful_batches: usize,
    /// Batches that failed or timed out
    pub failed_batches: usize,
}

/// Coarse classification of an ISP/ASN.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionType {
    /// Mobile/cellular carrier
    Mobile,
    /// Cloud or hosting provider
    Datacentre,
    /// Fiber access network
    Fibre,
    /// DSL access network
    Dsl,
    /// No keyword matched
    #[default]
    Unknown,
}

impl ConnectionType {
    /// Label value used in published metrics.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mobile => "mobile",
            Self::Datacentre => "datacentre",
            Self::Fibre => "fibre",
            Self::Dsl => "dsl",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ConnectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Network-intelligence metadata for one IP.
///
/// Records are immutable; an expired record is replaced by a fresh one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichmentRecord {
    /// IP address the record describes
    pub ip: String,
    /// Internet service provider
    pub isp: String,
    /// Owning organization
    pub org: String,
    /// Autonomous system number (e.g. "AS15169")
    pub asn: String,
    /// ISO country code
    pub country: String,
    /// Region or state
    pub region: String,
    /// City
    pub city: String,
    /// Inferred connection type
    pub connection_type: ConnectionType,
    /// When the record was fetched from the provider
    pub fetched_at: DateTime<Utc>,
}
