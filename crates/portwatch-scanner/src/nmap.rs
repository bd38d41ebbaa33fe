//! Port scanner trait and the nmap adapter.

use crate::error::{Result, ScanError};
use crate::parser::{parse_grepable, GrepableHost};
use async_trait::async_trait;
use portwatch_core::{ScanFinding, ScanningConfig, Target};
use std::collections::HashMap;
use std::net::IpAddr;
use std::process::Stdio;
use tokio::process::Command;

/// What a scanner reports for one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchScan {
    /// One finding per open port per host
    pub findings: Vec<ScanFinding>,
    /// Hosts the scanner reported as up
    pub hosts_up: usize,
}

/// Trait for anything that can scan a batch of targets.
///
/// Implementations must be thread-safe (Send + Sync) because batches are
/// scanned concurrently from separate tasks.
#[async_trait]
pub trait PortScanner: Send + Sync {
    /// Scan a batch of targets.
    ///
    /// `ports` is a port specification (e.g. `"22,80,443"` or `"1-1024"`);
    /// `None` leaves the choice of ports to the scanner.
    async fn scan(&self, batch: &[Target], ports: Option<&str>, arguments: &str)
        -> Result<BatchScan>;
}

/// Runs `nmap` as a child process with grepable output on stdout.
#[derive(Debug, Clone)]
pub struct NmapScanner {
    program: String,
}

impl NmapScanner {
    /// Create a scanner invoking the given executable.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Create a scanner from the scanning configuration.
    #[must_use]
    pub fn from_config(config: &ScanningConfig) -> Self {
        Self::new(config.nmap_path.clone())
    }

    /// Arguments for one invocation: `-oG - <arguments> [-p <ports>] <targets...>`.
    fn command_args(batch: &[Target], ports: Option<&str>, arguments: &str) -> Vec<String> {
        let mut args = vec!["-oG".to_string(), "-".to_string()];
        args.extend(arguments.split_whitespace().map(str::to_string));
        if let Some(ports) = ports.filter(|p| !p.trim().is_empty()) {
            args.push("-p".to_string());
            args.push(ports.trim().to_string());
        }
        args.extend(batch.iter().map(|t| t.as_str().to_string()));
        args
    }
}

#[async_trait]
impl PortScanner for NmapScanner {
    async fn scan(
        &self,
        batch: &[Target],
        ports: Option<&str>,
        arguments: &str,
    ) -> Result<BatchScan> {
        let args = Self::command_args(batch, ports, arguments);
        tracing::debug!(program = %self.program, args = ?args, "Running nmap");

        // Dropping the future (batch timeout) kills the child.
        let output = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| ScanError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(ScanError::ScannerFailed {
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let hosts = parse_grepable(&String::from_utf8_lossy(&output.stdout));
        let resolved = resolve_hostnames(batch).await;

        Ok(BatchScan {
            hosts_up: hosts.iter().filter(|h| h.up).count(),
            findings: findings_for(&hosts, batch, &resolved),
        })
    }
}

/// Convert parsed hosts into findings, attributing each host to a target.
pub(crate) fn findings_for(
    hosts: &[GrepableHost],
    batch: &[Target],
    resolved: &HashMap<IpAddr, String>,
) -> Vec<ScanFinding> {
    let mut findings = Vec::new();

    for host in hosts {
        let target = target_for(host, batch, resolved);
        for port in host.ports.iter().filter(|p| p.is_open()) {
            findings.push(ScanFinding {
                host: host.address.clone(),
                target: target.clone(),
                protocol: port.protocol,
                port: port.port,
                name: port.service.clone(),
                product: port.version.clone(),
            });
        }
    }

    findings
}

/// The batch target that produced a host, falling back to the address.
fn target_for(host: &GrepableHost, batch: &[Target], resolved: &HashMap<IpAddr, String>) -> String {
    if batch.iter().any(|t| t.as_str() == host.address) {
        return host.address.clone();
    }

    if let Some(name) = &host.hostname {
        if let Some(target) = batch.iter().find(|t| t.as_str().eq_ignore_ascii_case(name)) {
            return target.as_str().to_string();
        }
    }

    host.address
        .parse::<IpAddr>()
        .ok()
        .and_then(|ip| resolved.get(&ip).cloned())
        .unwrap_or_else(|| host.address.clone())
}

/// Resolve hostname targets so findings can be mapped back to them.
async fn resolve_hostnames(batch: &[Target]) -> HashMap<IpAddr, String> {
    let mut resolved = HashMap::new();

    for target in batch.iter().filter(|t| t.ip().is_none()) {
        match tokio::net::lookup_host((target.as_str(), 0)).await {
            Ok(addrs) => {
                for addr in addrs {
                    resolved
                        .entry(addr.ip())
                        .or_insert_with(|| target.as_str().to_string());
                }
            }
            Err(e) => {
                tracing::debug!(target = %target, "Could not resolve target: {}", e);
            }
        }
    }

    resolved
}
