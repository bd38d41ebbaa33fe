//! Parser for nmap grepable output (`-oG`).
//!
//! Each host line is tab separated:
//!
//! ```text
//! Host: 8.8.8.8 (dns.google)	Status: Up
//! Host: 8.8.8.8 (dns.google)	Ports: 53/open/tcp//domain//Google DNS/, 443/open/tcp//https///
//! ```
//!
//! A port entry is `port/state/protocol/owner/service/rpc/version/`; nmap
//! replaces slashes inside fields with `|`.

use portwatch_core::Protocol;
use std::collections::HashMap;

/// One port entry of a host line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrepablePort {
    /// Port number
    pub port: u16,
    /// Port state as reported (`open`, `open|filtered`, `closed`, ...)
    pub state: String,
    /// Transport protocol
    pub protocol: Protocol,
    /// Service name
    pub service: String,
    /// Product and version string, empty without version detection
    pub version: String,
}

impl GrepablePort {
    /// Whether the port counts as an open service.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state.starts_with("open")
    }
}

/// Everything reported for one address.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GrepableHost {
    /// Scanned address
    pub address: String,
    /// Name in parentheses after the address, if any
    pub hostname: Option<String>,
    /// Whether nmap reported the host up
    pub up: bool,
    /// Port entries
    pub ports: Vec<GrepablePort>,
}

/// Parse grepable output into hosts, in order of first appearance.
///
/// Malformed port entries are skipped.
#[must_use]
pub fn parse_grepable(output: &str) -> Vec<GrepableHost> {
    let mut hosts: Vec<GrepableHost> = Vec::new();
    let mut by_address: HashMap<String, usize> = HashMap::new();

    for line in output.lines() {
        if line.starts_with('#') {
            continue;
        }

        let mut fields = line.split('\t');
        let Some((address, hostname)) = fields.next().and_then(parse_host_field) else {
            continue;
        };

        let idx = *by_address.entry(address.clone()).or_insert_with(|| {
            hosts.push(GrepableHost {
                address: address.clone(),
                ..GrepableHost::default()
            });
            hosts.len() - 1
        });
        let host = &mut hosts[idx];
        if host.hostname.is_none() {
            host.hostname = hostname;
        }

        for field in fields {
            if let Some(status) = field.strip_prefix("Status: ") {
                host.up |= status.trim() == "Up";
            } else if let Some(ports) = field.strip_prefix("Ports: ") {
                host.ports.extend(split_port_entries(ports).filter_map(parse_port_entry));
            }
        }

        // A port line implies the host answered.
        if host.ports.iter().any(GrepablePort::is_open) {
            host.up = true;
        }
    }

    hosts
}

/// `Host: 8.8.8.8 (dns.google)` → ("8.8.8.8", Some("dns.google"))
fn parse_host_field(field: &str) -> Option<(String, Option<String>)> {
    let rest = field.strip_prefix("Host: ")?.trim();
    let (address, name) = match rest.split_once(' ') {
        Some((address, name)) => (address, name.trim()),
        None => (rest, ""),
    };
    if address.is_empty() {
        return None;
    }

    let name = name
        .strip_prefix('(')
        .and_then(|n| n.strip_suffix(')'))
        .filter(|n| !n.is_empty())
        .map(str::to_string);

    Some((address.to_string(), name))
}

/// Split the `Ports:` field on the `, ` that precedes each `<digits>/`.
///
/// Version strings may themselves contain `, `.
fn split_port_entries(ports: &str) -> impl Iterator<Item = String> + '_ {
    let mut entries: Vec<String> = Vec::new();
    for piece in ports.split(", ") {
        let starts_entry = piece
            .split_once('/')
            .is_some_and(|(port, _)| !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()));

        match entries.last_mut() {
            Some(last) if !starts_entry => {
                last.push_str(", ");
                last.push_str(piece);
            }
            _ => entries.push(piece.to_string()),
        }
    }
    entries.into_iter()
}

fn parse_port_entry(entry: String) -> Option<GrepablePort> {
    let parts: Vec<&str> = entry.trim().split('/').collect();
    if parts.len() < 7 {
        tracing::warn!(entry = %entry, "Skipping malformed port entry");
        return None;
    }

    let port = parts[0].parse::<u16>().ok()?;
    let protocol = match parts[2].parse::<Protocol>() {
        Ok(protocol) => protocol,
        Err(e) => {
            tracing::warn!(entry = %entry, "Skipping port entry: {}", e);
            return None;
        }
    };

    Some(GrepablePort {
        port,
        state: parts[1].to_string(),
        protocol,
        service: parts[4].to_string(),
        version: parts[6].trim().to_string(),
    })
}
