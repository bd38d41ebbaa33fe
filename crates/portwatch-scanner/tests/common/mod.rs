#![allow(dead_code)]

use async_trait::async_trait;
use portwatch_core::{Protocol, ScanFinding, Target};
use portwatch_enrich::{EnrichmentProvider, ProviderRecord};
use portwatch_scanner::{BatchScan, PortScanner, ScanError};
use portwatch_targets::{TargetError, TargetProvider};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

pub fn target(value: &str) -> Target {
    Target::new(value).expect("valid target")
}

pub fn finding(host: &str, port: u16, name: &str) -> ScanFinding {
    ScanFinding {
        host: host.to_string(),
        target: host.to_string(),
        protocol: Protocol::Tcp,
        port,
        name: name.to_string(),
        product: String::new(),
    }
}

/// Scanner with per-target scripted behaviour.
#[derive(Default)]
pub struct ScriptedScanner {
    findings: HashMap<String, Vec<ScanFinding>>,
    failing: HashSet<String>,
    stalling: HashSet<String>,
    panicking: HashSet<String>,
    delay: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    batches: Mutex<Vec<Vec<Target>>>,
}

impl ScriptedScanner {
    pub fn with_finding(mut self, finding: ScanFinding) -> Self {
        self.findings
            .entry(finding.host.clone())
            .or_default()
            .push(finding);
        self
    }

    pub fn failing(mut self, target: &str) -> Self {
        self.failing.insert(target.to_string());
        self
    }

    pub fn stalling(mut self, target: &str) -> Self {
        self.stalling.insert(target.to_string());
        self
    }

    pub fn panicking(mut self, target: &str) -> Self {
        self.panicking.insert(target.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn batches(&self) -> Vec<Vec<Target>> {
        self.batches.lock().unwrap().clone()
    }
}

#[async_trait]
impl PortScanner for ScriptedScanner {
    async fn scan(
        &self,
        batch: &[Target],
        _ports: Option<&str>,
        _arguments: &str,
    ) -> portwatch_scanner::Result<BatchScan> {
        self.batches.lock().unwrap().push(batch.to_vec());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let result = self.scripted(batch).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

impl ScriptedScanner {
    async fn scripted(&self, batch: &[Target]) -> portwatch_scanner::Result<BatchScan> {
        let mut scan = BatchScan::default();

        for target in batch {
            if self.stalling.contains(target.as_str()) {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            if self.panicking.contains(target.as_str()) {
                panic!("scanner crashed on {target}");
            }
            if self.failing.contains(target.as_str()) {
                return Err(ScanError::ScannerFailed {
                    code: Some(1),
                    stderr: format!("cannot scan {target}"),
                });
            }
            if let Some(found) = self.findings.get(target.as_str()) {
                scan.findings.extend(found.iter().cloned());
                scan.hosts_up += 1;
            }
        }

        Ok(scan)
    }
}

/// Target source returning a fixed set, or failing.
pub struct StaticTargets {
    targets: Mutex<Result<BTreeSet<Target>, String>>,
}

impl StaticTargets {
    pub fn new(values: &[&str]) -> Self {
        Self {
            targets: Mutex::new(Ok(values.iter().map(|v| target(v)).collect())),
        }
    }

    pub fn fail(&self) {
        *self.targets.lock().unwrap() = Err("inventory unavailable".to_string());
    }
}

#[async_trait]
impl TargetProvider for StaticTargets {
    async fn fetch_targets(&self) -> portwatch_targets::Result<BTreeSet<Target>> {
        self.targets.lock().unwrap().clone().map_err(|message| {
            TargetError::File {
                path: "targets.txt".into(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, message),
            }
        })
    }

    fn source_name(&self) -> &'static str {
        "static"
    }
}

/// Enrichment provider that always answers with Google's network data.
#[derive(Default)]
pub struct GoogleProvider {
    pub calls: AtomicUsize,
}

#[async_trait]
impl EnrichmentProvider for GoogleProvider {
    async fn lookup_ip(&self, _ip: IpAddr) -> portwatch_enrich::Result<ProviderRecord> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(ProviderRecord {
            isp: "Google LLC".to_string(),
            org: "Google LLC".to_string(),
            asn: "AS15169".to_string(),
            country: "US".to_string(),
            region: "California".to_string(),
            city: "Mountain View".to_string(),
        })
    }

    fn provider_id(&self) -> &str {
        "google-stub"
    }
}
