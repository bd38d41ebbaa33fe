//! Scan cycle coordinator.
//!
//! One cycle moves through `FetchingTargets → Scanning → Merging → Enriching
//! → Published`, or ends in `Failed`. Only a failed target fetch,
//! cancellation or an overlapping call surfaces as an error; batch and
//! enrichment failures are isolated and counted.

use crate::error::CycleError;
use crate::scheduler::BatchScheduler;
use portwatch_core::{BatchOutcome, EnrichmentRecord, RunStats, ScanFinding, Target};
use portwatch_enrich::{EnrichError, EnrichmentCache};
use portwatch_metrics::MetricsRegistry;
use portwatch_targets::TargetProvider;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Shared state the coordinator publishes into.
#[derive(Clone)]
pub struct ExporterContext {
    /// Enrichment cache, `None` when enrichment is disabled
    pub cache: Option<Arc<EnrichmentCache>>,
    /// Published metrics
    pub metrics: Arc<MetricsRegistry>,
}

impl ExporterContext {
    /// Create a context.
    #[must_use]
    pub fn new(cache: Option<Arc<EnrichmentCache>>, metrics: Arc<MetricsRegistry>) -> Self {
        Self { cache, metrics }
    }
}

/// Where the current (or last) cycle is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CyclePhase {
    /// No cycle has run yet
    #[default]
    Idle,
    /// Querying the target source
    FetchingTargets,
    /// Batches are being scanned
    Scanning,
    /// Combining batch outcomes
    Merging,
    /// Looking up enrichment data
    Enriching,
    /// Results handed to the metrics registry
    Published,
    /// Cycle ended without publishing
    Failed,
}

impl fmt::Display for CyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::FetchingTargets => "fetching_targets",
            Self::Scanning => "scanning",
            Self::Merging => "merging",
            Self::Enriching => "enriching",
            Self::Published => "published",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Lifetime cycle counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleCounters {
    /// Cycles that reached `Published`
    pub completed: u64,
    /// Cycles that ended in `Failed`
    pub failed: u64,
    /// Error of the most recent failed cycle
    pub last_error: Option<String>,
}

/// Findings and batch counts after merging one cycle's outcomes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergedResults {
    /// Deduplicated findings, ordered by (host, protocol, port)
    pub findings: Vec<ScanFinding>,
    /// Sum of hosts reported up by successful batches
    pub hosts_up: usize,
    /// Batches that completed
    pub successful_batches: usize,
    /// Batches that failed
    pub failed_batches: usize,
}

/// Merge batch outcomes.
///
/// Failed batches contribute no findings. A (host, protocol, port) reported by
/// several batches keeps the finding from the highest batch index.
#[must_use]
pub fn merge_outcomes(outcomes: &[BatchOutcome]) -> MergedResults {
    let mut ordered: Vec<&BatchOutcome> = outcomes.iter().collect();
    ordered.sort_by_key(|o| o.index);

    let mut merged = MergedResults::default();
    let mut by_key = BTreeMap::new();

    for outcome in ordered {
        if !outcome.succeeded() {
            merged.failed_batches += 1;
            continue;
        }
        merged.successful_batches += 1;
        merged.hosts_up += outcome.hosts_up;
        for finding in &outcome.findings {
            by_key.insert(finding.key(), finding.clone());
        }
    }

    merged.findings = by_key.into_values().collect();
    merged
}

/// Drives scan cycles and publishes their results.
pub struct ScanCoordinator {
    scheduler: BatchScheduler,
    context: ExporterContext,
    target_fetch_timeout: Duration,
    cycle_lock: tokio::sync::Mutex<()>,
    phase: RwLock<CyclePhase>,
    counters: RwLock<CycleCounters>,
}

impl ScanCoordinator {
    /// Create a coordinator.
    #[must_use]
    pub fn new(scheduler: BatchScheduler, context: ExporterContext) -> Self {
        Self {
            scheduler,
            context,
            target_fetch_timeout: Duration::from_secs(300),
            cycle_lock: tokio::sync::Mutex::new(()),
            phase: RwLock::new(CyclePhase::Idle),
            counters: RwLock::new(CycleCounters::default()),
        }
    }

    /// Set the upper bound for fetching targets.
    #[must_use]
    pub fn with_target_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.target_fetch_timeout = timeout;
        self
    }

    /// Shared state this coordinator publishes into.
    #[must_use]
    pub fn context(&self) -> &ExporterContext {
        &self.context
    }

    /// Phase of the current or most recent cycle.
    #[must_use]
    pub fn phase(&self) -> CyclePhase {
        *self.phase.read().expect("acquire read lock on cycle phase")
    }

    /// Lifetime cycle counters.
    #[must_use]
    pub fn counters(&self) -> CycleCounters {
        self.counters
            .read()
            .expect("acquire read lock on cycle counters")
            .clone()
    }

    /// Run one full scan cycle.
    ///
    /// Returns [`CycleError::AlreadyRunning`] without side effects if another
    /// cycle holds the lock. On failure the previously published metrics are
    /// left untouched.
    pub async fn run_cycle(
        &self,
        provider: &dyn TargetProvider,
        cancel: &CancellationToken,
    ) -> Result<RunStats, CycleError> {
        let Ok(_guard) = self.cycle_lock.try_lock() else {
            tracing::warn!("Scan cycle requested while another is running");
            return Err(CycleError::AlreadyRunning);
        };

        let result = self.drive(provider, cancel).await;

        match &result {
            Ok(stats) => {
                self.counters
                    .write()
                    .expect("acquire write lock on cycle counters")
                    .completed += 1;
                tracing::info!(
                    targets = stats.target_count,
                    hosts_up = stats.hosts_up,
                    successful_batches = stats.successful_batches,
                    failed_batches = stats.failed_batches,
                    elapsed_secs = stats.elapsed.as_secs_f64(),
                    "Scan cycle published"
                );
            }
            Err(e) => {
                self.set_phase(CyclePhase::Failed);
                let mut counters = self
                    .counters
                    .write()
                    .expect("acquire write lock on cycle counters");
                counters.failed += 1;
                counters.last_error = Some(e.to_string());
                tracing::error!("Scan cycle failed: {}", e);
            }
        }

        result
    }

    async fn drive(
        &self,
        provider: &dyn TargetProvider,
        cancel: &CancellationToken,
    ) -> Result<RunStats, CycleError> {
        let started = Instant::now();

        self.enter(CyclePhase::FetchingTargets, cancel)?;
        let targets: Vec<Target> =
            match tokio::time::timeout(self.target_fetch_timeout, provider.fetch_targets()).await {
                Ok(fetched) => fetched?.into_iter().collect(),
                Err(_) => {
                    return Err(CycleError::TargetFetchTimeout {
                        seconds: self.target_fetch_timeout.as_secs(),
                    })
                }
            };
        tracing::info!(
            source = provider.source_name(),
            count = targets.len(),
            "Fetched scan targets"
        );

        self.enter(CyclePhase::Scanning, cancel)?;
        let outcomes = self.scheduler.run(&targets).await;

        self.enter(CyclePhase::Merging, cancel)?;
        let merged = merge_outcomes(&outcomes);

        let enrichment = match &self.context.cache {
            Some(cache) => {
                self.enter(CyclePhase::Enriching, cancel)?;
                enrich_hosts(cache, &merged.findings).await
            }
            None => HashMap::new(),
        };

        if cancel.is_cancelled() {
            return Err(CycleError::Cancelled);
        }

        let stats = RunStats {
            target_count: targets.len(),
            elapsed: started.elapsed(),
            hosts_up: merged.hosts_up,
            hosts_down: targets.len().saturating_sub(merged.hosts_up),
            total_hosts: targets.len(),
            successful_batches: merged.successful_batches,
            failed_batches: merged.failed_batches,
        };

        self.context
            .metrics
            .publish(merged.findings, &enrichment, stats.clone());
        self.set_phase(CyclePhase::Published);

        Ok(stats)
    }

    /// Check for cancellation, then move to the next phase.
    fn enter(&self, phase: CyclePhase, cancel: &CancellationToken) -> Result<(), CycleError> {
        if cancel.is_cancelled() {
            return Err(CycleError::Cancelled);
        }
        tracing::debug!(phase = %phase, "Entering cycle phase");
        self.set_phase(phase);
        Ok(())
    }

    fn set_phase(&self, phase: CyclePhase) {
        *self.phase.write().expect("acquire write lock on cycle phase") = phase;
    }
}

/// Look up every distinct host with findings, concurrently.
///
/// Hosts whose lookup fails are left out of the result.
async fn enrich_hosts(
    cache: &EnrichmentCache,
    findings: &[ScanFinding],
) -> HashMap<String, EnrichmentRecord> {
    let hosts: BTreeSet<&str> = findings.iter().map(|f| f.host.as_str()).collect();

    let lookups = hosts.into_iter().map(|host| async move {
        let result = cache.lookup(host).await;
        (host, result)
    });

    let mut records = HashMap::new();
    for (host, result) in futures::future::join_all(lookups).await {
        match result {
            Ok(record) => {
                records.insert(host.to_string(), record);
            }
            Err(EnrichError::NotRoutable { .. }) => {
                tracing::debug!(ip = host, "Skipping enrichment for non-routable address");
            }
            Err(e) => {
                tracing::warn!(ip = host, "Enrichment failed: {}", e);
            }
        }
    }

    tracing::debug!(enriched = records.len(), "Enrichment complete");
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use portwatch_core::Protocol;

    fn finding(host: &str, port: u16, product: &str) -> ScanFinding {
        ScanFinding {
            host: host.to_string(),
            target: host.to_string(),
            protocol: Protocol::Tcp,
            port,
            name: "http".to_string(),
            product: product.to_string(),
        }
    }

    #[test]
    fn test_merge_counts_batches() {
        let outcomes = vec![
            BatchOutcome::success(0, Vec::new(), vec![finding("10.0.0.1", 80, "")], 1),
            BatchOutcome::failure(1, Vec::new(), "boom"),
            BatchOutcome::success(2, Vec::new(), vec![finding("10.0.0.3", 22, "")], 2),
        ];

        let merged = merge_outcomes(&outcomes);

        assert_eq!(merged.successful_batches, 2);
        assert_eq!(merged.failed_batches, 1);
        assert_eq!(merged.hosts_up, 3);
        assert_eq!(merged.findings.len(), 2);
    }

    #[test]
    fn test_merge_duplicate_keeps_highest_batch_index() {
        // Supplied out of order on purpose.
        let outcomes = vec![
            BatchOutcome::success(3, Vec::new(), vec![finding("10.0.0.1", 80, "nginx")], 1),
            BatchOutcome::success(1, Vec::new(), vec![finding("10.0.0.1", 80, "apache")], 1),
        ];

        let merged = merge_outcomes(&outcomes);

        assert_eq!(merged.findings.len(), 1);
        assert_eq!(merged.findings[0].product, "nginx");
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(CyclePhase::FetchingTargets.to_string(), "fetching_targets");
        assert_eq!(CyclePhase::default(), CyclePhase::Idle);
    }
}
