//! Published metric state.
//!
//! Each cycle replaces the whole snapshot in one swap, so a scrape never sees
//! findings from one cycle next to statistics from another.

use chrono::{DateTime, Utc};
use portwatch_core::{EnrichmentRecord, Protocol, RunStats, ScanFinding};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

/// Everything published by the most recent successful cycle, plus lifetime counters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsSnapshot {
    /// Merged findings of the cycle
    pub findings: Vec<ScanFinding>,
    /// Enrichment records for hosts that have findings
    pub enrichment: BTreeMap<String, EnrichmentRecord>,
    /// Statistics of the cycle, `None` until the first publish
    pub stats: Option<RunStats>,
    /// Successful batches over the process lifetime
    pub successful_batches_total: u64,
    /// Failed batches over the process lifetime
    pub failed_batches_total: u64,
    /// Cycles published over the process lifetime
    pub cycles_published: u64,
    /// When the snapshot was published
    pub published_at: Option<DateTime<Utc>>,
}

impl MetricsSnapshot {
    /// Enrichment record for a host, if one was published.
    #[must_use]
    pub fn enrichment_for(&self, host: &str) -> Option<&EnrichmentRecord> {
        self.enrichment.get(host)
    }
}

/// Holder of the current [`MetricsSnapshot`].
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    current: RwLock<Arc<MetricsSnapshot>>,
}

impl MetricsRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The currently published snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Arc<MetricsSnapshot> {
        self.current
            .read()
            .expect("acquire read lock on metrics")
            .clone()
    }

    /// Replace the published sample set with the results of one cycle.
    ///
    /// Findings from previous cycles are dropped; batch counters accumulate.
    /// Enrichment records for hosts without findings are ignored. Findings
    /// that share every exported label (the port is the sample value, not a
    /// label) collapse into one series holding the last port seen.
    pub fn publish(
        &self,
        findings: Vec<ScanFinding>,
        enrichment: &HashMap<String, EnrichmentRecord>,
        stats: RunStats,
    ) -> Arc<MetricsSnapshot> {
        let findings = collapse_series(findings);
        let enrichment: BTreeMap<String, EnrichmentRecord> = findings
            .iter()
            .filter_map(|f| enrichment.get(&f.host).map(|r| (f.host.clone(), r.clone())))
            .collect();

        let mut current = self.current.write().expect("acquire write lock on metrics");

        let next = Arc::new(MetricsSnapshot {
            successful_batches_total: current.successful_batches_total
                + stats.successful_batches as u64,
            failed_batches_total: current.failed_batches_total + stats.failed_batches as u64,
            cycles_published: current.cycles_published + 1,
            published_at: Some(Utc::now()),
            findings,
            enrichment,
            stats: Some(stats),
        });

        tracing::debug!(
            findings = next.findings.len(),
            enriched_hosts = next.enrichment.len(),
            cycle = next.cycles_published,
            "Published metrics snapshot"
        );

        *current = Arc::clone(&next);
        next
    }

    /// Render the current snapshot in the Prometheus text exposition format.
    #[must_use]
    pub fn render(&self) -> String {
        crate::exposition::render(&self.snapshot())
    }
}

type SeriesKey = (String, String, Protocol, String, String);

/// Keep one finding per label set, last write wins, in first-seen order.
fn collapse_series(findings: Vec<ScanFinding>) -> Vec<ScanFinding> {
    let mut slots: HashMap<SeriesKey, usize> = HashMap::with_capacity(findings.len());
    let mut series: Vec<ScanFinding> = Vec::with_capacity(findings.len());

    for finding in findings {
        let key = (
            finding.host.clone(),
            finding.target.clone(),
            finding.protocol,
            finding.name.clone(),
            finding.product.clone(),
        );
        match slots.get(&key) {
            Some(&slot) => {
                tracing::debug!(
                    host = %finding.host,
                    replaced = series[slot].port,
                    port = finding.port,
                    "Findings share a label set; keeping the later port"
                );
                series[slot] = finding;
            }
            None => {
                slots.insert(key, series.len());
                series.push(finding);
            }
        }
    }

    series
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finding(host: &str, port: u16) -> ScanFinding {
        ScanFinding {
            host: host.to_string(),
            target: host.to_string(),
            protocol: Protocol::Tcp,
            port,
            name: "http".to_string(),
            product: String::new(),
        }
    }

    #[test]
    fn test_new_registry_is_empty() {
        let registry = MetricsRegistry::new();
        let snapshot = registry.snapshot();
        assert!(snapshot.findings.is_empty());
        assert!(snapshot.stats.is_none());
        assert_eq!(snapshot.cycles_published, 0);
    }

    #[test]
    fn test_publish_accumulates_batch_counters() {
        let registry = MetricsRegistry::new();
        let stats = RunStats {
            successful_batches: 2,
            failed_batches: 1,
            ..RunStats::default()
        };

        registry.publish(vec![finding("8.8.8.8", 80)], &HashMap::new(), stats.clone());
        let snapshot = registry.publish(Vec::new(), &HashMap::new(), stats);

        assert_eq!(snapshot.successful_batches_total, 4);
        assert_eq!(snapshot.failed_batches_total, 2);
        assert_eq!(snapshot.cycles_published, 2);
        assert!(snapshot.findings.is_empty());
    }

    #[test]
    fn test_readers_keep_their_snapshot() {
        let registry = MetricsRegistry::new();
        registry.publish(vec![finding("8.8.8.8", 80)], &HashMap::new(), RunStats::default());

        let before = registry.snapshot();
        registry.publish(vec![finding("1.1.1.1", 53)], &HashMap::new(), RunStats::default());

        assert_eq!(before.findings[0].host, "8.8.8.8");
        assert_eq!(registry.snapshot().findings[0].host, "1.1.1.1");
    }
}
