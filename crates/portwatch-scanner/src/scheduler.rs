//! Batch scheduler for bounded-concurrency scanning.
//!
//! This module provides the `BatchScheduler`, which splits a target list into
//! fixed-size batches and scans them with at most `max_concurrency` batches
//! in flight. Each batch runs in its own task so a scanner error, timeout or
//! panic only fails that batch.

use crate::error::ScanError;
use crate::nmap::PortScanner;
use futures::stream::{FuturesUnordered, StreamExt};
use portwatch_core::{BatchOutcome, ScanningConfig, Target};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Split targets into contiguous batches of `batch_size`; the last may be smaller.
#[must_use]
pub fn partition(targets: &[Target], batch_size: usize) -> Vec<Vec<Target>> {
    targets
        .chunks(batch_size.max(1))
        .map(<[Target]>::to_vec)
        .collect()
}

/// Runs batches of targets against a [`PortScanner`].
pub struct BatchScheduler {
    scanner: Arc<dyn PortScanner>,
    batch_size: usize,
    max_concurrency: usize,
    ports: Option<String>,
    arguments: String,
    batch_timeout: Duration,
}

impl BatchScheduler {
    /// Create a scheduler with explicit limits and no port or argument overrides.
    #[must_use]
    pub fn new(scanner: Arc<dyn PortScanner>, batch_size: usize, max_concurrency: usize) -> Self {
        Self {
            scanner,
            batch_size: batch_size.max(1),
            max_concurrency: max_concurrency.max(1),
            ports: None,
            arguments: String::new(),
            batch_timeout: Duration::from_secs(1800),
        }
    }

    /// Create a scheduler from the scanning configuration.
    #[must_use]
    pub fn from_config(scanner: Arc<dyn PortScanner>, config: &ScanningConfig) -> Self {
        Self::new(scanner, config.batch_size, config.max_concurrent_batches)
            .with_ports(config.ports.clone())
            .with_arguments(config.arguments.clone())
            .with_batch_timeout(Duration::from_secs(config.scan_timeout_secs))
    }

    /// Set the port specification passed to the scanner.
    #[must_use]
    pub fn with_ports(mut self, ports: Option<String>) -> Self {
        self.ports = ports;
        self
    }

    /// Set the extra scanner arguments.
    #[must_use]
    pub fn with_arguments(mut self, arguments: impl Into<String>) -> Self {
        self.arguments = arguments.into();
        self
    }

    /// Set the upper bound for a single batch scan.
    #[must_use]
    pub fn with_batch_timeout(mut self, timeout: Duration) -> Self {
        self.batch_timeout = timeout;
        self
    }

    /// Configured batch size.
    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Configured concurrency limit.
    #[must_use]
    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Scan all targets and return one outcome per batch, sorted by batch index.
    ///
    /// Failed batches are not retried.
    pub async fn run(&self, targets: &[Target]) -> Vec<BatchOutcome> {
        let batches = partition(targets, self.batch_size);
        tracing::info!(
            targets = targets.len(),
            batches = batches.len(),
            batch_size = self.batch_size,
            max_concurrency = self.max_concurrency,
            "Starting batch scan"
        );

        let mut in_flight = FuturesUnordered::new();
        let mut outcomes = Vec::with_capacity(batches.len());

        for (index, batch) in batches.into_iter().enumerate() {
            in_flight.push(self.spawn_batch(index, batch));

            // Respect concurrency limit
            while in_flight.len() >= self.max_concurrency {
                if let Some(outcome) = in_flight.next().await {
                    outcomes.push(outcome);
                }
            }
        }

        // Collect remaining results
        while let Some(outcome) = in_flight.next().await {
            outcomes.push(outcome);
        }

        outcomes.sort_by_key(|outcome: &BatchOutcome| outcome.index);
        outcomes
    }

    /// Start scanning one batch in its own task.
    ///
    /// The task starts immediately; the returned future resolves to the
    /// batch outcome, turning a panicked task into a failed outcome.
    fn spawn_batch(
        &self,
        index: usize,
        batch: Vec<Target>,
    ) -> impl Future<Output = BatchOutcome> + Send + 'static {
        let scanner = Arc::clone(&self.scanner);
        let ports = self.ports.clone();
        let arguments = self.arguments.clone();
        let timeout = self.batch_timeout;
        let task_batch = batch.clone();

        let handle = tokio::spawn(async move {
            tracing::debug!(batch = index, size = task_batch.len(), "Scanning batch");

            let scan = scanner.scan(&task_batch, ports.as_deref(), &arguments);
            let result = match tokio::time::timeout(timeout, scan).await {
                Ok(result) => result,
                Err(_) => Err(ScanError::Timeout {
                    seconds: timeout.as_secs(),
                }),
            };

            match result {
                Ok(scan) => {
                    tracing::debug!(
                        batch = index,
                        findings = scan.findings.len(),
                        hosts_up = scan.hosts_up,
                        "Batch scan complete"
                    );
                    BatchOutcome::success(index, task_batch, scan.findings, scan.hosts_up)
                }
                Err(e) => {
                    tracing::warn!(batch = index, "Batch scan failed: {}", e);
                    BatchOutcome::failure(index, task_batch, e.to_string())
                }
            }
        });

        async move {
            match handle.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::error!(batch = index, "Batch task failed: {}", e);
                    BatchOutcome::failure(index, batch, ScanError::Task(e.to_string()).to_string())
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn targets(n: usize) -> Vec<Target> {
        (0..n)
            .map(|i| Target::new(format!("10.0.0.{i}")).expect("valid"))
            .collect()
    }

    #[test]
    fn test_partition_sizes() {
        let batches = partition(&targets(7), 3);
        let sizes: Vec<usize> = batches.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![3, 3, 1]);
    }

    #[test]
    fn test_partition_preserves_order() {
        let all = targets(5);
        let flattened: Vec<Target> = partition(&all, 2).into_iter().flatten().collect();
        assert_eq!(flattened, all);
    }

    #[test]
    fn test_partition_edge_cases() {
        assert!(partition(&[], 10).is_empty());
        assert_eq!(partition(&targets(3), 10).len(), 1);
        assert_eq!(partition(&targets(3), 0).len(), 3);
    }
}
