use async_trait::async_trait;
use portwatch::driver::run_cycles;
use portwatch_core::Target;
use portwatch_metrics::MetricsRegistry;
use portwatch_scanner::{BatchScan, BatchScheduler, ExporterContext, PortScanner, ScanCoordinator};
use portwatch_targets::{TargetError, TargetProvider};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Default)]
struct CountingScanner {
    scans: AtomicUsize,
}

#[async_trait]
impl PortScanner for CountingScanner {
    async fn scan(
        &self,
        _batch: &[Target],
        _ports: Option<&str>,
        _arguments: &str,
    ) -> portwatch_scanner::Result<BatchScan> {
        self.scans.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(2)).await;
        Ok(BatchScan::default())
    }
}

struct OneTarget;

#[async_trait]
impl TargetProvider for OneTarget {
    async fn fetch_targets(&self) -> portwatch_targets::Result<BTreeSet<Target>> {
        Ok([Target::new("192.0.2.1").expect("valid")].into_iter().collect())
    }

    fn source_name(&self) -> &'static str {
        "one"
    }
}

struct BrokenInventory;

#[async_trait]
impl TargetProvider for BrokenInventory {
    async fn fetch_targets(&self) -> portwatch_targets::Result<BTreeSet<Target>> {
        Err(TargetError::Unsupported("broken".to_string()))
    }

    fn source_name(&self) -> &'static str {
        "broken"
    }
}

fn coordinator(scanner: Arc<CountingScanner>) -> ScanCoordinator {
    ScanCoordinator::new(
        BatchScheduler::new(scanner, 10, 1),
        ExporterContext::new(None, Arc::new(MetricsRegistry::new())),
    )
}

#[tokio::test(start_paused = true)]
async fn test_cycles_run_on_interval_until_cancelled() {
    let scanner = Arc::new(CountingScanner::default());
    let coordinator = coordinator(scanner.clone());
    let cancel = CancellationToken::new();

    let stopper = {
        let cancel = cancel.clone();
        async move {
            tokio::time::sleep(Duration::from_secs(25)).await;
            cancel.cancel();
        }
    };

    tokio::join!(
        run_cycles(&coordinator, &OneTarget, Duration::from_secs(10), cancel.clone()),
        stopper
    );

    // Cycles start at t=0, 10 and 20.
    assert_eq!(scanner.scans.load(Ordering::SeqCst), 3);
    assert_eq!(coordinator.counters().completed, 3);
}

#[tokio::test(start_paused = true)]
async fn test_failed_cycles_do_not_stop_the_driver() {
    let scanner = Arc::new(CountingScanner::default());
    let coordinator = coordinator(scanner.clone());
    let cancel = CancellationToken::new();

    let stopper = {
        let cancel = cancel.clone();
        async move {
            tokio::time::sleep(Duration::from_secs(15)).await;
            cancel.cancel();
        }
    };

    tokio::join!(
        run_cycles(&coordinator, &BrokenInventory, Duration::from_secs(10), cancel.clone()),
        stopper
    );

    assert_eq!(scanner.scans.load(Ordering::SeqCst), 0);
    assert_eq!(coordinator.counters().failed, 2);
}
