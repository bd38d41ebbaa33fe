//! Fixed-interval cycle driver.

use portwatch_scanner::{CycleError, ScanCoordinator};
use portwatch_targets::TargetProvider;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Run scan cycles every `interval` until cancelled.
///
/// The first cycle starts immediately. A cycle that overruns the interval
/// delays the next one rather than overlapping it.
pub async fn run_cycles(
    coordinator: &ScanCoordinator,
    source: &dyn TargetProvider,
    interval: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        // Other failures are logged by the coordinator; retry on the next tick.
        if let Err(CycleError::Cancelled) = coordinator.run_cycle(source, &cancel).await {
            break;
        }

        tracing::debug!(next_in_secs = interval.as_secs(), "Waiting for next scan cycle");
    }

    tracing::info!("Scan driver stopped");
}
