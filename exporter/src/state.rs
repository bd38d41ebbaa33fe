//! Application state management.

use crate::error::ExporterError;
use portwatch_core::AppConfig;
use portwatch_enrich::EnrichmentCache;
use portwatch_metrics::MetricsRegistry;
use portwatch_scanner::{BatchScheduler, ExporterContext, NmapScanner, ScanCoordinator};
use portwatch_targets::TargetSource;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

/// Everything the exporter runs with, built once at startup.
pub struct AppState {
    /// Drives scan cycles
    pub coordinator: Arc<ScanCoordinator>,
    /// Configured target source
    pub source: Arc<TargetSource>,
    /// Time between the start of consecutive cycles
    pub interval: Duration,
    /// Address the HTTP endpoint binds to
    pub listen_addr: SocketAddr,
}

impl AppState {
    /// Assemble the exporter from a validated configuration.
    pub fn from_config(config: &AppConfig) -> Result<Self, ExporterError> {
        let source = TargetSource::from_config(
            &config.targets,
            Duration::from_secs(config.scanning.target_fetch_timeout_secs),
        )?;

        let cache = if config.enrichment.enabled {
            let provider = portwatch_enrich::from_config(&config.enrichment)?;
            Some(Arc::new(EnrichmentCache::new(
                provider,
                Duration::from_secs(config.enrichment.cache_ttl_secs),
                Duration::from_secs(config.enrichment.timeout_secs),
            )))
        } else {
            tracing::info!("Enrichment disabled");
            None
        };

        let context = ExporterContext::new(cache, Arc::new(MetricsRegistry::new()));
        let scanner = Arc::new(NmapScanner::from_config(&config.scanning));
        let scheduler = BatchScheduler::from_config(scanner, &config.scanning);
        let coordinator = ScanCoordinator::new(scheduler, context).with_target_fetch_timeout(
            Duration::from_secs(config.scanning.target_fetch_timeout_secs),
        );

        let address = format!("{}:{}", config.exporter.listen_address, config.exporter.port);
        let listen_addr = address
            .parse()
            .map_err(|e: std::net::AddrParseError| ExporterError::ListenAddress {
                address: address.clone(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            coordinator: Arc::new(coordinator),
            source: Arc::new(source),
            interval: Duration::from_secs(config.scanning.interval_secs),
            listen_addr,
        })
    }

    /// Shared state read by the HTTP handlers.
    #[must_use]
    pub fn context(&self) -> ExporterContext {
        self.coordinator.context().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_builds() {
        let state = AppState::from_config(&AppConfig::default()).expect("build state");

        assert_eq!(state.listen_addr.port(), 9808);
        assert_eq!(state.interval, Duration::from_secs(3600));
        assert!(state.context().cache.is_none());
    }

    #[test]
    fn test_enrichment_enabled_builds_cache() {
        let mut config = AppConfig::default();
        config.enrichment.enabled = true;

        let state = AppState::from_config(&config).expect("build state");
        assert!(state.context().cache.is_some());
    }

    #[test]
    fn test_invalid_listen_address() {
        let mut config = AppConfig::default();
        config.exporter.listen_address = "not an address".to_string();

        assert!(matches!(
            AppState::from_config(&config),
            Err(ExporterError::ListenAddress { .. })
        ));
    }
}
