use async_trait::async_trait;
use portwatch::server;
use portwatch_core::{Protocol, RunStats, ScanFinding};
use portwatch_enrich::{EnrichmentCache, EnrichmentProvider, ProviderRecord};
use portwatch_metrics::MetricsRegistry;
use portwatch_scanner::ExporterContext;
use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

struct FixedProvider;

#[async_trait]
impl EnrichmentProvider for FixedProvider {
    async fn lookup_ip(&self, _ip: IpAddr) -> portwatch_enrich::Result<ProviderRecord> {
        Ok(ProviderRecord {
            isp: "Deutsche Telekom AG".to_string(),
            org: "Deutsche Telekom AG".to_string(),
            asn: "AS3320".to_string(),
            country: "DE".to_string(),
            region: "Hesse".to_string(),
            city: "Frankfurt".to_string(),
        })
    }

    fn provider_id(&self) -> &str {
        "fixed"
    }
}

async fn start(context: ExporterContext) -> (SocketAddr, CancellationToken) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let shutdown = CancellationToken::new();
    tokio::spawn(server::serve(listener, context, shutdown.clone()));
    (addr, shutdown)
}

#[tokio::test]
async fn test_metrics_endpoint_serves_exposition() {
    let metrics = Arc::new(MetricsRegistry::new());
    metrics.publish(
        vec![ScanFinding {
            host: "192.0.2.10".to_string(),
            target: "192.0.2.10".to_string(),
            protocol: Protocol::Tcp,
            port: 22,
            name: "ssh".to_string(),
            product: "OpenSSH".to_string(),
        }],
        &HashMap::new(),
        RunStats {
            target_count: 1,
            total_hosts: 1,
            hosts_up: 1,
            successful_batches: 1,
            ..RunStats::default()
        },
    );
    let (addr, shutdown) = start(ExporterContext::new(None, metrics)).await;

    let response = reqwest::get(format!("http://{addr}/metrics"))
        .await
        .expect("request");
    assert!(response.status().is_success());
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(content_type.starts_with("text/plain; version=0.0.4"));

    let body = response.text().await.expect("body");
    assert!(body.contains("nmap_scan_results{host=\"192.0.2.10\""));
    assert!(body.contains("nmap_successful_scans_total 1\n"));

    shutdown.cancel();
}

#[tokio::test]
async fn test_geoip_debug_disabled_is_not_found() {
    let (addr, shutdown) =
        start(ExporterContext::new(None, Arc::new(MetricsRegistry::new()))).await;

    let response = reqwest::get(format!("http://{addr}/debug/geoip"))
        .await
        .expect("request");

    assert_eq!(response.status().as_u16(), 404);
    let body: serde_json::Value = response.json().await.expect("json");
    assert_eq!(body["code"], "ENRICHMENT_DISABLED");

    shutdown.cancel();
}

#[tokio::test]
async fn test_geoip_debug_lists_cache() {
    let cache = Arc::new(EnrichmentCache::new(
        Arc::new(FixedProvider),
        Duration::from_secs(3600),
        Duration::from_secs(5),
    ));
    cache.lookup("80.150.6.143").await.expect("lookup");
    let (addr, shutdown) = start(ExporterContext::new(
        Some(cache),
        Arc::new(MetricsRegistry::new()),
    ))
    .await;

    let body: serde_json::Value = reqwest::get(format!("http://{addr}/debug/geoip"))
        .await
        .expect("request")
        .json()
        .await
        .expect("json");

    assert_eq!(body["stats"]["total_entries"], 1);
    assert_eq!(body["stats"]["valid_entries"], 1);
    let entry = &body["cached_data"]["80.150.6.143"];
    assert_eq!(entry["city"], "Frankfurt");
    assert_eq!(entry["connection_type"], "unknown");
    assert_eq!(entry["is_valid"], true);

    shutdown.cancel();
}
