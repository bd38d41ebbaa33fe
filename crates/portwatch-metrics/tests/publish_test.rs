use chrono::Utc;
use portwatch_core::{ConnectionType, EnrichmentRecord, Protocol, RunStats, ScanFinding};
use portwatch_metrics::MetricsRegistry;
use std::collections::HashMap;
use std::time::Duration;

fn finding(host: &str, target: &str, port: u16, name: &str, product: &str) -> ScanFinding {
    ScanFinding {
        host: host.to_string(),
        target: target.to_string(),
        protocol: Protocol::Tcp,
        port,
        name: name.to_string(),
        product: product.to_string(),
    }
}

fn google_record() -> EnrichmentRecord {
    EnrichmentRecord {
        ip: "8.8.8.8".to_string(),
        isp: "Google LLC".to_string(),
        org: "Google LLC".to_string(),
        asn: "AS15169".to_string(),
        country: "US".to_string(),
        region: "California".to_string(),
        city: "Mountain View".to_string(),
        connection_type: ConnectionType::Datacentre,
        fetched_at: Utc::now(),
    }
}

fn stats(successful: usize, failed: usize) -> RunStats {
    RunStats {
        target_count: 2,
        elapsed: Duration::from_secs(12),
        hosts_up: 1,
        hosts_down: 1,
        total_hosts: 2,
        successful_batches: successful,
        failed_batches: failed,
    }
}

#[test]
fn test_render_plain_and_enriched_samples() {
    let registry = MetricsRegistry::new();
    let mut enrichment = HashMap::new();
    enrichment.insert("8.8.8.8".to_string(), google_record());

    registry.publish(
        vec![
            finding("8.8.8.8", "dns.google", 53, "domain", ""),
            finding("8.8.8.8", "dns.google", 443, "https", "Google httpd"),
        ],
        &enrichment,
        stats(1, 1),
    );
    let text = registry.render();

    assert!(text.contains(
        "nmap_scan_results{host=\"8.8.8.8\",target=\"dns.google\",protocol=\"tcp\",name=\"domain\",product_detected=\"\"} 53\n"
    ));
    assert!(text.contains(
        "nmap_scan_results_geoip{host=\"8.8.8.8\",target=\"dns.google\",protocol=\"tcp\",name=\"https\",product_detected=\"Google httpd\",isp=\"Google LLC\",asn=\"AS15169\",country=\"US\",city=\"Mountain View\",connection_type=\"datacentre\"} 443\n"
    ));
    assert!(text.contains(
        "nmap_scan_stats_info{time_elapsed=\"12.00\",uphosts=\"1\",downhosts=\"1\",totalhosts=\"2\"} 1\n"
    ));
    assert!(text.contains("nmap_target_count 2\n"));
    assert!(text.contains("nmap_scan_duration_seconds 12\n"));
}

#[test]
fn test_unenriched_host_has_only_plain_sample() {
    let registry = MetricsRegistry::new();

    registry.publish(
        vec![finding("10.0.0.1", "10.0.0.1", 22, "ssh", "OpenSSH")],
        &HashMap::new(),
        stats(1, 0),
    );
    let text = registry.render();

    assert!(text.contains("nmap_scan_results{host=\"10.0.0.1\""));
    assert!(!text.contains("nmap_scan_results_geoip{"));
}

#[test]
fn test_hosts_absent_from_new_cycle_disappear() {
    let registry = MetricsRegistry::new();

    registry.publish(
        vec![finding("1.1.1.1", "1.1.1.1", 53, "domain", "")],
        &HashMap::new(),
        stats(1, 0),
    );
    registry.publish(
        vec![finding("8.8.8.8", "8.8.8.8", 80, "http", "")],
        &HashMap::new(),
        stats(1, 0),
    );
    let text = registry.render();

    assert!(!text.contains("1.1.1.1"));
    assert!(text.contains("host=\"8.8.8.8\""));
}

#[test]
fn test_counters_are_monotonic_across_cycles() {
    let registry = MetricsRegistry::new();

    registry.publish(Vec::new(), &HashMap::new(), stats(3, 1));
    registry.publish(Vec::new(), &HashMap::new(), stats(0, 2));
    let text = registry.render();

    assert!(text.contains("# TYPE nmap_failed_scans_total counter"));
    assert!(text.contains("nmap_failed_scans_total 3\n"));
    assert!(text.contains("nmap_successful_scans_total 3\n"));
}

#[test]
fn test_label_values_are_escaped() {
    let registry = MetricsRegistry::new();

    registry.publish(
        vec![finding("8.8.8.8", "8.8.8.8", 80, "http", "nginx \"custom\"")],
        &HashMap::new(),
        stats(1, 0),
    );

    assert!(registry
        .render()
        .contains("product_detected=\"nginx \\\"custom\\\"\""));
}

#[test]
fn test_same_service_on_two_ports_is_one_series() {
    let registry = MetricsRegistry::new();
    let mut enrichment = HashMap::new();
    enrichment.insert("8.8.8.8".to_string(), google_record());

    let snapshot = registry.publish(
        vec![
            finding("8.8.8.8", "8.8.8.8", 80, "http", "nginx"),
            finding("8.8.8.8", "8.8.8.8", 8080, "http", "nginx"),
            finding("8.8.8.8", "8.8.8.8", 443, "https", "nginx"),
        ],
        &enrichment,
        stats(1, 0),
    );
    assert_eq!(snapshot.findings.len(), 2);

    let text = registry.render();
    let samples: Vec<&str> = text
        .lines()
        .filter(|line| line.starts_with("nmap_scan_results{") && line.contains("name=\"http\""))
        .collect();
    assert_eq!(samples.len(), 1);
    assert!(samples[0].ends_with("} 8080"));

    let enriched = text
        .lines()
        .filter(|line| {
            line.starts_with("nmap_scan_results_geoip{") && line.contains("name=\"http\"")
        })
        .count();
    assert_eq!(enriched, 1);

    let mut label_sets: Vec<&str> = text
        .lines()
        .filter(|line| line.starts_with("nmap_scan_results"))
        .filter_map(|line| line.rsplit_once(' ').map(|(series, _)| series))
        .collect();
    let total = label_sets.len();
    label_sets.sort_unstable();
    label_sets.dedup();
    assert_eq!(label_sets.len(), total);
}
