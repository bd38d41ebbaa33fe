//! Prometheus text exposition format (version 0.0.4).

use crate::registry::MetricsSnapshot;
use std::fmt::Write;

/// Content type of the rendered exposition.
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

const RESULTS: &str = "nmap_scan_results";
const RESULTS_GEOIP: &str = "nmap_scan_results_geoip";
const STATS_INFO: &str = "nmap_scan_stats_info";
const TARGET_COUNT: &str = "nmap_target_count";
const SCAN_DURATION: &str = "nmap_scan_duration_seconds";
const FAILED_TOTAL: &str = "nmap_failed_scans_total";
const SUCCESSFUL_TOTAL: &str = "nmap_successful_scans_total";

/// Render a snapshot as exposition text.
#[must_use]
pub fn render(snapshot: &MetricsSnapshot) -> String {
    let mut out = String::new();

    header(&mut out, RESULTS, "Holds the scanned result", "gauge");
    for f in &snapshot.findings {
        sample(
            &mut out,
            RESULTS,
            &[
                ("host", f.host.as_str()),
                ("target", f.target.as_str()),
                ("protocol", f.protocol.as_str()),
                ("name", f.name.as_str()),
                ("product_detected", f.product.as_str()),
            ],
            f.port,
        );
    }

    header(
        &mut out,
        RESULTS_GEOIP,
        "Holds the scanned result with GeoIP metadata",
        "gauge",
    );
    for f in &snapshot.findings {
        let Some(geo) = snapshot.enrichment_for(&f.host) else {
            continue;
        };
        sample(
            &mut out,
            RESULTS_GEOIP,
            &[
                ("host", f.host.as_str()),
                ("target", f.target.as_str()),
                ("protocol", f.protocol.as_str()),
                ("name", f.name.as_str()),
                ("product_detected", f.product.as_str()),
                ("isp", geo.isp.as_str()),
                ("asn", geo.asn.as_str()),
                ("country", geo.country.as_str()),
                ("city", geo.city.as_str()),
                ("connection_type", geo.connection_type.as_str()),
            ],
            f.port,
        );
    }

    let stats = snapshot.stats.clone().unwrap_or_default();

    header(&mut out, STATS_INFO, "Holds details about the scan", "gauge");
    if snapshot.stats.is_some() {
        let elapsed = format!("{:.2}", stats.elapsed.as_secs_f64());
        let up = stats.hosts_up.to_string();
        let down = stats.hosts_down.to_string();
        let total = stats.total_hosts.to_string();
        sample(
            &mut out,
            STATS_INFO,
            &[
                ("time_elapsed", elapsed.as_str()),
                ("uphosts", up.as_str()),
                ("downhosts", down.as_str()),
                ("totalhosts", total.as_str()),
            ],
            1,
        );
    }

    header(
        &mut out,
        TARGET_COUNT,
        "Number of targets discovered for scanning",
        "gauge",
    );
    sample(&mut out, TARGET_COUNT, &[], stats.target_count);

    header(
        &mut out,
        SCAN_DURATION,
        "Duration of the last scan in seconds",
        "gauge",
    );
    sample(&mut out, SCAN_DURATION, &[], stats.elapsed.as_secs_f64());

    header(
        &mut out,
        FAILED_TOTAL,
        "Total number of failed scan batches",
        "counter",
    );
    sample(&mut out, FAILED_TOTAL, &[], snapshot.failed_batches_total);

    header(
        &mut out,
        SUCCESSFUL_TOTAL,
        "Total number of successful scan batches",
        "counter",
    );
    sample(&mut out, SUCCESSFUL_TOTAL, &[], snapshot.successful_batches_total);

    out
}

fn header(out: &mut String, name: &str, help: &str, kind: &str) {
    // Writing to a String cannot fail.
    let _ = writeln!(out, "# HELP {name} {help}");
    let _ = writeln!(out, "# TYPE {name} {kind}");
}

fn sample(out: &mut String, name: &str, labels: &[(&str, &str)], value: impl std::fmt::Display) {
    out.push_str(name);
    if !labels.is_empty() {
        out.push('{');
        for (i, (key, value)) in labels.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            let _ = write!(out, "{key}=\"{}\"", escape_label_value(value));
        }
        out.push('}');
    }
    let _ = writeln!(out, " {value}");
}

/// Escape a label value: backslash, double quote and newline.
#[must_use]
pub fn escape_label_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            other => escaped.push(other),
        }
    }
    escaped
}
