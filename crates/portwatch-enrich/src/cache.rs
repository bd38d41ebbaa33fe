//! TTL cache of enrichment records.
//!
//! Records live for the process lifetime and are superseded, never mutated,
//! once older than the TTL. Misses for the same IP are serialised through a
//! per-IP async mutex so concurrent lookups share one provider call.

use crate::classify::classify_parts;
use crate::error::{EnrichError, Result};
use crate::provider::EnrichmentProvider;
use chrono::{DateTime, TimeDelta, Utc};
use portwatch_core::EnrichmentRecord;
use serde::Serialize;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

/// Source of the current time for TTL checks.
pub trait Clock: Send + Sync {
    /// Current wall-clock time.
    fn now(&self) -> DateTime<Utc>;
}

/// Clock backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Cache size broken down by validity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// All stored records
    pub total_entries: usize,
    /// Records within the TTL
    pub valid_entries: usize,
    /// Records past the TTL, awaiting replacement
    pub stale_entries: usize,
}

/// A stored record with its current validity.
#[derive(Debug, Clone, Serialize)]
pub struct CachedEntry {
    /// The record as fetched
    #[serde(flatten)]
    pub record: EnrichmentRecord,
    /// Whether the record would be served
    pub is_valid: bool,
}

/// Shared IP → enrichment record cache.
pub struct EnrichmentCache {
    provider: Arc<dyn EnrichmentProvider>,
    ttl: TimeDelta,
    lookup_timeout: Duration,
    clock: Arc<dyn Clock>,
    records: RwLock<HashMap<String, EnrichmentRecord>>,
    in_flight: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl EnrichmentCache {
    /// Create a cache using the system clock.
    #[must_use]
    pub fn new(
        provider: Arc<dyn EnrichmentProvider>,
        ttl: Duration,
        lookup_timeout: Duration,
    ) -> Self {
        Self::with_clock(provider, ttl, lookup_timeout, Arc::new(SystemClock))
    }

    /// Create a cache with an explicit clock.
    #[must_use]
    pub fn with_clock(
        provider: Arc<dyn EnrichmentProvider>,
        ttl: Duration,
        lookup_timeout: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        tracing::info!(
            provider = provider.provider_id(),
            ttl_secs = ttl.as_secs(),
            "Enrichment cache initialized"
        );

        Self {
            provider,
            ttl: TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX),
            lookup_timeout,
            clock,
            records: RwLock::new(HashMap::new()),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Look up the enrichment record for an IP.
    ///
    /// Serves a cached record while it is within the TTL; otherwise makes one
    /// provider call and caches the result. Failures are not cached.
    pub async fn lookup(&self, ip: &str) -> Result<EnrichmentRecord> {
        let addr: IpAddr = ip
            .parse()
            .map_err(|_| EnrichError::InvalidAddress(ip.to_string()))?;

        if let Some(record) = self.fresh_record(ip) {
            tracing::debug!(ip, "Using cached enrichment data");
            return Ok(record);
        }

        let slot = self.in_flight_slot(ip);
        let result = {
            let _guard = slot.lock().await;

            // Another lookup may have filled the cache while we waited.
            if let Some(record) = self.fresh_record(ip) {
                tracing::debug!(ip, "Enrichment data fetched by concurrent lookup");
                Ok(record)
            } else {
                self.fetch(ip, addr).await
            }
        };
        self.release_slot(ip, &slot);

        result
    }

    async fn fetch(&self, ip: &str, addr: IpAddr) -> Result<EnrichmentRecord> {
        let raw = tokio::time::timeout(self.lookup_timeout, self.provider.lookup_ip(addr))
            .await
            .map_err(|_| EnrichError::Timeout {
                seconds: self.lookup_timeout.as_secs(),
            })??;

        let record = EnrichmentRecord {
            ip: ip.to_string(),
            connection_type: classify_parts(&raw.isp, &raw.org, &raw.asn),
            isp: raw.isp,
            org: raw.org,
            asn: raw.asn,
            country: raw.country,
            region: raw.region,
            city: raw.city,
            fetched_at: self.clock.now(),
        };

        self.records
            .write()
            .expect("acquire write lock on enrichment records")
            .insert(ip.to_string(), record.clone());

        tracing::debug!(
            ip,
            connection_type = %record.connection_type,
            "Cached enrichment data"
        );

        Ok(record)
    }

    fn fresh_record(&self, ip: &str) -> Option<EnrichmentRecord> {
        let now = self.clock.now();
        let records = self
            .records
            .read()
            .expect("acquire read lock on enrichment records");

        records
            .get(ip)
            .filter(|record| self.is_valid(record, now))
            .cloned()
    }

    fn is_valid(&self, record: &EnrichmentRecord, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(record.fetched_at) <= self.ttl
    }

    fn in_flight_slot(&self, ip: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.in_flight
            .lock()
            .expect("acquire in-flight lock")
            .entry(ip.to_string())
            .or_default()
            .clone()
    }

    fn release_slot(&self, ip: &str, slot: &Arc<tokio::sync::Mutex<()>>) {
        let mut in_flight = self.in_flight.lock().expect("acquire in-flight lock");
        // Only the map and this caller hold the slot: nobody else is waiting.
        if Arc::strong_count(slot) == 2 {
            in_flight.remove(ip);
        }
    }

    /// Cache size broken down by validity.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let now = self.clock.now();
        let records = self
            .records
            .read()
            .expect("acquire read lock on enrichment records");

        let valid_entries = records.values().filter(|r| self.is_valid(r, now)).count();
        CacheStats {
            total_entries: records.len(),
            valid_entries,
            stale_entries: records.len() - valid_entries,
        }
    }

    /// All stored records sorted by IP, including stale ones.
    #[must_use]
    pub fn entries(&self) -> Vec<CachedEntry> {
        let now = self.clock.now();
        let records = self
            .records
            .read()
            .expect("acquire read lock on enrichment records");

        let mut entries: Vec<CachedEntry> = records
            .values()
            .map(|record| CachedEntry {
                record: record.clone(),
                is_valid: self.is_valid(record, now),
            })
            .collect();
        entries.sort_by(|a, b| a.record.ip.cmp(&b.record.ip));
        entries
    }
}
