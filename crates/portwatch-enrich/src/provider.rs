//! Enrichment provider trait and the ipapi.co client.

use crate::error::{EnrichError, Result};
use async_trait::async_trait;
use portwatch_core::EnrichmentConfig;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

/// Raw network-intelligence data for one IP, before classification.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderRecord {
    /// Internet service provider
    pub isp: String,
    /// Owning organization
    pub org: String,
    /// Autonomous system number
    pub asn: String,
    /// ISO country code
    pub country: String,
    /// Region or state
    pub region: String,
    /// City
    pub city: String,
}

/// Trait for network-intelligence lookups.
///
/// Implementations must be thread-safe (Send + Sync) because lookups for
/// different hosts run concurrently.
#[async_trait]
pub trait EnrichmentProvider: Send + Sync {
    /// Look up ISP/ASN/location data for an IP address.
    ///
    /// # Errors
    /// Returns error if the provider fails, rate limits, or the response cannot be parsed.
    async fn lookup_ip(&self, ip: IpAddr) -> Result<ProviderRecord>;

    /// Get the unique identifier for this provider.
    fn provider_id(&self) -> &str;
}

/// Build the provider named in the configuration.
///
/// # Errors
/// Returns error for unknown providers or if the HTTP client cannot be built.
pub fn from_config(config: &EnrichmentConfig) -> Result<Arc<dyn EnrichmentProvider>> {
    match config.provider.as_str() {
        IPAPI_ID => Ok(Arc::new(IpApiProvider::new(
            config.api_token.clone(),
            Duration::from_secs(config.timeout_secs),
        )?)),
        other => Err(EnrichError::UnsupportedProvider(other.to_string())),
    }
}

const IPAPI_ID: &str = "ipapi.co";

/// Client for `https://ipapi.co/{ip}/json/`.
pub struct IpApiProvider {
    client: Client,
    base_url: String,
    api_token: Option<String>,
}

impl IpApiProvider {
    /// Create a new ipapi.co client.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created.
    pub fn new(api_token: Option<String>, timeout: Duration) -> Result<Self> {
        Self::with_url("https://ipapi.co", api_token, timeout)
    }

    /// Create a client against a custom base URL.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created.
    pub fn with_url(
        base_url: impl Into<String>,
        api_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("portwatch/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            api_token,
        })
    }

    fn lookup_url(&self, ip: IpAddr) -> String {
        format!("{}/{ip}/json/", self.base_url.trim_end_matches('/'))
    }

    /// Convert an API response into a provider record.
    ///
    /// ipapi.co has no separate ISP field, so the organization doubles as ISP.
    fn convert_api_response(response: IpApiResponse) -> Result<ProviderRecord> {
        if response.error.unwrap_or(false) {
            let reason = response.reason.unwrap_or_default();
            if reason == "RateLimited" {
                return Err(EnrichError::RateLimited {
                    provider: IPAPI_ID.to_string(),
                });
            }
            return Err(EnrichError::ProviderError {
                provider: IPAPI_ID.to_string(),
                message: response.message.unwrap_or(reason),
            });
        }

        let org = response.org.unwrap_or_default();
        Ok(ProviderRecord {
            isp: org.clone(),
            org,
            asn: response.asn.unwrap_or_default(),
            country: response.country_code.unwrap_or_default(),
            region: response.region.unwrap_or_default(),
            city: response.city.unwrap_or_default(),
        })
    }
}

#[async_trait]
impl EnrichmentProvider for IpApiProvider {
    async fn lookup_ip(&self, ip: IpAddr) -> Result<ProviderRecord> {
        if !is_global_ip(ip) {
            return Err(EnrichError::NotRoutable { ip: ip.to_string() });
        }

        let mut request = self.client.get(self.lookup_url(ip));
        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            tracing::warn!(ip = %ip, "Rate limit hit for enrichment lookup");
            return Err(EnrichError::RateLimited {
                provider: IPAPI_ID.to_string(),
            });
        }
        if !status.is_success() {
            return Err(EnrichError::ApiError {
                provider: IPAPI_ID.to_string(),
                status: status.as_u16(),
            });
        }

        let api_response: IpApiResponse = response.json().await?;
        Self::convert_api_response(api_response)
    }

    fn provider_id(&self) -> &str {
        IPAPI_ID
    }
}

// ipapi.co API types

#[derive(Debug, Default, Deserialize)]
struct IpApiResponse {
    #[serde(default)]
    error: Option<bool>,
    #[serde(default)]
    reason: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    asn: Option<String>,
    #[serde(default)]
    org: Option<String>,
    #[serde(default)]
    country_code: Option<String>,
    #[serde(default)]
    region: Option<String>,
    #[serde(default)]
    city: Option<String>,
}

/// Returns `true` if the IP is a globally routable (public) address.
pub fn is_global_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            !v4.is_loopback()
                && !v4.is_private()
                && !v4.is_link_local()
                && !v4.is_broadcast()
                && !v4.is_unspecified()
                && !v4.is_documentation()
                && !v4.is_multicast()
                // 100.64.0.0/10 (CGNAT)
                && !(v4.octets()[0] == 100 && (v4.octets()[1] & 0xC0) == 64)
        }
        IpAddr::V6(v6) => {
            !v6.is_loopback()
                && !v6.is_unspecified()
                && !v6.is_multicast()
                // fc00::/7 (unique local)
                && (v6.segments()[0] & 0xfe00) != 0xfc00
                // fe80::/10 (link-local)
                && (v6.segments()[0] & 0xffc0) != 0xfe80
        }
    }
}
