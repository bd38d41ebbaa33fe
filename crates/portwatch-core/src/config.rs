//! Configuration management for Portwatch.
//!
//! Provides TOML-based configuration with XDG-compliant paths and
//! environment variable overrides.

use crate::error::{ConfigError, ConfigResult};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable naming an explicit config file.
pub const CONFIG_PATH_ENV: &str = "PORTWATCH_CONFIG";

/// Main application configuration.
///
/// This is loaded from `$PORTWATCH_CONFIG` or `~/.config/portwatch/config.toml`
/// (or platform equivalent). If the file doesn't exist, default values are used.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Scan scheduling settings
    pub scanning: ScanningConfig,
    /// Target discovery settings
    pub targets: TargetsConfig,
    /// Enrichment settings
    pub enrichment: EnrichmentConfig,
    /// Metrics endpoint settings
    pub exporter: ExporterConfig,
}

impl AppConfig {
    /// Load configuration from disk, falling back to defaults if not found.
    ///
    /// # Errors
    /// Returns error if:
    /// - Config directory cannot be determined
    /// - File exists but cannot be read
    /// - File contents are not valid TOML
    pub fn load() -> ConfigResult<Self> {
        let config_path = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => PathBuf::from(path),
            Err(_) => Self::config_path()?,
        };
        Self::load_from(&config_path)
    }

    /// Load configuration from a specific file, falling back to defaults if
    /// the file does not exist.
    pub fn load_from(config_path: &Path) -> ConfigResult<Self> {
        if config_path.exists() {
            tracing::debug!("Loading config from {}", config_path.display());
            let contents = fs::read_to_string(config_path)?;
            let config = toml::from_str(&contents)?;
            Ok(config)
        } else {
            tracing::debug!("Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load configuration with environment variable overrides, then validate.
    ///
    /// See [`AppConfig::apply_overrides`] for the supported variables.
    pub fn load_with_env() -> ConfigResult<Self> {
        let mut config = Self::load()?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a key lookup (normally the process environment).
    ///
    /// Supported keys:
    /// - `PORTWATCH_BATCH_SIZE`, `PORTWATCH_MAX_CONCURRENT_BATCHES`
    /// - `PORTWATCH_SCAN_PORTS`, `PORTWATCH_SCAN_ARGUMENTS`, `PORTWATCH_SCAN_INTERVAL_SECS`
    /// - `PORTWATCH_TARGET_SOURCE` (`file`, `aws`, `azure`), `PORTWATCH_TARGETS_FILE`
    /// - `PORTWATCH_AWS_CREDENTIALS`, `PORTWATCH_AZURE_CREDENTIALS` (JSON lists)
    /// - `PORTWATCH_GEOIP_ENABLED`, `PORTWATCH_GEOIP_CACHE_TTL`, `PORTWATCH_GEOIP_API_TOKEN`
    /// - `PORTWATCH_PORT`
    pub fn apply_overrides<F>(&mut self, lookup: F) -> ConfigResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(val) = lookup("PORTWATCH_BATCH_SIZE") {
            self.scanning.batch_size = parse_value("PORTWATCH_BATCH_SIZE", &val)?;
            tracing::debug!("Override scanning.batch_size from env: {}", val);
        }

        if let Some(val) = lookup("PORTWATCH_MAX_CONCURRENT_BATCHES") {
            self.scanning.max_concurrent_batches =
                parse_value("PORTWATCH_MAX_CONCURRENT_BATCHES", &val)?;
            tracing::debug!("Override scanning.max_concurrent_batches from env: {}", val);
        }

        if let Some(val) = lookup("PORTWATCH_SCAN_PORTS") {
            self.scanning.ports = Some(val).filter(|p| !p.trim().is_empty());
        }

        if let Some(val) = lookup("PORTWATCH_SCAN_ARGUMENTS") {
            self.scanning.arguments = val;
        }

        if let Some(val) = lookup("PORTWATCH_SCAN_INTERVAL_SECS") {
            self.scanning.interval_secs = parse_value("PORTWATCH_SCAN_INTERVAL_SECS", &val)?;
        }

        if let Some(val) = lookup("PORTWATCH_TARGET_SOURCE") {
            self.targets.source = match val.to_ascii_lowercase().as_str() {
                "file" => TargetSourceKind::File,
                "aws" => TargetSourceKind::Aws,
                "azure" => TargetSourceKind::Azure,
                other => {
                    return Err(ConfigError::InvalidValue {
                        field: "PORTWATCH_TARGET_SOURCE".to_string(),
                        reason: format!("expected file, aws or azure, got '{other}'"),
                    })
                }
            };
            tracing::debug!("Override targets.source from env: {:?}", self.targets.source);
        }

        if let Some(val) = lookup("PORTWATCH_TARGETS_FILE") {
            self.targets.file = PathBuf::from(val);
        }

        if let Some(val) = lookup("PORTWATCH_AWS_CREDENTIALS") {
            self.targets.aws =
                serde_json::from_str(&val).map_err(|source| ConfigError::Credentials {
                    field: "PORTWATCH_AWS_CREDENTIALS".to_string(),
                    source,
                })?;
        }

        if let Some(val) = lookup("PORTWATCH_AZURE_CREDENTIALS") {
            self.targets.azure =
                serde_json::from_str(&val).map_err(|source| ConfigError::Credentials {
                    field: "PORTWATCH_AZURE_CREDENTIALS".to_string(),
                    source,
                })?;
        }

        if let Some(val) = lookup("PORTWATCH_GEOIP_ENABLED") {
            self.enrichment.enabled = parse_value("PORTWATCH_GEOIP_ENABLED", &val)?;
            tracing::debug!("Override enrichment.enabled from env: {}", val);
        }

        if let Some(val) = lookup("PORTWATCH_GEOIP_CACHE_TTL") {
            self.enrichment.cache_ttl_secs = parse_value("PORTWATCH_GEOIP_CACHE_TTL", &val)?;
        }

        if let Some(val) = lookup("PORTWATCH_GEOIP_API_TOKEN") {
            self.enrichment.api_token = Some(val).filter(|t| !t.is_empty());
        }

        if let Some(val) = lookup("PORTWATCH_PORT") {
            self.exporter.port = parse_value("PORTWATCH_PORT", &val)?;
        }

        Ok(())
    }

    /// Check value constraints that serde cannot express.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.scanning.batch_size == 0 {
            return Err(invalid("scanning.batch_size", "must be greater than zero"));
        }
        if self.scanning.max_concurrent_batches == 0 {
            return Err(invalid(
                "scanning.max_concurrent_batches",
                "must be greater than zero",
            ));
        }
        if self.scanning.interval_secs == 0 {
            return Err(invalid("scanning.interval_secs", "must be greater than zero"));
        }
        if self.scanning.scan_timeout_secs == 0 {
            return Err(invalid("scanning.scan_timeout_secs", "must be greater than zero"));
        }
        if self.scanning.target_fetch_timeout_secs == 0 {
            return Err(invalid(
                "scanning.target_fetch_timeout_secs",
                "must be greater than zero",
            ));
        }
        if self.enrichment.cache_ttl_secs == 0 {
            return Err(invalid("enrichment.cache_ttl_secs", "must be greater than zero"));
        }
        if self.enrichment.timeout_secs == 0 {
            return Err(invalid("enrichment.timeout_secs", "must be greater than zero"));
        }
        match self.targets.source {
            TargetSourceKind::Aws if self.targets.aws.is_empty() => {
                Err(invalid("targets.aws", "at least one AWS account is required"))
            }
            TargetSourceKind::Azure if self.targets.azure.is_empty() => Err(invalid(
                "targets.azure",
                "at least one Azure service principal is required",
            )),
            _ => Ok(()),
        }
    }

    /// Get the path to the configuration file.
    ///
    /// Uses XDG base directories: `~/.config/portwatch/config.toml`
    pub fn config_path() -> ConfigResult<PathBuf> {
        let dirs =
            ProjectDirs::from("io", "portwatch", "portwatch").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.config_dir().join("config.toml"))
    }
}

fn parse_value<T: std::str::FromStr>(field: &str, value: &str) -> ConfigResult<T> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        field: field.to_string(),
        reason: format!("could not parse '{value}'"),
    })
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

/// Scan scheduling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanningConfig {
    /// Number of targets handed to the scanner at once
    pub batch_size: usize,
    /// Maximum number of batches scanned simultaneously
    pub max_concurrent_batches: usize,
    /// Port specification passed to nmap `-p`; `None` uses nmap's common ports
    pub ports: Option<String>,
    /// Extra nmap arguments
    pub arguments: String,
    /// Seconds between the start of consecutive cycles
    pub interval_secs: u64,
    /// Upper bound for one batch scan in seconds
    pub scan_timeout_secs: u64,
    /// Upper bound for fetching the target list in seconds
    pub target_fetch_timeout_secs: u64,
    /// Path or name of the nmap executable
    pub nmap_path: String,
}

impl Default for ScanningConfig {
    fn default() -> Self {
        Self {
            batch_size: 50,
            max_concurrent_batches: 4,
            ports: None,
            arguments: "-sV".to_string(),
            interval_secs: 3600,
            scan_timeout_secs: 1800,
            target_fetch_timeout_secs: 300,
            nmap_path: "nmap".to_string(),
        }
    }
}

/// Which target source is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetSourceKind {
    /// Static file, one target per line
    #[default]
    File,
    /// AWS Elastic IPs and EC2 instance public IPs
    Aws,
    /// Azure public IP address resources
    Azure,
}

/// Target discovery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetsConfig {
    /// Active source
    pub source: TargetSourceKind,
    /// Target file used by the `file` source
    pub file: PathBuf,
    /// AWS accounts used by the `aws` source
    pub aws: Vec<AwsAccount>,
    /// Azure service principals used by the `azure` source
    pub azure: Vec<AzureAccount>,
}

impl Default for TargetsConfig {
    fn default() -> Self {
        Self {
            source: TargetSourceKind::File,
            file: PathBuf::from("portscanip.nmap"),
            aws: Vec::new(),
            azure: Vec::new(),
        }
    }
}

/// Static credentials for one AWS account.
#[derive(Clone, Serialize, Deserialize)]
pub struct AwsAccount {
    /// Access key ID
    #[serde(alias = "AWS_ACCESS_KEY_ID")]
    pub access_key_id: String,
    /// Secret access key
    #[serde(alias = "AWS_SECRET_ACCESS_KEY")]
    pub secret_access_key: String,
    /// Label used in logs
    #[serde(default, alias = "AWS_PROFILE_NAME")]
    pub profile_name: Option<String>,
    /// Regions to enumerate
    #[serde(default, alias = "AWS_REGIONS")]
    pub regions: Vec<String>,
}

impl fmt::Debug for AwsAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AwsAccount")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("profile_name", &self.profile_name)
            .field("regions", &self.regions)
            .finish()
    }
}

/// Service principal for one Azure tenant.
#[derive(Clone, Serialize, Deserialize)]
pub struct AzureAccount {
    /// Directory (tenant) ID
    #[serde(alias = "AZURE_TENANT_ID")]
    pub tenant_id: String,
    /// Application (client) ID
    #[serde(alias = "AZURE_CLIENT_ID")]
    pub client_id: String,
    /// Client secret
    #[serde(alias = "AZURE_CLIENT_SECRET")]
    pub client_secret: String,
}

impl fmt::Debug for AzureAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AzureAccount")
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

/// Enrichment settings.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentConfig {
    /// Whether discovered hosts are enriched
    pub enabled: bool,
    /// Provider name (currently only `ipapi.co`)
    pub provider: String,
    /// Seconds a record stays valid
    pub cache_ttl_secs: u64,
    /// Optional bearer token for the provider
    #[serde(skip_serializing)]
    pub api_token: Option<String>,
    /// Upper bound for one provider lookup in seconds
    pub timeout_secs: u64,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: "ipapi.co".to_string(),
            cache_ttl_secs: 86_400,
            api_token: None,
            timeout_secs: 10,
        }
    }
}

impl fmt::Debug for EnrichmentConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnrichmentConfig")
            .field("enabled", &self.enabled)
            .field("provider", &self.provider)
            .field("cache_ttl_secs", &self.cache_ttl_secs)
            .field("api_token", &self.api_token.as_ref().map(|_| "<redacted>"))
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Metrics endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExporterConfig {
    /// Address to bind
    pub listen_address: String,
    /// Port to expose metrics on
    pub port: u16,
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            listen_address: "0.0.0.0".to_string(),
            port: 9808,
        }
    }
}
