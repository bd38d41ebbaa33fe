//! Portwatch Targets - Scan target discovery
//!
//! Produces the deduplicated set of hosts to scan each cycle, from one of:
//! - a static target file
//! - AWS EC2 (Elastic IPs and instance public IPs)
//! - Azure public IP resources

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

pub mod aws;
pub mod azure;
pub mod error;
pub mod file;

pub use aws::AwsSource;
pub use azure::AzureSource;
pub use error::{Result, TargetError};
pub use file::{parse_targets, FileSource};

use async_trait::async_trait;
use portwatch_core::{Target, TargetSourceKind, TargetsConfig};
use std::collections::BTreeSet;
use std::time::Duration;

/// Something that can list the hosts to scan.
///
/// Sources are queried once per cycle; a failed fetch fails the cycle.
#[async_trait]
pub trait TargetProvider: Send + Sync {
    /// Fetch the current target set, deduplicated and sorted.
    async fn fetch_targets(&self) -> Result<BTreeSet<Target>>;

    /// Short name used in logs.
    fn source_name(&self) -> &'static str;
}

/// The configured target source.
#[derive(Debug, Clone)]
pub enum TargetSource {
    /// Static file
    File(FileSource),
    /// AWS accounts
    Aws(AwsSource),
    /// Azure service principals
    Azure(AzureSource),
}

impl TargetSource {
    /// Build the source selected in the configuration.
    ///
    /// `http_timeout` bounds each request made by HTTP-based sources.
    pub fn from_config(config: &TargetsConfig, http_timeout: Duration) -> Result<Self> {
        let source = match config.source {
            TargetSourceKind::File => Self::File(FileSource::new(config.file.clone())),
            TargetSourceKind::Aws => Self::Aws(AwsSource::new(config.aws.clone())),
            TargetSourceKind::Azure => {
                Self::Azure(AzureSource::new(config.azure.clone(), http_timeout)?)
            }
        };

        tracing::info!(source = source.source_name(), "Target source configured");
        Ok(source)
    }
}

#[async_trait]
impl TargetProvider for TargetSource {
    async fn fetch_targets(&self) -> Result<BTreeSet<Target>> {
        match self {
            Self::File(source) => source.fetch().await,
            Self::Aws(source) => source.fetch().await,
            Self::Azure(source) => source.fetch().await,
        }
    }

    fn source_name(&self) -> &'static str {
        match self {
            Self::File(_) => "file",
            Self::Aws(_) => "aws",
            Self::Azure(_) => "azure",
        }
    }
}
