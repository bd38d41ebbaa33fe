use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TargetError {
    #[error("could not read target file {path}: {source}")]
    File {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("AWS API error for account {account} in {region}: {message}")]
    Aws {
        account: String,
        region: String,
        message: String,
    },

    #[error("Azure authentication failed for tenant {tenant_id}: {message}")]
    AzureAuth { tenant_id: String, message: String },

    #[error("Azure API error: status {status} for {url}")]
    AzureApi { status: u16, url: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("target source {0} is not available in this build")]
    Unsupported(String),
}

pub type Result<T> = std::result::Result<T, TargetError>;
