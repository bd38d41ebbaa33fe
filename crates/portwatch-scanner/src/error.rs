use portwatch_targets::TargetError;
use thiserror::Error;

/// Failure of one batch scan.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("failed to start scanner '{program}': {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("scanner exited with status {code:?}: {stderr}")]
    ScannerFailed { code: Option<i32>, stderr: String },

    #[error("batch scan timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("scan task failed: {0}")]
    Task(String),
}

/// Failure of a whole scan cycle.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error("failed to fetch targets: {0}")]
    TargetFetch(#[from] TargetError),

    #[error("fetching targets timed out after {seconds}s")]
    TargetFetchTimeout { seconds: u64 },

    #[error("a scan cycle is already running")]
    AlreadyRunning,

    #[error("scan cycle cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, ScanError>;
