//! Static target list read from a file.

use crate::error::{Result, TargetError};
use portwatch_core::Target;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Reads targets from a text file on every fetch.
///
/// Targets are separated by newlines or other whitespace. Blank lines and
/// lines starting with `#` are ignored.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    /// Create a source for the given file.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path the targets are read from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read and parse the target file.
    pub async fn fetch(&self) -> Result<BTreeSet<Target>> {
        let contents =
            tokio::fs::read_to_string(&self.path)
                .await
                .map_err(|source| TargetError::File {
                    path: self.path.clone(),
                    source,
                })?;

        let targets = parse_targets(&contents);
        tracing::debug!(
            path = %self.path.display(),
            count = targets.len(),
            "Read targets from file"
        );
        Ok(targets)
    }
}

/// Parse a whitespace-separated target list, skipping comments.
#[must_use]
pub fn parse_targets(contents: &str) -> BTreeSet<Target> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .flat_map(str::split_whitespace)
        .filter_map(|value| match Target::new(value) {
            Ok(target) => Some(target),
            Err(e) => {
                tracing::warn!("Skipping invalid target '{}': {}", value, e);
                None
            }
        })
        .collect()
}
