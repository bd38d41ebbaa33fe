use portwatch_core::{Target, TargetSourceKind, TargetsConfig};
use portwatch_targets::{TargetError, TargetProvider, TargetSource};
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;

fn file_config(path: &std::path::Path) -> TargetsConfig {
    TargetsConfig {
        source: TargetSourceKind::File,
        file: path.to_path_buf(),
        ..TargetsConfig::default()
    }
}

#[tokio::test]
async fn test_file_source_reads_current_contents_each_fetch() {
    let mut file = NamedTempFile::new().expect("create temp file");
    writeln!(file, "8.8.8.8\n1.1.1.1\n8.8.8.8").expect("write targets");

    let source = TargetSource::from_config(&file_config(file.path()), Duration::from_secs(5))
        .expect("build source");
    assert_eq!(source.source_name(), "file");

    let first = source.fetch_targets().await.expect("first fetch");
    let values: Vec<&str> = first.iter().map(Target::as_str).collect();
    assert_eq!(values, vec!["1.1.1.1", "8.8.8.8"]);

    writeln!(file, "9.9.9.9").expect("append target");
    let second = source.fetch_targets().await.expect("second fetch");
    assert_eq!(second.len(), 3);
}

#[tokio::test]
async fn test_missing_file_is_an_error() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let path = dir.path().join("absent.nmap");

    let source =
        TargetSource::from_config(&file_config(&path), Duration::from_secs(5)).expect("build");
    let err = source.fetch_targets().await.expect_err("missing file");

    assert!(matches!(err, TargetError::File { .. }));
}

#[tokio::test]
async fn test_empty_file_yields_empty_set() {
    let file = NamedTempFile::new().expect("create temp file");

    let source = TargetSource::from_config(&file_config(file.path()), Duration::from_secs(5))
        .expect("build source");

    assert!(source.fetch_targets().await.expect("fetch").is_empty());
}

#[test]
fn test_cloud_sources_are_selected_from_config() {
    let config = TargetsConfig {
        source: TargetSourceKind::Azure,
        ..TargetsConfig::default()
    };
    let source = TargetSource::from_config(&config, Duration::from_secs(5)).expect("build");
    assert_eq!(source.source_name(), "azure");

    let config = TargetsConfig {
        source: TargetSourceKind::Aws,
        ..TargetsConfig::default()
    };
    let source = TargetSource::from_config(&config, Duration::from_secs(5)).expect("build");
    assert_eq!(source.source_name(), "aws");
}
