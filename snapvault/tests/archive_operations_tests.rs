//! Integration tests for archive creation: exclusion pruning and the
//! shape of the produced tar streams.

use std::fs::{self, File};
use std::path::Path;

use flate2::read::GzDecoder;
use tempfile::TempDir;

use snapvault::archive::{archive_directory, archive_file, compile_excludes, CompressMethod};

/// Build a directory tree resembling a node deployment.
fn create_backup_tree(root: &Path) {
    fs::create_dir_all(root.join("data")).expect("failed to create data dir");
    fs::write(root.join("data/application.db"), b"application bytes").unwrap();
    fs::write(root.join("data/blockstore.db"), b"blockstore bytes").unwrap();

    fs::create_dir_all(root.join("logs")).expect("failed to create logs dir");
    fs::write(root.join("logs/app.log"), b"log line").unwrap();

    fs::create_dir_all(root.join("node_modules/pkg")).expect("failed to create node_modules");
    fs::write(root.join("node_modules/pkg/index.js"), b"js").unwrap();

    fs::write(root.join("config.toml"), b"[node]").unwrap();
}

fn tar_entry_names<R: std::io::Read>(reader: R) -> Vec<String> {
    let mut archive = tar::Archive::new(reader);
    archive
        .entries()
        .expect("failed to read tar entries")
        .map(|entry| {
            entry
                .expect("failed to read tar entry")
                .path()
                .expect("entry has no path")
                .to_string_lossy()
                .to_string()
        })
        .collect()
}

#[test]
fn directory_archive_prunes_excluded_entries() {
    let temp = TempDir::new().expect("failed to create temp dir");
    let source = temp.path().join("node-1");
    create_backup_tree(&source);

    let excludes = compile_excludes(&["*.log".to_string(), "node_modules".to_string()])
        .expect("failed to compile excludes");
    let output = archive_directory(&source, &excludes, CompressMethod::Gzip)
        .expect("archive failed");
    assert!(output.size_bytes > 0);
    assert!(output.path.to_string_lossy().ends_with(".tar.gz"));

    let names = tar_entry_names(GzDecoder::new(
        File::open(&output.path).expect("failed to open archive"),
    ));
    assert!(names.contains(&"node-1/data/application.db".to_string()));
    assert!(names.contains(&"node-1/data/blockstore.db".to_string()));
    assert!(names.contains(&"node-1/config.toml".to_string()));
    assert!(!names.iter().any(|n| n.ends_with(".log")));
    assert!(!names.iter().any(|n| n.contains("node_modules")));
}

#[test]
fn uncompressed_archive_keeps_tar_extension() {
    let temp = TempDir::new().expect("failed to create temp dir");
    let source = temp.path().join("node-2");
    create_backup_tree(&source);

    let output = archive_directory(&source, &[], CompressMethod::None).expect("archive failed");
    assert!(output.path.to_string_lossy().ends_with(".tar"));

    let names = tar_entry_names(File::open(&output.path).expect("failed to open archive"));
    assert!(names.contains(&"node-2/logs/app.log".to_string()));
}

#[test]
fn single_file_archive_preserves_the_file_name() {
    let temp = TempDir::new().expect("failed to create temp dir");
    let snapshot = temp.path().join("member.snap");
    fs::write(&snapshot, b"snapshot bytes").unwrap();

    let output = archive_file(&snapshot, CompressMethod::Gzip).expect("archive failed");

    let names = tar_entry_names(GzDecoder::new(
        File::open(&output.path).expect("failed to open archive"),
    ));
    assert_eq!(names, vec!["member.snap".to_string()]);
}

#[test]
fn archiving_an_empty_directory_fails() {
    let temp = TempDir::new().expect("failed to create temp dir");
    let source = temp.path().join("empty");
    fs::create_dir_all(&source).unwrap();

    assert!(archive_directory(&source, &[], CompressMethod::Gzip).is_err());
}

#[test]
fn archiving_a_missing_directory_fails() {
    let temp = TempDir::new().expect("failed to create temp dir");
    let missing = temp.path().join("missing");

    assert!(archive_directory(&missing, &[], CompressMethod::Gzip).is_err());
}
