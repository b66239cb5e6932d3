//! Integration tests for snapshot verification.
//!
//! Fixture snapshots are real store files written with redb, so the
//! internal scan tier runs against exactly what a cluster member would
//! produce. The external status tools are not installed in the test
//! environment, which is precisely the degraded setup the fallback
//! ordering is meant to cover.

use std::path::Path;

use redb::{Database, TableDefinition};
use tempfile::TempDir;
use test_case::test_case;

use snapvault::store::{KvStore, LeaseTracker, NoOpCluster, SnapshotBackend, KEY_SPACE_END};
use snapvault::verify::scan::{scan_snapshot, SCAN_PAGE_LIMIT};
use snapvault::verify::{check_snapshot_status, SnapshotStatus};

const KEYS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("keys");
const META: TableDefinition<&str, i64> = TableDefinition::new("meta");
const LEASES: TableDefinition<i64, i64> = TableDefinition::new("leases");

/// Write a snapshot fixture the way a cluster member serializes one.
fn write_snapshot(path: &Path, pairs: &[(Vec<u8>, Vec<u8>)], revision: i64, leases: &[i64]) {
    let db = Database::create(path).expect("failed to create snapshot fixture");
    let txn = db.begin_write().expect("failed to begin write");
    {
        let mut keys = txn.open_table(KEYS).expect("failed to open keys table");
        for (key, value) in pairs {
            keys.insert(key.as_slice(), value.as_slice())
                .expect("failed to insert pair");
        }
        let mut meta = txn.open_table(META).expect("failed to open meta table");
        meta.insert("revision", revision)
            .expect("failed to set revision");
        let mut lease_table = txn.open_table(LEASES).expect("failed to open leases table");
        for id in leases {
            lease_table.insert(*id, 3600).expect("failed to insert lease");
        }
    }
    txn.commit().expect("failed to commit fixture");
}

fn sample_pairs() -> Vec<(Vec<u8>, Vec<u8>)> {
    // Deliberately unsorted; the scan must order by key bytes.
    vec![
        (b"gamma".to_vec(), b"333".to_vec()),
        (b"alpha".to_vec(), b"1".to_vec()),
        (b"beta".to_vec(), b"22".to_vec()),
    ]
}

fn expected_status(pairs: &[(Vec<u8>, Vec<u8>)], revision: i64) -> SnapshotStatus {
    let mut sorted = pairs.to_vec();
    sorted.sort_by(|a, b| a.0.cmp(&b.0));

    let mut hasher = crc32fast::Hasher::new();
    let mut total_size = 0i64;
    for (key, value) in &sorted {
        hasher.update(key);
        hasher.update(value);
        total_size += (key.len() + value.len()) as i64;
    }
    SnapshotStatus {
        hash: hasher.finalize(),
        revision,
        total_key: sorted.len(),
        total_size,
    }
}

fn numbered_pairs(count: usize) -> Vec<(Vec<u8>, Vec<u8>)> {
    (0..count)
        .map(|i| {
            (
                format!("key{:08}", i).into_bytes(),
                format!("value{}", i).into_bytes(),
            )
        })
        .collect()
}

#[test]
fn scan_reports_expected_stats() {
    let dir = TempDir::new().expect("failed to create temp dir");
    let snapshot = dir.path().join("member.snap");
    let pairs = sample_pairs();
    write_snapshot(&snapshot, &pairs, 7, &[100, 101]);

    let status = scan_snapshot(&snapshot).expect("scan failed");
    assert_eq!(status, expected_status(&pairs, 7));
}

#[test]
fn scan_is_deterministic() {
    let dir = TempDir::new().expect("failed to create temp dir");
    let snapshot = dir.path().join("member.snap");
    write_snapshot(&snapshot, &numbered_pairs(257), 42, &[]);

    let first = scan_snapshot(&snapshot).expect("first scan failed");
    let second = scan_snapshot(&snapshot).expect("second scan failed");
    assert_eq!(first, second);
}

#[test]
fn scan_handles_empty_store() {
    let dir = TempDir::new().expect("failed to create temp dir");
    let snapshot = dir.path().join("empty.snap");
    write_snapshot(&snapshot, &[], 0, &[]);

    let status = scan_snapshot(&snapshot).expect("scan failed");
    assert_eq!(status.total_key, 0);
    assert_eq!(status.total_size, 0);
    assert_eq!(status.hash, 0);
    assert_eq!(status.revision, 0);
}

#[test]
fn hash_changes_when_a_value_byte_changes() {
    let dir = TempDir::new().expect("failed to create temp dir");
    let original = dir.path().join("a.snap");
    let modified = dir.path().join("b.snap");

    let pairs = sample_pairs();
    let mut tampered = pairs.clone();
    tampered[0].1[0] ^= 0x01;

    write_snapshot(&original, &pairs, 7, &[]);
    write_snapshot(&modified, &tampered, 7, &[]);

    let before = scan_snapshot(&original).expect("scan failed");
    let after = scan_snapshot(&modified).expect("scan failed");
    assert_ne!(before.hash, after.hash);
    assert_eq!(before.total_key, after.total_key);
    assert_eq!(before.total_size, after.total_size);
}

#[test_case(999)]
#[test_case(1000)]
#[test_case(1001)]
#[test_case(2500)]
fn full_scan_counts_every_key_once(count: usize) {
    let dir = TempDir::new().expect("failed to create temp dir");
    let snapshot = dir.path().join("paged.snap");
    let pairs = numbered_pairs(count);
    write_snapshot(&snapshot, &pairs, 9, &[]);

    let status = scan_snapshot(&snapshot).expect("scan failed");
    assert_eq!(status, expected_status(&pairs, 9));
}

#[test]
fn page_requests_end_with_a_short_or_empty_page() {
    let dir = TempDir::new().expect("failed to create temp dir");

    // Exactly one page limit of keys: a full page, then an empty one.
    let exact = dir.path().join("exact.snap");
    write_snapshot(&exact, &numbered_pairs(SCAN_PAGE_LIMIT), 1, &[]);

    let backend = SnapshotBackend::open(&exact).expect("open failed");
    let lessor = LeaseTracker::recover(&backend, &NoOpCluster).expect("lease recovery failed");
    let store = KvStore::open(&backend, &lessor).expect("store open failed");
    let view = store.read().expect("read view failed");

    let first = view
        .range(&[], KEY_SPACE_END, SCAN_PAGE_LIMIT)
        .expect("range failed");
    assert_eq!(first.len(), SCAN_PAGE_LIMIT);

    let mut cursor = first.last().expect("page was empty").0.clone();
    cursor.push(0);
    let second = view
        .range(&cursor, KEY_SPACE_END, SCAN_PAGE_LIMIT)
        .expect("range failed");
    assert!(second.is_empty());

    // One past the limit: a full page, then a single-entry page.
    let over = dir.path().join("over.snap");
    write_snapshot(&over, &numbered_pairs(SCAN_PAGE_LIMIT + 1), 1, &[]);

    let backend = SnapshotBackend::open(&over).expect("open failed");
    let lessor = LeaseTracker::recover(&backend, &NoOpCluster).expect("lease recovery failed");
    let store = KvStore::open(&backend, &lessor).expect("store open failed");
    let view = store.read().expect("read view failed");

    let first = view
        .range(&[], KEY_SPACE_END, SCAN_PAGE_LIMIT)
        .expect("range failed");
    assert_eq!(first.len(), SCAN_PAGE_LIMIT);

    let mut cursor = first.last().expect("page was empty").0.clone();
    cursor.push(0);
    let second = view
        .range(&cursor, KEY_SPACE_END, SCAN_PAGE_LIMIT)
        .expect("range failed");
    assert_eq!(second.len(), 1);
}

#[tokio::test]
async fn orchestrator_falls_back_to_internal_scan() {
    let dir = TempDir::new().expect("failed to create temp dir");
    let snapshot = dir.path().join("member.snap");
    let pairs = sample_pairs();
    write_snapshot(&snapshot, &pairs, 12, &[5]);

    // Neither status tool is installed here, so both external tiers fail
    // and the orchestrator must land on the scan without surfacing their
    // errors.
    let status = check_snapshot_status(&snapshot)
        .await
        .expect("verification failed");
    assert_eq!(status, scan_snapshot(&snapshot).expect("scan failed"));
}

#[tokio::test]
async fn empty_file_is_rejected_before_any_tier() {
    let dir = TempDir::new().expect("failed to create temp dir");
    let empty = dir.path().join("empty.snap");
    std::fs::write(&empty, b"").expect("failed to create empty file");

    let err = check_snapshot_status(&empty).await.unwrap_err();
    assert!(err.to_string().contains("empty"));
}

#[tokio::test]
async fn missing_file_is_rejected() {
    let dir = TempDir::new().expect("failed to create temp dir");
    let missing = dir.path().join("nope.snap");

    assert!(check_snapshot_status(&missing).await.is_err());
}

#[test]
fn status_serializes_with_tool_field_names() {
    let status = SnapshotStatus {
        hash: 42,
        revision: 1,
        total_key: 1,
        total_size: 10,
    };
    let value = serde_json::to_value(&status).expect("serialize failed");
    assert_eq!(value["hash"], 42);
    assert_eq!(value["revision"], 1);
    assert_eq!(value["totalKey"], 1);
    assert_eq!(value["totalSize"], 10);
}
