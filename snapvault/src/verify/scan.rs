//! Internal fallback tier: reconstruct the status directly from the
//! storage format.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

use super::SnapshotStatus;
use crate::store::{KvStore, LeaseTracker, NoOpCluster, SnapshotBackend, KEY_SPACE_END};

/// Page size for the full key-space scan. Matches what the cluster tools
/// use, so read patterns against large snapshots stay comparable.
pub const SCAN_PAGE_LIMIT: usize = 1000;

/// Compute a snapshot's status by opening it as a store and walking the
/// entire key space inside one consistent read view.
///
/// Must report exactly what the external tools report for the same file;
/// the hash folds in key bytes then value bytes, per pair, in ascending
/// key order.
pub fn scan_snapshot(path: &Path) -> Result<SnapshotStatus> {
    // Dependency chain, in acquisition order. Drops run in reverse
    // declaration order on every exit path, which is the required
    // teardown order: view, store, lease tracker, backend.
    let backend = SnapshotBackend::open(path)?;
    let cluster = NoOpCluster;
    let lessor = LeaseTracker::recover(&backend, &cluster)
        .context("failed to recover lease state from snapshot")?;
    let store = KvStore::open(&backend, &lessor)
        .context("failed to open versioned store over snapshot")?;

    let revision = store.revision();
    let view = store.read().context("failed to open snapshot read view")?;

    let mut total_key: usize = 0;
    let mut total_size: i64 = 0;
    let mut hasher = crc32fast::Hasher::new();

    // There is no exclusive-lower-bound range primitive, so the cursor is
    // advanced past the last returned key by appending a single zero byte:
    // the smallest key that sorts strictly after it.
    let mut cursor: Vec<u8> = Vec::new();
    loop {
        let page = view
            .range(&cursor, KEY_SPACE_END, SCAN_PAGE_LIMIT)
            .context("failed to range-read snapshot data")?;
        if page.is_empty() {
            break;
        }

        for (key, value) in &page {
            total_key += 1;
            total_size += (key.len() + value.len()) as i64;
            hasher.update(key);
            hasher.update(value);
        }

        if page.len() < SCAN_PAGE_LIMIT {
            break;
        }
        if let Some((last_key, _)) = page.last() {
            cursor = last_key.clone();
            cursor.push(0);
        }
    }

    debug!(
        "scanned snapshot {}: {} keys, {} bytes, revision {}",
        path.display(),
        total_key,
        total_size,
        revision
    );

    Ok(SnapshotStatus {
        hash: hasher.finalize(),
        revision,
        total_key,
        total_size,
    })
}
