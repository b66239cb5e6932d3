//! Lease recovery for snapshot reads.
//!
//! The versioned store cannot be constructed without a lease tracker, even
//! when nothing will ever touch a lease. Recovery only reads the lease
//! table; granting, revoking, and expiry belong to the live cluster and
//! have no meaning against a static file.

use anyhow::{Context, Result};
use redb::ReadableTable;
use tracing::debug;

use super::{SnapshotBackend, COMPAT_CLUSTER_VERSION, LEASES_TABLE};

/// Capability to report the cluster's storage version. The tracker uses it
/// to decide which lease layout to expect; a snapshot reader only ever
/// needs the fixed compatible answer.
pub trait ClusterVersionSource {
    fn cluster_version(&self) -> &str;
}

/// Stand-in cluster for read-only snapshot access. Reports a fixed
/// compatible version and must never be asked to mutate cluster state.
pub struct NoOpCluster;

impl ClusterVersionSource for NoOpCluster {
    fn cluster_version(&self) -> &str {
        COMPAT_CLUSTER_VERSION
    }
}

/// Lease state recovered from a snapshot's lease table.
pub struct LeaseTracker {
    granted: Vec<i64>,
}

impl LeaseTracker {
    /// Recover granted lease ids from the backend. Older snapshots have no
    /// lease table at all; that reads as zero leases.
    pub fn recover(
        backend: &SnapshotBackend,
        cluster: &impl ClusterVersionSource,
    ) -> Result<Self> {
        let txn = backend.begin_read()?;

        let granted = match txn.open_table(LEASES_TABLE) {
            Ok(table) => {
                let mut ids = Vec::new();
                for item in table.iter().context("failed to iterate lease table")? {
                    let (id, _ttl) = item.context("failed to read lease entry")?;
                    ids.push(id.value());
                }
                ids
            }
            Err(redb::TableError::TableDoesNotExist(_)) => Vec::new(),
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("failed to open lease table in {}", backend.path().display())
                })
            }
        };

        debug!(
            "recovered {} leases (cluster version {})",
            granted.len(),
            cluster.cluster_version()
        );
        Ok(Self { granted })
    }

    pub fn lease_count(&self) -> usize {
        self.granted.len()
    }
}
