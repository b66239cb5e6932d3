//! Versioned key/value store over a snapshot backend.

use anyhow::{Context, Result};
use redb::{ReadTransaction, ReadableTable};
use tracing::debug;

use super::{LeaseTracker, SnapshotBackend, KEYS_TABLE, META_TABLE, REVISION_KEY};

/// The versioned store a snapshot serializes. Construction wires up the
/// lease tracker the live store would own and records the last committed
/// revision; all data access goes through a [`ReadView`].
pub struct KvStore<'a> {
    backend: &'a SnapshotBackend,
    revision: i64,
}

impl<'a> KvStore<'a> {
    pub fn open(backend: &'a SnapshotBackend, lessor: &LeaseTracker) -> Result<Self> {
        let txn = backend.begin_read()?;

        let revision = match txn.open_table(META_TABLE) {
            Ok(table) => table
                .get(REVISION_KEY)
                .context("failed to read store revision")?
                .map(|guard| guard.value())
                .unwrap_or(0),
            Err(redb::TableError::TableDoesNotExist(_)) => 0,
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("failed to open meta table in {}", backend.path().display())
                })
            }
        };

        debug!(
            "opened versioned store: revision {}, {} leases",
            revision,
            lessor.lease_count()
        );
        Ok(Self { backend, revision })
    }

    /// Last committed revision at snapshot time.
    pub fn revision(&self) -> i64 {
        self.revision
    }

    /// Open one consistent read-only view. Every read made through the
    /// returned view observes the same state of the store.
    pub fn read(&self) -> Result<ReadView> {
        let txn = self.backend.begin_read()?;
        Ok(ReadView { txn })
    }
}

/// A consistent read-only view over the store's key space.
pub struct ReadView {
    txn: ReadTransaction,
}

impl ReadView {
    /// Return up to `limit` key/value pairs in `start..end`, in ascending
    /// key order. `start` is inclusive; callers paginating the key space
    /// advance it past the last returned key themselves.
    pub fn range(&self, start: &[u8], end: &[u8], limit: usize) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let table = match self.txn.open_table(KEYS_TABLE) {
            Ok(table) => table,
            Err(redb::TableError::TableDoesNotExist(_)) => return Ok(Vec::new()),
            Err(e) => return Err(e).context("failed to open key table"),
        };

        let mut kvs = Vec::new();
        for item in table
            .range::<&[u8]>(start..end)
            .context("failed to start range read")?
        {
            let (key, value) = item.context("failed to read key/value pair")?;
            kvs.push((key.value().to_vec(), value.value().to_vec()));
            if kvs.len() >= limit {
                break;
            }
        }
        Ok(kvs)
    }
}
