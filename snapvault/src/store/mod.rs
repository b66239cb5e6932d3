//! Read path of the nexkv snapshot storage format.
//!
//! A nexkv snapshot is a single redb database file holding the live key
//! space (`keys`), store metadata (`meta`, currently just the last
//! committed revision), and the granted leases (`leases`). The components
//! here form a dependency chain: the backend owns the file handle, the
//! lease tracker and versioned store borrow the backend, and a read view
//! borrows the store. Declaration order inside a scope therefore gives the
//! required teardown order for free: view, store, tracker, backend.

use redb::TableDefinition;

mod backend;
mod kv;
mod lease;

pub use backend::SnapshotBackend;
pub use kv::{KvStore, ReadView};
pub use lease::{ClusterVersionSource, LeaseTracker, NoOpCluster};

pub(crate) const KEYS_TABLE: TableDefinition<&[u8], &[u8]> = TableDefinition::new("keys");
pub(crate) const META_TABLE: TableDefinition<&str, i64> = TableDefinition::new("meta");
pub(crate) const LEASES_TABLE: TableDefinition<i64, i64> = TableDefinition::new("leases");

/// Meta-table entry naming the store's last committed revision.
pub(crate) const REVISION_KEY: &str = "revision";

/// Upper bound for full key-space scans. Keys are compared bytewise and no
/// valid user key starts with 0xff, so this sorts after all of them.
pub const KEY_SPACE_END: &[u8] = &[0xff];

/// Cluster version reported by [`NoOpCluster`]. Matches the storage format
/// generation this reader understands.
pub const COMPAT_CLUSTER_VERSION: &str = "3.6.0";
