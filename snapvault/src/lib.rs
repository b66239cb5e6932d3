//! snapvault backs up directories and nexkv snapshot files to an
//! object-storage gateway. Snapshot files are verified before upload:
//! their content hash, revision, key count, and byte size are resolved
//! through the cluster's own status tools, with an internal scan of the
//! storage format as the fallback tier.

pub mod archive;
pub mod backup;
pub mod cli;
pub mod config;
pub mod ipfetch;
pub mod logging;
pub mod store;
pub mod upload;
pub mod verify;
