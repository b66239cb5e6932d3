use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use redb::{Database, ReadTransaction};
use tracing::debug;

/// Read side of a snapshot file's transactional backend.
///
/// Only read transactions are ever started against the database, so the
/// snapshot content is never mutated by this process.
pub struct SnapshotBackend {
    db: Database,
    path: PathBuf,
}

impl SnapshotBackend {
    pub fn open(path: &Path) -> Result<Self> {
        let db = Database::open(path)
            .with_context(|| format!("failed to open snapshot backend at {}", path.display()))?;
        debug!("opened snapshot backend: {}", path.display());
        Ok(Self {
            db,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn begin_read(&self) -> Result<ReadTransaction> {
        self.db
            .begin_read()
            .with_context(|| format!("failed to begin read on {}", self.path.display()))
    }
}
