//! Snapshot integrity verification.
//!
//! A snapshot's status (content hash, revision, key count, byte size) is
//! resolved through three tiers in fixed priority order: the primary
//! cluster tool, the legacy tool, and finally an internal scan of the
//! storage format. The external tools are authoritative when installed;
//! the scan exists so verification keeps working without them and is
//! required to produce identical numbers.

use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub mod external;
pub mod scan;

/// Status of a snapshot file, as reported by the cluster tooling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotStatus {
    /// CRC-32 (IEEE) over every key's bytes followed by its value's bytes,
    /// in ascending key order across the whole snapshot.
    pub hash: u32,
    /// Last committed revision at snapshot time.
    pub revision: i64,
    /// Number of live key/value pairs.
    pub total_key: usize,
    /// Sum of key and value lengths over all pairs, in bytes.
    pub total_size: i64,
}

#[derive(Debug, Clone, Copy)]
enum VerifyTier {
    Primary,
    Legacy,
    InternalScan,
}

/// Priority order. Reordering or adding a tier is a change to this list,
/// not to the control flow below.
const TIERS: [VerifyTier; 3] = [
    VerifyTier::Primary,
    VerifyTier::Legacy,
    VerifyTier::InternalScan,
];

impl VerifyTier {
    fn describe(self) -> &'static str {
        match self {
            VerifyTier::Primary => "primary status tool",
            VerifyTier::Legacy => "legacy status tool",
            VerifyTier::InternalScan => "internal scan",
        }
    }

    async fn attempt(self, path: &Path) -> Result<SnapshotStatus> {
        match self {
            VerifyTier::Primary => external::status_via_primary(path).await,
            VerifyTier::Legacy => external::status_via_legacy(path).await,
            VerifyTier::InternalScan => scan::scan_snapshot(path),
        }
    }
}

/// Check and verify the status of a snapshot file.
///
/// The first tier to succeed wins; failures of earlier tiers are demoted
/// to debug logging. Only the last tier's error reaches the caller.
pub async fn check_snapshot_status(path: &Path) -> Result<SnapshotStatus> {
    let meta = std::fs::metadata(path)
        .with_context(|| format!("failed to read snapshot file {}", path.display()))?;
    if !meta.is_file() {
        bail!("snapshot path {} is not a regular file", path.display());
    }
    if meta.len() == 0 {
        bail!("snapshot file {} is empty", path.display());
    }

    let mut last_err: Option<anyhow::Error> = None;
    for tier in TIERS {
        match tier.attempt(path).await {
            Ok(status) => {
                debug!(
                    "snapshot status for {} resolved via {}",
                    path.display(),
                    tier.describe()
                );
                return Ok(status);
            }
            Err(e) => {
                debug!(
                    "{} failed for {}, trying next tier: {:#}",
                    tier.describe(),
                    path.display(),
                    e
                );
                last_err = Some(e);
            }
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow!("no verification tier available")))
}
