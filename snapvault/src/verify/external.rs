//! Adapters for the external snapshot status tools.

use std::path::Path;

use anyhow::{bail, Context, Result};
use tokio::process::Command;
use tracing::debug;

use super::SnapshotStatus;

pub(crate) const PRIMARY_TOOL: &str = "nexutl";
pub(crate) const LEGACY_TOOL: &str = "nexctl";

/// The legacy tool serves its v2 API unless told otherwise.
const LEGACY_API_ENV: (&str, &str) = ("NEXCTL_API", "3");

/// Ask the primary tool for a machine-readable status report.
pub(crate) async fn status_via_primary(path: &Path) -> Result<SnapshotStatus> {
    let output = run_status_tool(PRIMARY_TOOL, path, &[]).await?;
    parse_status_report(&output)
}

/// Ask the legacy tool, selecting its v3 compatibility API.
pub(crate) async fn status_via_legacy(path: &Path) -> Result<SnapshotStatus> {
    let output = run_status_tool(LEGACY_TOOL, path, &[LEGACY_API_ENV]).await?;
    parse_status_report(&output)
}

async fn run_status_tool(tool: &str, path: &Path, env: &[(&str, &str)]) -> Result<Vec<u8>> {
    debug!("running {} snapshot status {}", tool, path.display());

    let mut command = Command::new(tool);
    command
        .arg("snapshot")
        .arg("status")
        .arg(path)
        .arg("--write-out=json");
    for (key, value) in env {
        command.env(key, value);
    }

    let output = command
        .output()
        .await
        .with_context(|| format!("failed to run {}", tool))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!(
            "{} exited with {}: {}",
            tool,
            output.status,
            stderr.trim()
        );
    }
    if output.stdout.is_empty() {
        bail!("{} produced no output", tool);
    }

    Ok(output.stdout)
}

/// Decode a status report from tool output.
///
/// The legacy tool prints a deprecation warning on the same stream before
/// the JSON document and offers no flag to suppress it, so decoding starts
/// at the first `{` byte. All four fields must be present.
pub(crate) fn parse_status_report(output: &[u8]) -> Result<SnapshotStatus> {
    let start = output.iter().position(|&b| b == b'{').unwrap_or(0);
    serde_json::from_slice(&output[start..]).context("failed to decode snapshot status report")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_report() {
        let status = parse_status_report(
            br#"{"hash":3272125724,"revision":42,"totalKey":7,"totalSize":1024}"#,
        )
        .unwrap();
        assert_eq!(status.hash, 3272125724);
        assert_eq!(status.revision, 42);
        assert_eq!(status.total_key, 7);
        assert_eq!(status.total_size, 1024);
    }

    #[test]
    fn skips_deprecation_preamble() {
        let output = b"Deprecated: Use the primary tool instead.\n{\"hash\":42,\"revision\":1,\"totalKey\":1,\"totalSize\":10}";
        let status = parse_status_report(output).unwrap();
        assert_eq!(
            status,
            SnapshotStatus {
                hash: 42,
                revision: 1,
                total_key: 1,
                total_size: 10,
            }
        );
    }

    #[test]
    fn rejects_output_without_json() {
        assert!(parse_status_report(b"no report here").is_err());
        assert!(parse_status_report(b"").is_err());
    }

    #[test]
    fn rejects_missing_fields() {
        assert!(parse_status_report(br#"{"hash":42,"revision":1}"#).is_err());
    }

    #[test]
    fn rejects_truncated_document() {
        assert!(parse_status_report(br#"warning {"hash":42,"revision":1,"#).is_err());
    }
}
