//! Backup pipelines tying the pieces together: archive, verify, upload,
//! clean up.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use tracing::{info, warn};

use crate::archive::{self, ArchiveOutput};
use crate::config::Config;
use crate::ipfetch::PublicIpFetcher;
use crate::upload::{self, ObjectStoreClient};
use crate::verify;

/// Archive each configured directory and upload the artifacts.
pub async fn run_dir_backup(config: &Config) -> Result<()> {
    config.validate_dirs()?;
    config.validate_upload()?;
    announce_source_host().await;

    let excludes = archive::compile_excludes(&config.exclude_patterns)?;
    let client = ObjectStoreClient::new(
        &config.endpoint,
        &config.access_key,
        &config.secret_key,
        &config.bucket,
    )?;

    for dir in &config.dir_paths {
        info!("backing up directory {}", dir);

        let dir_path = PathBuf::from(dir);
        let method = config.compress_method;
        let patterns = excludes.clone();
        let artifact = tokio::task::spawn_blocking(move || {
            archive::archive_directory(&dir_path, &patterns, method)
        })
        .await
        .context("archive task failed")??;

        upload_and_cleanup(config, &client, &artifact, &[]).await?;
    }
    Ok(())
}

/// Verify a snapshot file, then archive and upload it. A snapshot that
/// fails verification is never uploaded.
pub async fn run_snapshot_backup(config: &Config, snapshot: &Path) -> Result<()> {
    config.validate_upload()?;
    announce_source_host().await;

    let status = verify::check_snapshot_status(snapshot)
        .await
        .with_context(|| format!("snapshot {} failed verification", snapshot.display()))?;
    info!(
        "snapshot verified: hash {:#010x}, revision {}, {} keys, {} bytes",
        status.hash, status.revision, status.total_key, status.total_size
    );

    let snapshot_path = snapshot.to_path_buf();
    let method = config.compress_method;
    let artifact =
        tokio::task::spawn_blocking(move || archive::archive_file(&snapshot_path, method))
            .await
            .context("archive task failed")??;

    let metadata = vec![
        ("x-snapvault-hash".to_string(), status.hash.to_string()),
        (
            "x-snapvault-revision".to_string(),
            status.revision.to_string(),
        ),
    ];
    let client = ObjectStoreClient::new(
        &config.endpoint,
        &config.access_key,
        &config.secret_key,
        &config.bucket,
    )?;
    upload_and_cleanup(config, &client, &artifact, &metadata).await
}

async fn upload_and_cleanup(
    config: &Config,
    client: &ObjectStoreClient,
    artifact: &ArchiveOutput,
    metadata: &[(String, String)],
) -> Result<()> {
    let file_name = artifact
        .path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| anyhow!("artifact {} has no file name", artifact.path.display()))?;
    let object = upload::object_name(&config.object_prefix, &file_name);

    client.upload_file(&artifact.path, &object, metadata).await?;

    if config.keep_backup_files {
        info!("keeping local artifact {}", artifact.path.display());
        return Ok(());
    }
    if let Err(e) = tokio::fs::remove_file(&artifact.path).await {
        warn!(
            "failed to remove local artifact {}: {}",
            artifact.path.display(),
            e
        );
    }
    Ok(())
}

/// Best-effort public-IP tag for the backup logs; never fatal.
async fn announce_source_host() {
    match PublicIpFetcher::new() {
        Ok(fetcher) => match fetcher.fetch().await {
            Ok(ip) => info!("backup source host: {}", ip),
            Err(e) => warn!("could not determine public IP: {:#}", e),
        },
        Err(e) => warn!("could not build public-IP client: {:#}", e),
    }
}
