//! Archive creation: directory trees and single files are packed into tar
//! artifacts, optionally gzip-compressed, written next to their source.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{anyhow, bail, Context, Result};
use chrono::Utc;
use flate2::write::GzEncoder;
use flate2::Compression;
use glob::Pattern;
use serde::Deserialize;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressMethod {
    Gzip,
    None,
}

impl Default for CompressMethod {
    fn default() -> Self {
        CompressMethod::Gzip
    }
}

impl CompressMethod {
    pub fn extension(self) -> &'static str {
        match self {
            CompressMethod::Gzip => "tar.gz",
            CompressMethod::None => "tar",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CompressMethod::Gzip => "gzip",
            CompressMethod::None => "none",
        }
    }
}

impl FromStr for CompressMethod {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gzip" => Ok(CompressMethod::Gzip),
            "none" => Ok(CompressMethod::None),
            other => Err(anyhow!(
                "unsupported compress method '{}' (expected gzip or none)",
                other
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ArchiveOutput {
    pub path: PathBuf,
    pub size_bytes: u64,
}

/// Compile exclude patterns, skipping empty entries.
pub fn compile_excludes(patterns: &[String]) -> Result<Vec<Pattern>> {
    patterns
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .map(|p| Pattern::new(p).with_context(|| format!("invalid exclude pattern '{}'", p)))
        .collect()
}

enum TreeEntry {
    Dir { abs: PathBuf, name: PathBuf },
    File { abs: PathBuf, name: PathBuf },
}

/// Archive a whole directory tree. Entries matching an exclude pattern are
/// pruned, directories together with their subtree. The artifact lands in
/// the directory's parent as `<name>-<timestamp>.<ext>`.
pub fn archive_directory(
    dir: &Path,
    excludes: &[Pattern],
    method: CompressMethod,
) -> Result<ArchiveOutput> {
    let meta = fs::metadata(dir)
        .with_context(|| format!("failed to read backup directory {}", dir.display()))?;
    if !meta.is_dir() {
        bail!("backup path {} is not a directory", dir.display());
    }
    let base = dir
        .file_name()
        .ok_or_else(|| anyhow!("backup directory {} has no name", dir.display()))?
        .to_string_lossy()
        .to_string();

    let mut entries = Vec::new();
    walk_tree(dir, Path::new(&base), Path::new(""), excludes, &mut entries)?;
    let file_count = entries
        .iter()
        .filter(|e| matches!(e, TreeEntry::File { .. }))
        .count();
    if file_count == 0 {
        bail!("nothing to archive under {}", dir.display());
    }

    let artifact = artifact_path(dir, &base, method)?;
    write_archive(&artifact, &entries, method)?;

    let size_bytes = fs::metadata(&artifact)
        .with_context(|| format!("failed to stat archive {}", artifact.display()))?
        .len();
    info!(
        "archived {} ({} files, {} bytes) -> {}",
        dir.display(),
        file_count,
        size_bytes,
        artifact.display()
    );
    Ok(ArchiveOutput {
        path: artifact,
        size_bytes,
    })
}

/// Archive a single file, preserving its name inside the tar.
pub fn archive_file(file: &Path, method: CompressMethod) -> Result<ArchiveOutput> {
    let meta = fs::metadata(file)
        .with_context(|| format!("failed to read backup file {}", file.display()))?;
    if !meta.is_file() {
        bail!("backup path {} is not a regular file", file.display());
    }
    let name = file
        .file_name()
        .ok_or_else(|| anyhow!("backup file {} has no name", file.display()))?
        .to_string_lossy()
        .to_string();

    let entries = vec![TreeEntry::File {
        abs: file.to_path_buf(),
        name: PathBuf::from(&name),
    }];
    let artifact = artifact_path(file, &name, method)?;
    write_archive(&artifact, &entries, method)?;

    let size_bytes = fs::metadata(&artifact)
        .with_context(|| format!("failed to stat archive {}", artifact.display()))?
        .len();
    info!(
        "archived {} ({} bytes) -> {}",
        file.display(),
        size_bytes,
        artifact.display()
    );
    Ok(ArchiveOutput {
        path: artifact,
        size_bytes,
    })
}

fn artifact_path(source: &Path, base: &str, method: CompressMethod) -> Result<PathBuf> {
    let timestamp = Utc::now().format("%Y%m%d-%H%M%S");
    let name = format!("{}-{}.{}", base, timestamp, method.extension());
    Ok(source
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
        .join(name))
}

/// Recursively collect tree entries. `name_dir` is the path inside the
/// archive (rooted at the directory's own name), `rel_dir` is the path
/// relative to the backup root that exclude patterns match against.
fn walk_tree(
    abs_dir: &Path,
    name_dir: &Path,
    rel_dir: &Path,
    excludes: &[Pattern],
    out: &mut Vec<TreeEntry>,
) -> Result<()> {
    let mut children: Vec<_> = fs::read_dir(abs_dir)
        .with_context(|| format!("failed to list {}", abs_dir.display()))?
        .collect::<std::io::Result<_>>()
        .with_context(|| format!("failed to list {}", abs_dir.display()))?;
    children.sort_by_key(|e| e.file_name());

    for child in children {
        let file_name = child.file_name();
        let rel = rel_dir.join(&file_name);
        if is_excluded(&rel, excludes) {
            debug!("excluding {}", rel.display());
            continue;
        }
        let name = name_dir.join(&file_name);
        let abs = child.path();
        let file_type = child
            .file_type()
            .with_context(|| format!("failed to read file type of {}", abs.display()))?;
        if file_type.is_dir() {
            out.push(TreeEntry::Dir {
                abs: abs.clone(),
                name: name.clone(),
            });
            walk_tree(&abs, &name, &rel, excludes, out)?;
        } else {
            // Regular files and symlinks; links are stored, not followed.
            out.push(TreeEntry::File { abs, name });
        }
    }
    Ok(())
}

fn is_excluded(rel: &Path, excludes: &[Pattern]) -> bool {
    excludes.iter().any(|pattern| {
        pattern.matches_path(rel)
            || rel
                .file_name()
                .map(|n| pattern.matches(&n.to_string_lossy()))
                .unwrap_or(false)
    })
}

fn write_archive(artifact: &Path, entries: &[TreeEntry], method: CompressMethod) -> Result<()> {
    let file = File::create(artifact)
        .with_context(|| format!("failed to create archive {}", artifact.display()))?;

    match method {
        CompressMethod::Gzip => {
            let encoder = GzEncoder::new(file, Compression::default());
            let mut builder = tar::Builder::new(encoder);
            builder.follow_symlinks(false);
            append_entries(&mut builder, entries)?;
            let encoder = builder
                .into_inner()
                .context("failed to finalize tar stream")?;
            encoder.finish().context("failed to finish gzip stream")?;
        }
        CompressMethod::None => {
            let mut builder = tar::Builder::new(file);
            builder.follow_symlinks(false);
            append_entries(&mut builder, entries)?;
            builder
                .into_inner()
                .context("failed to finalize tar stream")?;
        }
    }
    Ok(())
}

fn append_entries<W: Write>(builder: &mut tar::Builder<W>, entries: &[TreeEntry]) -> Result<()> {
    for entry in entries {
        match entry {
            TreeEntry::Dir { abs, name } => builder
                .append_dir(name, abs)
                .with_context(|| format!("failed to add directory {}", abs.display()))?,
            TreeEntry::File { abs, name } => builder
                .append_path_with_name(abs, name)
                .with_context(|| format!("failed to add file {}", abs.display()))?,
        }
    }
    Ok(())
}
