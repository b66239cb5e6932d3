//! Layered configuration: struct defaults, then an optional TOML file,
//! then environment variables, then command-line flags on top.

use std::path::Path;

use anyhow::{anyhow, bail, Result};
use serde::Deserialize;

use crate::archive::CompressMethod;
use crate::cli::GlobalArgs;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub endpoint: String,
    pub access_key: String,
    pub secret_key: String,
    pub bucket: String,
    pub object_prefix: String,
    pub compress_method: CompressMethod,
    pub keep_backup_files: bool,
    pub dir_paths: Vec<String>,
    pub exclude_patterns: Vec<String>,
}

impl Config {
    /// Load configuration, layering environment variables over the
    /// optional TOML file. A config path given explicitly must exist.
    pub async fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => {
                let content = tokio::fs::read_to_string(p)
                    .await
                    .map_err(|e| anyhow!("failed to read config {}: {}", p.display(), e))?;
                toml::from_str(&content)
                    .map_err(|e| anyhow!("failed to parse config {}: {}", p.display(), e))?
            }
            None => Config::default(),
        };
        config.apply_env()?;
        Ok(config)
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(v) = env_value("SNAPVAULT_ENDPOINT") {
            self.endpoint = v;
        }
        if let Some(v) = env_value("SNAPVAULT_ACCESS_KEY") {
            self.access_key = v;
        }
        if let Some(v) = env_value("SNAPVAULT_SECRET_KEY") {
            self.secret_key = v;
        }
        if let Some(v) = env_value("SNAPVAULT_BUCKET") {
            self.bucket = v;
        }
        if let Some(v) = env_value("SNAPVAULT_OBJECT_PREFIX") {
            self.object_prefix = v;
        }
        if let Some(v) = env_value("DIRS_TO_BACKUP") {
            self.dir_paths = split_list(&v);
        }
        if let Some(v) = env_value("EXCLUDE_PATTERNS") {
            self.exclude_patterns = split_list(&v);
        }
        if let Some(v) = env_value("COMPRESS_METHOD") {
            self.compress_method = v.parse()?;
        }
        if let Some(v) = env_value("KEEP_BACKUP_FILES") {
            self.keep_backup_files = matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes");
        }
        Ok(())
    }

    /// Command-line flags win over every other layer.
    pub fn merge_flags(&mut self, flags: &GlobalArgs) -> Result<()> {
        if let Some(v) = non_empty(&flags.endpoint) {
            self.endpoint = v;
        }
        if let Some(v) = non_empty(&flags.access_key) {
            self.access_key = v;
        }
        if let Some(v) = non_empty(&flags.secret_key) {
            self.secret_key = v;
        }
        if let Some(v) = non_empty(&flags.bucket) {
            self.bucket = v;
        }
        if let Some(v) = non_empty(&flags.prefix) {
            self.object_prefix = v;
        }
        if let Some(v) = non_empty(&flags.compress) {
            self.compress_method = v.parse()?;
        }
        if flags.keep_backup_files {
            self.keep_backup_files = true;
        }
        Ok(())
    }

    /// Merge the dir subcommand's own flags.
    pub fn merge_dir_flags(&mut self, path: Option<&str>, exclude: Option<&str>) {
        if let Some(p) = path.map(str::trim).filter(|p| !p.is_empty()) {
            self.dir_paths = split_list(p);
        }
        if let Some(x) = exclude.map(str::trim).filter(|x| !x.is_empty()) {
            self.exclude_patterns = split_list(x);
        }
    }

    /// Uploading commands need the full gateway coordinates.
    pub fn validate_upload(&self) -> Result<()> {
        for (field, value) in [
            ("endpoint", &self.endpoint),
            ("access_key", &self.access_key),
            ("secret_key", &self.secret_key),
            ("bucket", &self.bucket),
        ] {
            if value.is_empty() {
                bail!("missing required configuration: {}", field);
            }
        }
        Ok(())
    }

    pub fn validate_dirs(&self) -> Result<()> {
        if self.dir_paths.is_empty() {
            bail!("no backup directories configured (use --path or DIRS_TO_BACKUP)");
        }
        Ok(())
    }
}

/// Split a comma-separated list, dropping empty segments.
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
