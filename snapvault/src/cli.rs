use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "snapvault",
    version,
    about = "Back up directories and nexkv snapshots to object storage"
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Args)]
pub struct GlobalArgs {
    /// Log level: debug, info, warn or error (LOG_LEVEL env var as fallback)
    #[arg(long, short = 'l', global = true)]
    pub log_level: Option<String>,

    /// Also write logs to a timestamped file in this directory
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,

    /// Path to a TOML configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Object-storage gateway endpoint (SNAPVAULT_ENDPOINT)
    #[arg(long, short = 'e', global = true)]
    pub endpoint: Option<String>,

    /// Gateway access key (SNAPVAULT_ACCESS_KEY)
    #[arg(long, short = 'a', global = true)]
    pub access_key: Option<String>,

    /// Gateway secret key (SNAPVAULT_SECRET_KEY)
    #[arg(long, short = 's', global = true)]
    pub secret_key: Option<String>,

    /// Gateway bucket name (SNAPVAULT_BUCKET)
    #[arg(long, short = 'b', global = true)]
    pub bucket: Option<String>,

    /// Object name prefix; defaults to a timestamped backup- name
    #[arg(long, global = true)]
    pub prefix: Option<String>,

    /// Archive compression: gzip or none (COMPRESS_METHOD)
    #[arg(long, short = 'c', global = true)]
    pub compress: Option<String>,

    /// Keep local artifacts after upload instead of deleting them
    #[arg(long, global = true)]
    pub keep_backup_files: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the verified status of a snapshot file as JSON
    Status {
        /// Path to the snapshot file
        file: PathBuf,
    },

    /// Verify a snapshot file, then archive and upload it
    Snapshot {
        /// Path to the snapshot file
        #[arg(long, short = 'p')]
        path: PathBuf,
    },

    /// Archive directories and upload them
    Dir {
        /// Directories to back up, comma separated (DIRS_TO_BACKUP)
        #[arg(long, short = 'p')]
        path: Option<String>,

        /// Exclude patterns, comma separated, glob syntax (EXCLUDE_PATTERNS)
        #[arg(long, short = 'x')]
        exclude: Option<String>,
    },
}
