use anyhow::Result;
use clap::Parser;
use tracing::error;

use snapvault::backup;
use snapvault::cli::{Cli, Command};
use snapvault::config::Config;
use snapvault::logging;
use snapvault::verify;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let level = cli
        .global
        .log_level
        .clone()
        .or_else(|| std::env::var("LOG_LEVEL").ok())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| "info".to_string());

    let guard = match logging::init(&level, cli.global.log_dir.as_deref()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("failed to initialize logging: {:#}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = run(cli).await {
        error!("backup failed: {:#}", e);
        drop(guard);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = Config::load(cli.global.config.as_deref()).await?;
    config.merge_flags(&cli.global)?;

    match cli.command {
        Command::Status { file } => {
            let status = verify::check_snapshot_status(&file).await?;
            println!("{}", serde_json::to_string_pretty(&status)?);
            Ok(())
        }
        Command::Snapshot { path } => backup::run_snapshot_backup(&config, &path).await,
        Command::Dir { path, exclude } => {
            config.merge_dir_flags(path.as_deref(), exclude.as_deref());
            backup::run_dir_backup(&config).await
        }
    }
}
