use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tokio_util::sync::CancellationToken;

use pr_reviewer_service::{config, logging};

/// Pull request reviewer assignment service
#[derive(Parser, Debug)]
#[command(name = "pr-reviewer-service")]
#[command(about = "Assigns and rebalances pull request reviewers", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(long, env = "PR_REVIEWER_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on (overrides the configuration)
    #[arg(long)]
    port: Option<u16>,

    /// Default log level (RUST_LOG still takes precedence)
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match config::load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }

    logging::init(&config.logging.level);

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::info!("[main] Ctrl-C received, shutting down");
        }
        shutdown.cancel();
    });

    match pr_reviewer_service::run(config, cancel).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("[main] {}", e);
            ExitCode::FAILURE
        }
    }
}
