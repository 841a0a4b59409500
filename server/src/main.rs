mod config;
mod dispatch;
mod setup;
mod stdio;
mod telemetry;

use anyhow::{Context, Result};
use clap::Parser;
use config::Config;
use setup::{ensure_database_directory_from_config, initialize_app};
use stdio::StdioServer;
use telemetry::{init_telemetry, log_config_validation, log_startup_info};
use tracing::{error, info};
use std::path::Path;

#[derive(Parser)]
#[command(name = "orchestrator-server")]
#[command(about = "Multi-project AI-agent orchestration server")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Project name for database scoping (creates orchestrator.PROJECT_NAME.sqlite)
    #[arg(long, env = "PROJECT_NAME")]
    project: Option<String>,

    /// Project root directory (database is scoped under its .orchestrator/ subdirectory)
    #[arg(long, env = "PROJECT_ROOT")]
    project_root: Option<String>,

    /// Configuration file path
    #[arg(short, long, env = "CONFIG_FILE")]
    config: Option<String>,

    /// Database URL override (overrides --project scoping)
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Listen address override, recorded for parity with the config file but unused by the stdio transport
    #[arg(long, env = "LISTEN_ADDR")]
    listen_addr: Option<String>,

    /// Log level override
    #[arg(long, env = "LOG_LEVEL")]
    log_level: Option<String>,
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(config_file) => {
            info!("loading configuration from file: {}", config_file);
            Config::from_file(config_file)?
        }
        None => {
            info!("loading configuration from environment");
            Config::from_env()?
        }
    };

    if let Some(ref database_url) = cli.database_url {
        info!("overriding database URL from CLI");
        config.database.url = Some(database_url.clone());
    } else if let Some(ref project_name) = cli.project {
        if let Some(ref project_root) = cli.project_root {
            let db_path = Path::new(project_root)
                .join(".orchestrator")
                .join(format!("orchestrator.{}.sqlite", project_name));
            let db_url = format!("sqlite://{}", db_path.display());
            info!("using project-scoped database: {}", db_url);
            config.database.url = Some(db_url);
        }
    }

    if let Some(ref listen_addr) = cli.listen_addr {
        config.server.listen_addr = listen_addr.clone();
    }

    if let Some(ref log_level) = cli.log_level {
        info!("overriding log level from CLI");
        config.logging.level = log_level.clone();
    }

    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let cli = Cli::parse();
    let config = load_config(&cli).context("failed to load configuration")?;

    init_telemetry(&config.logging).context("failed to initialize telemetry")?;
    log_config_validation(&config);

    if let Err(e) = config.validate() {
        error!(error = %e, "configuration validation failed");
        std::process::exit(1);
    }

    log_startup_info(&config);

    ensure_database_directory_from_config(&config).context("failed to create database directory")?;

    info!("starting orchestrator-server");
    if let Some(ref project_name) = cli.project {
        info!(project = %project_name, "scoped to project");
    }

    let facade = initialize_app(&config).await.context("failed to initialize application")?;
    let server = StdioServer::new(facade);

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to register SIGTERM handler");
            let mut sigint = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt())
                .expect("failed to register SIGINT handler");

            tokio::select! {
                _ = sigterm.recv() => info!("received SIGTERM, initiating graceful shutdown"),
                _ = sigint.recv() => info!("received SIGINT, initiating graceful shutdown"),
            }
        }

        #[cfg(windows)]
        {
            tokio::signal::ctrl_c().await.expect("failed to listen for ctrl+c");
            info!("received Ctrl+C, initiating graceful shutdown");
        }

        let _ = shutdown_tx.send(());
    });

    tokio::select! {
        result = server.serve() => {
            match result {
                Ok(_) => {
                    info!("orchestrator-server shut down cleanly");
                    Ok(())
                }
                Err(e) => {
                    error!(error = %e, "orchestrator-server error");
                    std::process::exit(3);
                }
            }
        }
        _ = shutdown_rx => {
            info!("shutdown signal received, stopping server");
            Ok(())
        }
    }
}
