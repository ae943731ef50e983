mod config;
mod logging;
mod signals;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use group_sync::GroupSyncModule;
use group_sync::group_sync_sdk::GroupSyncClient;
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::{AppConfig, DatabaseConfig};

/// Group Sync Server - directory-backed group membership synchronization
#[derive(Parser)]
#[command(name = "group-sync-server")]
#[command(about = "Group Sync Server - directory-backed group membership synchronization")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print effective configuration (YAML) and exit
    #[arg(long)]
    print_config: bool,

    /// Log verbosity level (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the periodic synchronization until a shutdown signal arrives
    Run,
    /// Synchronize one tenant once and print the run summary as JSON
    SyncOnce {
        /// Tenant identifier
        tenant: Uuid,

        /// Refuse to run if the previous run finished within the tenant threshold
        #[arg(long)]
        require_threshold: bool,
    },
    /// Validate configuration and exit
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(path) = &cli.config
        && !path.is_file()
    {
        anyhow::bail!("config file does not exist: {}", path.display());
    }

    // defaults -> YAML (if provided) -> env (APP__*) -> CLI overrides
    let mut config = AppConfig::load(cli.config.as_deref())?;
    config.apply_cli_overrides(cli.verbose);

    logging::init(&config.logging)?;

    if cli.print_config {
        println!("Effective configuration:\n{}", config.to_yaml()?);
        return Ok(());
    }

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run_server(config).await,
        Commands::SyncOnce {
            tenant,
            require_threshold,
        } => sync_once(config, tenant, require_threshold).await,
        Commands::Check => check_config(&config),
    }
}

fn check_config(config: &AppConfig) -> Result<()> {
    tracing::info!("checking configuration");
    config.validate()?;
    println!("Configuration is valid");
    println!("{}", config.to_yaml()?);
    Ok(())
}

async fn connect(database: &DatabaseConfig) -> Result<DatabaseConnection> {
    let mut options = ConnectOptions::new(database.dsn.clone());
    options
        .max_connections(database.max_connections)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(10))
        .sqlx_logging(false);
    Database::connect(options)
        .await
        .with_context(|| format!("failed to connect to {}", database.dsn))
}

async fn run_server(config: AppConfig) -> Result<()> {
    config.validate()?;
    let db = connect(&config.database).await?;
    let module = GroupSyncModule::init(&db, config.group_sync).await?;

    let cancel = CancellationToken::new();
    let scheduler = module.spawn_scheduler(cancel.clone());
    if scheduler.is_none() {
        tracing::warn!("scheduler disabled or no tenants configured, waiting for shutdown");
    }
    tracing::info!("group-sync server started");

    signals::wait_for_shutdown().await?;
    cancel.cancel();
    if let Some(handle) = scheduler {
        handle.await.context("scheduler task panicked")?;
    }
    db.close().await?;
    tracing::info!("group-sync server stopped");
    Ok(())
}

async fn sync_once(config: AppConfig, tenant: Uuid, require_threshold: bool) -> Result<()> {
    config.validate()?;
    let db = connect(&config.database).await?;
    let module = GroupSyncModule::init(&db, config.group_sync).await?;

    let summary = module
        .client()
        .run_tenant_sync(tenant, require_threshold)
        .await
        .with_context(|| format!("tenant {tenant} sync did not run"))?;

    println!("{}", serde_json::to_string_pretty(&summary)?);
    db.close().await?;
    if summary.is_partial() {
        anyhow::bail!("tenant {tenant} sync finished with failures");
    }
    Ok(())
}
