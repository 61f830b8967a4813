use clap::{Parser, Subcommand};
use fieldsync_core::remote::DEFAULT_TIMEOUT;
use fieldsync_core::{
    check_server, ConnectivityMonitor, HttpRemoteStore, MemoryRemoteStore, RemoteStore,
    SyncEngine, SyncOutcome,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;

use commands::{
    AttentionCommand, ConfigCommand, DeleteCommand, ListCommand, RecordCommand, SyncCommand,
    ValidateCommand, WatchCommand,
};
use config::Config;

#[derive(Parser)]
#[command(name = "fieldsync")]
#[command(version)]
#[command(about = "Offline-first capture and sync of pregnancy and birth records", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Capture a new record (stored locally until synced)
    Record(RecordCommand),

    /// List records, merging queued and synced copies
    List(ListCommand),

    /// Sync with remote server
    Sync(SyncCommand),

    /// Inspect, retry or discard records that failed to sync
    Attention(AttentionCommand),

    /// Delete a record locally and, when reachable, on the server
    Delete(DeleteCommand),

    /// Set the validation status of a synced record
    Validate(ValidateCommand),

    /// Keep running and sync whenever the server is reachable
    Watch(WatchCommand),

    /// Manage configuration
    Config(ConfigCommand),
}

#[tokio::main]
async fn main() {
    init_tracing();

    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fieldsync=warn,fieldsync_core=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = Config::load(cli.config)?;

    let command = match cli.command {
        Some(Commands::Config(cmd)) => return cmd.run(&config),
        Some(command) => command,
        None => {
            println!("Use --help to see available commands");
            return Ok(());
        }
    };

    let engine = open_engine(&config).await?;
    let result = execute_command(&command, &engine, &config).await;

    // Auto-sync AFTER write commands (only if command succeeded)
    if result.is_ok() && is_write_command(&command) {
        try_auto_sync(&engine, &config).await;
    }

    engine.close().await;
    result
}

async fn execute_command(
    command: &Commands,
    engine: &SyncEngine,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Commands::Record(cmd) => cmd.run(engine, config).await?,
        Commands::List(cmd) => cmd.run(engine).await?,
        Commands::Sync(cmd) => cmd.run(engine, config).await?,
        Commands::Attention(cmd) => cmd.run(engine).await?,
        Commands::Delete(cmd) => cmd.run(engine).await?,
        Commands::Validate(cmd) => cmd.run(engine).await?,
        Commands::Watch(cmd) => cmd.run(engine, config).await?,
        Commands::Config(cmd) => cmd.run(config)?,
    }

    Ok(())
}

/// Opens the local store. With a server configured the device starts online
/// only if the server answers its health check; without one it stays
/// offline and records accumulate in the queue.
async fn open_engine(config: &Config) -> Result<SyncEngine, Box<dyn std::error::Error>> {
    let connectivity = ConnectivityMonitor::new(false);

    let remote: Arc<dyn RemoteStore> = match &config.sync.server_url {
        Some(url) => {
            let store = HttpRemoteStore::new(url.as_str(), config.sync.api_key.clone(), DEFAULT_TIMEOUT)?;
            let online = check_server(store.base_url()).await;
            debug!(server = %store.base_url(), online, "probed server");
            connectivity.set_online(online);
            Arc::new(store)
        }
        None => Arc::new(MemoryRemoteStore::new()),
    };

    let engine = SyncEngine::open(
        &config.database_path,
        remote,
        connectivity,
        config.sync.settings(),
    )
    .await?;

    Ok(engine)
}

/// Returns true if the command is a write operation that should sync after execution.
fn is_write_command(cmd: &Commands) -> bool {
    matches!(cmd, Commands::Record(_) | Commands::Attention(_))
}

async fn try_auto_sync(engine: &SyncEngine, config: &Config) {
    if !config.sync.auto_sync || !engine.connectivity().is_online() {
        return;
    }

    match engine.run_sync().await {
        Ok(SyncOutcome::Completed(report)) if report.has_failures() => {
            eprintln!("Auto-sync finished with errors; run `fieldsync sync status` for details.")
        }
        Ok(_) => {}
        Err(e) => eprintln!("Auto-sync failed: {}", e),
    }
}
