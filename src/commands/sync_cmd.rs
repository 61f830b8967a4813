//! Sync CLI commands for reconciling with the server.

use clap::{Args, Subcommand};
use fieldsync_core::{SyncEngine, SyncOutcome, SyncReport, SyncStatus};

use super::{CommandError, OutputFormat};
use crate::config::Config;

/// Sync with remote server
#[derive(Args)]
pub struct SyncCommand {
    #[command(subcommand)]
    command: Option<SyncSubcommand>,

    /// Output format
    #[arg(long, short, value_enum, default_value = "text", global = true)]
    format: OutputFormat,
}

#[derive(Subcommand)]
enum SyncSubcommand {
    /// Show queue counts, last sync times and server status
    Status,
}

impl SyncCommand {
    pub async fn run(&self, engine: &SyncEngine, config: &Config) -> Result<(), CommandError> {
        match &self.command {
            None => self.sync(engine, config).await,
            Some(SyncSubcommand::Status) => self.status(engine, config).await,
        }
    }

    async fn sync(&self, engine: &SyncEngine, config: &Config) -> Result<(), CommandError> {
        if !config.sync.is_configured() {
            return Err(CommandError::Invalid(
                "Sync is not configured. Set sync.server_url or FIELDSYNC_SERVER_URL.".to_string(),
            ));
        }

        let outcome = engine.run_sync().await?;
        match self.format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&outcome)?),
            OutputFormat::Text => match &outcome {
                SyncOutcome::AlreadyRunning => println!("A sync is already running."),
                SyncOutcome::Completed(report) => print_report(report),
            },
        }
        Ok(())
    }

    async fn status(&self, engine: &SyncEngine, config: &Config) -> Result<(), CommandError> {
        let status = engine.status().await?;

        match self.format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&status)?),
            OutputFormat::Text => print_status(&status, config),
        }
        Ok(())
    }
}

pub fn print_report(report: &SyncReport) {
    if report.push.offline {
        println!("Offline: nothing was sent. Records stay queued until the server is reachable.");
        return;
    }

    println!("Push:");
    for pushed in &report.push.pushed {
        println!("  ✓ {} {}", pushed.record_type, pushed.remote_id);
    }
    for failed in &report.push.failed {
        let marker = if failed.needs_attention { "needs attention" } else { "will retry" };
        println!(
            "  ✗ {} local:{} ({}, attempt {}): {}",
            failed.record_type, failed.queue_id, marker, failed.retry_count, failed.error
        );
    }
    if report.push.pushed.is_empty() && report.push.failed.is_empty() {
        println!("  nothing to send");
    }

    println!("Pull:");
    for pull in &report.pulls {
        match &pull.error {
            Some(error) => println!("  ✗ {}: {}", pull.record_type.collection(), error),
            None => println!(
                "  ✓ {}: {} fetched, {} removed",
                pull.record_type.collection(),
                pull.fetched,
                pull.pruned
            ),
        }
    }

    println!();
    if report.has_failures() {
        println!("Sync finished with errors.");
    } else {
        println!("Sync complete.");
    }
}

fn print_status(status: &SyncStatus, config: &Config) {
    println!("Sync Status");
    println!("===========");
    println!();

    match &config.sync.server_url {
        Some(url) => println!("Server:     {}", url),
        None => println!("Server:     not configured"),
    }
    println!(
        "Connection: {}",
        if status.online { "online" } else { "offline" }
    );
    if status.sync_in_progress {
        println!("A sync is currently running.");
    }
    println!();

    println!("Queued records:");
    for (record_type, count) in &status.pending {
        println!("  {:<12} {}", record_type.collection(), count);
    }
    if status.needs_attention > 0 {
        println!(
            "  {} record(s) need attention, see `fieldsync attention list`",
            status.needs_attention
        );
    }
    println!();

    match status.last_push_at {
        Some(at) => println!("Last push:  {}", at.format("%Y-%m-%d %H:%M:%S UTC")),
        None => println!("Last push:  never"),
    }
    for (record_type, at) in &status.last_pull_at {
        match at {
            Some(at) => println!(
                "Last pull ({}): {}",
                record_type.collection(),
                at.format("%Y-%m-%d %H:%M:%S UTC")
            ),
            None => println!("Last pull ({}): never", record_type.collection()),
        }
    }
}
