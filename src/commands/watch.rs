use clap::Args;
use fieldsync_core::{SyncEngine, SyncOutcome, SyncTrigger};
use std::time::Duration;

use super::sync_cmd::print_report;
use super::CommandError;
use crate::config::Config;

/// Stay running and sync whenever the server becomes reachable
#[derive(Args)]
pub struct WatchCommand {
    /// Seconds between background syncs (overrides sync.interval_secs)
    #[arg(long)]
    interval: Option<u64>,

    /// Seconds between server reachability checks
    #[arg(long, default_value = "15")]
    probe: u64,
}

impl WatchCommand {
    pub async fn run(&self, engine: &SyncEngine, config: &Config) -> Result<(), CommandError> {
        let Some(server_url) = config.sync.server_url.clone() else {
            return Err(CommandError::Invalid(
                "Sync is not configured. Set sync.server_url or FIELDSYNC_SERVER_URL.".to_string(),
            ));
        };

        let interval = self
            .interval
            .or(config.sync.interval_secs)
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);

        println!("Watching {} (Ctrl-C to stop)", server_url);

        if engine.connectivity().is_online() {
            if let SyncOutcome::Completed(report) =
                engine.run_sync_with(SyncTrigger::Manual).await?
            {
                print_report(&report);
            }
        }

        let probe = engine
            .connectivity()
            .spawn_probe(server_url, Duration::from_secs(self.probe.max(1)));
        let status = engine.connectivity().on_change(|online| {
            println!("Server is {}", if online { "reachable" } else { "unreachable" });
        });
        let auto_sync = engine.orchestrator().spawn_auto_sync(interval);

        tokio::signal::ctrl_c().await?;

        auto_sync.abort();
        status.abort();
        probe.abort();
        println!("Stopped.");
        Ok(())
    }
}
