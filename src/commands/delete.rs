use clap::Args;
use fieldsync_core::{RecordType, SyncEngine};
use std::io::{self, Write};

use super::{parse_identity, CommandError};

#[derive(Args)]
pub struct DeleteCommand {
    /// Record type (pregnancy, birth)
    record_type: RecordType,

    /// Record id as shown by `list` (remote id or local:<uuid>)
    identifier: String,

    /// Skip confirmation prompt
    #[arg(long, short)]
    force: bool,
}

impl DeleteCommand {
    pub async fn run(&self, engine: &SyncEngine) -> Result<(), CommandError> {
        let identity = parse_identity(&self.identifier)?;

        if !self.force {
            print!("Delete {} record '{}'? [y/N] ", self.record_type, identity);
            io::stdout().flush()?;

            let mut input = String::new();
            io::stdin().read_line(&mut input)?;

            if !input.trim().eq_ignore_ascii_case("y") {
                println!("Deletion cancelled.");
                return Ok(());
            }
        }

        let report = engine
            .delete_logical_record(self.record_type, &identity)
            .await?;

        if report.removed_from_queue == 0 && !report.removed_from_cache && !report.remote_deleted {
            println!("No local copy of {} found.", identity);
            return Ok(());
        }

        println!("Deleted {} record {}", self.record_type, identity);
        if identity.is_remote() && !report.remote_deleted {
            println!("  Server copy was not removed (offline or unreachable); it will reappear on the next sync.");
        }
        Ok(())
    }
}
