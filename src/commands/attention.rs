use clap::{Args, Subcommand};
use fieldsync_core::{RecordType, SyncEngine};
use uuid::Uuid;

use super::{CommandError, OutputFormat};

#[derive(Args)]
pub struct AttentionCommand {
    #[command(subcommand)]
    pub command: AttentionSubcommand,
}

#[derive(Subcommand)]
pub enum AttentionSubcommand {
    /// List queued records that ran out of sync attempts
    List {
        /// Only show this record type
        #[arg(long = "type", value_name = "TYPE")]
        record_type: Option<RecordType>,

        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Give a stuck record a fresh set of sync attempts
    Retry {
        /// Queue entry id
        id: Uuid,
    },

    /// Drop a queued record without sending it
    Discard {
        /// Queue entry id
        id: Uuid,
    },
}

impl AttentionCommand {
    pub async fn run(&self, engine: &SyncEngine) -> Result<(), CommandError> {
        match &self.command {
            AttentionSubcommand::List {
                record_type,
                format,
            } => {
                let entries = engine.needs_attention(*record_type).await?;

                match format {
                    OutputFormat::Json => {
                        let rows: Vec<serde_json::Value> = entries
                            .iter()
                            .map(|e| {
                                serde_json::json!({
                                    "id": e.id,
                                    "recordType": e.record_type,
                                    "retryCount": e.retry_count,
                                    "lastError": e.last_error,
                                    "createdAt": e.created_at,
                                    "payload": e.payload,
                                })
                            })
                            .collect();
                        println!("{}", serde_json::to_string_pretty(&rows)?);
                    }
                    OutputFormat::Text => {
                        if entries.is_empty() {
                            println!("Nothing needs attention.");
                            return Ok(());
                        }
                        for entry in &entries {
                            println!("{}  {}", entry.id, entry.payload);
                            println!(
                                "    {} attempts, last error: {}",
                                entry.retry_count,
                                entry.last_error.as_deref().unwrap_or("-")
                            );
                        }
                    }
                }
                Ok(())
            }

            AttentionSubcommand::Retry { id } => {
                let entry = engine.retry_entry(*id).await?;
                println!("Requeued {} record {}", entry.record_type, entry.id);
                Ok(())
            }

            AttentionSubcommand::Discard { id } => {
                engine.discard_entry(*id).await?;
                println!("Discarded queued record {}", id);
                Ok(())
            }
        }
    }
}
