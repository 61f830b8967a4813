use clap::Args;
use fieldsync_core::{RecordType, SyncEngine, ValidationStatus};
use serde_json::json;

use super::CommandError;

/// Set the validation status of a synced record
#[derive(Args)]
pub struct ValidateCommand {
    /// Record type (pregnancy, birth)
    record_type: RecordType,

    /// Remote record id
    remote_id: String,

    /// New status (pending, validated, rejected)
    #[arg(long, default_value = "validated")]
    status: ValidationStatus,
}

impl ValidateCommand {
    pub async fn run(&self, engine: &SyncEngine) -> Result<(), CommandError> {
        let remote_id = self.remote_id.trim();
        if remote_id.is_empty() || remote_id.starts_with("local:") {
            return Err(CommandError::Invalid(
                "Only records already on the server can be validated; run `fieldsync sync` first"
                    .to_string(),
            ));
        }

        engine
            .update_remote_fields(
                self.record_type,
                remote_id,
                json!({ "validation": self.status }),
            )
            .await?;

        println!("Marked {} {} as {}", self.record_type, remote_id, self.status);
        Ok(())
    }
}
