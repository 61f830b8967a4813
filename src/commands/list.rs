use clap::Args;
use fieldsync_core::{LogicalRecord, Origin, RecordType, SyncEngine};

use super::{CommandError, OutputFormat};

#[derive(Args)]
pub struct ListCommand {
    /// Record type (pregnancy, birth)
    record_type: RecordType,

    /// Output format
    #[arg(long, short, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Only show records not yet accepted by the server
    #[arg(long)]
    local: bool,
}

impl ListCommand {
    pub async fn run(&self, engine: &SyncEngine) -> Result<(), CommandError> {
        let mut records = engine.merged_view(self.record_type).await?;
        if self.local {
            records.retain(|r| r.origin == Origin::Local);
        }

        match self.format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(&records)?);
            }
            OutputFormat::Text => {
                if records.is_empty() {
                    println!("No {} records found.", self.record_type);
                    return Ok(());
                }
                for record in &records {
                    println!("{}", format_record(record));
                }
            }
        }

        Ok(())
    }
}

fn format_record(record: &LogicalRecord) -> String {
    let mut line = format!(
        "{}  {}  {}",
        record.created_at.format("%Y-%m-%d %H:%M"),
        record.identity,
        record.payload
    );

    if let Some(status) = record.queue_status {
        line.push_str(&format!("  [{}", status));
        if record.retry_count > 0 {
            line.push_str(&format!(", {} attempts", record.retry_count));
        }
        line.push(']');
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc};
    use fieldsync_core::{BirthRecord, Identity, QueueStatus};

    fn record(origin: Origin, queue_status: Option<QueueStatus>, retry_count: u32) -> LogicalRecord {
        let dob = NaiveDate::from_ymd_opt(2025, 3, 14).unwrap();
        LogicalRecord {
            identity: Identity::Remote("doc1".to_string()),
            origin,
            record_type: RecordType::Birth,
            payload: BirthRecord::new("Amina", dob, "agent-7").into(),
            created_at: Utc.with_ymd_and_hms(2025, 3, 15, 8, 30, 0).unwrap(),
            queue_status,
            retry_count,
            last_error: None,
        }
    }

    #[test]
    fn test_format_remote_record() {
        let line = format_record(&record(Origin::Remote, None, 0));
        assert!(line.starts_with("2025-03-15 08:30  doc1  Birth:"));
        assert!(!line.contains('['));
    }

    #[test]
    fn test_format_failed_record_shows_attempts() {
        let line = format_record(&record(Origin::Local, Some(QueueStatus::Failed), 2));
        assert!(line.ends_with("[failed, 2 attempts]"));
    }
}
