mod attention;
mod config_cmd;
mod delete;
mod list;
mod record;
mod sync_cmd;
mod validate;
mod watch;

pub use attention::AttentionCommand;
pub use config_cmd::ConfigCommand;
pub use delete::DeleteCommand;
pub use list::ListCommand;
pub use record::RecordCommand;
pub use sync_cmd::SyncCommand;
pub use validate::ValidateCommand;
pub use watch::WatchCommand;

use clap::ValueEnum;
use fieldsync_core::{Identity, SyncError};
use uuid::Uuid;

#[derive(Clone, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Parses a record identifier as printed by `list`: `local:<uuid>` for
/// records still in the queue, anything else is a remote id.
pub fn parse_identity(raw: &str) -> Result<Identity, CommandError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(CommandError::Invalid("Record identifier cannot be empty".to_string()));
    }

    match raw.strip_prefix("local:") {
        Some(id) => Uuid::parse_str(id)
            .map(Identity::Local)
            .map_err(|_| CommandError::Invalid(format!("Invalid local record id: {}", id))),
        None => Ok(Identity::Remote(raw.to_string())),
    }
}

/// Errors from record and sync commands
#[derive(Debug)]
pub enum CommandError {
    Engine(SyncError),
    Invalid(String),
    Io(std::io::Error),
    Json(serde_json::Error),
}

impl std::fmt::Display for CommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommandError::Engine(e) => write!(f, "{}", e),
            CommandError::Invalid(msg) => write!(f, "{}", msg),
            CommandError::Io(e) => write!(f, "I/O error: {}", e),
            CommandError::Json(e) => write!(f, "JSON error: {}", e),
        }
    }
}

impl std::error::Error for CommandError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CommandError::Engine(e) => Some(e),
            CommandError::Invalid(_) => None,
            CommandError::Io(e) => Some(e),
            CommandError::Json(e) => Some(e),
        }
    }
}

impl From<SyncError> for CommandError {
    fn from(e: SyncError) -> Self {
        CommandError::Engine(e)
    }
}

impl From<std::io::Error> for CommandError {
    fn from(e: std::io::Error) -> Self {
        CommandError::Io(e)
    }
}

impl From<serde_json::Error> for CommandError {
    fn from(e: serde_json::Error) -> Self {
        CommandError::Json(e)
    }
}
