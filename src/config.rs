use fieldsync_core::{SyncSettings, DEFAULT_BATCH_SIZE, DEFAULT_MAX_RETRIES};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Environment variables consulted after the config file, highest priority.
const ENV_DATABASE_PATH: &str = "FIELDSYNC_DATABASE_PATH";
const ENV_RECORDED_BY: &str = "FIELDSYNC_RECORDED_BY";
const ENV_SERVER_URL: &str = "FIELDSYNC_SERVER_URL";
const ENV_API_KEY: &str = "FIELDSYNC_API_KEY";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

/// The `sync:` section of the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    pub server_url: Option<String>,
    /// Sent as a bearer token
    pub api_key: Option<String>,
    /// Sync after every recorded write
    #[serde(default)]
    pub auto_sync: bool,
    /// Seconds between background syncs in `watch`; unset syncs on reconnect only
    #[serde(default)]
    pub interval_secs: Option<u64>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Age in seconds after which an unfinished push is presumed dead
    #[serde(default)]
    pub claim_timeout_secs: Option<u64>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            server_url: None,
            api_key: None,
            auto_sync: false,
            interval_secs: None,
            batch_size: DEFAULT_BATCH_SIZE,
            max_retries: DEFAULT_MAX_RETRIES,
            claim_timeout_secs: None,
        }
    }
}

impl SyncConfig {
    pub fn is_configured(&self) -> bool {
        self.server_url.is_some()
    }

    pub fn settings(&self) -> SyncSettings {
        let mut settings = SyncSettings::default()
            .with_batch_size(self.batch_size)
            .with_max_retries(self.max_retries);
        if let Some(secs) = self.interval_secs.filter(|s| *s > 0) {
            settings = settings.with_auto_sync_interval(Duration::from_secs(secs));
        }
        if let Some(secs) = self.claim_timeout_secs {
            settings = settings.with_claim_timeout(Duration::from_secs(secs));
        }
        settings
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ConfigFile {
    database_path: Option<PathBuf>,
    recorded_by: Option<String>,
    sync: Option<SyncConfig>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Config {
    pub database_path: PathBuf,
    /// Stamped on every captured record
    pub recorded_by: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_file: Option<PathBuf>,
    pub sync: SyncConfig,
    /// Environment variables that overrode a file or default value
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub env_overrides: Vec<&'static str>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: default_data_dir().join("fieldsync.db"),
            recorded_by: "unknown".to_string(),
            config_file: None,
            sync: SyncConfig::default(),
            env_overrides: Vec::new(),
        }
    }
}

impl Config {
    /// Defaults, then the config file if it exists, then the environment.
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let path = config_path.unwrap_or_else(Self::default_config_path);
        let mut config = if path.exists() {
            Self::from_file(&path)?
        } else {
            Self::default()
        };

        config.apply_env(|name| std::env::var(name).ok());
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let file: ConfigFile =
            serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        let mut config = Self {
            config_file: Some(path.to_path_buf()),
            ..Self::default()
        };
        if let Some(db_path) = file.database_path {
            // Relative to the directory holding the config file.
            config.database_path = match path.parent() {
                Some(dir) if db_path.is_relative() => dir.join(db_path),
                _ => db_path,
            };
        }
        if let Some(recorded_by) = file.recorded_by {
            config.recorded_by = recorded_by;
        }
        if let Some(sync) = file.sync {
            config.sync = sync;
        }
        Ok(config)
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(value) = lookup(ENV_DATABASE_PATH) {
            self.database_path = PathBuf::from(value);
            self.env_overrides.push(ENV_DATABASE_PATH);
        }
        if let Some(value) = lookup(ENV_RECORDED_BY) {
            self.recorded_by = value;
            self.env_overrides.push(ENV_RECORDED_BY);
        }
        if let Some(value) = lookup(ENV_SERVER_URL) {
            self.sync.server_url = Some(value);
            self.env_overrides.push(ENV_SERVER_URL);
        }
        if let Some(value) = lookup(ENV_API_KEY) {
            self.sync.api_key = Some(value);
            self.env_overrides.push(ENV_API_KEY);
        }
    }

    /// `config.yaml` in the platform config dir (e.g. ~/.config/fieldsync/).
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("fieldsync")
            .join("config.yaml")
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("fieldsync")
}
