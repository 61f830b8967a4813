use clap::{Args, Subcommand};
use std::fs;
use std::io::Write;

use super::OutputFormat;
use crate::config::Config;

#[derive(Args)]
pub struct ConfigCommand {
    #[command(subcommand)]
    pub command: ConfigSubcommand,
}

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Show current configuration values
    Show {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Initialize configuration file
    Init,
}

impl ConfigCommand {
    pub fn run(&self, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            ConfigSubcommand::Show { format } => {
                match format {
                    OutputFormat::Json => {
                        let mut value = serde_json::to_value(config)?;
                        if let Some(key) = value.pointer_mut("/sync/api_key") {
                            if !key.is_null() {
                                *key = serde_json::Value::String("********".to_string());
                            }
                        }
                        println!("{}", serde_json::to_string_pretty(&value)?);
                    }
                    OutputFormat::Text => {
                        println!("Configuration");
                        println!("=============\n");

                        if let Some(path) = &config.config_file {
                            println!("Config file: {}", path.display());
                        } else {
                            println!(
                                "Config file: {} (not found)",
                                Config::default_config_path().display()
                            );
                        }
                        println!();

                        println!("database_path: {}", config.database_path.display());
                        println!("recorded_by: {}", config.recorded_by);
                        if !config.env_overrides.is_empty() {
                            println!("environment overrides: {}", config.env_overrides.join(", "));
                        }
                        println!();

                        println!("sync:");
                        println!(
                            "  server_url: {}",
                            config.sync.server_url.as_deref().unwrap_or("(not set)")
                        );
                        println!(
                            "  api_key: {}",
                            if config.sync.api_key.is_some() { "(set)" } else { "(not set)" }
                        );
                        println!("  auto_sync: {}", config.sync.auto_sync);
                        match config.sync.interval_secs {
                            Some(secs) => println!("  interval_secs: {}", secs),
                            None => println!("  interval_secs: (reconnect only)"),
                        }
                        println!("  batch_size: {}", config.sync.batch_size);
                        println!("  max_retries: {}", config.sync.max_retries);
                        println!(
                            "  claim_timeout_secs: {}",
                            config.sync.settings().claim_timeout.as_secs()
                        );
                    }
                }
                Ok(())
            }

            ConfigSubcommand::Init => {
                let config_path = Config::default_config_path();

                if config_path.exists() {
                    println!("Config file already exists: {}", config_path.display());
                    println!("Use 'fieldsync config show' to view current configuration.");
                    return Ok(());
                }

                if let Some(parent) = config_path.parent() {
                    fs::create_dir_all(parent)?;
                }

                let default_config = r#"# fieldsync configuration

# Path to SQLite database (default: platform data dir)
# database_path: fieldsync.db

# Identity stamped on every record you capture
recorded_by: unknown

# sync:
#   server_url: "https://records.example.org"
#   api_key: "your-api-key"
#   auto_sync: false
#   interval_secs: 300
#   batch_size: 10
#   max_retries: 3
#   claim_timeout_secs: 30
"#;

                let mut file = fs::File::create(&config_path)?;
                file.write_all(default_config.as_bytes())?;

                println!("Created config file: {}", config_path.display());
                println!("\nEdit this file to customize your settings.");
                Ok(())
            }
        }
    }
}
