use clap::{Args, Subcommand, ValueEnum};
use std::fs;
use std::io::Write;
use std::path::Path;

use tourney::config::Config;

#[derive(Clone, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

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

const DEFAULT_CONFIG: &str = r#"# tourney configuration

# Where queued offline writes are kept (default: platform data dir)
# data_dir: ~/.local/share/tourney

# Recipient of new-registration notices
admin_email: admin@localhost

# Seconds between connectivity probes
probe_interval_secs: 5

server:
  server_url: "http://localhost:8080"
  # api_key: "your-api-key"

# sync:
#   max_reconnect_attempts: 5
#   reconnect_base_ms: 1000
#   reconnect_cap_ms: 30000
#   write_max_retries: 3
#   write_base_ms: 1000
#   write_cap_ms: 10000
#   retry_resource_exhausted: false
"#;

impl ConfigCommand {
    pub fn run(&self, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            ConfigSubcommand::Show { format } => {
                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(config)?);
                    }
                    OutputFormat::Text => print_text(config),
                }
                Ok(())
            }

            ConfigSubcommand::Init => {
                let config_path = config
                    .config_file
                    .clone()
                    .unwrap_or_else(Config::default_config_path);

                if config_path.exists() {
                    println!("Config file already exists: {}", config_path.display());
                    println!("Use 'tourney config show' to view current configuration.");
                    return Ok(());
                }

                write_default_config(&config_path)?;

                println!("Created config file: {}", config_path.display());
                println!("\nSet server.api_key, then run 'tourney status'.");
                Ok(())
            }
        }
    }
}

fn print_text(config: &Config) {
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

    println!("data_dir: {}", config.data_dir.value.display());
    println!("  source: {}", config.data_dir.source);
    println!();

    println!("admin_email: {}", config.admin_email.value);
    println!("  source: {}", config.admin_email.source);
    println!();

    println!(
        "server_url: {}",
        config.server.server_url.as_deref().unwrap_or("(not set)")
    );
    println!(
        "api_key: {}",
        if config.server.api_key.is_some() {
            "(set)"
        } else {
            "(not set)"
        }
    );
    println!();

    let sync = &config.sync;
    println!("probe_interval_secs: {}", config.probe_interval_secs);
    println!(
        "reconnect: {} attempts, {}ms base, {}ms cap",
        sync.max_reconnect_attempts, sync.reconnect_base_ms, sync.reconnect_cap_ms
    );
    println!(
        "writes: {} retries, {}ms base, {}ms cap, retry resource-exhausted: {}",
        sync.write_max_retries,
        sync.write_base_ms,
        sync.write_cap_ms,
        sync.retry_resource_exhausted
    );
}

fn write_default_config(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = fs::File::create(path)?;
    file.write_all(DEFAULT_CONFIG.as_bytes())
}
