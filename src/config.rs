use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tourney_core::SyncSettings;

/// Source of a configuration value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigSource {
    Default,
    File,
    Environment,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::Default => write!(f, "default"),
            ConfigSource::File => write!(f, "file"),
            ConfigSource::Environment => write!(f, "environment"),
        }
    }
}

/// A configuration value with its source
#[derive(Debug, Clone, Serialize)]
pub struct ConfigValue<T> {
    pub value: T,
    pub source: ConfigSource,
}

impl<T> ConfigValue<T> {
    pub fn new(value: T, source: ConfigSource) -> Self {
        Self { value, source }
    }
}

/// Document server connection
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ServerConfig {
    /// Server URL (e.g., "http://localhost:8080")
    pub server_url: Option<String>,
    /// API key sent as a bearer token
    pub api_key: Option<String>,
}

impl ServerConfig {
    /// Returns true if both server_url and api_key are set
    pub fn is_configured(&self) -> bool {
        self.server_url.is_some() && self.api_key.is_some()
    }
}

const DEFAULT_PROBE_INTERVAL_SECS: u64 = 5;

/// Application configuration with source tracking
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    /// Directory holding the offline outbox
    pub data_dir: ConfigValue<PathBuf>,
    /// Where registration notices for organisers go
    pub admin_email: ConfigValue<String>,
    /// Seconds between connectivity probes
    pub probe_interval_secs: u64,
    /// Config file path used (if any)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_file: Option<PathBuf>,
    pub server: ServerConfig,
    pub sync: SyncSettings,
}

/// Internal struct for deserializing config file
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ConfigFile {
    data_dir: Option<PathBuf>,
    admin_email: Option<String>,
    probe_interval_secs: Option<u64>,
    server: Option<ServerConfig>,
    sync: Option<SyncSettings>,
}

impl Config {
    /// Load configuration with priority: env vars > config file > defaults
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let mut data_dir = ConfigValue::new(Self::default_data_dir(), ConfigSource::Default);
        let mut admin_email =
            ConfigValue::new("admin@localhost".to_string(), ConfigSource::Default);
        let mut probe_interval_secs = DEFAULT_PROBE_INTERVAL_SECS;
        let mut config_file = None;
        let mut server = ServerConfig::default();
        let mut sync = SyncSettings::default();

        let path = config_path.unwrap_or_else(Self::default_config_path);
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadError(path.clone(), e))?;
            let file_config: ConfigFile = serde_yaml::from_str(&contents)
                .map_err(|e| ConfigError::ParseError(path.clone(), e))?;

            config_file = Some(path.clone());

            if let Some(dir) = file_config.data_dir {
                // Resolve relative paths against config file's directory
                let resolved = if dir.is_relative() {
                    path.parent().map(|p| p.join(&dir)).unwrap_or(dir)
                } else {
                    dir
                };
                data_dir = ConfigValue::new(resolved, ConfigSource::File);
            }
            if let Some(email) = file_config.admin_email {
                admin_email = ConfigValue::new(email, ConfigSource::File);
            }
            if let Some(secs) = file_config.probe_interval_secs {
                probe_interval_secs = secs.max(1);
            }
            if let Some(server_config) = file_config.server {
                server = server_config;
            }
            if let Some(settings) = file_config.sync {
                sync = settings;
            }
        }

        if let Ok(dir) = std::env::var("TOURNEY_DATA_DIR") {
            data_dir = ConfigValue::new(PathBuf::from(dir), ConfigSource::Environment);
        }
        if let Ok(email) = std::env::var("TOURNEY_ADMIN_EMAIL") {
            admin_email = ConfigValue::new(email, ConfigSource::Environment);
        }
        if let Ok(url) = std::env::var("TOURNEY_SERVER_URL") {
            server.server_url = Some(url);
        }
        if let Ok(key) = std::env::var("TOURNEY_API_KEY") {
            server.api_key = Some(key);
        }

        Ok(Self {
            data_dir,
            admin_email,
            probe_interval_secs,
            config_file,
            server,
            sync,
        })
    }

    /// Default config directory (platform-specific):
    /// - Linux: ~/.config/tourney/
    /// - macOS: ~/Library/Application Support/tourney/
    /// - Windows: %APPDATA%/tourney/
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("tourney")
    }

    /// Default data directory (platform-specific):
    /// - Linux: ~/.local/share/tourney/
    /// - macOS: ~/Library/Application Support/tourney/
    /// - Windows: %APPDATA%/tourney/
    pub fn default_data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("tourney")
    }

    /// Default config file path (platform-specific config dir + config.yaml)
    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join("config.yaml")
    }
}

#[derive(Debug)]
pub enum ConfigError {
    ReadError(PathBuf, std::io::Error),
    ParseError(PathBuf, serde_yaml::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ReadError(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), e)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
