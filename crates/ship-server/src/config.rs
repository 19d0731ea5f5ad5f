//! Configuration file support

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Configuration for ship-server
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Model used for generation
    pub model: Option<String>,
    /// Interface to bind
    pub bind: Option<String>,
    /// Port to listen on
    pub port: Option<u16>,
    /// Root directory for deployed sites
    pub storage_root: Option<String>,
    /// Base URL of the user/quota API; when unset, quota is not enforced
    pub quota_api_url: Option<String>,
    /// API keys (alternative to environment variables)
    #[serde(default)]
    pub api_keys: ApiKeys,
}

/// API key configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiKeys {
    pub anthropic: Option<String>,
}

impl Config {
    /// Get the config directory
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("shipstation")
    }

    /// Get the config file path
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("SHIPSTATION_CONFIG_PATH") {
            return PathBuf::from(path);
        }
        Self::config_dir().join("config.toml")
    }

    /// Load config from file
    pub fn load() -> Self {
        let path = Self::config_path();
        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string(&path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("Warning: Failed to parse config file: {}", e);
                    Self::default()
                }
            },
            Err(e) => {
                eprintln!("Warning: Failed to read config file: {}", e);
                Self::default()
            }
        }
    }

    /// Save config to file
    pub fn save(&self) -> std::io::Result<()> {
        let path = Self::config_path();
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }

        let content = toml::to_string_pretty(self).map_err(std::io::Error::other)?;
        fs::write(path, content)
    }

    /// Create a default config file if it doesn't exist
    pub fn init() -> std::io::Result<PathBuf> {
        let path = Self::config_path();
        if path.exists() {
            return Ok(path);
        }

        let default_config = Config {
            model: Some("claude-sonnet-4-5-20250929".to_string()),
            bind: Some("127.0.0.1".to_string()),
            port: Some(3001),
            storage_root: Some("./storage".to_string()),
            quota_api_url: None,
            api_keys: ApiKeys::default(),
        };

        default_config.save()?;
        Ok(path)
    }

    /// Service API key, checking config then env
    pub fn anthropic_api_key(&self) -> Option<String> {
        if let Some(ref key) = self.api_keys.anthropic {
            return Some(key.clone());
        }
        std::env::var("ANTHROPIC_API_KEY").ok()
    }
}

/// Generate example config content
pub fn example_config() -> &'static str {
    r#"# ship-server configuration file
# Place at ~/.config/shipstation/config.toml (Linux/Mac)
# or %APPDATA%\shipstation\config.toml (Windows)

# Model used for generation
model = "claude-sonnet-4-5-20250929"

# Interface and port to listen on
bind = "127.0.0.1"
port = 3001

# Root directory for deployed sites
storage_root = "./storage"

# Base URL of the user/quota API
# When unset, quota checks are skipped and all requests proceed.
# quota_api_url = "https://api.example.com"

# API keys (optional - can also use environment variables)
# It's recommended to use environment variables instead for security
[api_keys]
# anthropic = "sk-ant-..."
"#
}
