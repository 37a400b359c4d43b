//! Shared configuration for ghrelay
//!
//! Reads from ~/.ghrelay/config.toml

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// GitHub REST API endpoint
pub const DEFAULT_API_BASE: &str = "https://api.github.com";

/// Host serving raw file contents by branch and path
pub const DEFAULT_RAW_BASE: &str = "https://raw.githubusercontent.com";

/// Web UI host, used for the Actions page link
pub const DEFAULT_WEB_BASE: &str = "https://github.com";

/// Event type the upload workflow listens for
pub const DEFAULT_EVENT_TYPE: &str = "upload_files_commit";

/// Top-level config structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub github: GitHubConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// Value of Access-Control-Allow-Origin on every response
    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
    /// Request body ceiling in MB
    #[serde(default = "default_max_body_mb")]
    pub max_body_mb: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            cors_origin: default_cors_origin(),
            max_body_mb: default_max_body_mb(),
        }
    }
}

fn default_bind_address() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_cors_origin() -> String {
    "*".to_string()
}

fn default_max_body_mb() -> u64 {
    100
}

impl ServerConfig {
    /// Bind address with the port replaced by `PORT` when that is set
    pub fn effective_bind_address(&self) -> String {
        match std::env::var("PORT") {
            Ok(port) if !port.trim().is_empty() => with_port(&self.bind_address, port.trim()),
            _ => self.bind_address.clone(),
        }
    }

    pub fn max_body_bytes(&self) -> usize {
        (self.max_body_mb as usize).saturating_mul(1024 * 1024)
    }
}

fn with_port(addr: &str, port: &str) -> String {
    match addr.rsplit_once(':') {
        Some((host, _)) => format!("{}:{}", host, port),
        None => format!("{}:{}", addr, port),
    }
}

/// GitHub endpoints and credentials
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_raw_base")]
    pub raw_base: String,
    #[serde(default = "default_web_base")]
    pub web_base: String,
    /// Environment variable holding the token for the direct commit path
    #[serde(default = "default_token_env")]
    pub token_env: String,
    /// Environment variable holding the token for repository dispatch
    #[serde(default = "default_dispatch_token_env")]
    pub dispatch_token_env: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Commit message used when the upload form carries none
    #[serde(default = "default_commit_message")]
    pub default_commit_message: String,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            raw_base: default_raw_base(),
            web_base: default_web_base(),
            token_env: default_token_env(),
            dispatch_token_env: default_dispatch_token_env(),
            timeout_secs: default_timeout_secs(),
            default_commit_message: default_commit_message(),
        }
    }
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

fn default_raw_base() -> String {
    DEFAULT_RAW_BASE.to_string()
}

fn default_web_base() -> String {
    DEFAULT_WEB_BASE.to_string()
}

fn default_token_env() -> String {
    "TOKEN".to_string()
}

fn default_dispatch_token_env() -> String {
    "DISPATCH_TOKEN".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_commit_message() -> String {
    "Upload files via ghrelay".to_string()
}

impl GitHubConfig {
    /// Actions page of a repository
    pub fn actions_url(&self, owner: &str, repo: &str) -> String {
        format!("{}/{}/{}/actions", self.web_base.trim_end_matches('/'), owner, repo)
    }

    /// Token for the direct commit path, None if unset or empty
    pub fn token(&self) -> Option<String> {
        read_secret(&self.token_env)
    }

    /// Token for repository dispatch, None if unset or empty
    pub fn dispatch_token(&self) -> Option<String> {
        read_secret(&self.dispatch_token_env)
    }
}

fn read_secret(var: &str) -> Option<String> {
    std::env::var(var)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Repository dispatch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    #[serde(default = "default_event_type")]
    pub event_type: String,
    /// Commit message forwarded when the form carries none
    #[serde(default = "default_dispatch_commit_message")]
    pub commit_message: String,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            event_type: default_event_type(),
            commit_message: default_dispatch_commit_message(),
        }
    }
}

fn default_event_type() -> String {
    DEFAULT_EVENT_TYPE.to_string()
}

fn default_dispatch_commit_message() -> String {
    ".".to_string()
}

impl Config {
    /// Load config from file, or create default if doesn't exist
    pub fn load() -> Result<Self> {
        let config_path = get_config_path();

        if config_path.exists() {
            let content = fs::read_to_string(&config_path)
                .context("Failed to read config file")?;
            toml::from_str(&content).context("Failed to parse config file")
        } else {
            let config = Config::default();
            config.save()?;
            Ok(config)
        }
    }

    /// Load config, returning default on any error (no panic)
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }

    /// Save config to file
    pub fn save(&self) -> Result<()> {
        let config_path = get_config_path();

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(&config_path, content)?;

        Ok(())
    }
}

/// Get the ghrelay directory (~/.ghrelay)
pub fn get_ghrelay_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("GHRELAY_CONFIG_DIR") {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".ghrelay")
}

/// Get the config file path (~/.ghrelay/config.toml)
pub fn get_config_path() -> PathBuf {
    get_ghrelay_dir().join("config.toml")
}
