//! Configuration management for prlab.
//!
//! Handles loading and saving configuration from TOML files.
//! Config files are stored in platform-specific locations:
//!
//! - **macOS/Linux**: `~/.config/prlab/config.toml`
//! - **Windows**: `%APPDATA%\prlab\config.toml`
//!
//! The access token may also come from the `PRLAB_ACCESS_TOKEN`
//! environment variable, which wins over the file.
//!
//! # Example
//!
//! ```ignore
//! use prlab_core::config::{Config, ProviderKind};
//!
//! let mut config = Config::load()?;
//! config.provider = ProviderKind::Gitlab;
//! config.set("api_base_url", "https://gitlab.example.com/api/v4")?;
//! config.save()?;
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{Error, Result};

/// Config file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Config directory name.
const CONFIG_DIR_NAME: &str = "prlab";

/// Environment variable overriding the configured token.
pub const TOKEN_ENV_VAR: &str = "PRLAB_ACCESS_TOKEN";

/// Default GitHub REST API URL.
pub const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";

/// Default GitLab REST API URL.
pub const DEFAULT_GITLAB_API_URL: &str = "https://gitlab.com/api/v4/";

// =============================================================================
// Configuration structures
// =============================================================================

/// Supported source control providers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderKind {
    #[default]
    Github,
    GithubAnonymous,
    Gitlab,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Github => "github",
            ProviderKind::GithubAnonymous => "github-anonymous",
            ProviderKind::Gitlab => "gitlab",
        }
    }

    /// REST API URL used when none is configured.
    pub fn default_api_url(&self) -> &'static str {
        match self {
            ProviderKind::Github | ProviderKind::GithubAnonymous => DEFAULT_GITHUB_API_URL,
            ProviderKind::Gitlab => DEFAULT_GITLAB_API_URL,
        }
    }
}

impl FromStr for ProviderKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "github" => Ok(ProviderKind::Github),
            "github-anonymous" => Ok(ProviderKind::GithubAnonymous),
            "gitlab" => Ok(ProviderKind::Gitlab),
            other => Err(Error::Config(format!(
                "Unknown provider '{}'. Expected github, github-anonymous or gitlab",
                other
            ))),
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Source control provider
    #[serde(default)]
    pub provider: ProviderKind,

    /// Base URL of the provider REST API
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base_url: Option<String>,

    /// Personal access token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,

    /// Repository owner seeding anonymous listing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,

    /// Repository name seeding anonymous listing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo: Option<String>,
}

// =============================================================================
// Config implementation
// =============================================================================

impl Config {
    /// Get the configuration directory path.
    pub fn config_dir() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|p| p.join(CONFIG_DIR_NAME))
            .ok_or_else(|| Error::Config("Could not determine config directory".to_string()))
    }

    /// Get the configuration file path.
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join(CONFIG_FILE_NAME))
    }

    /// Load configuration from the default location.
    ///
    /// Returns a default config if the file doesn't exist.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    ///
    /// Returns a default config if the file doesn't exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = ?path, "Config file does not exist, using defaults");
            return Ok(Self::default());
        }

        debug!(path = ?path, "Loading config");

        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("Failed to parse config file: {}", e)))?;

        info!(path = ?path, provider = %config.provider, "Config loaded successfully");
        Ok(config)
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        self.save_to(&path)
    }

    /// Save configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::Config(format!("Failed to create config directory: {}", e)))?;
        }

        debug!(path = ?path, "Saving config");

        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, contents)
            .map_err(|e| Error::Config(format!("Failed to write config file: {}", e)))?;

        info!(path = ?path, "Config saved successfully");
        Ok(())
    }

    /// API base URL, falling back to the provider default.
    pub fn effective_base_url(&self) -> String {
        match &self.api_base_url {
            Some(url) if !url.is_empty() => url.clone(),
            _ => self.provider.default_api_url().to_string(),
        }
    }

    /// Access token from the environment or the file; empty when unset.
    pub fn resolve_token(&self) -> String {
        self.resolve_token_with(std::env::var(TOKEN_ENV_VAR).ok())
    }

    fn resolve_token_with(&self, from_env: Option<String>) -> String {
        from_env
            .filter(|t| !t.is_empty())
            .or_else(|| self.access_token.clone())
            .unwrap_or_default()
    }

    /// Set a configuration value by key.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "provider" => self.provider = value.parse()?,
            "api_base_url" | "url" => self.api_base_url = Some(value.to_string()),
            "access_token" | "token" => self.access_token = Some(value.to_string()),
            "owner" => self.owner = Some(value.to_string()),
            "repo" => self.repo = Some(value.to_string()),
            _ => return Err(Error::Config(format!("Unknown config key: {}", key))),
        }
        Ok(())
    }

    /// Get a configuration value by key.
    ///
    /// The token is never echoed back, only whether it is set.
    pub fn get(&self, key: &str) -> Result<Option<String>> {
        match key {
            "provider" => Ok(Some(self.provider.to_string())),
            "api_base_url" | "url" => Ok(Some(self.effective_base_url())),
            "access_token" | "token" => Ok(self.access_token.as_ref().map(|_| "<hidden>".to_string())),
            "owner" => Ok(self.owner.clone()),
            "repo" => Ok(self.repo.clone()),
            _ => Err(Error::Config(format!("Unknown config key: {}", key))),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
