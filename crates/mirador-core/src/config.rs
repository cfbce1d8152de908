//! Configuration loading and typed config structures for the panel.
//!
//! The canonical configuration lives in `mirador.yaml` next to the server
//! binary. This module defines strongly-typed structs that mirror the YAML
//! structure and a loader that reads it. Every field has a default, so an
//! empty (or missing) file yields a working configuration.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// An environment override held an unusable value.
    #[error("invalid value for {name}: {value}")]
    InvalidOverride {
        /// The environment variable name.
        name: &'static str,
        /// The rejected value.
        value: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level panel configuration.
///
/// Mirrors the structure of `mirador.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PanelConfig {
    /// Where the dashboard server listens.
    #[serde(default)]
    pub listen: ListenConfig,

    /// The single dashboard account.
    #[serde(default)]
    pub account: AccountConfig,

    /// Sender name used for chat messages sent from the dashboard.
    #[serde(default = "default_chat_name")]
    pub chat_name: String,

    /// Static game-server properties known before the server is online.
    #[serde(default)]
    pub game: GameConfig,

    /// CPU/RAM sampling parameters.
    #[serde(default)]
    pub sampling: SamplingConfig,

    /// Chat, command, and console history limits.
    #[serde(default)]
    pub logs: LogsConfig,

    /// Periodic refresh intervals.
    #[serde(default)]
    pub refresh: RefreshConfig,

    /// Path of the permissions file mirrored into the tree.
    #[serde(default = "default_permissions_file")]
    pub permissions_file: PathBuf,

    /// Optional `[code, name]` table used to display player languages.
    #[serde(default)]
    pub language_names_file: Option<PathBuf>,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            listen: ListenConfig::default(),
            account: AccountConfig::default(),
            chat_name: default_chat_name(),
            game: GameConfig::default(),
            sampling: SamplingConfig::default(),
            logs: LogsConfig::default(),
            refresh: RefreshConfig::default(),
            permissions_file: default_permissions_file(),
            language_names_file: None,
        }
    }
}

impl PanelConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override YAML values:
    /// - `MIRADOR_HOST` overrides `listen.host`
    /// - `MIRADOR_PORT` overrides `listen.port`
    /// - `MIRADOR_USERNAME` overrides `account.username`
    /// - `MIRADOR_PASSWORD` overrides `account.password`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::InvalidOverride`] if `MIRADOR_PORT` is not a port.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string and apply process
    /// environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config = Self::parse_without_env(yaml)?;
        config.apply_env_overrides(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Parse configuration from a YAML string, ignoring the environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse_without_env(yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yml::from_str(yaml)?)
    }

    /// Apply overrides looked up through `lookup` (normally the process
    /// environment).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidOverride`] if `MIRADOR_PORT` does not
    /// parse as a port number.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(val) = lookup("MIRADOR_HOST") {
            self.listen.host = val;
        }
        if let Some(val) = lookup("MIRADOR_PORT") {
            self.listen.port = val.parse().map_err(|e| ConfigError::InvalidOverride {
                name: "MIRADOR_PORT",
                value: format!("{val} ({e})"),
            })?;
        }
        if let Some(val) = lookup("MIRADOR_USERNAME") {
            self.account.username = val;
        }
        if let Some(val) = lookup("MIRADOR_PASSWORD") {
            self.account.password = val;
        }
        Ok(())
    }
}

/// Dashboard server bind address.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ListenConfig {
    /// The host address to bind to.
    #[serde(default = "default_host")]
    pub host: String,

    /// The TCP port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Credentials of the dashboard account.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct AccountConfig {
    /// Account name.
    #[serde(default = "default_username")]
    pub username: String,

    /// Account password.
    #[serde(default = "default_password")]
    pub password: String,
}

impl AccountConfig {
    /// Whether the given credentials match this account.
    pub fn matches(&self, username: &str, password: &str) -> bool {
        self.username == username && self.password == password
    }
}

impl core::fmt::Debug for AccountConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AccountConfig")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl Default for AccountConfig {
    fn default() -> Self {
        Self {
            username: default_username(),
            password: default_password(),
        }
    }
}

/// Static game-server properties.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GameConfig {
    /// Server name shown before the server reports its MOTD.
    #[serde(default = "default_server_name")]
    pub server_name: String,

    /// World (level) name.
    #[serde(default = "default_level_name")]
    pub level_name: String,

    /// Player limit from the server properties.
    #[serde(default = "default_max_players")]
    pub max_players: u32,

    /// Game server port.
    #[serde(default = "default_game_port")]
    pub port: u16,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            server_name: default_server_name(),
            level_name: default_level_name(),
            max_players: default_max_players(),
            port: default_game_port(),
        }
    }
}

/// CPU/RAM sampling parameters.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SamplingConfig {
    /// Seconds between samples.
    #[serde(default = "default_sample_interval_secs")]
    pub interval_secs: u64,

    /// Number of samples kept per series.
    #[serde(default = "default_history_len")]
    pub history_len: usize,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_sample_interval_secs(),
            history_len: default_history_len(),
        }
    }
}

/// History limits for the log panes.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LogsConfig {
    /// Entries kept per log (chat, commands, console).
    #[serde(default = "default_max_log_entries")]
    pub max_entries: usize,
}

impl Default for LogsConfig {
    fn default() -> Self {
        Self {
            max_entries: default_max_log_entries(),
        }
    }
}

/// Periodic refresh intervals.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RefreshConfig {
    /// Milliseconds between uptime and watched-player refreshes.
    #[serde(default = "default_status_interval_ms")]
    pub status_interval_ms: u64,

    /// Milliseconds between permissions file checks.
    #[serde(default = "default_permissions_poll_ms")]
    pub permissions_poll_ms: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            status_interval_ms: default_status_interval_ms(),
            permissions_poll_ms: default_permissions_poll_ms(),
        }
    }
}

fn default_chat_name() -> String {
    String::from("Server")
}

fn default_permissions_file() -> PathBuf {
    PathBuf::from("permissions.json")
}

fn default_host() -> String {
    String::from("0.0.0.0")
}

const fn default_port() -> u16 {
    3000
}

fn default_username() -> String {
    String::from("admin")
}

fn default_password() -> String {
    String::from("admin")
}

fn default_server_name() -> String {
    String::from("Dedicated Server")
}

fn default_level_name() -> String {
    String::from("Bedrock level")
}

const fn default_max_players() -> u32 {
    10
}

const fn default_game_port() -> u16 {
    19132
}

const fn default_sample_interval_secs() -> u64 {
    60
}

const fn default_history_len() -> usize {
    30
}

const fn default_max_log_entries() -> usize {
    500
}

const fn default_status_interval_ms() -> u64 {
    1000
}

const fn default_permissions_poll_ms() -> u64 {
    2000
}
