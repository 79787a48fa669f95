use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    fmt, fs,
    path::{Path, PathBuf},
    sync::OnceLock,
};
use tracing::{debug, info};

use crate::{error::ConfigurationError, location::KnownLocations, provider::ServiceKind};

pub const HOST_ENV: &str = "FORECAST_HOST";
pub const PORT_ENV: &str = "FORECAST_PORT";

/// Where the forecast service lives. Immutable once resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    host: String,
    port: u16,
}

impl ConnectionConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Result<Self, ConfigurationError> {
        let host = host.into();
        if host.trim().is_empty() {
            return Err(ConfigurationError::MissingField("host"));
        }
        if port == 0 {
            return Err(ConfigurationError::InvalidPort(port.to_string()));
        }

        Ok(Self { host, port })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

impl fmt::Display for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// `[connection]` table. Both values are optional on disk so that env vars or
/// flags can supply them instead.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConnectionSection {
    pub host: Option<String>,
    pub port: Option<i64>,
}

/// `[service]` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceSection {
    #[serde(default)]
    pub kind: ServiceKind,

    /// Per-request timeout for the HTTP service, in seconds.
    pub timeout_secs: Option<u64>,

    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_max_attempts() -> u32 {
    1
}

impl Default for ServiceSection {
    fn default() -> Self {
        Self {
            kind: ServiceKind::default(),
            timeout_secs: None,
            max_attempts: default_max_attempts(),
        }
    }
}

/// `[locations]` table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LocationsSection {
    /// Example TOML:
    /// [locations]
    /// known = ["Wroclaw", "Cadiz", "London"]
    pub known: Option<Vec<String>>,
}

impl LocationsSection {
    pub fn directory(&self) -> KnownLocations {
        match &self.known {
            Some(names) => KnownLocations::new(names.iter().cloned()),
            None => KnownLocations::default(),
        }
    }
}

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub connection: ConnectionSection,

    #[serde(default)]
    pub service: ServiceSection,

    #[serde(default)]
    pub locations: LocationsSection,
}

impl Config {
    /// Load config from the default location, or return an empty default if it doesn't exist yet.
    pub fn load() -> Result<Self, ConfigurationError> {
        let path = Self::config_file_path()?;
        if !path.exists() {
            // First run: no config file, return empty.
            debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }

        Self::load_from(&path)
    }

    /// Load config from an explicit path. A missing file is an error here.
    pub fn load_from(path: &Path) -> Result<Self, ConfigurationError> {
        let contents = fs::read_to_string(path)
            .map_err(|source| ConfigurationError::Read { path: path.to_path_buf(), source })?;

        toml::from_str(&contents)
            .map_err(|source| ConfigurationError::Parse { path: path.to_path_buf(), source })
    }

    /// Save config to the default location.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_file_path()?;
        self.save_to(&path)
    }

    /// Save config to `path`, creating parent directories as needed.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf, ConfigurationError> {
        let dirs = ProjectDirs::from("dev", "forecast", "forecast-cli")
            .ok_or(ConfigurationError::NoConfigDir)?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    pub fn set_connection(&mut self, host: String, port: u16) {
        self.connection = ConnectionSection { host: Some(host), port: Some(i64::from(port)) };
    }
}

/// Host/port values coming from outside the config file (env vars or flags).
/// The port stays raw so a bad value can be reported verbatim.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub host: Option<String>,
    pub port: Option<String>,
}

impl Overrides {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self { host: lookup(HOST_ENV), port: lookup(PORT_ENV) }
    }
}

/// Resolves the connection parameters once and hands the same value to every
/// caller afterwards.
///
/// Precedence, lowest first: config file, environment, command-line flags.
#[derive(Debug)]
pub struct ConfigProvider {
    settings: Config,
    env: Overrides,
    flags: Overrides,
    resolved: OnceLock<ConnectionConfig>,
}

impl ConfigProvider {
    pub fn new(settings: Config, env: Overrides, flags: Overrides) -> Self {
        Self { settings, env, flags, resolved: OnceLock::new() }
    }

    /// Read the config file (explicit path or platform default) and the environment.
    pub fn load(path: Option<&Path>, flags: Overrides) -> Result<Self, ConfigurationError> {
        let settings = match path {
            Some(path) => Config::load_from(path)?,
            None => Config::load()?,
        };

        Ok(Self::new(settings, Overrides::from_env(), flags))
    }

    pub fn settings(&self) -> &Config {
        &self.settings
    }

    pub fn get(&self) -> Result<&ConnectionConfig, ConfigurationError> {
        if let Some(config) = self.resolved.get() {
            return Ok(config);
        }

        let config = self.resolve()?;
        info!(service = %config, "resolved connection configuration");
        Ok(self.resolved.get_or_init(|| config))
    }

    fn resolve(&self) -> Result<ConnectionConfig, ConfigurationError> {
        let host = self
            .flags
            .host
            .clone()
            .or_else(|| self.env.host.clone())
            .or_else(|| self.settings.connection.host.clone())
            .ok_or(ConfigurationError::MissingField("host"))?;

        let port = self
            .flags
            .port
            .clone()
            .or_else(|| self.env.port.clone())
            .or_else(|| self.settings.connection.port.map(|port| port.to_string()))
            .ok_or(ConfigurationError::MissingField("port"))?;

        ConnectionConfig::new(host, parse_port(&port)?)
    }
}

fn parse_port(raw: &str) -> Result<u16, ConfigurationError> {
    match raw.trim().parse::<u16>() {
        Ok(port) if port > 0 => Ok(port),
        _ => Err(ConfigurationError::InvalidPort(raw.to_string())),
    }
}
