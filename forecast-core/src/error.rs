use std::path::PathBuf;
use thiserror::Error;

/// Raised while resolving configuration at startup. Always fatal.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error(
        "Missing required configuration value '{0}'.\n\
         Hint: run `forecast configure`, set FORECAST_HOST/FORECAST_PORT, or pass --host/--port."
    )]
    MissingField(&'static str),

    #[error("Invalid port '{0}': expected an integer in 1..=65535")]
    InvalidPort(String),

    #[error("Failed to read config file: {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file: {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Could not determine platform config directory")]
    NoConfigDir,

    #[error("Unknown service '{0}'. Supported services: stub, http.")]
    UnknownService(String),
}

/// Raised when user input does not name a recognised location.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Carries the input exactly as typed.
    #[error("Unknown city: {0}")]
    UnknownLocation(String),
}

/// Raised by a forecast service for a single failed attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("the forecast service has no data for '{0}'")]
    UnknownLocation(String),

    #[error("{reason}")]
    Failed { reason: String },
}

impl FetchError {
    pub fn failed(reason: impl Into<String>) -> Self {
        FetchError::Failed { reason: reason.into() }
    }

    /// Whether another attempt could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Failed { .. })
    }
}
