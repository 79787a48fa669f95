use crate::{
    ConnectionConfig, FetchError, Location, TemperatureReading,
    config::ServiceSection,
    error::ConfigurationError,
    provider::{http::HttpForecastService, stub::StubForecastService},
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::{convert::TryFrom, fmt::Debug, time::Duration};

pub mod http;
pub mod stub;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceKind {
    #[default]
    Stub,
    Http,
}

impl ServiceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceKind::Stub => "stub",
            ServiceKind::Http => "http",
        }
    }

    pub const fn all() -> &'static [ServiceKind] {
        &[ServiceKind::Stub, ServiceKind::Http]
    }
}

impl std::fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ServiceKind {
    type Error = ConfigurationError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let lower = value.to_lowercase();

        match lower.as_str() {
            "stub" => Ok(ServiceKind::Stub),
            "http" => Ok(ServiceKind::Http),
            _ => Err(ConfigurationError::UnknownService(value.to_string())),
        }
    }
}

/// The external "get forecast for location" call.
///
/// Implementations make exactly one attempt per call; retrying is the
/// caller's decision.
#[async_trait]
pub trait ForecastService: Send + Sync + Debug {
    async fn fetch(
        &self,
        config: &ConnectionConfig,
        location: &Location,
    ) -> Result<TemperatureReading, FetchError>;
}

/// Construct a service of the given kind using the `[service]` settings.
pub fn service_from_config(
    kind: ServiceKind,
    settings: &ServiceSection,
) -> anyhow::Result<Box<dyn ForecastService>> {
    let boxed: Box<dyn ForecastService> = match kind {
        ServiceKind::Stub => Box::new(StubForecastService::default()),
        ServiceKind::Http => {
            let timeout = settings.timeout_secs.map(Duration::from_secs);
            Box::new(HttpForecastService::new(timeout)?)
        }
    };

    Ok(boxed)
}
