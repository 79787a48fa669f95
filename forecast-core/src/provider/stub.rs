use async_trait::async_trait;
use std::collections::HashMap;
use tracing::debug;

use crate::{ConnectionConfig, FetchError, Location, TemperatureReading};

use super::ForecastService;

/// In-process stand-in for the forecast service, answering from a fixed table.
#[derive(Debug, Clone)]
pub struct StubForecastService {
    readings: HashMap<String, TemperatureReading>,
}

impl StubForecastService {
    pub fn new<I, S>(readings: I) -> Self
    where
        I: IntoIterator<Item = (S, TemperatureReading)>,
        S: Into<String>,
    {
        Self { readings: readings.into_iter().map(|(name, r)| (name.into(), r)).collect() }
    }
}

impl Default for StubForecastService {
    fn default() -> Self {
        Self::new([
            ("Wroclaw", TemperatureReading::celsius(7.0)),
            ("Cadiz", TemperatureReading::celsius(35.0)),
            ("London", TemperatureReading::celsius(15.0)),
        ])
    }
}

#[async_trait]
impl ForecastService for StubForecastService {
    async fn fetch(
        &self,
        config: &ConnectionConfig,
        location: &Location,
    ) -> Result<TemperatureReading, FetchError> {
        debug!(service = %config, %location, "stub forecast lookup");

        self.readings
            .get(location.as_str())
            .copied()
            .ok_or_else(|| FetchError::UnknownLocation(location.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ConnectionConfig {
        ConnectionConfig::new("localhost", 8080).unwrap()
    }

    #[tokio::test]
    async fn answers_from_the_default_table() {
        let service = StubForecastService::default();

        let reading = service.fetch(&config(), &Location::new("Cadiz")).await.unwrap();
        assert_eq!(reading, TemperatureReading::celsius(35.0));
    }

    #[tokio::test]
    async fn unlisted_location_is_a_fetch_error() {
        let service = StubForecastService::default();

        let err = service.fetch(&config(), &Location::new("Paris")).await.unwrap_err();
        assert_eq!(err, FetchError::UnknownLocation("Paris".into()));
    }

    #[tokio::test]
    async fn custom_table_replaces_defaults() {
        let service = StubForecastService::new([("Oslo", TemperatureReading::fahrenheit(41.0))]);

        assert!(service.fetch(&config(), &Location::new("Oslo")).await.is_ok());
        assert!(service.fetch(&config(), &Location::new("Cadiz")).await.is_err());
    }
}
