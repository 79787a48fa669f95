//! Core library for the `forecast` CLI.
//!
//! This crate defines:
//! - Connection configuration, resolved once at startup
//! - Validation of user-typed city names
//! - Abstraction over the forecast service (stub and HTTP)
//! - The ranking cache that tracks the hottest city seen so far
//! - The interactive session tying it all together
//!
//! It is used by `forecast-cli`, but can also be driven from tests or other binaries.

pub mod cache;
pub mod config;
pub mod error;
pub mod location;
pub mod model;
pub mod provider;
pub mod session;

pub use cache::RankingCache;
pub use config::{Config, ConfigProvider, ConnectionConfig, Overrides};
pub use error::{ConfigurationError, FetchError, ValidationError};
pub use location::{KnownLocations, LocationDirectory, LocationValidator};
pub use model::{Location, TemperatureReading, TemperatureUnit};
pub use provider::{ForecastService, ServiceKind, service_from_config};
pub use session::{LoopState, Outcome, RetryPolicy, Session};
