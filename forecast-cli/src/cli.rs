use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use forecast_core::{
    Config, ConfigProvider, ConnectionConfig, ForecastService, LocationValidator, Overrides,
    RetryPolicy, ServiceKind, Session, service_from_config,
};
use inquire::{CustomType, CustomUserError, Select, Text, validator::Validation};
use std::{io, path::PathBuf};
use tracing::info;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "forecast", version, about = "Look up city forecasts and track the hottest one")]
pub struct Cli {
    /// Log debug output to stderr.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Ask for cities until end of input or `quit`, reporting the hottest so far.
    Run {
        #[command(flatten)]
        service: ServiceArgs,
    },

    /// Look up a single city and exit.
    Show {
        /// City name, matched exactly.
        city: String,

        #[command(flatten)]
        service: ServiceArgs,
    },

    /// Interactively store host, port and service kind in the config file.
    Configure {
        /// Write to this file instead of the default location.
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[derive(Debug, Args)]
pub struct ServiceArgs {
    /// Forecast service host; overrides FORECAST_HOST and the config file.
    #[arg(long)]
    host: Option<String>,

    /// Forecast service port; overrides FORECAST_PORT and the config file.
    #[arg(long)]
    port: Option<String>,

    /// Read configuration from this file instead of the default location.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Service implementation: "stub" or "http".
    #[arg(long)]
    service: Option<String>,

    /// Attempts per lookup before the failure is reported (interactive mode).
    #[arg(long)]
    max_attempts: Option<u32>,

    /// Per-request timeout in seconds for the http service.
    #[arg(long)]
    timeout: Option<u64>,
}

/// Everything a lookup needs, resolved once before any input is read.
struct Pipeline {
    config: ConnectionConfig,
    validator: LocationValidator,
    service: Box<dyn ForecastService>,
    retry: RetryPolicy,
}

impl ServiceArgs {
    fn bootstrap(&self) -> anyhow::Result<Pipeline> {
        let flags = Overrides { host: self.host.clone(), port: self.port.clone() };
        let provider = ConfigProvider::load(self.config.as_deref(), flags)?;
        let config = provider.get()?.clone();
        let settings = provider.settings();

        let kind = match &self.service {
            Some(raw) => ServiceKind::try_from(raw.as_str())?,
            None => settings.service.kind,
        };

        let mut service_settings = settings.service.clone();
        if let Some(timeout) = self.timeout {
            service_settings.timeout_secs = Some(timeout);
        }

        let service = service_from_config(kind, &service_settings)?;
        let retry =
            RetryPolicy::attempts(self.max_attempts.unwrap_or(service_settings.max_attempts));

        info!(%kind, service = %config, attempts = retry.max_attempts, "pipeline ready");

        Ok(Pipeline {
            config,
            validator: LocationValidator::new(settings.locations.directory()),
            service,
            retry,
        })
    }
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Run { service } => {
                let pipeline = service.bootstrap()?;
                let mut session =
                    Session::new(pipeline.config, pipeline.validator, pipeline.service)
                        .with_retry(pipeline.retry);

                session
                    .run(io::BufReader::new(io::stdin()), io::stdout())
                    .await
                    .context("Failed to read from stdin or write to stdout")?;
            }
            Command::Show { city, service } => {
                let pipeline = service.bootstrap()?;
                let location = pipeline.validator.validate(&city)?;
                let reading = pipeline
                    .service
                    .fetch(&pipeline.config, &location)
                    .await
                    .with_context(|| format!("Could not fetch forecast for {location}"))?;

                println!("Forecast for city {location} is {reading}");
            }
            Command::Configure { config } => configure(config)?,
        }

        Ok(())
    }
}

fn configure(path: Option<PathBuf>) -> anyhow::Result<()> {
    let path = match path {
        Some(path) => path,
        None => Config::config_file_path()?,
    };

    let mut cfg = if path.exists() { Config::load_from(&path)? } else { Config::default() };

    let host = Text::new("Forecast service host:")
        .with_default(cfg.connection.host.as_deref().unwrap_or("localhost"))
        .prompt()?;

    let current_port = cfg.connection.port.and_then(|p| u16::try_from(p).ok()).unwrap_or(8080);
    let port = CustomType::<u16>::new("Forecast service port:")
        .with_default(current_port)
        .with_error_message("Please enter a whole number between 1 and 65535")
        .with_validator(|port: &u16| -> Result<Validation, CustomUserError> {
            if *port == 0 {
                Ok(Validation::Invalid("Port 0 is not allowed".into()))
            } else {
                Ok(Validation::Valid)
            }
        })
        .prompt()?;

    let kinds = ServiceKind::all().to_vec();
    let cursor = kinds.iter().position(|k| *k == cfg.service.kind).unwrap_or(0);
    let kind = Select::new("Forecast service:", kinds).with_starting_cursor(cursor).prompt()?;

    cfg.set_connection(host, port);
    cfg.service.kind = kind;
    cfg.save_to(&path)?;

    println!("Saved configuration to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn show_accepts_connection_flags() {
        let cli = Cli::try_parse_from([
            "forecast",
            "show",
            "Cadiz",
            "--host",
            "localhost",
            "--port",
            "8080",
            "--service",
            "http",
        ])
        .unwrap();

        match cli.command {
            Command::Show { city, service } => {
                assert_eq!(city, "Cadiz");
                assert_eq!(service.host.as_deref(), Some("localhost"));
                assert_eq!(service.port.as_deref(), Some("8080"));
                assert_eq!(service.service.as_deref(), Some("http"));
            }
            other => panic!("expected show, got {other:?}"),
        }
    }

    #[test]
    fn run_accepts_max_attempts_and_timeout() {
        let cli = Cli::try_parse_from([
            "forecast",
            "run",
            "--max-attempts",
            "3",
            "--timeout",
            "5",
        ])
        .unwrap();

        let Command::Run { service } = cli.command else { panic!("expected run") };
        assert_eq!(service.max_attempts, Some(3));
        assert_eq!(service.timeout, Some(5));
    }

    #[test]
    fn bootstrap_fails_without_host() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[connection]\nport = 8080\n").unwrap();

        let config = path.to_str().unwrap();
        let cli = Cli::try_parse_from(["forecast", "run", "--config", config]).unwrap();
        let Command::Run { service } = cli.command else { panic!("expected run") };

        // An ambient FORECAST_HOST would satisfy the lookup, so only assert when unset.
        if std::env::var_os("FORECAST_HOST").is_none() {
            let err = service.bootstrap().err().expect("host is missing");
            assert!(err.to_string().contains("'host'"));
        }
    }

    #[test]
    fn bootstrap_uses_file_and_flags() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[connection]\nhost = \"forecast.local\"\nport = 9000\n\n[service]\nmax_attempts = 2\n",
        )
        .unwrap();

        let cli = Cli::try_parse_from([
            "forecast", "run", "--config", path.to_str().unwrap(), "--port", "9100",
        ])
        .unwrap();
        let Command::Run { service } = cli.command else { panic!("expected run") };

        let pipeline = service.bootstrap().unwrap();
        assert_eq!(pipeline.config.port(), 9100);
        assert_eq!(pipeline.retry.max_attempts, 2);
        assert!(pipeline.validator.validate("Cadiz").is_ok());
    }
}
