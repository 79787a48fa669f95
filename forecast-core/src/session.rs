//! The interactive loop: prompt, validate, fetch, record, report.

use std::{
    io::{self, BufRead, Write},
    time::Duration,
};
use tracing::{debug, warn};

use crate::{
    ConnectionConfig, FetchError, Location, TemperatureReading, ValidationError,
    cache::RankingCache,
    location::{KnownLocations, LocationDirectory, LocationValidator},
    provider::ForecastService,
};

pub const PROMPT: &str = "What is the next city?";

/// Lines that end the session when typed at the prompt.
pub const QUIT_COMMANDS: &[&str] = &["quit", "exit"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    AwaitingInput,
    Validating,
    Fetching,
    Updating,
    Reporting,
    Stopped,
}

/// What a single iteration ended with.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Reported { location: Location, reading: TemperatureReading },
    Rejected(ValidationError),
    FetchFailed { location: Location, error: FetchError },
    Stopped,
}

/// How many times a failed fetch is attempted before it is reported.
///
/// The default is a single attempt, i.e. no retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn attempts(max_attempts: u32) -> Self {
        Self { max_attempts: max_attempts.max(1), ..Self::default() }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 1, delay: Duration::ZERO }
    }
}

pub struct Session<D = KnownLocations> {
    config: ConnectionConfig,
    validator: LocationValidator<D>,
    service: Box<dyn ForecastService>,
    cache: RankingCache,
    retry: RetryPolicy,
    state: LoopState,
}

impl<D: LocationDirectory> Session<D> {
    pub fn new(
        config: ConnectionConfig,
        validator: LocationValidator<D>,
        service: Box<dyn ForecastService>,
    ) -> Self {
        Self {
            config,
            validator,
            service,
            cache: RankingCache::new(),
            retry: RetryPolicy::default(),
            state: LoopState::AwaitingInput,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn cache(&self) -> &RankingCache {
        &self.cache
    }

    pub fn into_cache(self) -> RankingCache {
        self.cache
    }

    /// Run iterations until the input ends or a quit command is read.
    ///
    /// Bad input and failed lookups are reported and the loop carries on;
    /// only I/O errors on `input`/`output` end it early. Reads block the
    /// calling thread, which is fine for the single interactive session.
    pub async fn run<R, W>(&mut self, mut input: R, mut output: W) -> io::Result<()>
    where
        R: BufRead,
        W: Write,
    {
        while !matches!(self.step(&mut input, &mut output).await?, Outcome::Stopped) {}
        Ok(())
    }

    /// One full pass through the loop, starting and ending at `AwaitingInput`
    /// (or `Stopped`).
    pub async fn step<R, W>(&mut self, input: &mut R, output: &mut W) -> io::Result<Outcome>
    where
        R: BufRead,
        W: Write,
    {
        if self.state == LoopState::Stopped {
            return Ok(Outcome::Stopped);
        }
        self.enter(LoopState::AwaitingInput);

        writeln!(output, "{PROMPT}")?;
        output.flush()?;

        // Bytes, not `read_line`: a line that isn't UTF-8 is bad input, not an I/O error.
        let mut buf = Vec::new();
        if input.read_until(b'\n', &mut buf)? == 0 {
            self.enter(LoopState::Stopped);
            return Ok(Outcome::Stopped);
        }

        let line = String::from_utf8_lossy(&buf);
        let raw = strip_line_ending(&line);
        if QUIT_COMMANDS.contains(&raw) {
            self.enter(LoopState::Stopped);
            return Ok(Outcome::Stopped);
        }

        let outcome = self.process(raw).await;

        self.enter(LoopState::Reporting);
        match &outcome {
            Outcome::Reported { location, reading } => {
                writeln!(output, "Forecast for city {location} is {reading}")?
            }
            Outcome::Rejected(err) => writeln!(output, "{err}")?,
            Outcome::FetchFailed { location, error } => {
                writeln!(output, "Could not fetch forecast for {location}: {error}")?
            }
            Outcome::Stopped => {}
        }
        if let Some((hottest, best)) = self.cache.best() {
            writeln!(output, "Hottest city found so far: {hottest} at {best}")?;
        }

        Ok(outcome)
    }

    /// Validating, Fetching and Updating for one raw line.
    async fn process(&mut self, raw: &str) -> Outcome {
        self.enter(LoopState::Validating);
        let location = match self.validator.validate(raw) {
            Ok(location) => location,
            Err(err) => return Outcome::Rejected(err),
        };

        self.enter(LoopState::Fetching);
        let reading = match self.fetch(&location).await {
            Ok(reading) => reading,
            Err(error) => return Outcome::FetchFailed { location, error },
        };

        self.enter(LoopState::Updating);
        self.cache.update(location.clone(), reading);

        Outcome::Reported { location, reading }
    }

    async fn fetch(&self, location: &Location) -> Result<TemperatureReading, FetchError> {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match self.service.fetch(&self.config, location).await {
                Ok(reading) => return Ok(reading),
                Err(err) if !err.is_transient() || attempt >= max_attempts => {
                    warn!(%location, attempt, error = %err, "forecast lookup failed");
                    return Err(err);
                }
                Err(err) => {
                    warn!(%location, attempt, max_attempts, error = %err, "retrying lookup");
                    attempt += 1;
                    if !self.retry.delay.is_zero() {
                        tokio::time::sleep(self.retry.delay).await;
                    }
                }
            }
        }
    }

    fn enter(&mut self, next: LoopState) {
        debug!(from = ?self.state, to = ?next, "session transition");
        self.state = next;
    }
}

fn strip_line_ending(line: &str) -> &str {
    line.strip_suffix('\n').map(|l| l.strip_suffix('\r').unwrap_or(l)).unwrap_or(line)
}
