use std::collections::BTreeSet;
use tracing::debug;

use crate::{error::ValidationError, model::Location};

/// Places recognised out of the box.
pub const DEFAULT_LOCATIONS: &[&str] = &["Wroclaw", "Cadiz", "London"];

/// Answers whether a raw identifier names a place we can look up.
pub trait LocationDirectory: Send + Sync {
    fn contains(&self, raw: &str) -> bool;
}

/// A closed list of identifiers, matched exactly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnownLocations {
    names: BTreeSet<String>,
}

impl KnownLocations {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { names: names.into_iter().map(Into::into).collect() }
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}

impl Default for KnownLocations {
    fn default() -> Self {
        Self::new(DEFAULT_LOCATIONS.iter().copied())
    }
}

impl LocationDirectory for KnownLocations {
    fn contains(&self, raw: &str) -> bool {
        self.names.contains(raw)
    }
}

/// Turns free text into a [`Location`].
///
/// No normalisation happens: `"london"` and `" London"` are both rejected when
/// the directory only knows `"London"`, and the error carries the input as typed.
#[derive(Debug, Clone)]
pub struct LocationValidator<D = KnownLocations> {
    directory: D,
}

impl Default for LocationValidator {
    fn default() -> Self {
        Self::new(KnownLocations::default())
    }
}

impl<D: LocationDirectory> LocationValidator<D> {
    pub fn new(directory: D) -> Self {
        Self { directory }
    }

    pub fn validate(&self, raw: &str) -> Result<Location, ValidationError> {
        if raw.is_empty() || !self.directory.contains(raw) {
            debug!(input = raw, "rejected location");
            return Err(ValidationError::UnknownLocation(raw.to_string()));
        }

        Ok(Location::new(raw))
    }

    pub fn directory(&self) -> &D {
        &self.directory
    }
}
