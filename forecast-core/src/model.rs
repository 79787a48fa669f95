use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// A place that passed validation and can be looked up.
///
/// Only [`crate::LocationValidator`] hands these out, so holding one means the
/// identifier is non-empty and belonged to the recognised set at the time.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Location(String);

impl Location {
    pub(crate) fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemperatureUnit {
    Celsius,
    Fahrenheit,
}

impl TemperatureUnit {
    pub fn symbol(&self) -> &'static str {
        match self {
            TemperatureUnit::Celsius => "°C",
            TemperatureUnit::Fahrenheit => "°F",
        }
    }
}

impl fmt::Display for TemperatureUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for TemperatureUnit {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_lowercase().as_str() {
            "c" | "celsius" => Ok(TemperatureUnit::Celsius),
            "f" | "fahrenheit" => Ok(TemperatureUnit::Fahrenheit),
            _ => Err(anyhow::anyhow!(
                "Unknown temperature unit '{value}'. Supported units: celsius, fahrenheit."
            )),
        }
    }
}

/// A single temperature observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TemperatureReading {
    pub value: f64,
    pub unit: TemperatureUnit,
}

impl TemperatureReading {
    pub fn new(value: f64, unit: TemperatureUnit) -> Self {
        Self { value, unit }
    }

    pub fn celsius(value: f64) -> Self {
        Self::new(value, TemperatureUnit::Celsius)
    }

    pub fn fahrenheit(value: f64) -> Self {
        Self::new(value, TemperatureUnit::Fahrenheit)
    }

    /// Magnitude expressed in degrees Celsius, whatever unit it was read in.
    pub fn to_celsius(&self) -> f64 {
        match self.unit {
            TemperatureUnit::Celsius => self.value,
            TemperatureUnit::Fahrenheit => (self.value - 32.0) * 5.0 / 9.0,
        }
    }
}

impl fmt::Display for TemperatureReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.value, self.unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_parses_short_and_long_names() {
        assert_eq!("C".parse::<TemperatureUnit>().unwrap(), TemperatureUnit::Celsius);
        assert_eq!("fahrenheit".parse::<TemperatureUnit>().unwrap(), TemperatureUnit::Fahrenheit);

        let err = "kelvin".parse::<TemperatureUnit>().unwrap_err();
        assert!(err.to_string().contains("Unknown temperature unit"));
    }

    #[test]
    fn fahrenheit_converts_to_celsius() {
        assert_eq!(TemperatureReading::fahrenheit(212.0).to_celsius(), 100.0);
        assert_eq!(TemperatureReading::fahrenheit(32.0).to_celsius(), 0.0);
        assert_eq!(TemperatureReading::celsius(-4.5).to_celsius(), -4.5);
    }

    #[test]
    fn reading_display_uses_unit_symbol() {
        assert_eq!(TemperatureReading::celsius(35.0).to_string(), "35°C");
        assert_eq!(TemperatureReading::fahrenheit(59.5).to_string(), "59.5°F");
    }

    #[test]
    fn reading_deserializes_lowercase_unit() {
        let reading: TemperatureReading =
            serde_json::from_str(r#"{"value": 7.0, "unit": "celsius"}"#).unwrap();
        assert_eq!(reading, TemperatureReading::celsius(7.0));
    }
}
