use std::{cmp::Ordering, collections::BTreeMap};

use crate::model::{Location, TemperatureReading};

/// Latest reading per location, with a "hottest so far" query.
///
/// Readings are compared in Celsius, so 95°F outranks 30°C. When two entries
/// are equally hot the alphabetically first location wins.
#[derive(Debug, Clone, Default)]
pub struct RankingCache {
    entries: BTreeMap<Location, TemperatureReading>,
}

impl RankingCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite the reading for `location`. Last write wins.
    pub fn update(&mut self, location: Location, reading: TemperatureReading) {
        self.entries.insert(location, reading);
    }

    pub fn best(&self) -> Option<(&Location, &TemperatureReading)> {
        // Iteration is in location order; keeping the first of equals gives the tie-break.
        self.entries.iter().fold(None, |best, candidate| match best {
            Some(current) if compare(candidate.1, current.1) != Ordering::Greater => Some(current),
            _ => Some(candidate),
        })
    }

    pub fn get(&self, location: &Location) -> Option<&TemperatureReading> {
        self.entries.get(location)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Location, &TemperatureReading)> {
        self.entries.iter()
    }
}

fn compare(a: &TemperatureReading, b: &TemperatureReading) -> Ordering {
    a.to_celsius().total_cmp(&b.to_celsius())
}
