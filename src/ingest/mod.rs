/// Reading store boundary.
///
/// The scrapers that populate the store live elsewhere; the forecast core
/// only reads. `ReadingSource` is the seam: PostgreSQL in production, a JSON
/// export or an in-memory list for offline runs and tests.
///
/// Submodules:
/// - `postgres` - `water_levels` queries
/// - `fixtures` (test only) - representative JSON exports

pub mod postgres;

#[cfg(test)]
pub(crate) mod fixtures;

use chrono::{DateTime, Utc};
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::model::Reading;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse readings in {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("reading store query failed: {0}")]
    Database(#[from] ::postgres::Error),
}

/// Which readings to fetch. Bounds are `since <= recorded_at < until`;
/// `None` leaves that side open.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadingQuery {
    pub stations: Vec<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl ReadingQuery {
    /// All history for `stations`.
    pub fn all(stations: Vec<String>) -> Self {
        Self { stations, since: None, until: None }
    }

    /// The `hours` before `now`, up to and including `now`'s hour.
    pub fn recent(stations: Vec<String>, now: DateTime<Utc>, hours: u32) -> Self {
        Self {
            stations,
            since: Some(now - chrono::Duration::hours(i64::from(hours))),
            until: Some(now + chrono::Duration::seconds(1)),
        }
    }

    pub fn matches(&self, reading: &Reading) -> bool {
        self.stations.iter().any(|s| *s == reading.station_id)
            && self.since.is_none_or(|since| reading.recorded_at >= since)
            && self.until.is_none_or(|until| reading.recorded_at < until)
    }
}

/// A queryable store of water level readings.
pub trait ReadingSource {
    /// Readings matching `query`, oldest first. Within one timestamp, later
    /// writes come after earlier ones.
    fn fetch(&mut self, query: &ReadingQuery) -> Result<Vec<Reading>, SourceError>;
}

/// Readings held in memory, e.g. loaded from a JSON export.
#[derive(Debug, Clone, Default)]
pub struct InMemoryReadings {
    readings: Vec<Reading>,
}

impl InMemoryReadings {
    pub fn new(readings: Vec<Reading>) -> Self {
        Self { readings }
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    /// Timestamp of the newest reading, if any.
    pub fn latest_timestamp(&self) -> Option<DateTime<Utc>> {
        self.readings.iter().map(|r| r.recorded_at).max()
    }
}

impl ReadingSource for InMemoryReadings {
    fn fetch(&mut self, query: &ReadingQuery) -> Result<Vec<Reading>, SourceError> {
        let mut matched: Vec<Reading> = self
            .readings
            .iter()
            .filter(|r| query.matches(r))
            .cloned()
            .collect();
        // Stable: input order is the write order within a timestamp.
        matched.sort_by_key(|r| r.recorded_at);
        Ok(matched)
    }
}

/// Parses a JSON array of readings.
pub fn parse_readings_json(json: &str, origin: &str) -> Result<Vec<Reading>, SourceError> {
    serde_json::from_str(json).map_err(|source| SourceError::Parse {
        path: origin.to_string(),
        source,
    })
}

/// Loads a JSON export (array of `{station_id, recorded_at, water_level}`).
pub fn load_readings_json(path: &Path) -> Result<InMemoryReadings, SourceError> {
    let contents = fs::read_to_string(path).map_err(|source| SourceError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let readings = parse_readings_json(&contents, &path.display().to_string())?;
    Ok(InMemoryReadings::new(readings))
}
