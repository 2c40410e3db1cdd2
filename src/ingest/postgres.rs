/// PostgreSQL reading source over the `water_levels` table.
///
/// `water_level` is `NUMERIC` and nullable; nulls become missing readings
/// rather than errors. Rows come back ordered by `(recorded_at,
/// water_level_id)` so that, for duplicate timestamps, the later insert is
/// the later reading.

use ::postgres::Client;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use tracing::debug;

use crate::ingest::{ReadingQuery, ReadingSource, SourceError};
use crate::model::{RawLevel, Reading};

const READINGS_SQL: &str = "
    SELECT station_id, recorded_at, water_level
    FROM water_levels
    WHERE station_id = ANY($1)
      AND recorded_at IS NOT NULL
      AND ($2::timestamptz IS NULL OR recorded_at >= $2)
      AND ($3::timestamptz IS NULL OR recorded_at < $3)
    ORDER BY recorded_at, water_level_id
";

pub struct PgReadingSource {
    client: Client,
}

impl PgReadingSource {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

/// Converts a stored NUMERIC to a raw level. Values outside f64 range are
/// kept as text so coercion drops them like any other bad value.
pub fn decimal_to_raw_level(value: Decimal) -> RawLevel {
    match value.to_f64() {
        Some(level) => RawLevel::Number(level),
        None => RawLevel::Text(value.to_string()),
    }
}

impl ReadingSource for PgReadingSource {
    fn fetch(&mut self, query: &ReadingQuery) -> Result<Vec<Reading>, SourceError> {
        let rows = self.client.query(
            READINGS_SQL,
            &[&query.stations, &query.since, &query.until],
        )?;

        let readings: Vec<Reading> = rows
            .iter()
            .map(|row| {
                let level: Option<Decimal> = row.get(2);
                Reading {
                    station_id: row.get(0),
                    recorded_at: row.get(1),
                    water_level: level.map(decimal_to_raw_level),
                }
            })
            .collect();

        debug!(
            stations = query.stations.len(),
            rows = readings.len(),
            "Fetched readings from water_levels"
        );
        Ok(readings)
    }
}
