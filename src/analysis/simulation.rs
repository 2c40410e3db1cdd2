/// Synthetic scenarios for exercising the forecast pipeline.
///
/// Historical data for the Mun basin contains few floods, so the offline
/// evaluation injects a Gaussian flood wave that travels downstream, and a
/// single-hour upstream jump that the regression model has never seen.

use chrono::{DateTime, Duration, Utc};

use crate::model::Reading;

/// Width of the reference flood wave, hours (one standard deviation).
pub const REFERENCE_WAVE_WIDTH_HOURS: f64 = 48.0;

/// Height of the reference flash-rise jump, metres.
pub const REFERENCE_FLASH_RISE_M: f64 = 1.5;

/// A Gaussian bump added to one station's levels.
#[derive(Debug, Clone, PartialEq)]
pub struct FloodWave {
    pub station_id: String,
    pub peak_m: f64,
    /// Delay of this station's peak after the wave centre.
    pub lag_hours: f64,
    pub width_hours: f64,
}

impl FloodWave {
    /// Level offset at `hours` after the wave centre.
    pub fn offset_at(&self, hours: f64) -> f64 {
        let x = hours - self.lag_hours;
        self.peak_m * (-(x * x) / (2.0 * self.width_hours * self.width_hours)).exp()
    }
}

/// The reference wave: upstream peaks first and highest, the city 12 h
/// later, the downstream gauge 20 h later.
pub fn reference_flood_waves(upstream: &str, target: &str, downstream: &str) -> Vec<FloodWave> {
    let wave = |station_id: &str, peak_m, lag_hours| FloodWave {
        station_id: station_id.to_string(),
        peak_m,
        lag_hours,
        width_hours: REFERENCE_WAVE_WIDTH_HOURS,
    };
    vec![
        wave(upstream, 5.5, 0.0),
        wave(target, 4.5, 12.0),
        wave(downstream, 4.0, 20.0),
    ]
}

/// Midpoint of the readings' time span.
pub fn midpoint(readings: &[Reading]) -> Option<DateTime<Utc>> {
    let first = readings.iter().map(|r| r.recorded_at).min()?;
    let last = readings.iter().map(|r| r.recorded_at).max()?;
    Some(first + (last - first) / 2)
}

/// Returns a copy of `readings` with every wave added around `center`.
///
/// Readings without a usable value pass through unchanged.
pub fn inject_flood_waves(
    readings: &[Reading],
    waves: &[FloodWave],
    center: DateTime<Utc>,
) -> Vec<Reading> {
    readings
        .iter()
        .map(|reading| {
            let Some(level) = reading.level() else {
                return reading.clone();
            };
            let hours = (reading.recorded_at - center).num_seconds() as f64 / 3600.0;
            let offset: f64 = waves
                .iter()
                .filter(|w| w.station_id == reading.station_id)
                .map(|w| w.offset_at(hours))
                .sum();
            Reading::new(&reading.station_id, reading.recorded_at, level + offset)
        })
        .collect()
}

/// Raises every reading of `station_id` in its most recent hour by `rise_m`,
/// so the prepared current value exceeds the 1 h lag by that much more.
pub fn inject_flash_rise(readings: &[Reading], station_id: &str, rise_m: f64) -> Vec<Reading> {
    let last = readings
        .iter()
        .filter(|r| r.station_id == station_id && r.level().is_some())
        .map(|r| r.recorded_at)
        .max();
    let Some(last) = last else {
        return readings.to_vec();
    };
    let hour_start = last - Duration::seconds(last.timestamp().rem_euclid(3600));

    readings
        .iter()
        .map(|r| match r.level() {
            Some(level) if r.station_id == station_id && r.recorded_at >= hour_start => {
                Reading::new(&r.station_id, r.recorded_at, level + rise_m)
            }
            _ => r.clone(),
        })
        .collect()
}
