/// Series preparation: raw readings → hourly aligned table with lag features.
///
/// Steps, in order:
///
/// 1. Drop readings for unmonitored stations and readings whose value cannot
///    be coerced to a finite number.
/// 2. Resolve duplicate (station, timestamp) pairs by keeping the latest
///    write, i.e. the last valid reading in input order.
/// 3. Bucket by UTC hour and average each station's readings per hour over
///    one contiguous hourly index (first to last populated hour).
/// 4. Linearly interpolate interior gaps, then copy the nearest known value
///    into leading and trailing gaps.
/// 5. Emit one row per hour that has L hours of prior history, holding the
///    current values and lags 1..=L for every station.
///
/// A station with no usable readings can never produce a complete row, so
/// the result is empty; so is any input shorter than L + 1 hours. Callers
/// treat an empty table as "insufficient data".

use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

use crate::analysis::features::{FeatureLayout, FeatureVector};
use crate::model::Reading;

const SECONDS_PER_HOUR: i64 = 3600;

// ---------------------------------------------------------------------------
// Aligned table
// ---------------------------------------------------------------------------

/// One prepared hour.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedRow {
    /// Start of the UTC hour this row describes.
    pub hour: DateTime<Utc>,
    pub features: FeatureVector,
}

/// Prepared table. Rows are strictly ascending and exactly one hour apart.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedTable {
    layout: FeatureLayout,
    rows: Vec<AlignedRow>,
}

impl AlignedTable {
    pub fn empty(layout: FeatureLayout) -> Self {
        Self { layout, rows: Vec::new() }
    }

    pub fn layout(&self) -> &FeatureLayout {
        &self.layout
    }

    pub fn rows(&self) -> &[AlignedRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The most recent row, used as the prediction input.
    pub fn latest(&self) -> Option<&AlignedRow> {
        self.rows.last()
    }

    /// A station's current aligned value for every row.
    pub fn current_values(&self, station_id: &str) -> Option<Vec<f64>> {
        let index = self.layout.current_index(station_id)?;
        Some(self.rows.iter().map(|r| r.features.values()[index]).collect())
    }

    /// First and last row hours.
    pub fn span(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        Some((self.rows.first()?.hour, self.rows.last()?.hour))
    }
}

// ---------------------------------------------------------------------------
// Preparation
// ---------------------------------------------------------------------------

/// Builds the aligned feature table for `layout` from raw readings.
pub fn prepare(readings: &[Reading], layout: &FeatureLayout) -> AlignedTable {
    let Some(grid) = hourly_means(readings, layout) else {
        debug!("No usable monitored readings");
        return AlignedTable::empty(layout.clone());
    };

    let mut columns = Vec::with_capacity(grid.columns.len());
    for (station, column) in layout.stations().iter().zip(grid.columns) {
        match fill_gaps(column) {
            Some(filled) => columns.push(filled),
            None => {
                debug!(station = %station, "Station has no usable readings, table is empty");
                return AlignedTable::empty(layout.clone());
            }
        }
    }

    let lag = layout.lag_hours();
    let mut rows = Vec::with_capacity(grid.hours.saturating_sub(lag));
    for t in lag..grid.hours {
        let Some(hour) = hour_start(grid.first_hour + t as i64) else {
            continue;
        };
        let mut values = Vec::with_capacity(layout.width());
        values.extend(columns.iter().map(|c| c[t]));
        for column in &columns {
            values.extend((1..=lag).map(|k| column[t - k]));
        }
        rows.push(AlignedRow {
            hour,
            features: FeatureVector::new(values),
        });
    }

    debug!(
        hours = grid.hours,
        rows = rows.len(),
        "Prepared aligned table"
    );
    AlignedTable {
        layout: layout.clone(),
        rows,
    }
}

/// Hourly means on a contiguous index. `columns[s][t]` is station `s`'s mean
/// for hour `first_hour + t`, or `None` when it had no readings that hour.
struct HourlyGrid {
    first_hour: i64,
    hours: usize,
    columns: Vec<Vec<Option<f64>>>,
}

fn hourly_means(readings: &[Reading], layout: &FeatureLayout) -> Option<HourlyGrid> {
    let positions: HashMap<&str, usize> = layout
        .stations()
        .iter()
        .enumerate()
        .map(|(i, s)| (s.as_str(), i))
        .collect();

    // Latest write wins per (station, timestamp). Ordered so that hourly
    // sums are accumulated in the same order on every run.
    let mut latest: BTreeMap<(usize, DateTime<Utc>), f64> = BTreeMap::new();
    let mut dropped = 0usize;
    for reading in readings {
        let Some(&pos) = positions.get(reading.station_id.as_str()) else {
            continue;
        };
        match reading.level() {
            Some(level) => {
                latest.insert((pos, reading.recorded_at), level);
            }
            None => dropped += 1,
        }
    }
    if dropped > 0 {
        debug!(dropped, "Dropped readings with missing or unparseable values");
    }

    let mut buckets: HashMap<(usize, i64), (f64, u32)> = HashMap::new();
    for (&(pos, recorded_at), &level) in &latest {
        let hour = recorded_at.timestamp().div_euclid(SECONDS_PER_HOUR);
        let entry = buckets.entry((pos, hour)).or_insert((0.0, 0));
        entry.0 += level;
        entry.1 += 1;
    }

    let first_hour = buckets.keys().map(|&(_, h)| h).min()?;
    let last_hour = buckets.keys().map(|&(_, h)| h).max()?;
    let hours = usize::try_from(last_hour - first_hour + 1).ok()?;

    let mut columns = vec![vec![None; hours]; layout.stations().len()];
    for ((pos, hour), (sum, count)) in buckets {
        columns[pos][(hour - first_hour) as usize] = Some(sum / f64::from(count));
    }

    Some(HourlyGrid {
        first_hour,
        hours,
        columns,
    })
}

/// Interpolates interior gaps linearly and fills the edges with the nearest
/// known value. Returns `None` if the column has no known values at all.
fn fill_gaps(column: Vec<Option<f64>>) -> Option<Vec<f64>> {
    let known: Vec<(usize, f64)> = column
        .iter()
        .enumerate()
        .filter_map(|(i, v)| v.map(|v| (i, v)))
        .collect();
    let &(first_i, first_v) = known.first()?;
    let &(last_i, last_v) = known.last()?;

    let mut filled = vec![0.0; column.len()];
    filled[..=first_i].fill(first_v);
    filled[last_i..].fill(last_v);

    for pair in known.windows(2) {
        let (i0, v0) = pair[0];
        let (i1, v1) = pair[1];
        let span = (i1 - i0) as f64;
        for i in i0..=i1 {
            filled[i] = v0 + (v1 - v0) * (i - i0) as f64 / span;
        }
    }

    Some(filled)
}

fn hour_start(hour: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(hour.checked_mul(SECONDS_PER_HOUR)?, 0)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 9, 28, 0, 0, 0).unwrap()
    }

    fn at(hours: i64, minutes: i64) -> DateTime<Utc> {
        t0() + Duration::hours(hours) + Duration::minutes(minutes)
    }

    fn layout(stations: &[&str], lag: usize) -> FeatureLayout {
        FeatureLayout::new(stations.iter().map(|s| s.to_string()).collect(), lag)
    }

    fn steady(station: &str, hours: i64, level: f64) -> Vec<Reading> {
        (0..hours).map(|h| Reading::new(station, at(h, 0), level)).collect()
    }

    // --- Hourly means and gap filling ---------------------------------------

    #[test]
    fn test_fill_gaps_interpolates_interior_and_copies_edges() {
        let filled = fill_gaps(vec![None, Some(1.0), None, None, Some(4.0), None]).unwrap();
        assert_eq!(filled, vec![1.0, 1.0, 2.0, 3.0, 4.0, 4.0]);
    }

    #[test]
    fn test_fill_gaps_all_missing_is_none() {
        assert_eq!(fill_gaps(vec![None, None]), None);
    }

    #[test]
    fn test_readings_within_an_hour_are_averaged() {
        let layout = layout(&["A"], 1);
        let readings = vec![
            Reading::new("A", at(0, 0), 1.0),
            Reading::new("A", at(1, 10), 2.0),
            Reading::new("A", at(1, 50), 4.0),
        ];
        let table = prepare(&readings, &layout);
        assert_eq!(table.len(), 1);
        let row = &table.rows()[0];
        assert_eq!(row.hour, at(1, 0));
        assert_eq!(row.features.values(), &[3.0, 1.0]);
    }

    #[test]
    fn test_duplicate_timestamp_prefers_latest_write() {
        let layout = layout(&["A"], 1);
        let readings = vec![
            Reading::new("A", at(0, 0), 1.0),
            Reading::new("A", at(1, 0), 5.0),
            Reading::new("A", at(1, 0), 2.0),
        ];
        let table = prepare(&readings, &layout);
        assert_eq!(table.rows()[0].features.values()[0], 2.0, "second write should win");
    }

    #[test]
    fn test_unparseable_duplicate_does_not_replace_valid_value() {
        let layout = layout(&["A"], 1);
        let readings = vec![
            Reading::new("A", at(0, 0), 1.0),
            Reading::new("A", at(1, 0), 2.0),
            Reading::text("A", at(1, 0), "-"),
        ];
        let table = prepare(&readings, &layout);
        assert_eq!(table.rows()[0].features.values()[0], 2.0);
    }

    // --- Row construction ----------------------------------------------------

    #[test]
    fn test_lag_columns_hold_prior_hours() {
        let layout = layout(&["A", "B"], 2);
        let mut readings: Vec<Reading> =
            (0..4).map(|h| Reading::new("A", at(h, 0), h as f64)).collect();
        readings.extend((0..4).map(|h| Reading::new("B", at(h, 0), 10.0 + h as f64)));

        let table = prepare(&readings, &layout);
        assert_eq!(table.len(), 2, "leading L hours are trimmed");
        let last = table.latest().unwrap();
        assert_eq!(last.hour, at(3, 0));
        // [A, B, A_lag1h, A_lag2h, B_lag1h, B_lag2h]
        assert_eq!(last.features.values(), &[3.0, 13.0, 2.0, 1.0, 12.0, 11.0]);
    }

    #[test]
    fn test_rows_are_consecutive_hours_without_duplicates() {
        let layout = layout(&["A", "B"], 3);
        let readings = vec![
            Reading::new("A", at(0, 5), 1.0),
            Reading::new("A", at(9, 30), 10.0),
            Reading::new("B", at(4, 0), 7.0),
            Reading::new("B", at(4, 0), 7.5),
        ];
        let table = prepare(&readings, &layout);
        assert_eq!(table.len(), 10 - 3);
        for pair in table.rows().windows(2) {
            assert_eq!(pair[1].hour - pair[0].hour, Duration::hours(1));
        }
        assert!(table.rows().iter().all(|r| r.features.len() == layout.width()));
        assert!(
            table
                .rows()
                .iter()
                .all(|r| r.features.values().iter().all(|v| v.is_finite()))
        );
    }

    #[test]
    fn test_interior_gap_is_interpolated_in_current_values() {
        let layout = layout(&["A"], 1);
        let readings = vec![
            Reading::new("A", at(0, 0), 100.0),
            Reading::new("A", at(4, 0), 104.0),
        ];
        let table = prepare(&readings, &layout);
        assert_eq!(
            table.current_values("A").unwrap(),
            vec![101.0, 102.0, 103.0, 104.0]
        );
    }

    #[test]
    fn test_unmonitored_and_bad_readings_are_ignored() {
        let layout = layout(&["A"], 1);
        let mut readings = steady("A", 3, 5.0);
        readings.push(Reading::new("OTHER", at(10, 0), 99.0));
        readings.push(Reading::text("A", at(1, 0), "n/a"));
        readings.push(Reading::missing("A", at(2, 0)));
        let table = prepare(&readings, &layout);
        assert_eq!(table.len(), 2, "OTHER must not extend the index");
        assert!(table.rows().iter().all(|r| r.features.values() == [5.0, 5.0]));
    }

    // --- Insufficient data ---------------------------------------------------

    #[test]
    fn test_empty_input_gives_empty_table() {
        assert!(prepare(&[], &layout(&["A"], 3)).is_empty());
    }

    #[test]
    fn test_fewer_than_lag_plus_one_hours_gives_empty_table() {
        let layout = layout(&["A"], 3);
        assert!(prepare(&steady("A", 3, 1.0), &layout).is_empty());
        assert_eq!(prepare(&steady("A", 4, 1.0), &layout).len(), 1);
    }

    #[test]
    fn test_station_without_readings_gives_empty_table() {
        let layout = layout(&["A", "B"], 1);
        let mut readings = steady("A", 6, 1.0);
        readings.push(Reading::text("B", at(2, 0), ""));
        assert!(prepare(&readings, &layout).is_empty());
    }

    #[test]
    fn test_prepare_is_idempotent() {
        let layout = layout(&["A", "B"], 3);
        let mut readings = steady("A", 12, 3.0);
        readings.push(Reading::new("B", at(2, 17), 8.0));
        readings.push(Reading::new("B", at(7, 45), 9.0));
        assert_eq!(prepare(&readings, &layout), prepare(&readings, &layout));
    }
}
