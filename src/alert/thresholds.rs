/// Flood risk threshold checking.
///
/// Maps a water level at a station to a discrete risk tier. Comparisons are
/// inclusive at both boundaries: a level exactly at the critical line is
/// critical, exactly at the warning line is a warning.

use std::collections::HashMap;

use crate::model::{RiskAssessment, RiskTier, StationThresholds};

/// Per-station thresholds with a designated fallback station.
///
/// Lookups never fail: a station without its own entry is judged against the
/// fallback (target) station's thresholds.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdTable {
    by_station: HashMap<String, StationThresholds>,
    fallback: StationThresholds,
}

impl ThresholdTable {
    /// Builds a table whose fallback is `default_station`'s entry. If that
    /// station has no entry the lowest warning pair in the table is used, so
    /// an unknown station errs toward alerting.
    pub fn new(by_station: HashMap<String, StationThresholds>, default_station: &str) -> Self {
        let fallback = by_station
            .get(default_station)
            .copied()
            .or_else(|| {
                by_station
                    .values()
                    .copied()
                    .min_by(|a, b| a.warning_level_m.total_cmp(&b.warning_level_m))
            })
            .unwrap_or(StationThresholds {
                warning_level_m: f64::INFINITY,
                critical_level_m: f64::INFINITY,
            });
        Self { by_station, fallback }
    }

    /// Thresholds for `station_id`, or the fallback when it has none.
    pub fn for_station(&self, station_id: &str) -> StationThresholds {
        self.by_station
            .get(station_id)
            .copied()
            .unwrap_or(self.fallback)
    }

    pub fn contains(&self, station_id: &str) -> bool {
        self.by_station.contains_key(station_id)
    }
}

/// Classifies a level against explicit thresholds.
pub fn classify(level_m: f64, thresholds: &StationThresholds) -> RiskTier {
    if level_m >= thresholds.critical_level_m {
        RiskTier::Critical
    } else if level_m >= thresholds.warning_level_m {
        RiskTier::Warning
    } else {
        RiskTier::Normal
    }
}

/// Evaluates the flood risk of `level_m` at `station_id`.
///
/// Unknown stations degrade to the table's fallback thresholds; this never
/// errors. The status text is the subscriber-facing label for the tier.
pub fn evaluate_flood_risk(
    level_m: f64,
    station_id: &str,
    table: &ThresholdTable,
) -> RiskAssessment {
    let tier = classify(level_m, &table.for_station(station_id));
    RiskAssessment {
        tier,
        status: tier.thai_label().to_string(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
