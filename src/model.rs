/// Core data types for the Mun River flood forecasting service.
///
/// This module defines the shared domain model imported by all other modules.
/// It contains no I/O, only types and the small amount of logic that belongs
/// to the types themselves (value coercion, tier ordering, labels).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Reading types
// ---------------------------------------------------------------------------

/// A water level value as delivered by the reading store.
///
/// Upstream providers are not consistent about types: most rows carry a
/// number, some scraped rows carry the provider's text verbatim ("-", "",
/// "112.4 "). Coercion to a usable level happens in `Reading::level`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawLevel {
    Number(f64),
    Text(String),
}

impl RawLevel {
    /// Coerces the raw value to a finite level in metres (MSL), or `None`
    /// if it cannot be interpreted as one.
    pub fn coerce(&self) -> Option<f64> {
        let value = match self {
            RawLevel::Number(v) => *v,
            RawLevel::Text(s) => s.trim().parse::<f64>().ok()?,
        };
        value.is_finite().then_some(value)
    }
}

/// A single water level observation for one station.
///
/// Readings are immutable once stored. A reading whose value is missing or
/// unparseable is kept as-is here; the series preparer treats it as absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub station_id: String,
    pub recorded_at: DateTime<Utc>,
    #[serde(default)]
    pub water_level: Option<RawLevel>,
}

impl Reading {
    /// Reading with a numeric level.
    pub fn new(station_id: &str, recorded_at: DateTime<Utc>, level_m: f64) -> Self {
        Self {
            station_id: station_id.to_string(),
            recorded_at,
            water_level: Some(RawLevel::Number(level_m)),
        }
    }

    /// Reading carrying the provider's raw text.
    pub fn text(station_id: &str, recorded_at: DateTime<Utc>, raw: &str) -> Self {
        Self {
            station_id: station_id.to_string(),
            recorded_at,
            water_level: Some(RawLevel::Text(raw.to_string())),
        }
    }

    /// Reading with no value (null in the store).
    pub fn missing(station_id: &str, recorded_at: DateTime<Utc>) -> Self {
        Self {
            station_id: station_id.to_string(),
            recorded_at,
            water_level: None,
        }
    }

    /// The usable level of this reading, if any.
    pub fn level(&self) -> Option<f64> {
        self.water_level.as_ref().and_then(RawLevel::coerce)
    }
}

// ---------------------------------------------------------------------------
// Threshold types
// ---------------------------------------------------------------------------

/// Warning and critical water levels for one station, in metres (MSL).
///
/// Invariant (enforced by config validation): warning < critical.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StationThresholds {
    pub warning_level_m: f64,
    pub critical_level_m: f64,
}

// ---------------------------------------------------------------------------
// Risk types
// ---------------------------------------------------------------------------

/// Discrete flood risk tier, in ascending order of severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskTier {
    Normal = 0,
    Warning = 1,
    Critical = 2,
}

impl RiskTier {
    /// Numeric tier as used by subscribers and the stored `risk_level` column.
    pub fn level(self) -> u8 {
        self as u8
    }

    /// Short English status.
    pub fn as_str(self) -> &'static str {
        match self {
            RiskTier::Normal => "normal",
            RiskTier::Warning => "warning",
            RiskTier::Critical => "critical",
        }
    }

    /// Subscriber-facing Thai status, as shown in the LINE alerts.
    pub fn thai_label(self) -> &'static str {
        match self {
            RiskTier::Normal => "ปกติ",
            RiskTier::Warning => "เฝ้าระวัง",
            RiskTier::Critical => "วิกฤต (น้ำล้นตลิ่ง)",
        }
    }
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of evaluating a level against a station's thresholds.
#[derive(Debug, Clone, PartialEq)]
pub struct RiskAssessment {
    pub tier: RiskTier,
    pub status: String,
}

// ---------------------------------------------------------------------------
// Decision types
// ---------------------------------------------------------------------------

/// A deterministic rule that escalated the model's assessment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum OverrideReason {
    /// Upstream station rose faster than the configured threshold in one hour.
    FlashRise {
        station_id: String,
        rise_m: f64,
        threshold_m: f64,
    },
    /// Target station is high and barely above the downstream station, so
    /// drainage is impeded.
    Backwater {
        target_level_m: f64,
        downstream_level_m: f64,
        difference_m: f64,
        threshold_m: f64,
    },
}

impl OverrideReason {
    /// Short reason text used in the composite status message.
    pub fn summary(&self) -> &'static str {
        match self {
            OverrideReason::FlashRise { .. } => "upstream rising fast",
            OverrideReason::Backwater { .. } => "drainage impeded / backwater",
        }
    }
}

impl fmt::Display for OverrideReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverrideReason::FlashRise { station_id, rise_m, threshold_m } => write!(
                f,
                "upstream rising fast: {} rose {:+.2} m in 1 h (threshold {:.2} m)",
                station_id, rise_m, threshold_m
            ),
            OverrideReason::Backwater {
                target_level_m,
                downstream_level_m,
                difference_m,
                threshold_m,
            } => write!(
                f,
                "drainage impeded / backwater: target {:.2} m vs downstream {:.2} m, \
                 difference {:.2} m (threshold {:.2} m)",
                target_level_m, downstream_level_m, difference_m, threshold_m
            ),
        }
    }
}

/// Final output of the hybrid decision engine.
///
/// `tier` is never lower than `model_tier`; when `overrides` is non-empty it
/// is at least `RiskTier::Warning` and `status` is the special-watch message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HybridDecision {
    pub station_id: String,
    pub predicted_level_m: f64,
    pub horizon_hours: u32,
    pub tier: RiskTier,
    pub model_tier: RiskTier,
    pub status: String,
    pub overrides: Vec<OverrideReason>,
    /// Hour of the feature row the prediction was made from.
    pub as_of: DateTime<Utc>,
    pub model_version: u64,
    pub model_trained_at: DateTime<Utc>,
}

impl HybridDecision {
    pub fn is_overridden(&self) -> bool {
        !self.overrides.is_empty()
    }

    /// The time the predicted level refers to.
    pub fn valid_at(&self) -> DateTime<Utc> {
        self.as_of + chrono::Duration::hours(i64::from(self.horizon_hours))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
