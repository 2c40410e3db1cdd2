/// Forecast configuration loader - parses forecast.toml
///
/// Separates station thresholds, the monitored station set and rule-override
/// tuning from code, so thresholds can be retuned or stations added without
/// recompiling or retraining logic changes.
///
/// # Resolution order
///
/// 1. `FLOMON_FORECAST_CONFIG` environment variable (path to a TOML file)
/// 2. `forecast.toml` in the current working directory
/// 3. Built-in defaults derived from `stations::STATION_REGISTRY`
///
/// `FLOMON_MODEL_PATH`, when set, replaces `forecast.model_path` after the
/// file is loaded.

use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

use crate::alert::thresholds::ThresholdTable;
use crate::analysis::features::FeatureLayout;
use crate::model::StationThresholds;
use crate::stations::{self, STATION_REGISTRY, StationRole};

pub const CONFIG_ENV_VAR: &str = "FLOMON_FORECAST_CONFIG";
pub const MODEL_PATH_ENV_VAR: &str = "FLOMON_MODEL_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "forecast.toml";
pub const DEFAULT_MODEL_PATH: &str = "trained_model.json";

const DEFAULT_HORIZON_HOURS: u32 = 6;
const DEFAULT_LAG_HOURS: u32 = 3;
const DEFAULT_RECENT_WINDOW_HOURS: u32 = 12;
const DEFAULT_RISE_THRESHOLD_M: f64 = 0.5;
const DEFAULT_BACKWATER_DIFF_THRESHOLD_M: f64 = 0.5;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

// ---------------------------------------------------------------------------
// File structures
// ---------------------------------------------------------------------------

/// One `[[station]]` entry in forecast.toml.
#[derive(Debug, Clone, Deserialize)]
pub struct StationConfig {
    pub station_id: String,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_role")]
    pub role: StationRole,
    pub warning_level_m: f64,
    pub critical_level_m: f64,
}

fn default_role() -> StationRole {
    StationRole::Auxiliary
}

impl From<&StationConfig> for StationThresholds {
    fn from(config: &StationConfig) -> Self {
        StationThresholds {
            warning_level_m: config.warning_level_m,
            critical_level_m: config.critical_level_m,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ForecastSection {
    target_station: Option<String>,
    horizon_hours: Option<u32>,
    lag_hours: Option<u32>,
    recent_window_hours: Option<u32>,
    model_path: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OverridesSection {
    upstream_station: Option<String>,
    downstream_station: Option<String>,
    rise_threshold_m: Option<f64>,
    backwater_level_trigger_m: Option<f64>,
    backwater_diff_threshold_m: Option<f64>,
}

/// Root structure for TOML parsing.
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    forecast: ForecastSection,
    #[serde(default)]
    overrides: OverridesSection,
    #[serde(default)]
    station: Vec<StationConfig>,
}

// ---------------------------------------------------------------------------
// Resolved configuration
// ---------------------------------------------------------------------------

/// Tuning for the deterministic override rules.
///
/// A check whose station is `None` is disabled.
#[derive(Debug, Clone, PartialEq)]
pub struct OverrideRules {
    pub upstream_station: Option<String>,
    pub downstream_station: Option<String>,
    /// Flash-rise fires when upstream(now) - upstream(1h ago) exceeds this.
    pub rise_threshold_m: f64,
    /// Backwater check only applies while the target is above this level.
    pub backwater_level_trigger_m: f64,
    /// Backwater fires when target - downstream falls below this.
    pub backwater_diff_threshold_m: f64,
}

/// Fully resolved and validated forecast configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastConfig {
    /// Monitored stations, in feature order.
    pub stations: Vec<StationConfig>,
    pub target_station: String,
    pub horizon_hours: u32,
    pub lag_hours: u32,
    /// How much recent history the predictor fetches before building features.
    pub recent_window_hours: u32,
    pub model_path: PathBuf,
    pub overrides: OverrideRules,
}

impl PartialEq for StationConfig {
    fn eq(&self, other: &Self) -> bool {
        self.station_id == other.station_id
            && self.role == other.role
            && self.warning_level_m == other.warning_level_m
            && self.critical_level_m == other.critical_level_m
    }
}

impl Default for ForecastConfig {
    /// Configuration matching the reference deployment (TS2 → TS16 → TS5).
    fn default() -> Self {
        let stations: Vec<StationConfig> = STATION_REGISTRY
            .iter()
            .map(|s| StationConfig {
                station_id: s.station_id.to_string(),
                code: Some(s.code.to_string()),
                name: Some(s.name.to_string()),
                role: s.role,
                warning_level_m: s.thresholds.warning_level_m,
                critical_level_m: s.thresholds.critical_level_m,
            })
            .collect();

        let role_id = |role: StationRole| {
            stations::station_with_role(role).map(|s| s.station_id.to_string())
        };
        let target_station = role_id(StationRole::Target).unwrap_or_default();
        let target_warning = stations::find_station(&target_station)
            .map(|s| s.thresholds.warning_level_m)
            .unwrap_or_default();

        ForecastConfig {
            stations,
            target_station,
            horizon_hours: DEFAULT_HORIZON_HOURS,
            lag_hours: DEFAULT_LAG_HOURS,
            recent_window_hours: DEFAULT_RECENT_WINDOW_HOURS,
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            overrides: OverrideRules {
                upstream_station: role_id(StationRole::Upstream),
                downstream_station: role_id(StationRole::Downstream),
                rise_threshold_m: DEFAULT_RISE_THRESHOLD_M,
                backwater_level_trigger_m: target_warning,
                backwater_diff_threshold_m: DEFAULT_BACKWATER_DIFF_THRESHOLD_M,
            },
        }
    }
}

impl ForecastConfig {
    /// Loads configuration following the documented resolution order.
    ///
    /// A file that exists but fails to load is an error: silently falling
    /// back to defaults would forecast against the wrong thresholds.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            let config = Self::load_from_file(Path::new(&path))?;
            info!(path = %path, "Loaded forecast config from {}", CONFIG_ENV_VAR);
            config
        } else if Path::new(DEFAULT_CONFIG_PATH).exists() {
            let config = Self::load_from_file(Path::new(DEFAULT_CONFIG_PATH))?;
            info!(path = DEFAULT_CONFIG_PATH, "Loaded forecast config");
            config
        } else {
            warn!("No {} found, using built-in station defaults", DEFAULT_CONFIG_PATH);
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Applies `FLOMON_MODEL_PATH`, if set.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(model_path) = std::env::var(MODEL_PATH_ENV_VAR) {
            info!(path = %model_path, "Model path overridden by {}", MODEL_PATH_ENV_VAR);
            self.model_path = PathBuf::from(model_path);
        }
    }

    /// Loads and validates a specific TOML file.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&contents, &path.display().to_string())
    }

    /// Parses and validates configuration text. `origin` names the source
    /// in error messages.
    pub fn from_toml_str(contents: &str, origin: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(contents).map_err(|source| ConfigError::Parse {
            path: origin.to_string(),
            source,
        })?;
        resolve(file)
    }

    /// Monitored station identifiers, in feature order.
    pub fn monitored_station_ids(&self) -> Vec<String> {
        self.stations.iter().map(|s| s.station_id.clone()).collect()
    }

    /// Looks up a monitored station by identifier.
    pub fn station(&self, station_id: &str) -> Option<&StationConfig> {
        self.stations.iter().find(|s| s.station_id == station_id)
    }

    /// Feature layout implied by the monitored stations and lag depth.
    pub fn feature_layout(&self) -> FeatureLayout {
        FeatureLayout::new(self.monitored_station_ids(), self.lag_hours as usize)
    }

    /// Per-station thresholds with the target station as fallback.
    pub fn threshold_table(&self) -> ThresholdTable {
        let by_station: HashMap<String, StationThresholds> = self
            .stations
            .iter()
            .map(|s| (s.station_id.clone(), StationThresholds::from(s)))
            .collect();
        ThresholdTable::new(by_station, &self.target_station)
    }
}

// ---------------------------------------------------------------------------
// Resolution + validation
// ---------------------------------------------------------------------------

fn resolve(file: ConfigFile) -> Result<ForecastConfig, ConfigError> {
    let stations = file.station;
    if stations.is_empty() {
        return Err(ConfigError::Invalid(
            "at least one [[station]] must be configured".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for station in &stations {
        if station.station_id.trim().is_empty() {
            return Err(ConfigError::Invalid("station_id must not be empty".to_string()));
        }
        if !seen.insert(station.station_id.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "duplicate station_id '{}'",
                station.station_id
            )));
        }
        if !(station.warning_level_m < station.critical_level_m) {
            return Err(ConfigError::Invalid(format!(
                "{}: warning_level_m ({}) must be below critical_level_m ({})",
                station.station_id, station.warning_level_m, station.critical_level_m
            )));
        }
    }

    let by_role = |role: StationRole| {
        stations
            .iter()
            .find(|s| s.role == role)
            .map(|s| s.station_id.clone())
    };

    let target_station = file
        .forecast
        .target_station
        .or_else(|| by_role(StationRole::Target))
        .ok_or_else(|| {
            ConfigError::Invalid(
                "no target station: set forecast.target_station or give one station role = \"target\""
                    .to_string(),
            )
        })?;

    let upstream_station = file
        .overrides
        .upstream_station
        .or_else(|| by_role(StationRole::Upstream));
    let downstream_station = file
        .overrides
        .downstream_station
        .or_else(|| by_role(StationRole::Downstream));

    for (what, id) in [
        ("forecast.target_station", Some(&target_station)),
        ("overrides.upstream_station", upstream_station.as_ref()),
        ("overrides.downstream_station", downstream_station.as_ref()),
    ] {
        if let Some(id) = id {
            if !seen.contains(id.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "{what} '{id}' is not a monitored station"
                )));
            }
        }
    }

    let horizon_hours = file.forecast.horizon_hours.unwrap_or(DEFAULT_HORIZON_HOURS);
    let lag_hours = file.forecast.lag_hours.unwrap_or(DEFAULT_LAG_HOURS);
    let recent_window_hours = file
        .forecast
        .recent_window_hours
        .unwrap_or(DEFAULT_RECENT_WINDOW_HOURS);

    if horizon_hours == 0 {
        return Err(ConfigError::Invalid("horizon_hours must be at least 1".to_string()));
    }
    if lag_hours == 0 {
        return Err(ConfigError::Invalid("lag_hours must be at least 1".to_string()));
    }
    if recent_window_hours <= lag_hours {
        return Err(ConfigError::Invalid(format!(
            "recent_window_hours ({recent_window_hours}) must exceed lag_hours ({lag_hours})"
        )));
    }

    let target_warning = stations
        .iter()
        .find(|s| s.station_id == target_station)
        .map(|s| s.warning_level_m)
        .unwrap_or_default();

    let overrides = OverrideRules {
        upstream_station,
        downstream_station,
        rise_threshold_m: file
            .overrides
            .rise_threshold_m
            .unwrap_or(DEFAULT_RISE_THRESHOLD_M),
        backwater_level_trigger_m: file
            .overrides
            .backwater_level_trigger_m
            .unwrap_or(target_warning),
        backwater_diff_threshold_m: file
            .overrides
            .backwater_diff_threshold_m
            .unwrap_or(DEFAULT_BACKWATER_DIFF_THRESHOLD_M),
    };

    if !(overrides.rise_threshold_m >= 0.0) {
        return Err(ConfigError::Invalid(
            "overrides.rise_threshold_m must be non-negative".to_string(),
        ));
    }

    Ok(ForecastConfig {
        stations,
        target_station,
        horizon_hours,
        lag_hours,
        recent_window_hours,
        model_path: file
            .forecast
            .model_path
            .unwrap_or_else(|| PathBuf::from(DEFAULT_MODEL_PATH)),
        overrides,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [forecast]
        target_station = "TS16"
        horizon_hours = 6
        lag_hours = 3
        model_path = "models/ts16.json"

        [overrides]
        rise_threshold_m = 0.4
        backwater_level_trigger_m = 110.5
        backwater_diff_threshold_m = 0.25

        [[station]]
        station_id = "TS2"
        role = "upstream"
        warning_level_m = 119.0
        critical_level_m = 120.0

        [[station]]
        station_id = "TS16"
        role = "target"
        warning_level_m = 110.0
        critical_level_m = 112.0

        [[station]]
        station_id = "TS5"
        role = "downstream"
        warning_level_m = 111.0
        critical_level_m = 112.0
    "#;

    #[test]
    fn test_default_config_matches_reference_deployment() {
        let config = ForecastConfig::default();
        assert_eq!(config.monitored_station_ids(), vec!["TS2", "TS16", "TS5"]);
        assert_eq!(config.target_station, "TS16");
        assert_eq!(config.horizon_hours, 6);
        assert_eq!(config.lag_hours, 3);
        assert_eq!(config.recent_window_hours, 12);
        assert_eq!(config.overrides.upstream_station.as_deref(), Some("TS2"));
        assert_eq!(config.overrides.downstream_station.as_deref(), Some("TS5"));
        assert_eq!(config.overrides.rise_threshold_m, 0.5);
        assert_eq!(config.overrides.backwater_level_trigger_m, 110.0);
    }

    #[test]
    fn test_parse_sample_config() {
        let config = ForecastConfig::from_toml_str(SAMPLE, "sample").expect("sample should load");
        assert_eq!(config.model_path, PathBuf::from("models/ts16.json"));
        assert_eq!(config.overrides.rise_threshold_m, 0.4);
        assert_eq!(config.overrides.backwater_level_trigger_m, 110.5);
        assert_eq!(config.overrides.backwater_diff_threshold_m, 0.25);
        assert_eq!(config.feature_layout().width(), 12);
    }

    #[test]
    fn test_roles_fill_in_missing_station_references() {
        let text = r#"
            [[station]]
            station_id = "A"
            role = "upstream"
            warning_level_m = 5.0
            critical_level_m = 6.0

            [[station]]
            station_id = "B"
            role = "target"
            warning_level_m = 3.0
            critical_level_m = 4.0
        "#;
        let config = ForecastConfig::from_toml_str(text, "inline").expect("should load");
        assert_eq!(config.target_station, "B");
        assert_eq!(config.overrides.upstream_station.as_deref(), Some("A"));
        assert_eq!(config.overrides.downstream_station, None, "backwater check disabled");
    }

    #[test]
    fn test_rejects_inverted_thresholds() {
        let text = SAMPLE.replace("warning_level_m = 110.0", "warning_level_m = 113.0");
        let err = ForecastConfig::from_toml_str(&text, "inline").unwrap_err();
        assert!(err.to_string().contains("TS16"), "error should name the station: {err}");
    }

    #[test]
    fn test_rejects_unmonitored_target() {
        let text = SAMPLE.replace("target_station = \"TS16\"", "target_station = \"TS99\"");
        let err = ForecastConfig::from_toml_str(&text, "inline").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_rejects_duplicate_station() {
        let text = format!(
            "{SAMPLE}\n[[station]]\nstation_id = \"TS5\"\nwarning_level_m = 1.0\ncritical_level_m = 2.0\n"
        );
        let err = ForecastConfig::from_toml_str(&text, "inline").unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_rejects_zero_horizon() {
        let text = SAMPLE.replace("horizon_hours = 6", "horizon_hours = 0");
        assert!(ForecastConfig::from_toml_str(&text, "inline").is_err());
    }

    #[test]
    fn test_malformed_toml_is_parse_error() {
        let err = ForecastConfig::from_toml_str("[[station]\n", "broken.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("broken.toml"));
    }

    #[test]
    fn test_threshold_table_falls_back_to_target() {
        let config = ForecastConfig::default();
        let table = config.threshold_table();
        assert_eq!(table.for_station("XXX99").warning_level_m, 110.0);
        assert_eq!(table.for_station("TS2").warning_level_m, 119.0);
    }

    #[test]
    fn test_shipped_forecast_toml_matches_defaults() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join(DEFAULT_CONFIG_PATH);
        let config = ForecastConfig::load_from_file(&path).expect("forecast.toml should load");
        let defaults = ForecastConfig::default();

        assert_eq!(config.stations, defaults.stations);
        assert_eq!(config.target_station, defaults.target_station);
        assert_eq!(config.horizon_hours, defaults.horizon_hours);
        assert_eq!(config.lag_hours, defaults.lag_hours);
        assert_eq!(config.overrides.upstream_station, defaults.overrides.upstream_station);
        assert_eq!(config.overrides.downstream_station, defaults.overrides.downstream_station);
    }
}
