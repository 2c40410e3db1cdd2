/// Reference station registry for the Ubon Ratchathani forecast service.
///
/// Defines the gauge stations the reference deployment was built around,
/// along with their RID station codes and flood thresholds. The registry is
/// only the source of *defaults*: the live station set, order and thresholds
/// come from `forecast.toml` (see `config`), so retuning never requires a
/// rebuild.

use serde::Deserialize;

use crate::model::StationThresholds;

// ---------------------------------------------------------------------------
// Station metadata
// ---------------------------------------------------------------------------

/// Hydraulic role of a station relative to the forecast target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StationRole {
    /// Upstream warning station; feeds the flash-rise check.
    Upstream,
    /// The station whose level is forecast.
    Target,
    /// Downstream station; feeds the backwater check.
    Downstream,
    /// Monitored as a model feature only.
    Auxiliary,
}

/// Metadata for a single gauge station.
pub struct Station {
    /// ThaiWater station identifier used by the reading store.
    pub station_id: &'static str,
    /// Royal Irrigation Department gauge code.
    pub code: &'static str,
    /// Human-readable station name.
    pub name: &'static str,
    pub role: StationRole,
    pub thresholds: StationThresholds,
}

/// Stations monitored for the Mueang Ubon Ratchathani forecast, ordered
/// upstream to downstream. This order is also the default feature order.
pub static STATION_REGISTRY: &[Station] = &[
    Station {
        station_id: "TS2",
        code: "M.5",
        name: "Mun River at Rasi Salai, Sisaket",
        role: StationRole::Upstream,
        // Upstream of the city and sits higher; flood levels differ accordingly.
        thresholds: StationThresholds {
            warning_level_m: 119.00,
            critical_level_m: 120.00,
        },
    },
    Station {
        station_id: "TS16",
        code: "M.7",
        name: "Mun River at Mueang Ubon Ratchathani",
        role: StationRole::Target,
        thresholds: StationThresholds {
            warning_level_m: 110.00,
            critical_level_m: 112.00,
        },
    },
    Station {
        station_id: "TS5",
        code: "M.11B",
        name: "Mun River at Kaeng Saphue, Phibun Mangsahan",
        role: StationRole::Downstream,
        thresholds: StationThresholds {
            warning_level_m: 111.00,
            critical_level_m: 112.00,
        },
    },
];

/// Returns the identifiers of all registry stations in feature order.
pub fn all_station_ids() -> Vec<&'static str> {
    STATION_REGISTRY.iter().map(|s| s.station_id).collect()
}

/// Looks up a station by identifier. Returns `None` if not found.
pub fn find_station(station_id: &str) -> Option<&'static Station> {
    STATION_REGISTRY.iter().find(|s| s.station_id == station_id)
}

/// Returns the first registry station with the given role.
pub fn station_with_role(role: StationRole) -> Option<&'static Station> {
    STATION_REGISTRY.iter().find(|s| s.role == role)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
