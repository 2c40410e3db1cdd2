/// Test fixtures: representative reading exports.
///
/// Shape matches `flomon_forecast --readings FILE` input, which is also what
/// a `water_levels` dump looks like after `json_agg`. Values arrive as
/// numbers, as strings copied verbatim from the provider, or as null.

/// Two hours for all three reference stations, with one duplicate write, one
/// dash placeholder and one null.
pub(crate) fn fixture_mixed_export_json() -> &'static str {
    r#"[
      { "station_id": "TS2",  "recorded_at": "2025-09-28T07:00:00Z", "water_level": 118.42 },
      { "station_id": "TS16", "recorded_at": "2025-09-28T07:00:00Z", "water_level": "109.87" },
      { "station_id": "TS5",  "recorded_at": "2025-09-28T07:00:00Z", "water_level": "-" },
      { "station_id": "TS2",  "recorded_at": "2025-09-28T08:00:00Z", "water_level": 118.51 },
      { "station_id": "TS2",  "recorded_at": "2025-09-28T08:00:00+07:00", "water_level": 118.30 },
      { "station_id": "TS16", "recorded_at": "2025-09-28T08:00:00Z", "water_level": 109.95 },
      { "station_id": "TS16", "recorded_at": "2025-09-28T08:00:00Z", "water_level": 109.97 },
      { "station_id": "TS5",  "recorded_at": "2025-09-28T08:00:00Z", "water_level": null }
    ]"#
}
