/// flomon_forecast: Mun River flood forecasting for Ubon Ratchathani.
///
/// # Module structure
///
/// ```text
/// flomon_forecast
/// ├── model       - shared data types (Reading, RiskTier, HybridDecision, ...)
/// ├── config      - forecast configuration loader (forecast.toml)
/// ├── stations    - reference gauge registry with RID flood thresholds
/// ├── logging     - tracing subscriber setup for the binaries
/// ├── cli         - arguments shared by the binaries
/// ├── db          - PostgreSQL connection + reading store validation
/// ├── ingest
/// │   ├── postgres - water_levels queries
/// │   └── fixtures (test only) - representative reading exports
/// ├── alert
/// │   ├── thresholds - per-station risk tier evaluation
/// │   └── notify     - alert formatting + dispatcher boundary
/// ├── analysis
/// │   ├── features   - fixed feature layout (stations × lags)
/// │   ├── series     - readings → hourly aligned table with lag features
/// │   └── simulation - synthetic flood wave and flash-rise scenarios
/// └── forecast
///     ├── regression - ordinary least squares + fit metrics
///     ├── artifact   - versioned model artifacts, atomic file store
///     ├── trainer    - model training, cross validation, horizon sweep
///     ├── overrides  - flash-rise and backwater rules
///     └── predictor  - hybrid decision engine
/// ```

/// Public modules
pub mod alert;
pub mod analysis;
pub mod cli;
pub mod config;
pub mod db;
pub mod forecast;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod stations;
