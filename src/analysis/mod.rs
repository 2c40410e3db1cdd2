/// Time-series analysis for the forecast pipeline.
///
/// Submodules:
/// - `features`   - fixed feature layout and feature vectors
/// - `series`     - raw readings → hourly aligned table with lag features
/// - `simulation` - synthetic flood-wave and flash-rise scenarios

pub mod features;
pub mod series;
pub mod simulation;
