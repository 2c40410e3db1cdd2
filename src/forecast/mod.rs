/// Forecasting: regression, model artifacts, training and hybrid prediction.
///
/// Expected conditions (not enough data, no model yet) are outcome variants;
/// `ForecastError` is reserved for faults the caller cannot fix by waiting,
/// such as an unreadable artifact or an unreachable reading store.

pub mod artifact;
pub mod overrides;
pub mod predictor;
pub mod regression;
pub mod trainer;

use std::fmt;
use thiserror::Error;

use crate::forecast::artifact::{ArtifactError, ArtifactHandle};
use crate::forecast::regression::{FitMetrics, RegressionError};
use crate::ingest::SourceError;
use crate::model::HybridDecision;

#[derive(Debug, Error)]
pub enum ForecastError {
    #[error(transparent)]
    Artifact(#[from] ArtifactError),
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error("regression failed: {0}")]
    Regression(#[from] RegressionError),
}

// ---------------------------------------------------------------------------
// Training outcome
// ---------------------------------------------------------------------------

/// Why training produced no model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsufficientData {
    /// No readings for any monitored station.
    NoReadings,
    /// Readings exist but no complete aligned row could be built.
    NoAlignedRows,
    /// Aligned rows exist but none has a target `horizon` hours later.
    NoTargetRows,
}

impl fmt::Display for InsufficientData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            InsufficientData::NoReadings => "no readings for the monitored stations",
            InsufficientData::NoAlignedRows => "not enough aligned history to build features",
            InsufficientData::NoTargetRows => "history is shorter than the forecast horizon",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrainingReport {
    pub handle: ArtifactHandle,
    pub samples: usize,
    pub in_sample: FitMetrics,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TrainOutcome {
    Trained(TrainingReport),
    InsufficientData(InsufficientData),
}

// ---------------------------------------------------------------------------
// Prediction outcome
// ---------------------------------------------------------------------------

/// Why no decision could be made right now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unavailable {
    NoModel,
    InsufficientRecentData,
    /// The stored model was trained for a different station set, target or
    /// horizon; retraining is required.
    IncompatibleModel(String),
}

impl fmt::Display for Unavailable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Unavailable::NoModel => f.write_str("no model trained yet"),
            Unavailable::InsufficientRecentData => f.write_str("insufficient recent data"),
            Unavailable::IncompatibleModel(detail) => {
                write!(f, "model does not match configuration ({detail}); retrain required")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PredictionOutcome {
    Decision(HybridDecision),
    Unavailable(Unavailable),
}

impl PredictionOutcome {
    pub fn decision(&self) -> Option<&HybridDecision> {
        match self {
            PredictionOutcome::Decision(decision) => Some(decision),
            PredictionOutcome::Unavailable(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_messages() {
        assert_eq!(Unavailable::NoModel.to_string(), "no model trained yet");
        assert_eq!(
            Unavailable::InsufficientRecentData.to_string(),
            "insufficient recent data"
        );
        assert!(
            Unavailable::IncompatibleModel("x".into())
                .to_string()
                .contains("retrain")
        );
    }
}
