/// Hybrid decision engine.
///
/// Loads the current model, builds the latest feature row from recent
/// readings, predicts the target level `horizon` hours ahead, classifies it,
/// then lets the override rules escalate the result.

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::alert::thresholds::{ThresholdTable, evaluate_flood_risk};
use crate::analysis::features::FeatureLayout;
use crate::analysis::series::prepare;
use crate::config::ForecastConfig;
use crate::forecast::artifact::{ArtifactHandle, ArtifactStore};
use crate::forecast::overrides::{apply_overrides, check_overrides};
use crate::forecast::{ForecastError, PredictionOutcome, Unavailable};
use crate::ingest::{ReadingQuery, ReadingSource};
use crate::model::{HybridDecision, Reading};

pub struct Predictor<'a> {
    config: &'a ForecastConfig,
    store: &'a dyn ArtifactStore,
    layout: FeatureLayout,
    thresholds: ThresholdTable,
}

impl<'a> Predictor<'a> {
    pub fn new(config: &'a ForecastConfig, store: &'a dyn ArtifactStore) -> Self {
        Self {
            config,
            store,
            layout: config.feature_layout(),
            thresholds: config.threshold_table(),
        }
    }

    /// Handle of the artifact predictions would currently use.
    pub fn current_model(&self) -> Result<Option<ArtifactHandle>, ForecastError> {
        Ok(self
            .store
            .load()?
            .map(|artifact| artifact.handle(&self.store.describe())))
    }

    /// Produces a decision from `recent` readings, which should cover at
    /// least `lag_hours + 1` hours.
    pub fn predict(&self, recent: &[Reading]) -> Result<PredictionOutcome, ForecastError> {
        let Some(artifact) = self.store.load()? else {
            return Ok(unavailable(Unavailable::NoModel));
        };
        let target = self.config.target_station.as_str();
        if let Err(detail) =
            artifact.check_compatible(&self.layout, target, self.config.horizon_hours)
        {
            return Ok(unavailable(Unavailable::IncompatibleModel(detail)));
        }

        let table = prepare(recent, &self.layout);
        let Some(latest) = table.latest() else {
            return Ok(unavailable(Unavailable::InsufficientRecentData));
        };
        if latest.features.len() != self.layout.width() {
            return Ok(unavailable(Unavailable::InsufficientRecentData));
        }

        let predicted = artifact.predict(&latest.features)?;
        let model_assessment = evaluate_flood_risk(predicted, target, &self.thresholds);
        let model_tier = model_assessment.tier;

        let reasons = check_overrides(&latest.features, &self.layout, target, &self.config.overrides);
        let final_assessment = apply_overrides(model_assessment, &reasons);
        for reason in &reasons {
            warn!(station = %target, "Override fired: {}", reason);
        }

        let decision = HybridDecision {
            station_id: target.to_string(),
            predicted_level_m: predicted,
            horizon_hours: self.config.horizon_hours,
            tier: final_assessment.tier,
            model_tier,
            status: final_assessment.status,
            overrides: reasons,
            as_of: latest.hour,
            model_version: artifact.version,
            model_trained_at: artifact.trained_at,
        };
        info!(
            station = %decision.station_id,
            predicted = decision.predicted_level_m,
            tier = decision.tier.level(),
            model_tier = decision.model_tier.level(),
            version = decision.model_version,
            "Forecast decision"
        );
        Ok(PredictionOutcome::Decision(decision))
    }

    /// Fetches the last `recent_window_hours` of monitored readings up to
    /// `now` and predicts from them.
    pub fn predict_from_source(
        &self,
        source: &mut dyn ReadingSource,
        now: DateTime<Utc>,
    ) -> Result<PredictionOutcome, ForecastError> {
        let query = ReadingQuery::recent(
            self.config.monitored_station_ids(),
            now,
            self.config.recent_window_hours,
        );
        let readings = source.fetch(&query)?;
        self.predict(&readings)
    }
}

fn unavailable(reason: Unavailable) -> PredictionOutcome {
    warn!(reason = %reason, "Forecast unavailable");
    PredictionOutcome::Unavailable(reason)
}
