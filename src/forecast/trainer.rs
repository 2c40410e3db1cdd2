/// Model training and offline diagnostics.
///
/// `Trainer::train` is the production path: prepare every reading, pair each
/// aligned row with the target station's value `horizon` hours later, fit on
/// all pairs, and replace the stored artifact. `cross_validate` and
/// `sweep_horizons` are diagnostics for the evaluation binary and never
/// touch the store.

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::analysis::features::FeatureVector;
use crate::analysis::series::{AlignedTable, prepare};
use crate::config::ForecastConfig;
use crate::forecast::artifact::{ARTIFACT_FORMAT_VERSION, ArtifactStore, ModelArtifact};
use crate::forecast::regression::{FitMetrics, LinearModel};
use crate::forecast::{ForecastError, InsufficientData, TrainOutcome, TrainingReport};
use crate::ingest::{ReadingQuery, ReadingSource};
use crate::model::Reading;

/// Folds used by `cross_validate` in the evaluation binary.
pub const DEFAULT_FOLDS: usize = 5;

/// Horizons compared by `sweep_horizons`.
pub const SWEEP_HORIZONS: [u32; 5] = [1, 3, 6, 12, 24];

/// Horizons with fewer examples than this are skipped by the sweep.
pub const MIN_SWEEP_EXAMPLES: usize = 50;

// ---------------------------------------------------------------------------
// Training examples
// ---------------------------------------------------------------------------

/// One supervised pair: features at `hour`, target level at `hour + H`.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingExample {
    pub hour: DateTime<Utc>,
    pub features: FeatureVector,
    pub target: f64,
}

/// Pairs every row with the target station's value `horizon` rows later.
///
/// Aligned rows are consecutive hours, so a row offset is an hour offset.
/// The trailing `horizon` rows have no target and are dropped.
pub fn build_training_set(
    table: &AlignedTable,
    target_station: &str,
    horizon_hours: u32,
) -> Vec<TrainingExample> {
    let Some(index) = table.layout().current_index(target_station) else {
        return Vec::new();
    };
    let horizon = horizon_hours as usize;
    let rows = table.rows();
    if horizon == 0 || rows.len() <= horizon {
        return Vec::new();
    }

    rows.iter()
        .zip(&rows[horizon..])
        .map(|(row, future)| TrainingExample {
            hour: row.hour,
            features: row.features.clone(),
            target: future.features.values()[index],
        })
        .collect()
}

fn fit_examples(examples: &[TrainingExample]) -> Result<LinearModel, ForecastError> {
    let rows: Vec<&[f64]> = examples.iter().map(|e| e.features.values()).collect();
    let targets: Vec<f64> = examples.iter().map(|e| e.target).collect();
    Ok(LinearModel::fit(&rows, &targets)?)
}

fn score(model: &LinearModel, examples: &[TrainingExample]) -> Result<Option<FitMetrics>, ForecastError> {
    let mut predicted = Vec::with_capacity(examples.len());
    for example in examples {
        predicted.push(model.predict(example.features.values())?);
    }
    let truth: Vec<f64> = examples.iter().map(|e| e.target).collect();
    Ok(FitMetrics::compute(&truth, &predicted))
}

// ---------------------------------------------------------------------------
// Trainer
// ---------------------------------------------------------------------------

pub struct Trainer<'a> {
    config: &'a ForecastConfig,
    store: &'a dyn ArtifactStore,
}

impl<'a> Trainer<'a> {
    pub fn new(config: &'a ForecastConfig, store: &'a dyn ArtifactStore) -> Self {
        Self { config, store }
    }

    /// Trains on `readings` and replaces the stored artifact.
    ///
    /// Too little history is reported as `TrainOutcome::InsufficientData`;
    /// the stored artifact is then left untouched.
    pub fn train(
        &self,
        readings: &[Reading],
        now: DateTime<Utc>,
    ) -> Result<TrainOutcome, ForecastError> {
        let layout = self.config.feature_layout();
        let target = self.config.target_station.as_str();

        if readings.is_empty() {
            return Ok(self.insufficient(InsufficientData::NoReadings));
        }
        let table = prepare(readings, &layout);
        if table.is_empty() {
            return Ok(self.insufficient(InsufficientData::NoAlignedRows));
        }
        let examples = build_training_set(&table, target, self.config.horizon_hours);
        let (Some(first), Some(last)) = (examples.first(), examples.last()) else {
            return Ok(self.insufficient(InsufficientData::NoTargetRows));
        };
        let (span_start, span_end) = (first.hour, last.hour);

        let model = fit_examples(&examples)?;
        let in_sample = score(&model, &examples)?.unwrap_or(FitMetrics {
            mae: 0.0,
            rmse: 0.0,
            r2: 1.0,
        });

        let artifact = ModelArtifact {
            format_version: ARTIFACT_FORMAT_VERSION,
            version: self.next_version(),
            trained_at: now,
            target_station: target.to_string(),
            horizon_hours: self.config.horizon_hours,
            lag_hours: self.config.lag_hours,
            feature_names: layout.feature_names(),
            samples: examples.len(),
            span_start,
            span_end,
            in_sample,
            model,
        };
        let handle = self.store.save(&artifact)?;

        info!(
            version = handle.version,
            samples = artifact.samples,
            r2 = in_sample.r2,
            mae = in_sample.mae,
            location = %handle.location,
            "Trained forecast model"
        );
        Ok(TrainOutcome::Trained(TrainingReport {
            handle,
            samples: artifact.samples,
            in_sample,
        }))
    }

    /// Fetches all monitored history from `source` and trains on it.
    pub fn train_from_source(
        &self,
        source: &mut dyn ReadingSource,
        now: DateTime<Utc>,
    ) -> Result<TrainOutcome, ForecastError> {
        let query = ReadingQuery::all(self.config.monitored_station_ids());
        let readings = source.fetch(&query)?;
        info!(readings = readings.len(), "Fetched training history");
        self.train(&readings, now)
    }

    /// Previous version + 1. An unreadable previous artifact is about to be
    /// replaced anyway, so it restarts the sequence instead of failing.
    fn next_version(&self) -> u64 {
        match self.store.load() {
            Ok(Some(previous)) => previous.version + 1,
            Ok(None) => 1,
            Err(e) => {
                warn!(error = %e, "Previous model artifact unreadable, restarting version at 1");
                1
            }
        }
    }

    fn insufficient(&self, reason: InsufficientData) -> TrainOutcome {
        warn!(
            reason = %reason,
            location = %self.store.describe(),
            "Not enough data to train, keeping existing model"
        );
        TrainOutcome::InsufficientData(reason)
    }
}

// ---------------------------------------------------------------------------
// Diagnostics
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct CrossValidation {
    pub folds: Vec<FitMetrics>,
    pub mean_mae: f64,
    pub mean_r2: f64,
}

/// K-fold cross validation over contiguous, unshuffled folds. The first
/// `n % k` folds hold one extra example. Returns `None` with fewer than `k`
/// examples or `k < 2`.
pub fn cross_validate(
    examples: &[TrainingExample],
    k: usize,
) -> Result<Option<CrossValidation>, ForecastError> {
    let n = examples.len();
    if k < 2 || n < k {
        return Ok(None);
    }

    let mut folds = Vec::with_capacity(k);
    let mut start = 0;
    for fold in 0..k {
        let size = n / k + usize::from(fold < n % k);
        let end = start + size;

        let train: Vec<TrainingExample> = examples[..start]
            .iter()
            .chain(&examples[end..])
            .cloned()
            .collect();
        let model = fit_examples(&train)?;
        if let Some(metrics) = score(&model, &examples[start..end])? {
            folds.push(metrics);
        }
        start = end;
    }

    let count = folds.len() as f64;
    let mean_mae = folds.iter().map(|m| m.mae).sum::<f64>() / count;
    let mean_r2 = folds.iter().map(|m| m.r2).sum::<f64>() / count;
    Ok(Some(CrossValidation {
        folds,
        mean_mae,
        mean_r2,
    }))
}

/// Result for one horizon in a sweep; `metrics` is `None` when skipped.
#[derive(Debug, Clone, PartialEq)]
pub struct HorizonScore {
    pub horizon_hours: u32,
    pub examples: usize,
    pub metrics: Option<FitMetrics>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HorizonSweep {
    pub scores: Vec<HorizonScore>,
    /// Horizon with the highest held-out R².
    pub best_horizon: Option<u32>,
}

/// Compares forecast horizons on a chronological 80/20 split.
pub fn sweep_horizons(
    table: &AlignedTable,
    target_station: &str,
    horizons: &[u32],
) -> Result<HorizonSweep, ForecastError> {
    let mut scores = Vec::with_capacity(horizons.len());
    let mut best: Option<(u32, f64)> = None;

    for &horizon in horizons {
        let examples = build_training_set(table, target_station, horizon);
        let mut score_entry = HorizonScore {
            horizon_hours: horizon,
            examples: examples.len(),
            metrics: None,
        };
        if examples.len() >= MIN_SWEEP_EXAMPLES {
            let test_len = (examples.len() as f64 * 0.2).ceil() as usize;
            let (train, test) = examples.split_at(examples.len() - test_len);
            let model = fit_examples(train)?;
            score_entry.metrics = score(&model, test)?;
            if let Some(metrics) = score_entry.metrics {
                if best.is_none_or(|(_, r2)| metrics.r2 > r2) {
                    best = Some((horizon, metrics.r2));
                }
            }
        }
        scores.push(score_entry);
    }

    Ok(HorizonSweep {
        scores,
        best_horizon: best.map(|(h, _)| h),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::features::FeatureLayout;
    use crate::forecast::artifact::MemoryArtifactStore;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 8, 1, 0, 0, 0).unwrap()
    }

    /// Hourly readings for the reference stations following smooth curves.
    fn history(hours: i64) -> Vec<Reading> {
        let mut readings = Vec::new();
        for h in 0..hours {
            let x = h as f64 / 10.0;
            let t = t0() + Duration::hours(h);
            readings.push(Reading::new("TS2", t, 117.0 + x.sin()));
            readings.push(Reading::new("TS16", t, 108.0 + (x - 0.6).sin()));
            readings.push(Reading::new("TS5", t, 106.0 + (x - 1.0).sin() * 0.8));
        }
        readings
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 10, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_training_set_targets_are_horizon_ahead() {
        let layout = FeatureLayout::new(vec!["A".into()], 1);
        let readings: Vec<Reading> = (0..10)
            .map(|h| Reading::new("A", t0() + Duration::hours(h), h as f64))
            .collect();
        let table = prepare(&readings, &layout);
        let examples = build_training_set(&table, "A", 3);
        // 9 aligned rows (hours 1..=9), minus 3 without a target.
        assert_eq!(examples.len(), 6);
        for e in &examples {
            assert_eq!(e.target, e.features.values()[0] + 3.0);
        }
    }

    #[test]
    fn test_training_set_empty_when_history_shorter_than_horizon() {
        let layout = FeatureLayout::new(vec!["A".into()], 1);
        let readings: Vec<Reading> = (0..4)
            .map(|h| Reading::new("A", t0() + Duration::hours(h), 1.0))
            .collect();
        let table = prepare(&readings, &layout);
        assert_eq!(table.len(), 3);
        assert!(build_training_set(&table, "A", 6).is_empty());
        assert!(build_training_set(&table, "MISSING", 1).is_empty());
    }

    #[test]
    fn test_train_saves_versioned_artifact() {
        let config = ForecastConfig::default();
        let store = MemoryArtifactStore::new();
        let trainer = Trainer::new(&config, &store);

        let outcome = trainer.train(&history(200), now()).unwrap();
        let TrainOutcome::Trained(report) = outcome else {
            panic!("expected a trained model, got {outcome:?}");
        };
        // 200 hours, minus 3 lag rows, minus 6 without a target.
        assert_eq!(report.samples, 191);
        assert_eq!(report.handle.version, 1);
        assert!(report.in_sample.r2 > 0.9, "r2 = {}", report.in_sample.r2);

        let artifact = store.load().unwrap().unwrap();
        assert_eq!(artifact.feature_names.len(), 12);
        assert_eq!(artifact.trained_at, now());

        let again = trainer.train(&history(200), now()).unwrap();
        assert!(matches!(again, TrainOutcome::Trained(ref r) if r.handle.version == 2));
    }

    #[test]
    fn test_train_reports_insufficient_data() {
        let config = ForecastConfig::default();
        let store = MemoryArtifactStore::new();
        let trainer = Trainer::new(&config, &store);

        assert_eq!(
            trainer.train(&[], now()).unwrap(),
            TrainOutcome::InsufficientData(InsufficientData::NoReadings)
        );
        assert_eq!(
            trainer.train(&history(3), now()).unwrap(),
            TrainOutcome::InsufficientData(InsufficientData::NoAlignedRows)
        );
        // 8 hours → 5 aligned rows, none with a target 6 h ahead.
        assert_eq!(
            trainer.train(&history(8), now()).unwrap(),
            TrainOutcome::InsufficientData(InsufficientData::NoTargetRows)
        );
        assert!(store.load().unwrap().is_none(), "nothing should be saved");
    }

    #[test]
    fn test_insufficient_data_keeps_previous_model() {
        let config = ForecastConfig::default();
        let store = MemoryArtifactStore::new();
        let trainer = Trainer::new(&config, &store);
        trainer.train(&history(100), now()).unwrap();
        trainer.train(&history(2), now()).unwrap();
        assert_eq!(store.load().unwrap().unwrap().version, 1);
    }

    #[test]
    fn test_cross_validate_uses_k_folds() {
        let config = ForecastConfig::default();
        let table = prepare(&history(120), &config.feature_layout());
        let examples = build_training_set(&table, "TS16", 6);
        let cv = cross_validate(&examples, DEFAULT_FOLDS).unwrap().unwrap();
        assert_eq!(cv.folds.len(), 5);
        assert!(cv.mean_mae < 0.5, "mean MAE {}", cv.mean_mae);
        assert!(cross_validate(&examples[..3], 5).unwrap().is_none());
    }

    #[test]
    fn test_sweep_skips_short_horizons_data() {
        let config = ForecastConfig::default();
        let table = prepare(&history(70), &config.feature_layout());
        // 67 rows: horizons 1..12 leave >= 50 examples, 24 leaves 43.
        let sweep = sweep_horizons(&table, "TS16", &SWEEP_HORIZONS).unwrap();
        assert_eq!(sweep.scores.len(), 5);
        assert!(sweep.scores[4].metrics.is_none());
        assert_eq!(sweep.scores[4].examples, 43);
        assert!(sweep.scores[..4].iter().all(|s| s.metrics.is_some()));
        assert!(sweep.best_horizon.is_some());
    }
}
