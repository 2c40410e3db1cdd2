/// Ordinary least squares regressor.
///
/// Fits `y = intercept + Σ coefficients[j]·x[j]` on centred data with an SVD
/// least-squares solve. Singular values below a cutoff relative to the
/// largest one are dropped, so constant or collinear columns (lags of a
/// smooth series) get the minimum-norm solution instead of failing the fit.
/// A fit on any non-empty, rectangular input succeeds and is deterministic.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Singular values at or below this fraction of the largest are treated as
/// zero.
const SINGULAR_VALUE_CUTOFF: f64 = 1e-10;

#[derive(Debug, Error, PartialEq)]
pub enum RegressionError {
    #[error("no training samples")]
    NoSamples,
    #[error("feature count mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
    #[error("{rows} feature rows but {targets} targets")]
    LengthMismatch { rows: usize, targets: usize },
    #[error("least squares solve failed: {0}")]
    Solve(&'static str),
}

/// A fitted linear model. This is the payload stored in the model artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    pub intercept: f64,
    pub coefficients: Vec<f64>,
}

impl LinearModel {
    /// Fits a model on `rows` (each of equal width) against `targets`.
    pub fn fit<R: AsRef<[f64]>>(rows: &[R], targets: &[f64]) -> Result<Self, RegressionError> {
        if rows.len() != targets.len() {
            return Err(RegressionError::LengthMismatch {
                rows: rows.len(),
                targets: targets.len(),
            });
        }
        let first = rows.first().ok_or(RegressionError::NoSamples)?;
        let p = first.as_ref().len();
        for row in rows {
            if row.as_ref().len() != p {
                return Err(RegressionError::DimensionMismatch {
                    expected: p,
                    got: row.as_ref().len(),
                });
            }
        }
        if p == 0 {
            return Ok(LinearModel {
                intercept: targets.iter().sum::<f64>() / targets.len() as f64,
                coefficients: Vec::new(),
            });
        }

        let n = rows.len();
        let x = DMatrix::from_fn(n, p, |i, j| rows[i].as_ref()[j]);
        let y = DVector::from_column_slice(targets);

        // Centring absorbs the intercept and keeps ~110 m levels well
        // conditioned.
        let x_mean: Vec<f64> = x.column_iter().map(|column| column.mean()).collect();
        let y_mean = y.mean();
        let xc = DMatrix::from_fn(n, p, |i, j| x[(i, j)] - x_mean[j]);
        let yc = y.add_scalar(-y_mean);

        let svd = xc.svd(true, true);
        let cutoff = svd.singular_values.max() * SINGULAR_VALUE_CUTOFF;
        let solution = svd.solve(&yc, cutoff).map_err(RegressionError::Solve)?;

        let coefficients: Vec<f64> = solution.iter().copied().collect();
        let intercept = y_mean - x_mean.iter().zip(&coefficients).map(|(m, c)| m * c).sum::<f64>();

        Ok(LinearModel {
            intercept,
            coefficients,
        })
    }

    /// Predicts a value for one feature row.
    pub fn predict(&self, features: &[f64]) -> Result<f64, RegressionError> {
        if features.len() != self.coefficients.len() {
            return Err(RegressionError::DimensionMismatch {
                expected: self.coefficients.len(),
                got: features.len(),
            });
        }
        Ok(self.intercept
            + features
                .iter()
                .zip(&self.coefficients)
                .map(|(x, c)| x * c)
                .sum::<f64>())
    }

    pub fn width(&self) -> usize {
        self.coefficients.len()
    }
}

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

/// Goodness of fit of predictions against observed values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitMetrics {
    pub mae: f64,
    pub rmse: f64,
    pub r2: f64,
}

impl FitMetrics {
    /// Computes metrics, or `None` if the slices are empty or differ in length.
    ///
    /// R² of a constant truth series is 1.0 for a perfect fit and 0.0
    /// otherwise.
    pub fn compute(truth: &[f64], predicted: &[f64]) -> Option<Self> {
        if truth.is_empty() || truth.len() != predicted.len() {
            return None;
        }
        let n = truth.len() as f64;
        let mean = truth.iter().sum::<f64>() / n;

        let mut abs_sum = 0.0;
        let mut ss_res = 0.0;
        let mut ss_tot = 0.0;
        for (&y, &y_hat) in truth.iter().zip(predicted) {
            let err = y - y_hat;
            abs_sum += err.abs();
            ss_res += err * err;
            ss_tot += (y - mean) * (y - mean);
        }

        let r2 = if ss_tot > 0.0 {
            1.0 - ss_res / ss_tot
        } else if ss_res == 0.0 {
            1.0
        } else {
            0.0
        };

        Some(FitMetrics {
            mae: abs_sum / n,
            rmse: (ss_res / n).sqrt(),
            r2,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-8
    }

    #[test]
    fn test_fit_recovers_exact_linear_relation() {
        // y = 2 + 3a - 0.5b
        let rows: Vec<Vec<f64>> = (0..20)
            .map(|i| vec![f64::from(i), f64::from((i * 7) % 5)])
            .collect();
        let targets: Vec<f64> = rows.iter().map(|r| 2.0 + 3.0 * r[0] - 0.5 * r[1]).collect();

        let model = LinearModel::fit(&rows, &targets).unwrap();
        assert!(close(model.intercept, 2.0), "intercept {}", model.intercept);
        assert!(close(model.coefficients[0], 3.0));
        assert!(close(model.coefficients[1], -0.5));
        assert!(close(model.predict(&[10.0, 4.0]).unwrap(), 30.0));
    }

    #[test]
    fn test_fit_handles_large_offsets() {
        // Water levels sit around 110 m; centring keeps this well conditioned.
        let rows: Vec<Vec<f64>> = (0..48).map(|i| vec![110.0 + f64::from(i) * 0.01]).collect();
        let targets: Vec<f64> = rows.iter().map(|r| r[0] + 0.25).collect();
        let model = LinearModel::fit(&rows, &targets).unwrap();
        assert!(close(model.predict(&[111.0]).unwrap(), 111.25));
    }

    #[test]
    fn test_constant_column_gets_zero_coefficient() {
        let rows: Vec<Vec<f64>> = (0..10).map(|i| vec![f64::from(i), 5.0]).collect();
        let targets: Vec<f64> = rows.iter().map(|r| 1.0 + r[0]).collect();
        let model = LinearModel::fit(&rows, &targets).unwrap();
        assert!(close(model.coefficients[1], 0.0), "constant column {}", model.coefficients[1]);
        assert!(close(model.coefficients[0], 1.0));
    }

    #[test]
    fn test_duplicated_column_is_still_solvable() {
        let rows: Vec<Vec<f64>> = (0..10).map(|i| vec![f64::from(i), f64::from(i)]).collect();
        let targets: Vec<f64> = rows.iter().map(|r| 4.0 * r[0]).collect();
        let model = LinearModel::fit(&rows, &targets).unwrap();
        assert!(close(model.predict(&[3.0, 3.0]).unwrap(), 12.0));
        // Minimum-norm solution splits the weight evenly.
        assert!(close(model.coefficients[0], 2.0));
        assert!(close(model.coefficients[1], 2.0));
    }

    #[test]
    fn test_collinear_lag_columns_fit_exactly() {
        // A sine-wave level and its lags span two dimensions; the fit must
        // still reproduce a target that is an exact function of them.
        for w in [0.05, 0.01, 0.003] {
            let level = |t: usize| 108.0 + 0.5 * (w * t as f64).sin();
            let rows: Vec<Vec<f64>> = (4..400)
                .map(|t| vec![level(t), level(t - 1), level(t - 2), level(t - 3)])
                .collect();
            let targets: Vec<f64> = (4..400).map(|t| level(t + 6)).collect();

            let model = LinearModel::fit(&rows, &targets).unwrap();
            let predicted: Vec<f64> = rows.iter().map(|r| model.predict(r).unwrap()).collect();
            let metrics = FitMetrics::compute(&targets, &predicted).unwrap();
            assert!(metrics.mae < 1e-6, "w = {w}: mae {}", metrics.mae);
            assert!(metrics.r2 > 0.999_999, "w = {w}: r2 {}", metrics.r2);
            assert!(
                model.coefficients.iter().all(|c| c.abs() < 1e3),
                "w = {w}: coefficients should stay bounded, got {:?}",
                model.coefficients
            );
        }
    }

    #[test]
    fn test_single_sample_predicts_its_target() {
        let model = LinearModel::fit(&[vec![1.0, 2.0]], &[7.0]).unwrap();
        assert_eq!(model.coefficients, vec![0.0, 0.0]);
        assert_eq!(model.intercept, 7.0);
    }

    #[test]
    fn test_fit_rejects_bad_shapes() {
        let empty: Vec<Vec<f64>> = Vec::new();
        assert_eq!(LinearModel::fit(&empty, &[]), Err(RegressionError::NoSamples));
        assert!(matches!(
            LinearModel::fit(&[vec![1.0], vec![1.0, 2.0]], &[1.0, 2.0]),
            Err(RegressionError::DimensionMismatch { .. })
        ));
        assert!(matches!(
            LinearModel::fit(&[vec![1.0]], &[1.0, 2.0]),
            Err(RegressionError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn test_predict_rejects_wrong_width() {
        let model = LinearModel {
            intercept: 0.0,
            coefficients: vec![1.0, 1.0],
        };
        assert!(model.predict(&[1.0]).is_err());
    }

    #[test]
    fn test_metrics() {
        let m = FitMetrics::compute(&[1.0, 2.0, 3.0], &[1.0, 2.0, 4.0]).unwrap();
        assert!(close(m.mae, 1.0 / 3.0));
        assert!(close(m.rmse, (1.0f64 / 3.0).sqrt()));
        assert!(close(m.r2, 0.5));
    }

    #[test]
    fn test_metrics_constant_truth() {
        assert_eq!(FitMetrics::compute(&[2.0, 2.0], &[2.0, 2.0]).unwrap().r2, 1.0);
        assert_eq!(FitMetrics::compute(&[2.0, 2.0], &[2.0, 3.0]).unwrap().r2, 0.0);
        assert!(FitMetrics::compute(&[], &[]).is_none());
    }
}
