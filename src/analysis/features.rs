/// Fixed-order feature layout for the forecast regressor.
///
/// A feature vector for S monitored stations and L lag hours has width
/// S × (1 + L), laid out as:
///
/// ```text
/// [ s0, s1, .., s(S-1),                       current aligned values
///   s0_lag1h .. s0_lagLh, s1_lag1h .., ... ]  lags, grouped by station
/// ```
///
/// The order is part of the trained model's contract, so the layout also
/// produces the column names stored in the model artifact.

// ---------------------------------------------------------------------------
// Layout
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureLayout {
    stations: Vec<String>,
    lag_hours: usize,
}

impl FeatureLayout {
    pub fn new(stations: Vec<String>, lag_hours: usize) -> Self {
        Self { stations, lag_hours }
    }

    pub fn stations(&self) -> &[String] {
        &self.stations
    }

    pub fn lag_hours(&self) -> usize {
        self.lag_hours
    }

    /// Number of values in one feature vector.
    pub fn width(&self) -> usize {
        self.stations.len() * (1 + self.lag_hours)
    }

    /// Position of `station_id` among the monitored stations.
    pub fn position(&self, station_id: &str) -> Option<usize> {
        self.stations.iter().position(|s| s == station_id)
    }

    /// Index of a station's current value.
    pub fn current_index(&self, station_id: &str) -> Option<usize> {
        self.position(station_id)
    }

    /// Index of a station's value `lag` hours back (1 ≤ lag ≤ L).
    pub fn lag_index(&self, station_id: &str, lag: usize) -> Option<usize> {
        if lag == 0 || lag > self.lag_hours {
            return None;
        }
        let s = self.position(station_id)?;
        Some(self.stations.len() + s * self.lag_hours + (lag - 1))
    }

    /// Column names in feature order, e.g. `TS2`, `TS16`, `TS2_lag1h`.
    pub fn feature_names(&self) -> Vec<String> {
        let mut names = self.stations.clone();
        for station in &self.stations {
            for lag in 1..=self.lag_hours {
                names.push(format!("{station}_lag{lag}h"));
            }
        }
        names
    }
}

// ---------------------------------------------------------------------------
// Vector
// ---------------------------------------------------------------------------

/// One row of model input. Always `layout.width()` long when built by the
/// series preparer.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector(Vec<f64>);

impl FeatureVector {
    pub fn new(values: Vec<f64>) -> Self {
        Self(values)
    }

    pub fn values(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn current(&self, layout: &FeatureLayout, station_id: &str) -> Option<f64> {
        layout
            .current_index(station_id)
            .and_then(|i| self.0.get(i).copied())
    }

    pub fn lag(&self, layout: &FeatureLayout, station_id: &str, lag: usize) -> Option<f64> {
        layout
            .lag_index(station_id, lag)
            .and_then(|i| self.0.get(i).copied())
    }

    /// Mutable access to a station's current value.
    pub fn current_mut(&mut self, layout: &FeatureLayout, station_id: &str) -> Option<&mut f64> {
        layout
            .current_index(station_id)
            .and_then(move |i| self.0.get_mut(i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> FeatureLayout {
        FeatureLayout::new(vec!["TS2".into(), "TS16".into(), "TS5".into()], 3)
    }

    #[test]
    fn test_reference_layout_has_twelve_features() {
        let layout = layout();
        assert_eq!(layout.width(), 12);
        assert_eq!(layout.feature_names().len(), 12);
    }

    #[test]
    fn test_feature_names_follow_layout_order() {
        let names = layout().feature_names();
        assert_eq!(&names[..4], &["TS2", "TS16", "TS5", "TS2_lag1h"]);
        assert_eq!(names[11], "TS5_lag3h");
    }

    #[test]
    fn test_indices_agree_with_names() {
        let layout = layout();
        let names = layout.feature_names();
        assert_eq!(names[layout.current_index("TS16").unwrap()], "TS16");
        assert_eq!(names[layout.lag_index("TS16", 2).unwrap()], "TS16_lag2h");
        assert_eq!(names[layout.lag_index("TS5", 1).unwrap()], "TS5_lag1h");
    }

    #[test]
    fn test_out_of_range_lag_and_unknown_station() {
        let layout = layout();
        assert_eq!(layout.lag_index("TS2", 0), None);
        assert_eq!(layout.lag_index("TS2", 4), None);
        assert_eq!(layout.current_index("XXX99"), None);
    }

    #[test]
    fn test_vector_accessors() {
        let layout = layout();
        let mut v = FeatureVector::new((0..12).map(f64::from).collect());
        assert_eq!(v.current(&layout, "TS5"), Some(2.0));
        assert_eq!(v.lag(&layout, "TS2", 1), Some(3.0));
        *v.current_mut(&layout, "TS2").unwrap() += 1.5;
        assert_eq!(v.current(&layout, "TS2"), Some(1.5));
    }
}
