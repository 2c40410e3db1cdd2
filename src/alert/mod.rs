/// Risk evaluation and the alert dispatch boundary.
pub mod notify;
pub mod thresholds;
