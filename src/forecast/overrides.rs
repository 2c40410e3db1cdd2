/// Deterministic override rules layered on the regression forecast.
///
/// The regressor learns from historical flood shapes and underreacts to fast
/// onsets and to drainage backing up from downstream. These checks read the
/// same feature row the model saw and can only raise the tier.

use crate::analysis::features::{FeatureLayout, FeatureVector};
use crate::config::OverrideRules;
use crate::model::{OverrideReason, RiskAssessment, RiskTier};

/// Label prefixed to the status whenever a rule fires.
pub const SPECIAL_WATCH_LABEL: &str = "เฝ้าระวังพิเศษ (special watch)";

/// Runs every enabled rule against `features`. Rules are independent; all
/// that fire are returned, flash-rise first.
pub fn check_overrides(
    features: &FeatureVector,
    layout: &FeatureLayout,
    target_station: &str,
    rules: &OverrideRules,
) -> Vec<OverrideReason> {
    let mut reasons = Vec::new();
    if let Some(reason) = check_flash_rise(features, layout, rules) {
        reasons.push(reason);
    }
    if let Some(reason) = check_backwater(features, layout, target_station, rules) {
        reasons.push(reason);
    }
    reasons
}

/// Upstream rose more than `rise_threshold_m` over the last hour.
fn check_flash_rise(
    features: &FeatureVector,
    layout: &FeatureLayout,
    rules: &OverrideRules,
) -> Option<OverrideReason> {
    let station = rules.upstream_station.as_deref()?;
    let now = features.current(layout, station)?;
    let hour_ago = features.lag(layout, station, 1)?;
    let rise = now - hour_ago;

    (rise > rules.rise_threshold_m).then(|| OverrideReason::FlashRise {
        station_id: station.to_string(),
        rise_m: rise,
        threshold_m: rules.rise_threshold_m,
    })
}

/// Target is high and barely above downstream, so water is not draining.
fn check_backwater(
    features: &FeatureVector,
    layout: &FeatureLayout,
    target_station: &str,
    rules: &OverrideRules,
) -> Option<OverrideReason> {
    let downstream = rules.downstream_station.as_deref()?;
    let target = features.current(layout, target_station)?;
    let downstream_level = features.current(layout, downstream)?;
    let difference = target - downstream_level;

    (target > rules.backwater_level_trigger_m && difference < rules.backwater_diff_threshold_m)
        .then(|| OverrideReason::Backwater {
            target_level_m: target,
            downstream_level_m: downstream_level,
            difference_m: difference,
            threshold_m: rules.backwater_diff_threshold_m,
        })
}

/// Composite status listing every triggered rule.
pub fn special_watch_status(reasons: &[OverrideReason]) -> String {
    let summaries: Vec<&str> = reasons.iter().map(OverrideReason::summary).collect();
    format!("{}: {}", SPECIAL_WATCH_LABEL, summaries.join("; "))
}

/// Escalates a model assessment when any rule fired. The tier is raised to
/// at least warning and never lowered; the status is replaced.
pub fn apply_overrides(model: RiskAssessment, reasons: &[OverrideReason]) -> RiskAssessment {
    if reasons.is_empty() {
        return model;
    }
    RiskAssessment {
        tier: model.tier.max(RiskTier::Warning),
        status: special_watch_status(reasons),
    }
}
