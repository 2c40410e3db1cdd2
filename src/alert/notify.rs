/// Alert dispatch boundary.
///
/// The forecast core only decides; delivery (LINE push, SMS, email) belongs to
/// whatever implements `AlertDispatcher`. `notify` formats a message for any
/// decision at warning tier or above and hands it over.

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{info, warn};

use crate::model::{HybridDecision, RiskTier};

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("alert delivery failed: {0}")]
    Delivery(String),
}

/// A formatted alert ready for delivery.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertMessage {
    pub station_id: String,
    pub tier: RiskTier,
    pub title: String,
    pub body: String,
    pub valid_at: DateTime<Utc>,
}

impl AlertMessage {
    /// Builds the subscriber message for a decision.
    pub fn from_decision(decision: &HybridDecision) -> Self {
        let valid_at = decision.valid_at();
        let title = format!(
            "{}: {} ({})",
            decision.station_id,
            decision.status,
            decision.tier.as_str()
        );

        let mut body = format!(
            "Forecast level {:.2} m MSL at {} (+{} h)",
            decision.predicted_level_m,
            valid_at.format("%Y-%m-%d %H:%M UTC"),
            decision.horizon_hours
        );
        for reason in &decision.overrides {
            body.push_str("\n- ");
            body.push_str(&reason.to_string());
        }

        AlertMessage {
            station_id: decision.station_id.clone(),
            tier: decision.tier,
            title,
            body,
            valid_at,
        }
    }
}

/// Delivers alert messages to subscribers.
pub trait AlertDispatcher {
    fn dispatch(&self, message: &AlertMessage) -> Result<(), DispatchError>;
}

/// Dispatcher that only writes alerts to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogDispatcher;

impl AlertDispatcher for LogDispatcher {
    fn dispatch(&self, message: &AlertMessage) -> Result<(), DispatchError> {
        warn!(
            station = %message.station_id,
            tier = message.tier.level(),
            "{}\n{}",
            message.title,
            message.body
        );
        Ok(())
    }
}

/// Sends an alert for `decision` when its tier is warning or above.
///
/// Returns `Ok(true)` when a message was dispatched, `Ok(false)` when the
/// decision did not warrant one.
pub fn notify(
    decision: &HybridDecision,
    dispatcher: &dyn AlertDispatcher,
) -> Result<bool, DispatchError> {
    if decision.tier < RiskTier::Warning {
        info!(station = %decision.station_id, "Risk normal, no alert sent");
        return Ok(false);
    }
    let message = AlertMessage::from_decision(decision);
    dispatcher.dispatch(&message)?;
    Ok(true)
}
