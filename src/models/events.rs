use serde::{Deserialize, Serialize};

use super::domain::{DeliveryState, MatchingFactor};

/// Events published by the engine for external reporting and UI surfaces.
///
/// Carried on a `tokio::sync::broadcast` channel; consumers that lag simply
/// miss events, they never block ingestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum EngineEvent {
    #[serde(rename_all = "camelCase")]
    MatchCreated {
        match_id: String,
        lost_report_id: String,
        found_report_id: String,
        match_score: u8,
        priority_review: bool,
    },
    #[serde(rename_all = "camelCase")]
    MatchUpdated {
        match_id: String,
        match_score: u8,
        matching_factors: Vec<MatchingFactor>,
    },
    #[serde(rename_all = "camelCase")]
    TriggerDelivered {
        trigger_id: String,
        alert_id: String,
        report_id: String,
        channel: String,
    },
    #[serde(rename_all = "camelCase")]
    TriggerFailed {
        trigger_id: String,
        alert_id: String,
        report_id: String,
        channel: String,
        state: DeliveryState,
        reason: String,
    },
}
