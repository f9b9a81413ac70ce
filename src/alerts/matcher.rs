use std::collections::HashSet;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::core::distance::haversine_distance;
use crate::core::filters::{species_matches, tokenize};
use crate::models::{AlertTrigger, LostFoundAlert, LostPetReport};

/// Evaluates reports against geofenced alert subscriptions
///
/// Each `(alert_id, report_id)` pair fires at most once, ever: the fired
/// set survives re-evaluation after report edits. Paused alerts produce
/// nothing and queue nothing — pausing takes effect at evaluation time.
pub struct AlertMatcher {
    fired: Mutex<HashSet<(String, String)>>,
}

impl AlertMatcher {
    pub fn new() -> Self {
        Self { fired: Mutex::new(HashSet::new()) }
    }

    /// Evaluate a newly ingested (or edited) report against subscriptions
    /// whose geofence covers it
    pub fn evaluate_report(
        &self,
        report: &LostPetReport,
        alerts: &[LostFoundAlert],
        now: DateTime<Utc>,
    ) -> Vec<AlertTrigger> {
        alerts
            .iter()
            .filter(|alert| alert_matches(alert, report))
            .filter_map(|alert| self.fire(alert, report, now))
            .collect()
    }

    /// Retro-match a newly registered alert against recent active reports,
    /// symmetric to the forward case
    pub fn evaluate_new_alert(
        &self,
        alert: &LostFoundAlert,
        recent_reports: &[LostPetReport],
        now: DateTime<Utc>,
    ) -> Vec<AlertTrigger> {
        recent_reports
            .iter()
            .filter(|report| alert_matches(alert, report))
            .filter_map(|report| self.fire(alert, report, now))
            .collect()
    }

    fn fire(
        &self,
        alert: &LostFoundAlert,
        report: &LostPetReport,
        now: DateTime<Utc>,
    ) -> Option<AlertTrigger> {
        if alert.is_paused {
            tracing::debug!(alert_id = %alert.id, report_id = %report.id, "alert paused, not triggering");
            return None;
        }

        let key = (alert.id.clone(), report.id.clone());
        let mut fired = self.fired.lock().unwrap_or_else(|e| e.into_inner());
        if !fired.insert(key) {
            return None;
        }

        tracing::info!(alert_id = %alert.id, report_id = %report.id, "alert triggered");
        Some(AlertTrigger {
            id: Uuid::new_v4().to_string(),
            alert_id: alert.id.clone(),
            report_id: report.id.clone(),
            user_id: alert.user_id.clone(),
            frequency: alert.frequency,
            channels: alert.channels,
            matched_at: now,
        })
    }
}

impl Default for AlertMatcher {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether a subscription covers a report: watched type, attribute filters
/// empty-or-intersecting, and the report inside the geofence
fn alert_matches(alert: &LostFoundAlert, report: &LostPetReport) -> bool {
    if report.report_type != alert.watch_type || !report.status.is_active() {
        return false;
    }

    if let Some(species) = &alert.species {
        if !species_matches(species, &report.species) {
            return false;
        }
    }

    if !alert.sizes.is_empty() && !alert.sizes.contains(&report.size) {
        return false;
    }

    if !alert.colors.is_empty() {
        let report_colors = tokenize(&report.color);
        let overlaps = alert
            .colors
            .iter()
            .any(|c| report_colors.contains(&c.to_ascii_lowercase()));
        if !overlaps {
            return false;
        }
    }

    if !report.point().is_valid() {
        tracing::warn!(report_id = %report.id, "skipping alert check for report with bad coordinates");
        return false;
    }
    haversine_distance(alert.center, report.point()) <= alert.radius_km
}
