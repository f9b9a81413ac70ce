use std::sync::{Arc, RwLock};

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use tokio::sync::broadcast;
use validator::Validate;

use crate::alerts::AlertMatcher;
use crate::core::matcher::{MatchUpsert, MatchingEngine, ReviewError};
use crate::index::GeoGridIndex;
use crate::models::{
    AlertTrigger, AutoMatchingCriteria, EngineEvent, LostFoundAlert, LostPetReport, MatchStatus,
    PotentialMatch, ReportStatus, SubscriberContact,
};
use crate::notify::{DigestSchedule, NotificationDispatcher, RetryPolicy, TemplateSet};
use crate::services::{AlertRepository, NotificationChannel, ReportRepository, RepositoryError};

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Errors surfaced by engine operations
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Review(#[from] ReviewError),
}

/// The lost & found engine: report ingestion, match scoring, alert
/// evaluation, and notification fan-out behind one facade
///
/// Matching criteria are swapped copy-on-write; in-flight evaluations keep
/// the snapshot they started with.
pub struct LostFoundEngine {
    criteria: RwLock<Arc<AutoMatchingCriteria>>,
    reports: Arc<dyn ReportRepository>,
    alerts: Arc<dyn AlertRepository>,
    index: GeoGridIndex,
    matcher: MatchingEngine,
    alert_matcher: AlertMatcher,
    dispatcher: Arc<NotificationDispatcher>,
    events: broadcast::Sender<EngineEvent>,
    retro_window_days: i64,
}

impl LostFoundEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        criteria: AutoMatchingCriteria,
        reports: Arc<dyn ReportRepository>,
        alerts: Arc<dyn AlertRepository>,
        channels: Vec<Arc<dyn NotificationChannel>>,
        templates: TemplateSet,
        schedule: DigestSchedule,
        retry: RetryPolicy,
        retro_window_days: i64,
    ) -> Result<Self, EngineError> {
        criteria.validate_config().map_err(EngineError::Validation)?;

        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let dispatcher = Arc::new(NotificationDispatcher::new(
            channels,
            alerts.clone(),
            templates,
            schedule,
            retry,
            events.clone(),
        ));
        let index = GeoGridIndex::new(criteria.max_distance_km);

        Ok(Self {
            criteria: RwLock::new(Arc::new(criteria)),
            reports,
            alerts,
            index,
            matcher: MatchingEngine::new(),
            alert_matcher: AlertMatcher::new(),
            dispatcher,
            events,
            retro_window_days,
        })
    }

    /// Ingest a new report: persist it, index it, score it against nearby
    /// counterparts, and evaluate covering alert subscriptions
    pub async fn ingest_report(
        &self,
        report: LostPetReport,
        now: DateTime<Utc>,
    ) -> Result<Vec<MatchUpsert>, EngineError> {
        report
            .validate()
            .map_err(|e| EngineError::Validation(e.to_string()))?;

        self.reports.create(report.clone()).await?;
        self.index.insert(&report);
        tracing::info!(
            report_id = %report.id,
            report_type = ?report.report_type,
            species = %report.species,
            "report ingested"
        );

        let upserts = self.run_matching(&report, now).await?;
        self.run_alerts(&report, now).await?;
        Ok(upserts)
    }

    /// Register an alert subscription and retro-match it against recent
    /// active reports of the watched type
    pub async fn register_alert(
        &self,
        alert: LostFoundAlert,
        now: DateTime<Utc>,
    ) -> Result<Vec<AlertTrigger>, EngineError> {
        alert
            .validate()
            .map_err(|e| EngineError::Validation(e.to_string()))?;

        self.alerts.create(alert.clone()).await?;
        tracing::info!(alert_id = %alert.id, user_id = %alert.user_id, "alert registered");

        let recent = self
            .reports
            .query_active_by_type_near(
                alert.watch_type,
                alert.center,
                alert.radius_km,
                self.retro_window_days,
            )
            .await?;
        let triggers = self.alert_matcher.evaluate_new_alert(&alert, &recent, now);
        for trigger in &triggers {
            if let Ok(report) = self.reports.get(&trigger.report_id).await {
                self.dispatcher.enqueue(trigger.clone(), &report, now).await;
            }
        }
        Ok(triggers)
    }

    /// Transition a report's lifecycle status, keeping the index in sync
    pub async fn update_report_status(
        &self,
        report_id: &str,
        status: ReportStatus,
    ) -> Result<LostPetReport, EngineError> {
        let updated = self.reports.update_status(report_id, status).await?;
        if updated.status.is_active() {
            self.index.insert(&updated);
        } else {
            self.index.remove(report_id);
        }
        tracing::info!(report_id, status = ?updated.status, "report status updated");
        Ok(updated)
    }

    /// Expire active reports whose incident date is older than the
    /// retention window, dropping them from the index
    pub async fn expire_stale(
        &self,
        retention_days: i64,
        now: DateTime<Utc>,
    ) -> Result<Vec<String>, EngineError> {
        let cutoff = now - Duration::days(retention_days);
        let expired = self.reports.expire_older_than(cutoff).await?;
        for id in &expired {
            self.index.remove(id);
        }
        if !expired.is_empty() {
            tracing::info!(count = expired.len(), "expired stale reports");
        }
        Ok(expired)
    }

    /// Advance a match through its review lifecycle
    pub fn review_match(
        &self,
        match_id: &str,
        next: MatchStatus,
    ) -> Result<PotentialMatch, EngineError> {
        Ok(self.matcher.review(match_id, next)?)
    }

    pub fn match_for_pair(&self, lost_id: &str, found_id: &str) -> Option<PotentialMatch> {
        self.matcher.get(lost_id, found_id)
    }

    pub fn all_matches(&self) -> Vec<PotentialMatch> {
        self.matcher.all_matches()
    }

    pub async fn pause_alert(&self, alert_id: &str, paused: bool) -> Result<(), EngineError> {
        Ok(self.alerts.set_paused(alert_id, paused).await?)
    }

    pub async fn remove_alert(&self, alert_id: &str) -> Result<(), EngineError> {
        Ok(self.alerts.remove(alert_id).await?)
    }

    /// Register or update a subscriber's contact details
    pub fn update_contact(&self, contact: SubscriberContact) {
        self.dispatcher.update_contact(contact);
    }

    /// Swap the matching criteria; evaluations already underway finish on
    /// the snapshot they took
    pub fn set_criteria(&self, criteria: AutoMatchingCriteria) -> Result<(), EngineError> {
        criteria.validate_config().map_err(EngineError::Validation)?;
        let mut slot = self.criteria.write().unwrap_or_else(|e| e.into_inner());
        *slot = Arc::new(criteria);
        Ok(())
    }

    pub fn criteria(&self) -> Arc<AutoMatchingCriteria> {
        self.criteria.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Subscribe to engine events; lagging consumers miss events rather
    /// than blocking ingestion
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    /// The dispatcher handle, for wiring the digest scheduler
    pub fn dispatcher(&self) -> Arc<NotificationDispatcher> {
        self.dispatcher.clone()
    }

    async fn run_matching(
        &self,
        report: &LostPetReport,
        now: DateTime<Utc>,
    ) -> Result<Vec<MatchUpsert>, EngineError> {
        let criteria = self.criteria();
        let counterpart = report.report_type.opposite();

        let mut candidates =
            self.index
                .query_radius(report.point(), criteria.max_distance_km, counterpart);
        // Chipped reports are matched on identity regardless of where or
        // when the animal turned up
        if report.microchip().is_some() {
            let chipped = self.reports.query_active_chipped(counterpart).await?;
            for extra in chipped {
                if !candidates.iter().any(|c| c.id == extra.id) {
                    candidates.push(extra);
                }
            }
        }

        let upserts = self.matcher.evaluate(report, &candidates, &criteria, now);
        for upsert in &upserts {
            let event = if upsert.created {
                EngineEvent::MatchCreated {
                    match_id: upsert.record.id.clone(),
                    lost_report_id: upsert.record.lost_report_id.clone(),
                    found_report_id: upsert.record.found_report_id.clone(),
                    match_score: upsert.record.match_score,
                    priority_review: upsert.record.priority_review,
                }
            } else {
                EngineEvent::MatchUpdated {
                    match_id: upsert.record.id.clone(),
                    match_score: upsert.record.match_score,
                    matching_factors: upsert.record.matching_factors.clone(),
                }
            };
            let _ = self.events.send(event);
        }
        Ok(upserts)
    }

    async fn run_alerts(
        &self,
        report: &LostPetReport,
        now: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        let covering = self.alerts.list_active_covering(report.point()).await?;
        let triggers = self.alert_matcher.evaluate_report(report, &covering, now);
        for trigger in triggers {
            self.dispatcher.enqueue(trigger, report, now).await;
        }
        Ok(())
    }
}
