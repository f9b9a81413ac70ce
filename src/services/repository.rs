use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::core::distance::haversine_distance;
use crate::models::{GeoPoint, LostFoundAlert, LostPetReport, ReportStatus, ReportType};

/// Errors from report/alert storage
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),
}

/// Durable store of lost/found reports (consumed, never mutated by scoring)
///
/// Production deployments back this with the platform's report service;
/// the in-memory arena below serves tests and embedded use.
#[async_trait]
pub trait ReportRepository: Send + Sync {
    async fn create(&self, report: LostPetReport) -> Result<(), RepositoryError>;

    async fn get(&self, id: &str) -> Result<LostPetReport, RepositoryError>;

    /// Transition a report's lifecycle status, returning the updated record
    async fn update_status(
        &self,
        id: &str,
        status: ReportStatus,
    ) -> Result<LostPetReport, RepositoryError>;

    /// Active reports of one type within a radius and age window
    async fn query_active_by_type_near(
        &self,
        report_type: ReportType,
        center: GeoPoint,
        radius_km: f64,
        max_age_days: i64,
    ) -> Result<Vec<LostPetReport>, RepositoryError>;

    /// All active reports of one type carrying a microchip id, regardless
    /// of distance or age — the escape hatch for exact-identity matching
    async fn query_active_chipped(
        &self,
        report_type: ReportType,
    ) -> Result<Vec<LostPetReport>, RepositoryError>;

    /// Mark active reports whose incident date predates `cutoff` as
    /// expired; returns the affected report ids
    async fn expire_older_than(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<String>, RepositoryError>;
}

/// Store of alert subscriptions
#[async_trait]
pub trait AlertRepository: Send + Sync {
    async fn create(&self, alert: LostFoundAlert) -> Result<(), RepositoryError>;

    async fn get(&self, id: &str) -> Result<LostFoundAlert, RepositoryError>;

    /// All subscriptions (paused included) whose geofence covers `point`.
    /// Pause state is a matter for evaluation time, not storage.
    async fn list_active_covering(
        &self,
        point: GeoPoint,
    ) -> Result<Vec<LostFoundAlert>, RepositoryError>;

    async fn set_paused(&self, id: &str, paused: bool) -> Result<(), RepositoryError>;

    /// Delete a subscription on cancellation
    async fn remove(&self, id: &str) -> Result<(), RepositoryError>;

    /// Bump `total_matches` and `last_triggered` after a delivered trigger
    async fn record_trigger(&self, id: &str, at: DateTime<Utc>) -> Result<(), RepositoryError>;
}

/// Arena-backed report store with stable string ids
///
/// Records live in an append-only arena; the id map points into it. This
/// mirrors how the engine expects an external store to behave (ids never
/// move, status transitions happen in place).
#[derive(Default)]
pub struct InMemoryReportRepository {
    inner: RwLock<ReportArena>,
}

#[derive(Default)]
struct ReportArena {
    slots: Vec<LostPetReport>,
    by_id: HashMap<String, usize>,
}

impl InMemoryReportRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ReportRepository for InMemoryReportRepository {
    async fn create(&self, report: LostPetReport) -> Result<(), RepositoryError> {
        let mut arena = self.inner.write().unwrap_or_else(|e| e.into_inner());
        if arena.by_id.contains_key(&report.id) {
            return Err(RepositoryError::Conflict(report.id));
        }
        let slot = arena.slots.len();
        arena.by_id.insert(report.id.clone(), slot);
        arena.slots.push(report);
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<LostPetReport, RepositoryError> {
        let arena = self.inner.read().unwrap_or_else(|e| e.into_inner());
        arena
            .by_id
            .get(id)
            .map(|&slot| arena.slots[slot].clone())
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))
    }

    async fn update_status(
        &self,
        id: &str,
        status: ReportStatus,
    ) -> Result<LostPetReport, RepositoryError> {
        let mut arena = self.inner.write().unwrap_or_else(|e| e.into_inner());
        let slot = *arena
            .by_id
            .get(id)
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))?;
        arena.slots[slot].status = status;
        Ok(arena.slots[slot].clone())
    }

    async fn query_active_by_type_near(
        &self,
        report_type: ReportType,
        center: GeoPoint,
        radius_km: f64,
        max_age_days: i64,
    ) -> Result<Vec<LostPetReport>, RepositoryError> {
        let arena = self.inner.read().unwrap_or_else(|e| e.into_inner());
        let cutoff = Utc::now() - chrono::Duration::days(max_age_days);
        Ok(arena
            .slots
            .iter()
            .filter(|r| {
                r.status.is_active()
                    && r.report_type == report_type
                    && r.date_time_lost_found >= cutoff
                    && r.point().is_valid()
                    && haversine_distance(center, r.point()) <= radius_km
            })
            .cloned()
            .collect())
    }

    async fn query_active_chipped(
        &self,
        report_type: ReportType,
    ) -> Result<Vec<LostPetReport>, RepositoryError> {
        let arena = self.inner.read().unwrap_or_else(|e| e.into_inner());
        Ok(arena
            .slots
            .iter()
            .filter(|r| {
                r.status.is_active() && r.report_type == report_type && r.microchip().is_some()
            })
            .cloned()
            .collect())
    }

    async fn expire_older_than(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<String>, RepositoryError> {
        let mut arena = self.inner.write().unwrap_or_else(|e| e.into_inner());
        let mut expired = Vec::new();
        for report in arena.slots.iter_mut() {
            if report.status.is_active() && report.date_time_lost_found < cutoff {
                report.status = ReportStatus::Expired;
                expired.push(report.id.clone());
            }
        }
        Ok(expired)
    }
}

/// Arena-backed alert subscription store
#[derive(Default)]
pub struct InMemoryAlertRepository {
    inner: RwLock<HashMap<String, LostFoundAlert>>,
}

impl InMemoryAlertRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AlertRepository for InMemoryAlertRepository {
    async fn create(&self, alert: LostFoundAlert) -> Result<(), RepositoryError> {
        let mut alerts = self.inner.write().unwrap_or_else(|e| e.into_inner());
        if alerts.contains_key(&alert.id) {
            return Err(RepositoryError::Conflict(alert.id));
        }
        alerts.insert(alert.id.clone(), alert);
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<LostFoundAlert, RepositoryError> {
        let alerts = self.inner.read().unwrap_or_else(|e| e.into_inner());
        alerts
            .get(id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))
    }

    async fn list_active_covering(
        &self,
        point: GeoPoint,
    ) -> Result<Vec<LostFoundAlert>, RepositoryError> {
        let alerts = self.inner.read().unwrap_or_else(|e| e.into_inner());
        Ok(alerts
            .values()
            .filter(|a| haversine_distance(a.center, point) <= a.radius_km)
            .cloned()
            .collect())
    }

    async fn set_paused(&self, id: &str, paused: bool) -> Result<(), RepositoryError> {
        let mut alerts = self.inner.write().unwrap_or_else(|e| e.into_inner());
        let alert = alerts
            .get_mut(id)
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))?;
        alert.is_paused = paused;
        Ok(())
    }

    async fn remove(&self, id: &str) -> Result<(), RepositoryError> {
        let mut alerts = self.inner.write().unwrap_or_else(|e| e.into_inner());
        alerts
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))
    }

    async fn record_trigger(&self, id: &str, at: DateTime<Utc>) -> Result<(), RepositoryError> {
        let mut alerts = self.inner.write().unwrap_or_else(|e| e.into_inner());
        let alert = alerts
            .get_mut(id)
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))?;
        alert.total_matches += 1;
        alert.last_triggered = Some(at);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PetSize, ReportLocation};

    fn report(id: &str, report_type: ReportType, lat: f64, lon: f64) -> LostPetReport {
        LostPetReport {
            id: id.to_string(),
            report_type,
            species: "dog".to_string(),
            breed: None,
            size: PetSize::Medium,
            color: "brown".to_string(),
            markings: None,
            pet_name: None,
            location: ReportLocation {
                address: "somewhere".to_string(),
                point: GeoPoint::new(lat, lon),
            },
            date_time_lost_found: Utc::now(),
            microchip_id: None,
            has_collar: None,
            status: ReportStatus::Active,
            created_at: None,
        }
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let repo = InMemoryReportRepository::new();
        repo.create(report("r1", ReportType::Lost, 39.78, -89.65))
            .await
            .expect("create");
        let loaded = repo.get("r1").await.expect("get");
        assert_eq!(loaded.id, "r1");
        assert!(repo.get("missing").await.is_err());
    }

    #[tokio::test]
    async fn test_slots_stay_aligned_across_inserts() {
        let repo = InMemoryReportRepository::new();
        for id in ["r1", "r2", "r3"] {
            repo.create(report(id, ReportType::Lost, 39.78, -89.65))
                .await
                .expect("create");
        }
        repo.update_status("r2", ReportStatus::Reunited).await.expect("update");

        // Each id resolves to its own record, not a neighboring slot
        assert_eq!(repo.get("r1").await.expect("get").id, "r1");
        assert_eq!(repo.get("r2").await.expect("get").status, ReportStatus::Reunited);
        assert_eq!(repo.get("r3").await.expect("get").status, ReportStatus::Active);
    }

    #[tokio::test]
    async fn test_duplicate_id_conflicts() {
        let repo = InMemoryReportRepository::new();
        repo.create(report("r1", ReportType::Lost, 39.78, -89.65))
            .await
            .expect("create");
        assert!(repo
            .create(report("r1", ReportType::Lost, 39.78, -89.65))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_status_update_excludes_from_queries() {
        let repo = InMemoryReportRepository::new();
        repo.create(report("r1", ReportType::Found, 39.79, -89.64))
            .await
            .expect("create");

        let near = repo
            .query_active_by_type_near(ReportType::Found, GeoPoint::new(39.78, -89.65), 50.0, 30)
            .await
            .expect("query");
        assert_eq!(near.len(), 1);

        repo.update_status("r1", ReportStatus::Reunited)
            .await
            .expect("update");
        let near = repo
            .query_active_by_type_near(ReportType::Found, GeoPoint::new(39.78, -89.65), 50.0, 30)
            .await
            .expect("query");
        assert!(near.is_empty());
    }

    #[tokio::test]
    async fn test_chipped_query_ignores_distance() {
        let repo = InMemoryReportRepository::new();
        let mut far = report("r1", ReportType::Found, 45.0, -70.0);
        far.microchip_id = Some("ABC123".to_string());
        repo.create(far).await.expect("create");
        repo.create(report("r2", ReportType::Found, 45.0, -70.0))
            .await
            .expect("create");

        let chipped = repo.query_active_chipped(ReportType::Found).await.expect("query");
        assert_eq!(chipped.len(), 1);
        assert_eq!(chipped[0].id, "r1");
    }

    #[tokio::test]
    async fn test_expire_older_than() {
        let repo = InMemoryReportRepository::new();
        let mut old = report("r1", ReportType::Lost, 39.78, -89.65);
        old.date_time_lost_found = Utc::now() - chrono::Duration::days(90);
        repo.create(old).await.expect("create");
        repo.create(report("r2", ReportType::Lost, 39.78, -89.65))
            .await
            .expect("create");

        let expired = repo
            .expire_older_than(Utc::now() - chrono::Duration::days(60))
            .await
            .expect("expire");
        assert_eq!(expired, vec!["r1".to_string()]);
        assert_eq!(repo.get("r1").await.expect("get").status, ReportStatus::Expired);
        assert_eq!(repo.get("r2").await.expect("get").status, ReportStatus::Active);
    }

    #[tokio::test]
    async fn test_alert_trigger_accounting() {
        let repo = InMemoryAlertRepository::new();
        let alert = LostFoundAlert {
            id: "a1".to_string(),
            user_id: "u1".to_string(),
            watch_type: ReportType::Found,
            species: None,
            sizes: vec![],
            colors: vec![],
            center: GeoPoint::new(39.78, -89.65),
            radius_km: 10.0,
            channels: Default::default(),
            frequency: crate::models::AlertFrequency {
                immediate_notification: true,
                ..Default::default()
            },
            is_paused: false,
            total_matches: 0,
            last_triggered: None,
            created_at: None,
        };
        repo.create(alert).await.expect("create");

        let now = Utc::now();
        repo.record_trigger("a1", now).await.expect("record");
        let loaded = repo.get("a1").await.expect("get");
        assert_eq!(loaded.total_matches, 1);
        assert_eq!(loaded.last_triggered, Some(now));
    }

    #[tokio::test]
    async fn test_alert_geofence_coverage() {
        let repo = InMemoryAlertRepository::new();
        let mut alert = LostFoundAlert {
            id: "a1".to_string(),
            user_id: "u1".to_string(),
            watch_type: ReportType::Found,
            species: None,
            sizes: vec![],
            colors: vec![],
            center: GeoPoint::new(39.78, -89.65),
            radius_km: 16.0, // ~10 miles
            channels: Default::default(),
            frequency: crate::models::AlertFrequency {
                immediate_notification: true,
                ..Default::default()
            },
            is_paused: false,
            total_matches: 0,
            last_triggered: None,
            created_at: None,
        };
        repo.create(alert.clone()).await.expect("create");
        alert.id = "a2".to_string();
        alert.center = GeoPoint::new(41.0, -89.65); // far north
        repo.create(alert).await.expect("create");

        // ~8km from a1's center
        let covering = repo
            .list_active_covering(GeoPoint::new(39.85, -89.65))
            .await
            .expect("list");
        assert_eq!(covering.len(), 1);
        assert_eq!(covering[0].id, "a1");
    }
}
