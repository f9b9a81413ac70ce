use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::core::filters::coarse_candidate;
use crate::core::scoring::score_pair;
use crate::models::{
    AutoMatchingCriteria, LostPetReport, MatchStatus, PotentialMatch, ReportType,
};

/// One match record produced or refreshed by a scoring run
#[derive(Debug, Clone)]
pub struct MatchUpsert {
    pub record: PotentialMatch,
    pub created: bool,
}

/// The matching orchestrator: scores coarse candidates against a new report
/// and maintains the ledger of potential matches
///
/// The ledger is keyed by the unordered (lost, found) pair: a pair's record
/// is created exactly once, the first time its score crosses the threshold,
/// and updated in place on every later recomputation.
pub struct MatchingEngine {
    ledger: Mutex<HashMap<(String, String), PotentialMatch>>,
}

impl MatchingEngine {
    pub fn new() -> Self {
        Self { ledger: Mutex::new(HashMap::new()) }
    }

    /// Score a new report against a coarse candidate set
    ///
    /// Candidates normally come from the geospatial index plus a date
    /// filter; when both sides carry microchips the date window does not
    /// apply (exact identity is checked regardless of when or where the
    /// animal turned up).
    pub fn evaluate(
        &self,
        report: &LostPetReport,
        candidates: &[LostPetReport],
        criteria: &AutoMatchingCriteria,
        now: DateTime<Utc>,
    ) -> Vec<MatchUpsert> {
        let mut upserts = Vec::new();

        for candidate in candidates {
            let chip_pair = report.microchip().is_some() && candidate.microchip().is_some();
            if !chip_pair && !coarse_candidate(report, candidate, criteria) {
                continue;
            }
            if candidate.report_type != report.report_type.opposite()
                || !candidate.status.is_active()
            {
                continue;
            }

            let (lost, found) = orient(report, candidate);
            let outcome = score_pair(lost, found, criteria);

            if let Some(upsert) = self.upsert(
                lost,
                found,
                outcome.score,
                outcome.factors,
                outcome.priority_review,
                criteria.minimum_match_score,
                now,
            ) {
                upserts.push(upsert);
            }
        }

        upserts
    }

    /// Apply a scoring result to the ledger
    ///
    /// An existing record is refreshed regardless of the new score; a new
    /// record is only minted when the score meets the threshold (boundary
    /// inclusive).
    #[allow(clippy::too_many_arguments)]
    fn upsert(
        &self,
        lost: &LostPetReport,
        found: &LostPetReport,
        score: u8,
        factors: Vec<crate::models::MatchingFactor>,
        priority_review: bool,
        minimum_match_score: u8,
        now: DateTime<Utc>,
    ) -> Option<MatchUpsert> {
        let key = (lost.id.clone(), found.id.clone());
        let mut ledger = self.ledger.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(existing) = ledger.get_mut(&key) {
            existing.match_score = score;
            existing.matching_factors = factors;
            existing.priority_review = existing.priority_review || priority_review;
            existing.updated_at = now;
            return Some(MatchUpsert { record: existing.clone(), created: false });
        }

        if score < minimum_match_score {
            return None;
        }

        let record = PotentialMatch {
            id: Uuid::new_v4().to_string(),
            lost_report_id: lost.id.clone(),
            found_report_id: found.id.clone(),
            match_score: score,
            matching_factors: factors,
            status: MatchStatus::Pending,
            priority_review,
            matched_date: now,
            updated_at: now,
        };
        tracing::info!(
            match_id = %record.id,
            lost_id = %lost.id,
            found_id = %found.id,
            score,
            priority = priority_review,
            "potential match created"
        );
        ledger.insert(key, record.clone());
        Some(MatchUpsert { record, created: true })
    }

    /// Look up the match record for a (lost, found) pair
    pub fn get(&self, lost_report_id: &str, found_report_id: &str) -> Option<PotentialMatch> {
        let ledger = self.ledger.lock().unwrap_or_else(|e| e.into_inner());
        ledger
            .get(&(lost_report_id.to_string(), found_report_id.to_string()))
            .cloned()
    }

    /// All match records, including historical ones whose reports have
    /// since left the active state
    pub fn all_matches(&self) -> Vec<PotentialMatch> {
        let ledger = self.ledger.lock().unwrap_or_else(|e| e.into_inner());
        ledger.values().cloned().collect()
    }

    /// Advance a match through its review lifecycle:
    /// pending → reviewed → {confirmed, dismissed}
    pub fn review(&self, match_id: &str, next: MatchStatus) -> Result<PotentialMatch, ReviewError> {
        let mut ledger = self.ledger.lock().unwrap_or_else(|e| e.into_inner());
        let record = ledger
            .values_mut()
            .find(|m| m.id == match_id)
            .ok_or_else(|| ReviewError::NotFound(match_id.to_string()))?;

        let allowed = matches!(
            (record.status, next),
            (MatchStatus::Pending, MatchStatus::Reviewed)
                | (MatchStatus::Reviewed, MatchStatus::Confirmed)
                | (MatchStatus::Reviewed, MatchStatus::Dismissed)
        );
        if !allowed {
            return Err(ReviewError::InvalidTransition {
                from: record.status,
                to: next,
            });
        }
        record.status = next;
        record.updated_at = Utc::now();
        Ok(record.clone())
    }
}

impl Default for MatchingEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Errors from match review transitions
#[derive(Debug, thiserror::Error)]
pub enum ReviewError {
    #[error("match not found: {0}")]
    NotFound(String),

    #[error("invalid review transition: {from:?} -> {to:?}")]
    InvalidTransition { from: MatchStatus, to: MatchStatus },
}

/// Order a pair so the lost report always comes first
fn orient<'a>(
    a: &'a LostPetReport,
    b: &'a LostPetReport,
) -> (&'a LostPetReport, &'a LostPetReport) {
    if a.report_type == ReportType::Lost {
        (a, b)
    } else {
        (b, a)
    }
}
