use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::models::{AutoMatchingCriteria, LostPetReport};

/// Case-insensitive species equality — the one gate that always applies
///
/// Cross-species matches are never valid regardless of configured weights.
#[inline]
pub fn species_matches(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

/// True when a breed value carries no discriminating information
/// (unspecified, "mixed", "unknown")
pub fn breed_is_open(breed: Option<&str>) -> bool {
    match breed {
        None => true,
        Some(b) => {
            let b = b.trim().to_ascii_lowercase();
            b.is_empty() || b.contains("mix") || b == "unknown"
        }
    }
}

/// True when both sides name distinct, non-mixed breeds
pub fn breeds_conflict(a: Option<&str>, b: Option<&str>) -> bool {
    if breed_is_open(a) || breed_is_open(b) {
        return false;
    }
    // Both are Some and non-open here
    let (a, b) = (a.unwrap_or_default(), b.unwrap_or_default());
    !a.trim().eq_ignore_ascii_case(b.trim())
}

/// Absolute gap in fractional days between two timestamps
#[inline]
pub fn delta_days(a: DateTime<Utc>, b: DateTime<Utc>) -> f64 {
    (a - b).num_seconds().abs() as f64 / 86_400.0
}

/// Coarse temporal pre-filter for candidate selection
#[inline]
pub fn within_date_window(a: DateTime<Utc>, b: DateTime<Utc>, max_days: i64) -> bool {
    delta_days(a, b) <= max_days as f64
}

/// Tokenize free text into a lower-cased word set for Jaccard overlap
pub fn tokenize(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_ascii_lowercase())
        .collect()
}

/// Jaccard similarity of two token sets in [0, 1]
pub fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count() as f64;
    let union = a.union(b).count() as f64;
    intersection / union
}

/// Check whether a candidate survives the coarse phase for a new report:
/// opposite type, active, inside the date window. Distance is enforced by
/// the geospatial index radius query that produced the candidate.
pub fn coarse_candidate(
    report: &LostPetReport,
    candidate: &LostPetReport,
    criteria: &AutoMatchingCriteria,
) -> bool {
    candidate.status.is_active()
        && candidate.report_type == report.report_type.opposite()
        && within_date_window(
            report.date_time_lost_found,
            candidate.date_time_lost_found,
            criteria.max_days,
        )
}
