use crate::core::distance::haversine_distance;
use crate::core::filters::{
    breed_is_open, breeds_conflict, delta_days, jaccard, species_matches, tokenize,
};
use crate::models::{AutoMatchingCriteria, FactorKind, FactorRule, LostPetReport, MatchingFactor};

/// Result of scoring one (lost, found) pair
#[derive(Debug, Clone)]
pub struct ScoreOutcome {
    /// Aggregate score in [0, 100]
    pub score: u8,
    pub factors: Vec<MatchingFactor>,
    /// Set when a shared microchip id proved identity; such matches are
    /// queued for priority human confirmation instead of routine review
    pub priority_review: bool,
}

impl ScoreOutcome {
    fn zero() -> Self {
        Self { score: 0, factors: Vec::new(), priority_review: false }
    }
}

/// Calculate a match score (0-100) for a lost/found report pair
///
/// Pure function of its inputs, symmetric in pair order. The pipeline:
/// 1. Hard gates: differing species always scores 0; any factor marked
///    `required` in the criteria with a zero sub-score scores 0.
/// 2. Microchip override: equal non-empty chip ids score 100 outright.
/// 3. Weighted average of per-factor sub-scores, normalized by the sum of
///    weights actually applied — a factor with missing data on either side
///    is excluded from numerator and denominator rather than scored as 0.
pub fn score_pair(
    lost: &LostPetReport,
    found: &LostPetReport,
    criteria: &AutoMatchingCriteria,
) -> ScoreOutcome {
    // Malformed coordinates are the engine's one skip-with-log case.
    // Distance is effectively required for any positive score, so the pair
    // scores 0 rather than being scored on non-geo factors alone.
    if !lost.point().is_valid() || !found.point().is_valid() {
        tracing::warn!(
            lost_id = %lost.id,
            found_id = %found.id,
            "skipping pair with out-of-range coordinates"
        );
        return ScoreOutcome::zero();
    }

    // Stage 1: species hard gate
    if !species_matches(&lost.species, &found.species) {
        return ScoreOutcome::zero();
    }

    let subs = compute_sub_scores(lost, found, criteria);

    // Stage 1b: configured required-factor gates. A required factor whose
    // data is present on both sides but scores 0 is a disagreement.
    for sub in &subs {
        if sub.rule.required {
            if let Some(value) = sub.value {
                if value == 0.0 {
                    return ScoreOutcome::zero();
                }
            }
        }
    }

    // Stage 2: microchip override — exact identity trumps fuzzy similarity
    if let (Some(lost_chip), Some(found_chip)) = (lost.microchip(), found.microchip()) {
        if lost_chip.eq_ignore_ascii_case(found_chip) {
            let factor = MatchingFactor {
                factor: FactorKind::Microchip,
                weight: 100.0,
                confidence: 100,
                details: format!("microchip {} present on both reports", lost_chip),
            };
            return ScoreOutcome { score: 100, factors: vec![factor], priority_review: true };
        }
    }

    // Stage 3: weighted aggregate over factors with data on both sides
    let mut weighted_sum = 0.0;
    let mut weight_sum = 0.0;
    let mut factors = Vec::new();

    for sub in subs {
        let (Some(value), weight) = (sub.value, sub.rule.weight) else {
            continue;
        };
        if weight <= 0.0 {
            continue;
        }
        weighted_sum += value * weight;
        weight_sum += weight;
        factors.push(MatchingFactor {
            factor: sub.kind,
            weight,
            confidence: value.round().clamp(0.0, 100.0) as u8,
            details: sub.details,
        });
    }

    if weight_sum <= 0.0 {
        return ScoreOutcome::zero();
    }

    let score = (weighted_sum / weight_sum).round().clamp(0.0, 100.0) as u8;
    ScoreOutcome { score, factors, priority_review: false }
}

struct SubScore {
    kind: FactorKind,
    rule: FactorRule,
    /// None when data is missing on either side
    value: Option<f64>,
    details: String,
}

fn compute_sub_scores(
    lost: &LostPetReport,
    found: &LostPetReport,
    criteria: &AutoMatchingCriteria,
) -> Vec<SubScore> {
    let distance_km = haversine_distance(lost.point(), found.point());
    let gap_days = delta_days(lost.date_time_lost_found, found.date_time_lost_found);

    vec![
        SubScore {
            kind: FactorKind::Distance,
            rule: criteria.distance,
            value: Some(distance_sub_score(distance_km, criteria.max_distance_km)),
            details: format!("{:.1} km apart (max {:.0} km)", distance_km, criteria.max_distance_km),
        },
        SubScore {
            kind: FactorKind::Date,
            rule: criteria.date,
            value: Some(date_sub_score(gap_days, criteria.max_days)),
            details: format!("{:.1} days apart (max {} days)", gap_days, criteria.max_days),
        },
        breed_sub_score(lost, found, criteria.breed),
        text_sub_score(
            FactorKind::Color,
            Some(lost.color.as_str()),
            Some(found.color.as_str()),
            criteria.color,
        ),
        text_sub_score(
            FactorKind::Markings,
            lost.markings.as_deref(),
            found.markings.as_deref(),
            criteria.markings,
        ),
        SubScore {
            kind: FactorKind::Size,
            rule: criteria.size,
            value: Some(size_sub_score(lost.size.rank(), found.size.rank())),
            details: format!("sizes {:?} / {:?}", lost.size, found.size),
        },
    ]
}

/// Distance sub-score: 100 at zero distance, linear decay to 0 at the
/// configured maximum, 0 beyond it
#[inline]
fn distance_sub_score(distance_km: f64, max_distance_km: f64) -> f64 {
    if distance_km >= max_distance_km {
        return 0.0;
    }
    100.0 * (1.0 - distance_km / max_distance_km)
}

/// Date sub-score: 100 at zero gap, linear decay to 0 at `max_days`
#[inline]
fn date_sub_score(gap_days: f64, max_days: i64) -> f64 {
    let max = max_days as f64;
    if gap_days >= max {
        return 0.0;
    }
    100.0 * (1.0 - gap_days / max)
}

/// Breed sub-score: exact 100, one side mixed/unspecified 60, conflict 0.
/// Excluded entirely when neither side recorded a breed.
fn breed_sub_score(lost: &LostPetReport, found: &LostPetReport, rule: FactorRule) -> SubScore {
    let a = lost.breed.as_deref();
    let b = found.breed.as_deref();

    let value = if breed_is_open(a) && breed_is_open(b) {
        None
    } else if breeds_conflict(a, b) {
        Some(0.0)
    } else if breed_is_open(a) || breed_is_open(b) {
        Some(60.0)
    } else {
        Some(100.0)
    };

    SubScore {
        kind: FactorKind::Breed,
        rule,
        value,
        details: format!(
            "breeds {} / {}",
            a.unwrap_or("unspecified"),
            b.unwrap_or("unspecified")
        ),
    }
}

/// Free-text sub-score: Jaccard word overlap scaled to [0, 100], excluded
/// when either side has no usable tokens
fn text_sub_score(
    kind: FactorKind,
    a: Option<&str>,
    b: Option<&str>,
    rule: FactorRule,
) -> SubScore {
    let tokens_a = a.map(tokenize).unwrap_or_default();
    let tokens_b = b.map(tokenize).unwrap_or_default();

    let value = if tokens_a.is_empty() || tokens_b.is_empty() {
        None
    } else {
        Some(jaccard(&tokens_a, &tokens_b) * 100.0)
    };

    SubScore {
        kind,
        rule,
        value,
        details: format!(
            "{} token overlap: {} shared",
            match kind {
                FactorKind::Color => "color",
                FactorKind::Markings => "markings",
                _ => "text",
            },
            tokens_a.intersection(&tokens_b).count()
        ),
    }
}

/// Size sub-score: exact bucket 100, adjacent bucket 50, otherwise 0
#[inline]
fn size_sub_score(rank_a: u8, rank_b: u8) -> f64 {
    match rank_a.abs_diff(rank_b) {
        0 => 100.0,
        1 => 50.0,
        _ => 0.0,
    }
}
