use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// Whether a report describes a lost pet or a found pet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportType {
    Lost,
    Found,
}

impl ReportType {
    /// The report type a report of this type is matched against
    pub fn opposite(&self) -> ReportType {
        match self {
            ReportType::Lost => ReportType::Found,
            ReportType::Found => ReportType::Lost,
        }
    }
}

/// Report lifecycle status
///
/// `Active` reports participate in matching; all other states are terminal
/// and remove the report from the geospatial index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Active,
    Reunited,
    Closed,
    Expired,
}

impl ReportStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, ReportStatus::Active)
    }
}

/// Coarse size bucket for an animal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PetSize {
    Small,
    Medium,
    Large,
    ExtraLarge,
}

impl PetSize {
    /// Ordinal rank used for adjacency scoring (adjacent buckets score 50)
    pub fn rank(&self) -> u8 {
        match self {
            PetSize::Small => 0,
            PetSize::Medium => 1,
            PetSize::Large => 2,
            PetSize::ExtraLarge => 3,
        }
    }
}

/// A WGS84 coordinate pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Check that both components are inside the valid WGS84 range
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// Where the animal was lost or found
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportLocation {
    pub address: String,
    #[serde(flatten)]
    pub point: GeoPoint,
}

/// A lost-pet or found-pet report
///
/// Reports are created and validated by the external report store; the
/// engine treats anomalies defensively (skip with a logged warning).
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_report_coordinates"))]
pub struct LostPetReport {
    pub id: String,
    pub report_type: ReportType,
    #[validate(length(min = 1))]
    pub species: String,
    #[serde(default)]
    pub breed: Option<String>,
    pub size: PetSize,
    #[validate(length(min = 1))]
    pub color: String,
    #[serde(default)]
    pub markings: Option<String>,
    #[serde(default)]
    pub pet_name: Option<String>,
    pub location: ReportLocation,
    pub date_time_lost_found: DateTime<Utc>,
    #[serde(default)]
    pub microchip_id: Option<String>,
    #[serde(default)]
    pub has_collar: Option<bool>,
    pub status: ReportStatus,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

fn validate_report_coordinates(report: &LostPetReport) -> Result<(), ValidationError> {
    if !report.location.point.is_valid() {
        return Err(ValidationError::new("coordinates_out_of_range"));
    }
    Ok(())
}

impl LostPetReport {
    /// Microchip id, treating empty strings as absent
    pub fn microchip(&self) -> Option<&str> {
        self.microchip_id.as_deref().map(str::trim).filter(|c| !c.is_empty())
    }

    pub fn point(&self) -> GeoPoint {
        self.location.point
    }
}

/// Named similarity factor kinds produced by the scoring engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FactorKind {
    Species,
    Breed,
    Color,
    Markings,
    Size,
    Distance,
    Date,
    Microchip,
}

/// One contribution to a match score, produced fresh on every scoring run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchingFactor {
    pub factor: FactorKind,
    pub weight: f64,
    /// Normalized sub-score in [0, 100]
    pub confidence: u8,
    pub details: String,
}

/// Review lifecycle of a potential match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    Pending,
    Reviewed,
    Confirmed,
    Dismissed,
}

/// A scored pairing of one lost and one found report
///
/// Created once per unordered (lost, found) pair the first time its score
/// crosses the configured threshold; later recomputations update the record
/// in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PotentialMatch {
    pub id: String,
    pub lost_report_id: String,
    pub found_report_id: String,
    /// Aggregate score in [0, 100]
    pub match_score: u8,
    pub matching_factors: Vec<MatchingFactor>,
    pub status: MatchStatus,
    /// Set for microchip-exact matches, which skip routine review queues
    pub priority_review: bool,
    pub matched_date: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Weight and gating rule for a single scoring factor
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FactorRule {
    pub weight: f64,
    #[serde(default)]
    pub required: bool,
}

impl FactorRule {
    pub fn new(weight: f64) -> Self {
        Self { weight, required: false }
    }
}

/// Matching configuration — the single source of truth the scoring engine
/// consults. Mutable only by configuration, never by the engine.
///
/// Species carries no weight here: cross-species matches are never valid,
/// so species acts as an unconditional hard gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoMatchingCriteria {
    #[serde(default = "default_distance_rule")]
    pub distance: FactorRule,
    #[serde(default = "default_date_rule")]
    pub date: FactorRule,
    #[serde(default = "default_breed_rule")]
    pub breed: FactorRule,
    #[serde(default = "default_color_rule")]
    pub color: FactorRule,
    #[serde(default = "default_markings_rule")]
    pub markings: FactorRule,
    #[serde(default = "default_size_rule")]
    pub size: FactorRule,
    #[serde(default = "default_max_distance_km")]
    pub max_distance_km: f64,
    #[serde(default = "default_max_days")]
    pub max_days: i64,
    #[serde(default = "default_minimum_match_score")]
    pub minimum_match_score: u8,
}

fn default_distance_rule() -> FactorRule { FactorRule::new(25.0) }
fn default_date_rule() -> FactorRule { FactorRule::new(20.0) }
fn default_breed_rule() -> FactorRule { FactorRule::new(15.0) }
fn default_color_rule() -> FactorRule { FactorRule::new(20.0) }
fn default_markings_rule() -> FactorRule { FactorRule::new(10.0) }
fn default_size_rule() -> FactorRule { FactorRule::new(10.0) }
fn default_max_distance_km() -> f64 { 50.0 }
fn default_max_days() -> i64 { 30 }
fn default_minimum_match_score() -> u8 { 75 }

impl Default for AutoMatchingCriteria {
    fn default() -> Self {
        Self {
            distance: default_distance_rule(),
            date: default_date_rule(),
            breed: default_breed_rule(),
            color: default_color_rule(),
            markings: default_markings_rule(),
            size: default_size_rule(),
            max_distance_km: default_max_distance_km(),
            max_days: default_max_days(),
            minimum_match_score: default_minimum_match_score(),
        }
    }
}

impl AutoMatchingCriteria {
    fn rules(&self) -> [&FactorRule; 6] {
        [
            &self.distance,
            &self.date,
            &self.breed,
            &self.color,
            &self.markings,
            &self.size,
        ]
    }

    /// Fail-fast startup validation (never checked per request)
    pub fn validate_config(&self) -> Result<(), String> {
        if self.minimum_match_score == 0 || self.minimum_match_score > 100 {
            return Err(format!(
                "minimumMatchScore must be in 1..=100, got {}",
                self.minimum_match_score
            ));
        }
        if self.max_distance_km <= 0.0 {
            return Err(format!(
                "maxDistanceKm must be positive, got {}",
                self.max_distance_km
            ));
        }
        if self.max_days <= 0 {
            return Err(format!("maxDays must be positive, got {}", self.max_days));
        }
        if self.rules().iter().any(|r| r.weight < 0.0) {
            return Err("factor weights must not be negative".to_string());
        }
        let weight_sum: f64 = self.rules().iter().map(|r| r.weight).sum();
        if weight_sum <= 0.0 {
            return Err("factor weights must sum to a positive value".to_string());
        }
        Ok(())
    }
}

/// Digest cadence for batched alert notifications
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DigestKind {
    Daily,
    Weekly,
}

/// How a subscriber wants to be notified
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertFrequency {
    #[serde(default)]
    pub immediate_notification: bool,
    #[serde(default)]
    pub daily_digest: bool,
    #[serde(default)]
    pub weekly_digest: bool,
}

impl AlertFrequency {
    pub fn any(&self) -> bool {
        self.immediate_notification || self.daily_digest || self.weekly_digest
    }
}

/// Channel enablement flags on an alert subscription
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertChannels {
    #[serde(default)]
    pub email: bool,
    #[serde(default)]
    pub sms: bool,
    #[serde(default)]
    pub push: bool,
}

impl Default for AlertChannels {
    fn default() -> Self {
        Self { email: true, sms: false, push: false }
    }
}

/// A geofenced alert subscription
///
/// Direction is a property of the alert: `watch_type` names the report type
/// the subscriber wants to hear about (a user who lost a dog watches for
/// `found` reports).
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_alert_frequency"))]
pub struct LostFoundAlert {
    pub id: String,
    #[validate(length(min = 1))]
    pub user_id: String,
    pub watch_type: ReportType,
    #[serde(default)]
    pub species: Option<String>,
    #[serde(default)]
    pub sizes: Vec<PetSize>,
    #[serde(default)]
    pub colors: Vec<String>,
    pub center: GeoPoint,
    #[validate(range(min = 0.001))]
    pub radius_km: f64,
    #[serde(default)]
    pub channels: AlertChannels,
    #[serde(default)]
    pub frequency: AlertFrequency,
    #[serde(default)]
    pub is_paused: bool,
    #[serde(default)]
    pub total_matches: u64,
    #[serde(default)]
    pub last_triggered: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

fn validate_alert_frequency(alert: &LostFoundAlert) -> Result<(), ValidationError> {
    if !alert.frequency.any() {
        return Err(ValidationError::new("frequency_mode_required"));
    }
    Ok(())
}

/// One alert subscription matching one report — the unit of deduplication
/// and delivery. Each `(alert_id, report_id)` pair triggers at most once.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertTrigger {
    pub id: String,
    pub alert_id: String,
    pub report_id: String,
    pub user_id: String,
    pub frequency: AlertFrequency,
    pub channels: AlertChannels,
    pub matched_at: DateTime<Utc>,
}

impl AlertTrigger {
    /// Deduplication and idempotency key
    pub fn dedup_key(&self) -> (String, String) {
        (self.alert_id.clone(), self.report_id.clone())
    }
}

/// Daily quiet window during which immediate sends are deferred, expressed
/// in the subscriber's local time
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuietHours {
    /// Hour of day the window starts (0-23)
    pub start_hour: u32,
    /// Hour of day the window ends (0-23); may wrap past midnight
    pub end_hour: u32,
    /// Subscriber offset from UTC, in minutes
    #[serde(default)]
    pub utc_offset_minutes: i32,
}

/// Delivery addresses and preferences for one subscriber
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriberContact {
    pub user_id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub push_token: Option<String>,
    #[serde(default)]
    pub quiet_hours: Option<QuietHours>,
}

/// Delivery states of a trigger on one channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DeliveryState {
    Queued,
    Sent,
    Delivered,
    FailedTransient,
    FailedPermanent,
}

/// Record of a human contact attempt against a report (external workflow,
/// read-only to the engine)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactAttempt {
    pub report_id: String,
    pub attempted_by: String,
    pub method: String,
    pub notes: Option<String>,
    pub attempted_at: DateTime<Utc>,
}

/// Follow-up note attached to a match during investigation (external
/// workflow, read-only to the engine)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowUpRecord {
    pub match_id: String,
    pub recorded_by: String,
    pub notes: String,
    pub recorded_at: DateTime<Utc>,
}

/// Reunion outcome for a confirmed match (external workflow, read-only)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReunionInfo {
    pub match_id: String,
    pub reunited_at: DateTime<Utc>,
    pub notes: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_report() -> LostPetReport {
        LostPetReport {
            id: "r1".to_string(),
            report_type: ReportType::Lost,
            species: "dog".to_string(),
            breed: None,
            size: PetSize::Medium,
            color: "brown".to_string(),
            markings: None,
            pet_name: None,
            location: ReportLocation {
                address: "123 Main St".to_string(),
                point: GeoPoint::new(39.78, -89.65),
            },
            date_time_lost_found: Utc::now(),
            microchip_id: None,
            has_collar: None,
            status: ReportStatus::Active,
            created_at: None,
        }
    }

    #[test]
    fn test_report_type_opposite() {
        assert_eq!(ReportType::Lost.opposite(), ReportType::Found);
        assert_eq!(ReportType::Found.opposite(), ReportType::Lost);
    }

    #[test]
    fn test_geo_point_validity() {
        assert!(GeoPoint::new(39.78, -89.65).is_valid());
        assert!(!GeoPoint::new(91.0, 0.0).is_valid());
        assert!(!GeoPoint::new(0.0, -181.0).is_valid());
        assert!(!GeoPoint::new(f64::NAN, 0.0).is_valid());
    }

    #[test]
    fn test_size_rank_adjacency() {
        assert_eq!(PetSize::Small.rank().abs_diff(PetSize::Medium.rank()), 1);
        assert_eq!(PetSize::Small.rank().abs_diff(PetSize::ExtraLarge.rank()), 3);
    }

    #[test]
    fn test_default_criteria_valid() {
        assert!(AutoMatchingCriteria::default().validate_config().is_ok());
    }

    #[test]
    fn test_criteria_rejects_zero_weights() {
        let mut criteria = AutoMatchingCriteria::default();
        criteria.distance.weight = 0.0;
        criteria.date.weight = 0.0;
        criteria.breed.weight = 0.0;
        criteria.color.weight = 0.0;
        criteria.markings.weight = 0.0;
        criteria.size.weight = 0.0;
        assert!(criteria.validate_config().is_err());
    }

    #[test]
    fn test_criteria_rejects_bad_threshold() {
        let mut criteria = AutoMatchingCriteria::default();
        criteria.minimum_match_score = 0;
        assert!(criteria.validate_config().is_err());
    }

    #[test]
    fn test_empty_microchip_is_absent() {
        let mut report = test_report();
        report.microchip_id = Some("  ".to_string());
        assert!(report.microchip().is_none());
        report.microchip_id = Some("ABC123".to_string());
        assert_eq!(report.microchip(), Some("ABC123"));
    }

    #[test]
    fn test_report_rejects_out_of_range_coordinates() {
        use validator::Validate;
        let mut report = test_report();
        assert!(report.validate().is_ok());

        report.location.point = GeoPoint::new(120.0, -89.65);
        assert!(report.validate().is_err());
        report.location.point = GeoPoint::new(39.78, f64::NAN);
        assert!(report.validate().is_err());
    }

    #[test]
    fn test_alert_requires_frequency_mode() {
        use validator::Validate;
        let alert = LostFoundAlert {
            id: "a1".to_string(),
            user_id: "u1".to_string(),
            watch_type: ReportType::Found,
            species: None,
            sizes: vec![],
            colors: vec![],
            center: GeoPoint::new(39.78, -89.65),
            radius_km: 10.0,
            channels: AlertChannels::default(),
            frequency: AlertFrequency::default(),
            is_paused: false,
            total_matches: 0,
            last_triggered: None,
            created_at: None,
        };
        assert!(alert.validate().is_err());

        let mut ok = alert.clone();
        ok.frequency.immediate_notification = true;
        assert!(ok.validate().is_ok());
    }
}
