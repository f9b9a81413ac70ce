// Unit tests for Shelter Match

use chrono::{Duration, TimeZone, Utc};
use shelter_match::core::distance::{cell_key, cell_size_for_radius, haversine_distance};
use shelter_match::core::filters::{breed_is_open, jaccard, species_matches, tokenize};
use shelter_match::core::scoring::score_pair;
use shelter_match::index::GeoGridIndex;
use shelter_match::models::{
    AutoMatchingCriteria, EngineEvent, FactorKind, GeoPoint, LostPetReport, PetSize,
    ReportLocation, ReportStatus, ReportType,
};

fn make_report(id: &str, report_type: ReportType, lat: f64, lon: f64) -> LostPetReport {
    LostPetReport {
        id: id.to_string(),
        report_type,
        species: "dog".to_string(),
        breed: Some("labrador".to_string()),
        size: PetSize::Medium,
        color: "brown".to_string(),
        markings: Some("white chest patch".to_string()),
        pet_name: Some("Rex".to_string()),
        location: ReportLocation {
            address: "Washington Park".to_string(),
            point: GeoPoint::new(lat, lon),
        },
        date_time_lost_found: Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
        microchip_id: None,
        has_collar: Some(true),
        status: ReportStatus::Active,
        created_at: None,
    }
}

#[test]
fn test_haversine_distance_zero() {
    let p = GeoPoint::new(39.78, -89.65);
    assert!(haversine_distance(p, p) < 0.01);
}

#[test]
fn test_haversine_distance_springfield_to_chicago() {
    // Springfield IL to Chicago is roughly 280-300 km
    let springfield = GeoPoint::new(39.7817, -89.6501);
    let chicago = GeoPoint::new(41.8781, -87.6298);
    let distance = haversine_distance(springfield, chicago);
    assert!(distance > 250.0 && distance < 320.0);
}

#[test]
fn test_cell_size_covers_radius_at_high_latitude() {
    // One neighbor ring must span the radius even where longitude
    // degrees are compressed (worst case handled: 60 degrees latitude)
    let cell = cell_size_for_radius(50.0);
    let covered_km = cell * 111.0 * 0.5;
    assert!(covered_km >= 50.0 - 1e-6);
}

#[test]
fn test_nearby_points_share_or_neighbor_cells() {
    let cell = cell_size_for_radius(50.0);
    let a = cell_key(GeoPoint::new(39.78, -89.65), cell);
    let b = cell_key(GeoPoint::new(39.79, -89.64), cell);
    assert!((a.lat_idx - b.lat_idx).abs() <= 1);
    assert!((a.lon_idx - b.lon_idx).abs() <= 1);
}

#[test]
fn test_species_matching_is_case_insensitive() {
    assert!(species_matches("Dog", " dog "));
    assert!(!species_matches("dog", "cat"));
}

#[test]
fn test_open_breed_values() {
    assert!(breed_is_open(None));
    assert!(breed_is_open(Some("  ")));
    assert!(breed_is_open(Some("Mixed Breed")));
    assert!(breed_is_open(Some("unknown")));
    assert!(!breed_is_open(Some("labrador")));
}

#[test]
fn test_token_overlap() {
    let a = tokenize("Brown and White");
    let b = tokenize("white, brown");
    assert!((jaccard(&a, &b) - 2.0 / 3.0).abs() < 1e-9);
}

#[test]
fn test_identical_reports_score_perfect() {
    let criteria = AutoMatchingCriteria::default();
    let lost = make_report("lost-1", ReportType::Lost, 39.78, -89.65);
    let found = make_report("found-1", ReportType::Found, 39.78, -89.65);

    let outcome = score_pair(&lost, &found, &criteria);
    assert_eq!(outcome.score, 100);
    assert!(!outcome.priority_review);
}

#[test]
fn test_cross_species_pair_scores_zero() {
    let criteria = AutoMatchingCriteria::default();
    let lost = make_report("lost-1", ReportType::Lost, 39.78, -89.65);
    let mut found = make_report("found-1", ReportType::Found, 39.78, -89.65);
    found.species = "cat".to_string();

    assert_eq!(score_pair(&lost, &found, &criteria).score, 0);
}

#[test]
fn test_microchip_match_overrides_everything() {
    let criteria = AutoMatchingCriteria::default();
    let mut lost = make_report("lost-1", ReportType::Lost, 39.78, -89.65);
    let mut found = make_report("found-1", ReportType::Found, 45.0, -93.0);
    lost.microchip_id = Some("985112003456789".to_string());
    found.microchip_id = Some("985112003456789".to_string());
    found.color = "black".to_string();
    found.size = PetSize::Large;

    let outcome = score_pair(&lost, &found, &criteria);
    assert_eq!(outcome.score, 100);
    assert!(outcome.priority_review);
    assert_eq!(outcome.factors.len(), 1);
    assert_eq!(outcome.factors[0].factor, FactorKind::Microchip);
}

#[test]
fn test_score_decays_with_distance() {
    let criteria = AutoMatchingCriteria::default();
    let lost = make_report("lost-1", ReportType::Lost, 39.78, -89.65);
    let near = make_report("found-1", ReportType::Found, 39.80, -89.65);
    let far = make_report("found-2", ReportType::Found, 40.10, -89.65);

    let near_score = score_pair(&lost, &near, &criteria).score;
    let far_score = score_pair(&lost, &far, &criteria).score;
    assert!(near_score > far_score);
}

#[test]
fn test_score_decays_with_date_gap() {
    let criteria = AutoMatchingCriteria::default();
    let lost = make_report("lost-1", ReportType::Lost, 39.78, -89.65);
    let mut soon = make_report("found-1", ReportType::Found, 39.78, -89.65);
    soon.date_time_lost_found += Duration::days(2);
    let mut late = make_report("found-2", ReportType::Found, 39.78, -89.65);
    late.date_time_lost_found += Duration::days(20);

    let soon_score = score_pair(&lost, &soon, &criteria).score;
    let late_score = score_pair(&lost, &late, &criteria).score;
    assert!(soon_score > late_score);
}

#[test]
fn test_missing_markings_do_not_penalize() {
    let criteria = AutoMatchingCriteria::default();
    let lost = make_report("lost-1", ReportType::Lost, 39.78, -89.65);
    let mut found = make_report("found-1", ReportType::Found, 39.78, -89.65);
    found.markings = None;

    // The markings factor drops out of the weighted average entirely
    assert_eq!(score_pair(&lost, &found, &criteria).score, 100);
}

#[test]
fn test_grid_index_radius_query() {
    let index = GeoGridIndex::new(50.0);
    index.insert(&make_report("f-near", ReportType::Found, 39.80, -89.65));
    index.insert(&make_report("f-far", ReportType::Found, 42.00, -89.65));
    index.insert(&make_report("l-near", ReportType::Lost, 39.80, -89.65));

    let hits = index.query_radius(GeoPoint::new(39.78, -89.65), 50.0, ReportType::Found);
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, "f-near");
}

#[test]
fn test_grid_index_drops_resolved_reports() {
    let index = GeoGridIndex::new(50.0);
    index.insert(&make_report("f1", ReportType::Found, 39.80, -89.65));
    index.remove("f1");

    let hits = index.query_radius(GeoPoint::new(39.78, -89.65), 50.0, ReportType::Found);
    assert!(hits.is_empty());
}

#[test]
fn test_report_serializes_with_camel_case_keys() {
    let report = make_report("lost-1", ReportType::Lost, 39.78, -89.65);
    let json = serde_json::to_value(&report).expect("serialize");

    assert_eq!(json["reportType"], "lost");
    assert_eq!(json["petName"], "Rex");
    assert_eq!(json["location"]["latitude"], 39.78);
    assert!(json.get("report_type").is_none());
}

#[test]
fn test_engine_event_round_trips_through_json() {
    let event = EngineEvent::MatchCreated {
        match_id: "m1".to_string(),
        lost_report_id: "lost-1".to_string(),
        found_report_id: "found-1".to_string(),
        match_score: 92,
        priority_review: false,
    };
    let json = serde_json::to_value(&event).expect("serialize");
    assert_eq!(json["kind"], "matchCreated");
    assert_eq!(json["matchScore"], 92);

    let back: EngineEvent = serde_json::from_value(json).expect("deserialize");
    match back {
        EngineEvent::MatchCreated { match_id, match_score, .. } => {
            assert_eq!(match_id, "m1");
            assert_eq!(match_score, 92);
        }
        other => panic!("unexpected event: {:?}", other),
    }
}

#[test]
fn test_grid_index_skips_invalid_coordinates() {
    let index = GeoGridIndex::new(50.0);
    index.insert(&make_report("bad", ReportType::Found, 120.0, -89.65));
    assert!(index.is_empty());
}
