// Criterion benchmarks for Shelter Match

use chrono::{Duration, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use shelter_match::core::distance::haversine_distance;
use shelter_match::core::matcher::MatchingEngine;
use shelter_match::core::scoring::score_pair;
use shelter_match::index::GeoGridIndex;
use shelter_match::models::{
    AutoMatchingCriteria, GeoPoint, LostPetReport, PetSize, ReportLocation, ReportStatus,
    ReportType,
};

fn create_report(id: usize, report_type: ReportType, lat: f64, lon: f64) -> LostPetReport {
    let sizes = [PetSize::Small, PetSize::Medium, PetSize::Large];
    let colors = ["brown", "black", "white", "brown and white", "gray"];
    LostPetReport {
        id: format!("{:?}-{}", report_type, id),
        report_type,
        species: if id % 4 == 0 { "cat" } else { "dog" }.to_string(),
        breed: if id % 3 == 0 { None } else { Some("labrador".to_string()) },
        size: sizes[id % sizes.len()],
        color: colors[id % colors.len()].to_string(),
        markings: if id % 2 == 0 { Some("white chest patch".to_string()) } else { None },
        pet_name: None,
        location: ReportLocation {
            address: "somewhere".to_string(),
            point: GeoPoint::new(lat, lon),
        },
        date_time_lost_found: Utc::now() - Duration::days((id % 20) as i64),
        microchip_id: None,
        has_collar: None,
        status: ReportStatus::Active,
        created_at: None,
    }
}

fn scattered(report_type: ReportType, count: usize) -> Vec<LostPetReport> {
    (0..count)
        .map(|i| {
            let lat_offset = (i as f64 * 0.003) % 0.5;
            let lon_offset = (i as f64 * 0.007) % 0.5;
            create_report(i, report_type, 39.78 + lat_offset, -89.65 + lon_offset)
        })
        .collect()
}

fn bench_haversine_distance(c: &mut Criterion) {
    c.bench_function("haversine_distance", |b| {
        b.iter(|| {
            haversine_distance(
                black_box(GeoPoint::new(39.78, -89.65)),
                black_box(GeoPoint::new(39.80, -89.62)),
            )
        });
    });
}

fn bench_score_pair(c: &mut Criterion) {
    let criteria = AutoMatchingCriteria::default();
    let lost = create_report(1, ReportType::Lost, 39.78, -89.65);
    let found = create_report(2, ReportType::Found, 39.80, -89.62);

    c.bench_function("score_pair", |b| {
        b.iter(|| score_pair(black_box(&lost), black_box(&found), black_box(&criteria)));
    });
}

fn bench_matching(c: &mut Criterion) {
    let criteria = AutoMatchingCriteria::default();
    let report = create_report(0, ReportType::Lost, 39.78, -89.65);

    let mut group = c.benchmark_group("matching");
    for candidate_count in [10, 50, 100, 500, 1000].iter() {
        let candidates = scattered(ReportType::Found, *candidate_count);

        group.bench_with_input(
            BenchmarkId::new("evaluate", candidate_count),
            candidate_count,
            |b, _| {
                b.iter(|| {
                    let engine = MatchingEngine::new();
                    engine.evaluate(
                        black_box(&report),
                        black_box(&candidates),
                        black_box(&criteria),
                        Utc::now(),
                    )
                });
            },
        );
    }
    group.finish();
}

fn bench_grid_query(c: &mut Criterion) {
    let index = GeoGridIndex::new(50.0);
    for report in scattered(ReportType::Found, 1000) {
        index.insert(&report);
    }
    let center = GeoPoint::new(39.78, -89.65);

    c.bench_function("grid_query_radius_1000_indexed", |b| {
        b.iter(|| {
            index.query_radius(black_box(center), black_box(50.0), black_box(ReportType::Found))
        });
    });
}

criterion_group!(
    benches,
    bench_haversine_distance,
    bench_score_pair,
    bench_matching,
    bench_grid_query
);

criterion_main!(benches);
