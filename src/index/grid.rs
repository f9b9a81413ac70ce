use std::collections::HashMap;
use std::sync::RwLock;

use crate::core::distance::{
    cell_key, cell_size_for_radius, haversine_distance, neighborhood, CellKey, KM_PER_DEGREE_LAT,
};
use crate::models::{GeoPoint, LostPetReport, ReportType};

/// In-memory geospatial grid index over active reports
///
/// Reports are bucketed by a coarse grid-cell key sized so the configured
/// maximum match distance spans at most one ring of neighbor cells. The
/// index holds no reference to inactive reports, bounding its size to the
/// currently-open caseload.
///
/// The cell map sits behind a single reader-writer lock: a radius query
/// never observes a half-inserted report.
pub struct GeoGridIndex {
    cell_size_deg: f64,
    inner: RwLock<Cells>,
}

#[derive(Default)]
struct Cells {
    by_cell: HashMap<CellKey, Vec<LostPetReport>>,
    cell_of: HashMap<String, CellKey>,
}

impl GeoGridIndex {
    /// Create an index whose cells cover `max_distance_km` within the
    /// center cell plus one neighbor ring
    pub fn new(max_distance_km: f64) -> Self {
        Self {
            cell_size_deg: cell_size_for_radius(max_distance_km),
            inner: RwLock::new(Cells::default()),
        }
    }

    /// Insert or replace an active report
    ///
    /// Non-active reports and reports with out-of-range coordinates are
    /// skipped with a logged warning rather than indexed.
    pub fn insert(&self, report: &LostPetReport) {
        if !report.status.is_active() {
            tracing::debug!(report_id = %report.id, "not indexing inactive report");
            return;
        }
        if !report.point().is_valid() {
            tracing::warn!(
                report_id = %report.id,
                "not indexing report with out-of-range coordinates"
            );
            return;
        }

        let key = cell_key(report.point(), self.cell_size_deg);
        let mut cells = self.inner.write().unwrap_or_else(|e| e.into_inner());

        if let Some(previous) = cells.cell_of.insert(report.id.clone(), key) {
            if let Some(bucket) = cells.by_cell.get_mut(&previous) {
                bucket.retain(|r| r.id != report.id);
            }
        }
        cells.by_cell.entry(key).or_default().push(report.clone());
    }

    /// Remove a report; called whenever a report leaves the active state
    pub fn remove(&self, report_id: &str) {
        let mut cells = self.inner.write().unwrap_or_else(|e| e.into_inner());
        if let Some(key) = cells.cell_of.remove(report_id) {
            if let Some(bucket) = cells.by_cell.get_mut(&key) {
                bucket.retain(|r| r.id != report_id);
                if bucket.is_empty() {
                    cells.by_cell.remove(&key);
                }
            }
        }
    }

    /// All active reports of `report_type` within `radius_km` of `center`,
    /// true-haversine filtered
    pub fn query_radius(
        &self,
        center: GeoPoint,
        radius_km: f64,
        report_type: ReportType,
    ) -> Vec<LostPetReport> {
        if !center.is_valid() || radius_km <= 0.0 {
            return Vec::new();
        }

        let center_key = cell_key(center, self.cell_size_deg);
        let span = self.ring_span(radius_km);
        let cells = self.inner.read().unwrap_or_else(|e| e.into_inner());

        let mut results = Vec::new();
        let mut scan = |key: &CellKey| {
            if let Some(bucket) = cells.by_cell.get(key) {
                for report in bucket {
                    if report.report_type == report_type
                        && haversine_distance(center, report.point()) <= radius_km
                    {
                        results.push(report.clone());
                    }
                }
            }
        };

        if span <= 1 {
            for key in neighborhood(center_key) {
                scan(&key);
            }
        } else {
            // Radius exceeds the configured cell span; widen the ring so
            // oversized queries stay correct.
            for dlat in -span..=span {
                for dlon in -span..=span {
                    scan(&CellKey {
                        lat_idx: center_key.lat_idx + dlat,
                        lon_idx: center_key.lon_idx + dlon,
                    });
                }
            }
        }
        results
    }

    /// Number of indexed reports
    pub fn len(&self) -> usize {
        let cells = self.inner.read().unwrap_or_else(|e| e.into_inner());
        cells.cell_of.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Neighbor-ring breadth needed to cover `radius_km` at the index's
    /// worst-case latitude
    fn ring_span(&self, radius_km: f64) -> i32 {
        let radius_deg = radius_km / (KM_PER_DEGREE_LAT * 0.5);
        (radius_deg / self.cell_size_deg).ceil().max(1.0) as i32
    }
}
