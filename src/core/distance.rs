use crate::models::GeoPoint;

/// Earth's radius in kilometers
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Approximate kilometers spanned by one degree of latitude
pub const KM_PER_DEGREE_LAT: f64 = 111.0;

/// Calculate the Haversine distance between two points in kilometers
///
/// # Arguments
/// * `a` - First point in degrees
/// * `b` - Second point in degrees
///
/// # Returns
/// Great-circle distance in kilometers
#[inline]
pub fn haversine_distance(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat1_rad = a.latitude.to_radians();
    let lat2_rad = b.latitude.to_radians();
    let delta_lat = (b.latitude - a.latitude).to_radians();
    let delta_lon = (b.longitude - a.longitude).to_radians();

    let h = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_KM * c
}

/// Grid cell key for the geospatial index
///
/// Cells are sized so a radius query for the configured maximum distance
/// only has to enumerate the center cell plus its ring of neighbors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellKey {
    pub lat_idx: i32,
    pub lon_idx: i32,
}

/// Compute the cell key for a point given a cell edge length in degrees
#[inline]
pub fn cell_key(point: GeoPoint, cell_size_deg: f64) -> CellKey {
    CellKey {
        lat_idx: (point.latitude / cell_size_deg).floor() as i32,
        lon_idx: (point.longitude / cell_size_deg).floor() as i32,
    }
}

/// Cell edge length (degrees) sized so `max_distance_km` fits within one
/// neighbor ring. Longitude degrees shrink toward the poles; 60° latitude
/// (cos = 0.5) is used as the worst case the index is expected to serve.
pub fn cell_size_for_radius(max_distance_km: f64) -> f64 {
    let deg = max_distance_km / KM_PER_DEGREE_LAT / 0.5;
    deg.max(0.001)
}

/// Enumerate a cell and its ring of neighbors (the 3x3 block)
pub fn neighborhood(center: CellKey) -> impl Iterator<Item = CellKey> {
    (-1..=1).flat_map(move |dlat| {
        (-1..=1).map(move |dlon| CellKey {
            lat_idx: center.lat_idx + dlat,
            lon_idx: center.lon_idx + dlon,
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haversine_distance() {
        // Distance from London to Paris (approximately 344 km)
        let london = GeoPoint::new(51.5074, -0.1278);
        let paris = GeoPoint::new(48.8566, 2.3522);

        let distance = haversine_distance(london, paris);
        assert!(
            (distance - 344.0).abs() < 10.0,
            "Distance should be ~344km, got {}",
            distance
        );
    }

    #[test]
    fn test_haversine_zero_distance() {
        let p = GeoPoint::new(39.78, -89.65);
        assert!(haversine_distance(p, p) < 0.01);
    }

    #[test]
    fn test_haversine_symmetry() {
        let a = GeoPoint::new(39.78, -89.65);
        let b = GeoPoint::new(39.79, -89.64);
        let ab = haversine_distance(a, b);
        let ba = haversine_distance(b, a);
        assert!((ab - ba).abs() < 1e-9);
    }

    #[test]
    fn test_cell_key_stability() {
        let size = cell_size_for_radius(50.0);
        let p = GeoPoint::new(39.78, -89.65);
        assert_eq!(cell_key(p, size), cell_key(p, size));
    }

    #[test]
    fn test_nearby_points_share_neighborhood() {
        let size = cell_size_for_radius(50.0);
        let a = GeoPoint::new(39.78, -89.65);
        let b = GeoPoint::new(39.79, -89.64); // ~1.4km away
        let key_b = cell_key(b, size);
        assert!(neighborhood(cell_key(a, size)).any(|k| k == key_b));
    }

    #[test]
    fn test_cell_size_spans_radius() {
        // One cell edge at 60°N must cover the query radius so the 3x3
        // neighborhood is sufficient.
        let radius = 50.0;
        let size = cell_size_for_radius(radius);
        let km_per_degree_lon_at_60 = KM_PER_DEGREE_LAT * 0.5;
        assert!(size * km_per_degree_lon_at_60 >= radius);
    }

    #[test]
    fn test_neighborhood_is_nine_cells() {
        let count = neighborhood(CellKey { lat_idx: 0, lon_idx: 0 }).count();
        assert_eq!(count, 9);
    }
}
