// Geospatial index exports
pub mod grid;

pub use grid::GeoGridIndex;
