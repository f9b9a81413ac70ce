// Core algorithm exports
pub mod distance;
pub mod filters;
pub mod matcher;
pub mod scoring;

pub use distance::{cell_key, cell_size_for_radius, haversine_distance, neighborhood, CellKey};
pub use filters::{breed_is_open, breeds_conflict, delta_days, jaccard, species_matches, tokenize};
pub use matcher::{MatchUpsert, MatchingEngine, ReviewError};
pub use scoring::{score_pair, ScoreOutcome};
