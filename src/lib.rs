//! Shelter Match - Lost-and-found matching and alerting engine
//!
//! This library pairs lost-pet reports with found-pet reports through a
//! weighted multi-attribute scoring pipeline, evaluates geofenced alert
//! subscriptions, and fans notifications out to delivery channels with
//! digest batching and retry handling.

pub mod alerts;
pub mod config;
pub mod core;
pub mod engine;
pub mod index;
pub mod models;
pub mod notify;
pub mod services;

// Re-export commonly used types
pub use config::Settings;
pub use core::distance::haversine_distance;
pub use core::matcher::{MatchUpsert, MatchingEngine};
pub use core::scoring::score_pair;
pub use engine::{EngineError, LostFoundEngine};
pub use index::GeoGridIndex;
pub use models::{
    AutoMatchingCriteria, EngineEvent, LostFoundAlert, LostPetReport, PotentialMatch,
};
