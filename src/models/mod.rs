// Model exports
pub mod domain;
pub mod events;

pub use domain::{
    AlertChannels, AlertFrequency, AlertTrigger, AutoMatchingCriteria, ContactAttempt,
    DeliveryState, DigestKind, FactorKind, FactorRule, FollowUpRecord, GeoPoint, LostFoundAlert,
    LostPetReport, MatchStatus, MatchingFactor, PetSize, PotentialMatch, QuietHours,
    ReportLocation, ReportStatus, ReportType, ReunionInfo, SubscriberContact,
};
pub use events::EngineEvent;
