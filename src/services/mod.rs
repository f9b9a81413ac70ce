// Service exports
pub mod channel;
pub mod repository;

pub use channel::{ChannelKind, NotificationChannel, RenderedMessage, SendOutcome};
pub use repository::{
    AlertRepository, InMemoryAlertRepository, InMemoryReportRepository, ReportRepository,
    RepositoryError,
};
