// Notification rendering, dispatch, and digest batching
pub mod digest;
pub mod dispatcher;
pub mod template;

pub use digest::{DigestBuffers, DigestEntry, DigestSchedule, DigestScheduler};
pub use dispatcher::{NotificationDispatcher, RetryPolicy};
pub use template::{NotificationTemplate, TemplateSet};
