use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Delivery channel discriminator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Email,
    Sms,
    Push,
}

impl ChannelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelKind::Email => "email",
            ChannelKind::Sms => "sms",
            ChannelKind::Push => "push",
        }
    }
}

/// A rendered, ready-to-send message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderedMessage {
    pub subject: String,
    pub body: String,
}

/// Result of one send attempt
///
/// Transient errors are retried with backoff up to the configured attempt
/// cap; permanent errors suppress the channel for that subscriber until
/// their contact info is updated.
#[derive(Debug, Clone)]
pub enum SendOutcome {
    Delivered,
    TransientError(String),
    PermanentError(String),
}

/// A delivery transport (email/SMS/push). Implementations live outside the
/// core; the dispatcher wraps every call in a bounded timeout.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    fn kind(&self) -> ChannelKind;

    async fn send(&self, recipient: &str, message: &RenderedMessage) -> SendOutcome;
}
