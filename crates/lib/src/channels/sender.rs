//! Outbound side of a channel: deliver a reply to the conversation it answers.

use crate::activity::Reply;
use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("connector request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("connector api error: {0}")]
    Api(String),
    #[error("reply has no service url and none is configured")]
    NoServiceUrl,
    #[error("invalid service url {0}")]
    InvalidServiceUrl(String),
    #[error("channel closed")]
    Closed,
}

/// Delivers replies. Shared by all turns, so implementations must be `Send + Sync`.
#[async_trait]
pub trait ReplySender: Send + Sync {
    /// Channel adapter name for logs (e.g. "connector").
    fn id(&self) -> &str;
    /// Send one reply. Failures are reported to the caller; nothing is retried here.
    async fn send_reply(&self, reply: &Reply) -> Result<(), ChannelError>;
}
