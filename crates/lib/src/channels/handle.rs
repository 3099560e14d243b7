//! Reply side of a channel.

use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("channel request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("channel api error: {0}")]
    Api(String),
}

/// Handle to a channel that can answer an inbound event.
#[async_trait]
pub trait ReplyChannel: Send + Sync {
    /// Channel id (e.g. "line").
    fn id(&self) -> &str;
    /// Send `text` as the reply for the event that carried `reply_token`.
    async fn reply(&self, reply_token: &str, text: &str) -> Result<(), ChannelError>;
}
