//! Inbound event from a channel: one text message to be answered exactly once.

/// A text message extracted from a webhook event. The reply token is single-use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    pub reply_token: String,
    pub text: String,
}
