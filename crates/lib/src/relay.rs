//! Completion relay: one inbound text message in, one model call, exactly one reply out.
//!
//! A failed model call is not swallowed: its error text becomes the reply, prefixed with
//! [`DIAGNOSTIC_PREFIX`], so failures are visible in the chat itself.

use crate::channels::{InboundEvent, ReplyChannel};
use crate::llm::CompletionBackend;
use std::sync::Arc;

/// Prefix of the reply sent when the model call fails.
pub const DIAGNOSTIC_PREFIX: &str = "診斷訊息：";

/// Outcome of one model call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayResult {
    Success(String),
    Failure(String),
}

impl RelayResult {
    /// Text to send back to the chat for this result.
    pub fn reply_text(&self) -> String {
        match self {
            Self::Success(text) => text.clone(),
            Self::Failure(reason) => format!("{}{}", DIAGNOSTIC_PREFIX, reason),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// What happened to one inbound event after the model call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayOutcome {
    pub result: RelayResult,
    /// False when the reply API call failed. It is not retried.
    pub reply_sent: bool,
}

/// Relay between a model backend and a reply channel. Cheap to clone; holds only shared read-only state.
#[derive(Clone)]
pub struct Relay {
    backend: Arc<dyn CompletionBackend>,
    channel: Arc<dyn ReplyChannel>,
    system_instruction: Arc<str>,
}

impl Relay {
    pub fn new(
        backend: Arc<dyn CompletionBackend>,
        channel: Arc<dyn ReplyChannel>,
        system_instruction: Arc<str>,
    ) -> Self {
        Self {
            backend,
            channel,
            system_instruction,
        }
    }

    /// Call the model once. Never retries.
    pub async fn complete(&self, text: &str) -> RelayResult {
        match self.backend.generate(&self.system_instruction, text).await {
            Ok(reply) => RelayResult::Success(reply),
            Err(e) => {
                log::warn!("relay: {} generation failed: {}", self.backend.model(), e);
                RelayResult::Failure(e.to_string())
            }
        }
    }

    /// Complete `event` and send exactly one reply addressed with its reply token.
    pub async fn handle(&self, event: InboundEvent) -> RelayOutcome {
        let result = self.complete(&event.text).await;
        let reply_sent = match self
            .channel
            .reply(&event.reply_token, &result.reply_text())
            .await
        {
            Ok(()) => true,
            Err(e) => {
                log::warn!("relay: {} reply failed: {}", self.channel.id(), e);
                false
            }
        };
        RelayOutcome { result, reply_sent }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{FakeBackend, RecordingChannel};
    use super::*;

    fn event(token: &str, text: &str) -> InboundEvent {
        InboundEvent {
            reply_token: token.to_string(),
            text: text.to_string(),
        }
    }

    #[test]
    fn failure_reply_carries_diagnostic_prefix() {
        let r = RelayResult::Failure("quota exceeded".to_string());
        assert_eq!(r.reply_text(), "診斷訊息：quota exceeded");
        assert!(!r.is_success());
        assert_eq!(RelayResult::Success("ok".to_string()).reply_text(), "ok");
    }

    #[tokio::test]
    async fn success_is_replied_with_model_text() {
        let backend = Arc::new(FakeBackend::replying("Hi there"));
        let channel = Arc::new(RecordingChannel::default());
        let relay = Relay::new(backend.clone(), channel.clone(), Arc::from("persona"));

        let outcome = relay.handle(event("tok1", "Hello")).await;

        assert_eq!(outcome.result, RelayResult::Success("Hi there".to_string()));
        assert!(outcome.reply_sent);
        assert_eq!(
            backend.prompts.lock().unwrap().clone(),
            vec![("persona".to_string(), "Hello".to_string())]
        );
        assert_eq!(
            channel.replies(),
            vec![("tok1".to_string(), "Hi there".to_string())]
        );
    }

    #[tokio::test]
    async fn model_failure_is_replied_as_diagnostic() {
        let backend = Arc::new(FakeBackend::failing());
        let channel = Arc::new(RecordingChannel::default());
        let relay = Relay::new(backend.clone(), channel.clone(), Arc::from("persona"));

        let outcome = relay.handle(event("tok1", "Hello")).await;

        assert!(!outcome.result.is_success());
        assert_eq!(backend.calls(), 1);
        let replies = channel.replies();
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].0, "tok1");
        assert_eq!(
            replies[0].1,
            "診斷訊息：model api error (429): RESOURCE_EXHAUSTED: quota exceeded"
        );
    }

    #[tokio::test]
    async fn reply_failure_is_reported_not_retried() {
        let backend = Arc::new(FakeBackend::replying("Hi"));
        let channel = Arc::new(RecordingChannel {
            fail: true,
            ..Default::default()
        });
        let relay = Relay::new(backend.clone(), channel.clone(), Arc::from("persona"));

        let outcome = relay.handle(event("tok1", "Hello")).await;

        assert!(!outcome.reply_sent);
        assert_eq!(backend.calls(), 1);
        assert_eq!(channel.replies().len(), 1);
    }

    #[tokio::test]
    async fn each_event_gets_its_own_call_and_token() {
        let backend = Arc::new(FakeBackend::replying("same"));
        let channel = Arc::new(RecordingChannel::default());
        let relay = Relay::new(backend.clone(), channel.clone(), Arc::from("persona"));

        relay.handle(event("tok1", "Hello")).await;
        relay.handle(event("tok2", "Hello")).await;

        assert_eq!(backend.calls(), 2);
        let tokens: Vec<String> = channel.replies().into_iter().map(|(t, _)| t).collect();
        assert_eq!(tokens, vec!["tok1".to_string(), "tok2".to_string()]);
    }
}
