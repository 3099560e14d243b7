//! Event dispatch table: event kind → handler, with an explicit ignore default.

use crate::channels::{EventKind, WebhookEvent};
use crate::relay::{Relay, RelayOutcome};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerResult {
    Relayed(RelayOutcome),
    Ignored,
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    fn event_kind(&self) -> EventKind;
    async fn handle(&self, event: &WebhookEvent) -> HandlerResult;
}

/// Maps each event kind to at most one handler. Kinds without a handler are ignored.
#[derive(Default)]
pub struct Dispatcher {
    handlers: HashMap<EventKind, Arc<dyn EventHandler>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H>(&mut self, handler: H)
    where
        H: EventHandler + 'static,
    {
        self.handlers.insert(handler.event_kind(), Arc::new(handler));
    }

    pub async fn dispatch(&self, event: &WebhookEvent) -> HandlerResult {
        let kind = event.kind();
        let Some(handler) = self.handlers.get(&kind) else {
            log::debug!("dispatch: ignoring {:?} event", kind);
            return HandlerResult::Ignored;
        };
        handler.handle(event).await
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

/// Dispatcher that relays text messages and ignores everything else.
pub fn default_dispatcher(relay: Relay) -> Dispatcher {
    let mut dispatcher = Dispatcher::new();
    dispatcher.register(TextMessageHandler::new(relay));
    dispatcher
}

pub struct TextMessageHandler {
    relay: Relay,
}

impl TextMessageHandler {
    pub fn new(relay: Relay) -> Self {
        Self { relay }
    }
}

#[async_trait]
impl EventHandler for TextMessageHandler {
    fn event_kind(&self) -> EventKind {
        EventKind::TextMessage
    }

    async fn handle(&self, event: &WebhookEvent) -> HandlerResult {
        if let WebhookEvent::Message(m) = event {
            let user = m.user_id().unwrap_or("(unknown user)");
            if m.is_redelivery() {
                log::info!(
                    "dispatch: redelivered event {} from {}",
                    m.webhook_event_id.as_deref().unwrap_or("(no id)"),
                    user
                );
            } else {
                log::debug!("dispatch: text message from {}", user);
            }
        }
        let Some(inbound) = event.inbound() else {
            log::debug!("dispatch: text message without reply token, ignoring");
            return HandlerResult::Ignored;
        };
        HandlerResult::Relayed(self.relay.handle(inbound).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::WebhookBody;
    use crate::relay::testing::{FakeBackend, RecordingChannel};
    use crate::relay::RelayResult;

    fn events(json: &str) -> Vec<WebhookEvent> {
        serde_json::from_str::<WebhookBody>(json)
            .unwrap()
            .events()
            .map(|e| e.unwrap())
            .collect()
    }

    fn setup() -> (Arc<FakeBackend>, Arc<RecordingChannel>, Dispatcher) {
        let backend = Arc::new(FakeBackend::replying("Hi there"));
        let channel = Arc::new(RecordingChannel::default());
        let relay = Relay::new(backend.clone(), channel.clone(), Arc::from("persona"));
        (backend, channel, default_dispatcher(relay))
    }

    #[test]
    fn default_dispatcher_registers_only_text() {
        let (_, _, dispatcher) = setup();
        assert_eq!(dispatcher.handler_count(), 1);
    }

    #[tokio::test]
    async fn text_message_is_relayed() {
        let (backend, channel, dispatcher) = setup();
        let evs = events(
            r#"{"events":[{"type":"message","message":{"type":"text","text":"Hello"},"replyToken":"tok1"}]}"#,
        );
        let result = dispatcher.dispatch(&evs[0]).await;
        assert_eq!(
            result,
            HandlerResult::Relayed(RelayOutcome {
                result: RelayResult::Success("Hi there".to_string()),
                reply_sent: true,
            })
        );
        assert_eq!(backend.calls(), 1);
        assert_eq!(channel.replies(), vec![("tok1".to_string(), "Hi there".to_string())]);
    }

    #[tokio::test]
    async fn other_kinds_are_ignored() {
        let (backend, channel, dispatcher) = setup();
        let evs = events(
            r#"{"events":[
                {"type":"message","replyToken":"a","message":{"type":"image","id":"1"}},
                {"type":"follow","replyToken":"b"},
                {"type":"postback","replyToken":"c","postback":{"data":"x"}},
                {"type":"things","replyToken":"d"},
                {"type":"message","mode":"standby","message":{"type":"text","text":"hi"}}
            ]}"#,
        );
        for e in &evs {
            assert_eq!(dispatcher.dispatch(e).await, HandlerResult::Ignored);
        }
        assert_eq!(backend.calls(), 0);
        assert!(channel.replies().is_empty());
    }
}
