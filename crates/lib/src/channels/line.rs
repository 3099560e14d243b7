//! LINE Messaging API channel: webhook payload types and the reply API.
//!
//! Webhook bodies are `{ "destination": ..., "events": [...] }`; each event is tagged by `type`
//! and message events carry a `message` tagged by its own `type`. Unknown kinds deserialize to
//! `Unsupported` so new platform event types never break parsing of the rest of the body.
//! Events are kept as raw JSON until [`WebhookBody::events`] decodes them one at a time, so a
//! malformed event only costs itself.

use crate::channels::handle::{ChannelError, ReplyChannel};
use crate::channels::inbound::InboundEvent;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

const LINE_API_BASE: &str = "https://api.line.me";

/// Maximum characters in one text message object.
pub const MAX_TEXT_CHARS: usize = 5000;
/// Maximum message objects in one reply call.
pub const MAX_REPLY_MESSAGES: usize = 5;

/// Webhook POST body.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookBody {
    /// Bot user id the events were sent to.
    #[serde(default)]
    pub destination: Option<String>,
    /// May be empty (the console's "Verify" button sends no events).
    #[serde(default, rename = "events")]
    pub raw_events: Vec<serde_json::Value>,
}

impl WebhookBody {
    /// Decode each event independently, in body order.
    pub fn events(&self) -> impl Iterator<Item = Result<WebhookEvent, serde_json::Error>> + '_ {
        self.raw_events.iter().map(WebhookEvent::deserialize)
    }
}

/// One webhook event.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum WebhookEvent {
    Message(MessageEvent),
    Follow,
    Unfollow,
    Join,
    Leave,
    Postback,
    MemberJoined,
    MemberLeft,
    Unsend,
    #[serde(other)]
    Unsupported,
}

/// Event kinds used as dispatch keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    TextMessage,
    /// Image, sticker, location, etc.
    OtherMessage,
    Follow,
    Unfollow,
    Join,
    Leave,
    Postback,
    MemberJoined,
    MemberLeft,
    Unsend,
    Unsupported,
}

impl WebhookEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Message(m) => match m.message {
                MessageContent::Text(_) => EventKind::TextMessage,
                _ => EventKind::OtherMessage,
            },
            Self::Follow => EventKind::Follow,
            Self::Unfollow => EventKind::Unfollow,
            Self::Join => EventKind::Join,
            Self::Leave => EventKind::Leave,
            Self::Postback => EventKind::Postback,
            Self::MemberJoined => EventKind::MemberJoined,
            Self::MemberLeft => EventKind::MemberLeft,
            Self::Unsend => EventKind::Unsend,
            Self::Unsupported => EventKind::Unsupported,
        }
    }

    /// Text and reply token when this is a text message that can be replied to.
    pub fn inbound(&self) -> Option<InboundEvent> {
        let Self::Message(m) = self else {
            return None;
        };
        let MessageContent::Text(ref t) = m.message else {
            return None;
        };
        let reply_token = m.reply_token.as_ref().filter(|tok| !tok.is_empty())?;
        Some(InboundEvent {
            reply_token: reply_token.clone(),
            text: t.text.clone(),
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageEvent {
    /// Absent when the channel is in standby mode.
    #[serde(default)]
    pub reply_token: Option<String>,
    pub message: MessageContent,
    #[serde(default)]
    pub source: Option<EventSource>,
    #[serde(default)]
    pub webhook_event_id: Option<String>,
    #[serde(default)]
    pub delivery_context: Option<DeliveryContext>,
}

impl MessageEvent {
    /// True when LINE is re-sending an event it could not deliver earlier.
    pub fn is_redelivery(&self) -> bool {
        self.delivery_context
            .as_ref()
            .map(|d| d.is_redelivery)
            .unwrap_or(false)
    }

    pub fn user_id(&self) -> Option<&str> {
        self.source.as_ref().and_then(|s| s.user_id.as_deref())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum MessageContent {
    Text(TextContent),
    Image,
    Video,
    Audio,
    File,
    Location,
    Sticker,
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TextContent {
    pub text: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventSource {
    /// Absent for group and room sources when the sender has not consented.
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryContext {
    #[serde(default)]
    pub is_redelivery: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReplyRequest<'a> {
    reply_token: &'a str,
    messages: Vec<TextMessage>,
}

#[derive(Debug, Serialize)]
struct TextMessage {
    #[serde(rename = "type")]
    typ: &'static str,
    text: String,
}

/// Split reply text into at most [`MAX_REPLY_MESSAGES`] chunks of at most [`MAX_TEXT_CHARS`] characters.
/// Returns the chunks and whether text was dropped.
pub fn split_reply_text(text: &str) -> (Vec<String>, bool) {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut count = 0;
    let mut chars = text.chars();
    for c in chars.by_ref() {
        if count == MAX_TEXT_CHARS {
            chunks.push(std::mem::take(&mut current));
            count = 0;
            if chunks.len() == MAX_REPLY_MESSAGES {
                return (chunks, true);
            }
        }
        current.push(c);
        count += 1;
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    (chunks, false)
}

/// LINE channel connector: answers events through the reply API.
pub struct LineChannel {
    id: String,
    access_token: String,
    api_base: String,
    client: reqwest::Client,
}

impl LineChannel {
    pub fn new(access_token: String, api_base: Option<String>) -> Self {
        let api_base = api_base
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|| LINE_API_BASE.to_string());
        Self {
            id: "line".to_string(),
            access_token,
            api_base,
            client: reqwest::Client::new(),
        }
    }

    /// POST /v2/bot/message/reply: one call, up to five text messages.
    pub async fn reply_message(&self, reply_token: &str, text: &str) -> Result<(), ChannelError> {
        if text.trim().is_empty() {
            return Err(ChannelError::Api("refusing to send an empty reply".to_string()));
        }
        let (chunks, truncated) = split_reply_text(text);
        if truncated {
            log::warn!(
                "line: reply exceeds {} messages of {} chars, dropping the rest",
                MAX_REPLY_MESSAGES,
                MAX_TEXT_CHARS
            );
        }
        let body = ReplyRequest {
            reply_token,
            messages: chunks
                .into_iter()
                .map(|text| TextMessage { typ: "text", text })
                .collect(),
        };
        let url = format!("{}/v2/bot/message/reply", self.api_base);
        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(ChannelError::Api(format!("reply failed: {} {}", status, body)));
        }
        Ok(())
    }
}

#[async_trait]
impl ReplyChannel for LineChannel {
    fn id(&self) -> &str {
        &self.id
    }

    async fn reply(&self, reply_token: &str, text: &str) -> Result<(), ChannelError> {
        self.reply_message(reply_token, text).await
    }
}
