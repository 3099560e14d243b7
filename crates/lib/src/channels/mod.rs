//! Communication channels (LINE).
//!
//! Webhook payload types, signature verification, and the reply side of a channel.
//! Inbound text messages become [`InboundEvent`]s handed to the relay.

mod handle;
mod inbound;
pub mod line;
pub mod signature;

pub use handle::{ChannelError, ReplyChannel};
pub use inbound::InboundEvent;
pub use line::{EventKind, LineChannel, WebhookBody, WebhookEvent};
