//! Gateway: HTTP webhook endpoint for the LINE channel.
//!
//! `POST /callback` is authenticated by the body signature, then each event goes through the
//! dispatch table. Text messages are relayed to the model and answered; all else is ignored.

mod dispatch;
mod server;

pub use dispatch::{
    default_dispatcher, Dispatcher, EventHandler, HandlerResult, TextMessageHandler,
};
pub use server::{router, run_gateway, GatewayState};
