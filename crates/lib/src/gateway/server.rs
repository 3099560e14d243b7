//! Gateway HTTP server: LINE webhook callback and health probe.

use crate::channels::signature::{verify_signature, SIGNATURE_HEADER};
use crate::channels::{LineChannel, WebhookBody};
use crate::config::Settings;
use crate::gateway::dispatch::{default_dispatcher, Dispatcher, HandlerResult};
use crate::llm::GeminiClient;
use crate::relay::Relay;
use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;

/// Shared state for the gateway. Everything here is read-only after startup.
#[derive(Clone)]
pub struct GatewayState {
    pub settings: Arc<Settings>,
    pub dispatcher: Arc<Dispatcher>,
}

impl GatewayState {
    /// Wire the Gemini client and LINE reply channel from `settings`.
    pub fn from_settings(settings: Settings) -> Result<Self> {
        let backend = GeminiClient::from_settings(&settings).context("building model client")?;
        let channel = LineChannel::new(
            settings.channel_access_token.clone(),
            Some(settings.line_api_base.clone()),
        );
        let relay = Relay::new(
            Arc::new(backend),
            Arc::new(channel),
            settings.system_instruction.clone(),
        );
        Ok(Self::new(settings, default_dispatcher(relay)))
    }

    pub fn new(settings: Settings, dispatcher: Dispatcher) -> Self {
        Self {
            settings: Arc::new(settings),
            dispatcher: Arc::new(dispatcher),
        }
    }
}

/// Routes: `GET /` health, `POST /callback` LINE webhook.
pub fn router(state: GatewayState) -> Router {
    Router::new()
        .route("/", get(health_http))
        .route("/callback", post(callback))
        .with_state(state)
}

/// Run the gateway server; binds to settings.bind:settings.port.
/// Blocks until shutdown (e.g. Ctrl+C).
pub async fn run_gateway(settings: Settings) -> Result<()> {
    if settings.model_api_key.is_none() {
        log::warn!("GEMINI_API_KEY not configured; every reply will be a diagnostic message");
    }
    if let Some(t) = settings.model_timeout {
        log::info!("model calls time out after {}s", t.as_secs());
    }
    let bind_addr = format!("{}:{}", settings.bind, settings.port);
    let state = GatewayState::from_settings(settings)?;
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding to {}", bind_addr))?;
    log::info!("gateway listening on {}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("gateway server exited")?;
    log::info!("gateway stopped");
    Ok(())
}

/// Future that completes when the process should shut down (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => {
                log::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    log::info!("shutdown signal received, draining connections");
}

/// POST /callback: verifies X-Line-Signature, then dispatches each event.
/// Once the signature checks out the platform always gets 200, whatever the body holds.
async fn callback(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, &'static str) {
    let Some(signature) = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
    else {
        log::warn!("callback: missing {} header", SIGNATURE_HEADER);
        return (StatusCode::BAD_REQUEST, "Bad Request");
    };
    if !verify_signature(&state.settings.channel_secret, &body, signature) {
        log::warn!("callback: invalid signature, rejecting");
        return (StatusCode::BAD_REQUEST, "Bad Request");
    }
    let webhook: WebhookBody = match serde_json::from_slice(&body) {
        Ok(w) => w,
        Err(e) => {
            log::warn!("callback: unparseable webhook body, nothing dispatched: {}", e);
            return (StatusCode::OK, "OK");
        }
    };
    log::debug!(
        "callback: {} event(s) for {}",
        webhook.raw_events.len(),
        webhook.destination.as_deref().unwrap_or("(no destination)")
    );
    for (index, decoded) in webhook.events().enumerate() {
        let event = match decoded {
            Ok(event) => event,
            Err(e) => {
                log::warn!("callback: ignoring undecodable event #{}: {}", index, e);
                continue;
            }
        };
        if let HandlerResult::Relayed(outcome) = state.dispatcher.dispatch(&event).await {
            log::info!(
                "callback: relayed message (model ok: {}, reply sent: {})",
                outcome.result.is_success(),
                outcome.reply_sent
            );
        }
    }
    (StatusCode::OK, "OK")
}

/// GET / returns a simple health JSON (for probes).
async fn health_http(State(state): State<GatewayState>) -> Json<serde_json::Value> {
    Json(json!({
        "runtime": "running",
        "port": state.settings.port,
    }))
}
