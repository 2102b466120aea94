use crate::config::ApiKey;
use crate::pipeline::Dispatcher;
use crate::webhook::line::{verify_signature, WebhookBody, SIGNATURE_HEADER};
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::Router;
use bytes::Bytes;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

const LOG_TARGET: &str = "webhook::server";

#[derive(Clone)]
pub struct AppState {
    dispatcher: Dispatcher,
    channel_secret: Arc<ApiKey>,
}

impl AppState {
    pub fn new(dispatcher: Dispatcher, channel_secret: ApiKey) -> Self {
        Self {
            dispatcher,
            channel_secret: Arc::new(channel_secret),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/webhook", post(webhook))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve until Ctrl-C.
pub async fn serve(listener: TcpListener, state: AppState) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(target: LOG_TARGET, %addr, "listening");
    }
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(target: LOG_TARGET, error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!(target: LOG_TARGET, "shutting down");
}

async fn health() -> &'static str {
    "OK"
}

/// Verify, parse, hand the batch off, and acknowledge right away. The
/// platform gets its 200 no matter how translation goes.
async fn webhook(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> StatusCode {
    let Some(signature) = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
    else {
        tracing::warn!(target: LOG_TARGET, "webhook without signature");
        return StatusCode::UNAUTHORIZED;
    };

    if !verify_signature(state.channel_secret.expose(), &body, signature) {
        tracing::warn!(target: LOG_TARGET, "webhook signature mismatch");
        return StatusCode::UNAUTHORIZED;
    }

    let payload: WebhookBody = match serde_json::from_slice(&body) {
        Ok(p) => p,
        Err(e) => {
            tracing::warn!(target: LOG_TARGET, error = %e, "malformed webhook body");
            return StatusCode::BAD_REQUEST;
        }
    };

    let events = payload.into_chat_events();
    tracing::debug!(target: LOG_TARGET, events = events.len(), "webhook accepted");
    if !events.is_empty() {
        let dispatcher = state.dispatcher.clone();
        tokio::spawn(async move {
            dispatcher.handle_batch(events).await;
        });
    }
    StatusCode::OK
}
