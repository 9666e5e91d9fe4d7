//! Observer-facing endpoints.
//!
//! Observers connect over WebSocket and receive `alert`/`status` frames
//! as JSON text; `send_message` frames flow back into the router's
//! command path. A `/health` endpoint reports liveness and store health.

use crate::config::Config;
use crate::metrics::{self, ObserverMetricsGuard};
use anyhow::Result;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use futures_util::{SinkExt, StreamExt};
use haven_core::{EventRouter, ObserverHub, PersistenceGateway};
use haven_protocol::{codec, ClientFrame};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

/// Shared server state.
pub struct AppState {
    /// The observer hub.
    pub hub: Arc<ObserverHub>,
    /// The event router.
    pub router: Arc<EventRouter>,
    /// The persistence gateway, for health reporting.
    pub store: Arc<dyn PersistenceGateway>,
}

/// Run the HTTP/WebSocket server until `shutdown` resolves.
///
/// # Errors
///
/// Returns an error if the server fails to bind or serve.
pub async fn run_server(
    config: &Config,
    state: Arc<AppState>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let app = Router::new()
        .route(&config.observer.websocket_path, get(ws_handler))
        .route("/health", get(health_handler))
        .with_state(state);

    let addr = config.bind_addr();
    let listener = TcpListener::bind(addr).await?;

    info!("Haven server listening on {}", addr);
    info!(
        "Observer endpoint: ws://{}{}",
        addr, config.observer.websocket_path
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}

/// Health check handler.
async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let store_ok = state.store.health_check().await;

    axum::Json(serde_json::json!({
        "status": "ok",
        "store": if store_ok { "ok" } else { "unavailable" },
        "observers": state.hub.observer_count(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// WebSocket upgrade handler.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_observer(socket, state))
}

/// Handle one observer connection.
async fn handle_observer(socket: WebSocket, state: Arc<AppState>) {
    let _metrics_guard = ObserverMetricsGuard::new();

    let (observer_id, mut frames) = state.hub.connect();
    debug!(observer = %observer_id, "Observer WebSocket connected");

    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            biased;

            // Frames broadcast by the router, delivered through the hub.
            frame = frames.recv() => {
                let Some(frame) = frame else { break };
                match codec::encode(&frame) {
                    Ok(text) => {
                        metrics::record_frame_out();
                        if sender.send(Message::Text(text)).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(observer = %observer_id, error = %e, "Frame encode failed");
                        metrics::record_error("encode");
                    }
                }
            }

            // Frames sent by the observer.
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        match codec::decode_client(&text) {
                            Ok(ClientFrame::SendMessage(send)) => {
                                metrics::record_command();
                                state.router.on_observer_command(send.msg, send.color).await;
                            }
                            Err(e) => {
                                warn!(observer = %observer_id, error = %e, "Ignoring malformed observer frame");
                                metrics::record_error("malformed_frame");
                            }
                        }
                    }
                    Some(Ok(Message::Binary(_))) => {
                        warn!(observer = %observer_id, "Ignoring binary frame from observer");
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Pong(_))) => {
                        // Ignore pongs
                    }
                    Some(Ok(Message::Close(_))) => {
                        debug!(observer = %observer_id, "Observer sent close frame");
                        break;
                    }
                    Some(Err(e)) => {
                        warn!(observer = %observer_id, error = %e, "Observer socket error");
                        metrics::record_error("websocket");
                        break;
                    }
                    None => {
                        debug!(observer = %observer_id, "Observer stream ended");
                        break;
                    }
                }
            }
        }
    }

    state.hub.disconnect(observer_id);
    debug!(observer = %observer_id, "Observer WebSocket disconnected");
}
