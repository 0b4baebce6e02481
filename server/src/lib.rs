//! HTTP and WebSocket surface for the Pawline chat relay.
//!
//! Both surfaces are thin wrappers around [`RelayHandle`]: the WebSocket
//! endpoint feeds transport events into the relay actor, and the REST
//! endpoint performs the same persist-and-fan-out as a broadcast send for
//! non-connection callers.

use axum::{
    extract::{
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use futures_util::{SinkExt, StreamExt};
use pawline_relay::{validate_connect, Outbound, RelayError, RelayHandle, POLICY_VIOLATION};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, error, warn};

#[derive(Clone)]
pub struct AppState {
    pub relay: RelayHandle,
}

impl AppState {
    pub fn new(relay: RelayHandle) -> Self {
        Self { relay }
    }
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/ws", get(websocket_handler))
        .route("/api/send", post(send_message))
        .route("/api/health", get(health))
        .with_state(state)
        .layer(cors)
}

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    /// Conversation key; defaults to the relay's configured room.
    conv: Option<String>,
    /// Self-asserted identity. Supplying `conv` without `user` is a policy
    /// violation.
    user: Option<String>,
}

async fn websocket_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsQuery>,
    State(state): State<AppState>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, params))
}

async fn handle_socket(socket: WebSocket, state: AppState, params: WsQuery) {
    if let Err(violation) = validate_connect(params.conv.as_deref(), params.user.as_deref()) {
        warn!(error = %violation, "rejecting websocket connection");
        close_with_policy_violation(socket, violation).await;
        return;
    }

    let (mut ws_sender, mut receiver) = socket.split();
    let conn_id = state.relay.next_conn_id();
    let (out_tx, mut out_rx) = state.relay.outbound_channel();

    let sender_task = tokio::spawn(async move {
        while let Some(outbound) = out_rx.recv().await {
            let frame = match outbound {
                Outbound::Event(event) => match serde_json::to_string(&event) {
                    Ok(json) => Message::Text(json),
                    Err(e) => {
                        error!(error = %e, "failed to encode server event");
                        continue;
                    }
                },
                Outbound::Ping => Message::Ping(Vec::new()),
                Outbound::Close { code, reason } => {
                    let frame = CloseFrame {
                        code,
                        reason: reason.into(),
                    };
                    let _ = ws_sender.send(Message::Close(Some(frame))).await;
                    break;
                }
            };

            if ws_sender.send(frame).await.is_err() {
                break;
            }
        }
    });

    state
        .relay
        .connect(conn_id, params.conv, params.user, out_tx)
        .await;
    debug!(conn_id, "websocket connection established");

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => state.relay.frame(conn_id, text).await,
            Ok(Message::Pong(_)) => state.relay.pong(conn_id).await,
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                debug!(conn_id, error = %e, "websocket receive error");
                break;
            }
        }
    }

    state.relay.disconnect(conn_id).await;
    sender_task.abort();
    debug!(conn_id, "websocket connection closed");
}

async fn close_with_policy_violation(mut socket: WebSocket, violation: RelayError) {
    let frame = CloseFrame {
        code: POLICY_VIOLATION,
        reason: violation.to_string().into(),
    };
    let _ = socket.send(Message::Close(Some(frame))).await;
}

#[derive(Debug, Deserialize)]
pub struct SendRequest {
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub identity: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

/// Persist and broadcast a message without a live connection. Delivery is
/// fire-and-forget, matching the relay's best-effort guarantee.
async fn send_message(
    State(state): State<AppState>,
    Json(payload): Json<SendRequest>,
) -> Response {
    let Some(identity) = payload.identity.filter(|i| !i.is_empty()) else {
        return bad_request("missing identity");
    };
    let Some(content) = payload.content else {
        return bad_request("missing content");
    };

    state.relay.publish(payload.channel, identity, content).await;
    Json(json!({ "ok": true })).into_response()
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "ok": true }))
}

fn bad_request(message: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
        .into_response()
}
