use crate::api::{json_body, ChatBody, ChatResponse};
use crate::connection::Connection;
use crate::error::ApiError;
use crate::router::ChatRequest;
use crate::server::AppState;
use axum::{
    extract::{
        rejection::JsonRejection,
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use switchboard_core::{ChannelKind, SwitchboardError};
use switchboard_security::redact;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Frame sent by the browser widget.
#[derive(Debug, Deserialize)]
pub struct WebFrame {
    pub session_id: Option<String>,
    pub message: String,
    pub language: Option<String>,
}

/// Frame sent back to the widget.
#[derive(Debug, Serialize)]
pub struct ReplyFrame {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub session_id: String,
    pub text: String,
    pub intent: Option<String>,
    pub confidence: Option<f64>,
}

/// `POST /api/web/chat`: the direct chat contract, always on the web channel.
pub async fn chat(
    State(state): State<Arc<AppState>>,
    body: Result<Json<ChatBody>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let body = json_body(body)?;
    let message = body
        .message
        .filter(|m| !m.trim().is_empty())
        .ok_or_else(|| ApiError(SwitchboardError::Validation("message is required".into())))?;

    let outcome = state
        .router
        .handle(
            ChatRequest::new(ChannelKind::Web, message)
                .session(body.session_id)
                .language(body.language),
        )
        .await?;
    Ok(Json(outcome.into()))
}

/// `GET /api/web/ws`
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    use futures_util::{SinkExt, StreamExt};

    let connection_id = Uuid::new_v4();
    // Provisional; the session is created by the first message.
    let session_id = Uuid::new_v4().to_string();
    let (mut ws_sender, mut ws_receiver) = socket.split();

    // Channel for sending messages back to the WebSocket
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    state
        .connections
        .add(Connection {
            id: connection_id,
            session_id: session_id.clone(),
            tx,
        })
        .await;

    info!(
        connection_id = %connection_id,
        session_id = %session_id,
        "WebSocket connected"
    );

    let welcome = serde_json::json!({
        "type": "connected",
        "session_id": session_id,
        "connection_id": connection_id,
    });
    state
        .connections
        .send_to_connection(connection_id, &welcome.to_string())
        .await;

    // Task: forward messages from channel to WebSocket
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if ws_sender.send(Message::Text(msg.into())).await.is_err() {
                break;
            }
        }
    });

    // Task: receive frames from the WebSocket and run them through the router
    let recv_state = state.clone();
    let recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_receiver.next().await {
            match msg {
                Message::Text(text) => {
                    handle_frame(&recv_state, connection_id, text.as_str()).await;
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    // Wait for either task to finish
    tokio::select! {
        _ = send_task => {},
        _ = recv_task => {},
    }

    state.connections.remove(connection_id).await;
    info!(connection_id = %connection_id, "WebSocket disconnected");
}

async fn handle_frame(state: &AppState, connection_id: Uuid, raw: &str) {
    let current = state
        .connections
        .session_of(connection_id)
        .await
        .unwrap_or_default();

    // Plain text is a message on the connection's current session.
    let frame = serde_json::from_str::<WebFrame>(raw).unwrap_or_else(|_| WebFrame {
        session_id: None,
        message: raw.to_string(),
        language: None,
    });
    let requested = frame.session_id.unwrap_or_else(|| current.clone());

    let request = ChatRequest::new(ChannelKind::Web, frame.message)
        .session(Some(requested.clone()))
        .language(frame.language)
        .identifier("connection_id", connection_id.to_string());

    let response = match state.router.handle(request).await {
        Ok(outcome) => {
            if outcome.session_id != current {
                state
                    .connections
                    .bind_session(connection_id, &outcome.session_id)
                    .await;
            }
            serde_json::to_string(&ReplyFrame {
                kind: "reply",
                session_id: outcome.session_id,
                text: outcome.reply.text,
                intent: outcome.reply.intent,
                confidence: outcome.reply.confidence,
            })
        }
        Err(e) => {
            warn!(
                connection_id = %connection_id,
                error = %redact(&e.to_string()),
                "WebSocket message failed"
            );
            let message = match &e {
                SwitchboardError::Validation(msg) => redact(msg),
                _ => switchboard_core::TECHNICAL_DIFFICULTIES_TEXT.to_string(),
            };
            Ok(serde_json::json!({
                "type": "error",
                "session_id": requested,
                "error": message,
                "code": e.code(),
            })
            .to_string())
        }
    };

    match response {
        Ok(json) => {
            state.connections.send_to_connection(connection_id, &json).await;
        }
        Err(e) => error!(error = %e, "Failed to encode WebSocket frame"),
    }
}
