//! Direct HTTP API: chat, voice transcripts, session history, handoff and
//! the dialogue engine status check.

use crate::error::{ApiError, ErrorBody};
use crate::router::{ChatOutcome, ChatRequest};
use crate::server::AppState;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use switchboard_core::{ChannelKind, SwitchboardError};
use switchboard_security::redact;

const MAX_HANDOFF_REASON_CHARS: usize = 500;

#[derive(Debug, Deserialize)]
pub struct ChatBody {
    pub message: Option<String>,
    pub session_id: Option<String>,
    pub language: Option<String>,
    pub channel: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct VoiceBody {
    pub audio_text: Option<String>,
    pub session_id: Option<String>,
    pub language: Option<String>,
    pub channel: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct HandoffBody {
    pub session_id: Option<String>,
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub session_id: String,
    pub text: String,
    pub intent: Option<String>,
    pub confidence: Option<f64>,
}

impl From<ChatOutcome> for ChatResponse {
    fn from(outcome: ChatOutcome) -> Self {
        Self {
            session_id: outcome.session_id,
            text: outcome.reply.text,
            intent: outcome.reply.intent,
            confidence: outcome.reply.confidence,
        }
    }
}

/// Unwrap a JSON body, reporting rejections in the API error shape.
pub(crate) fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    body.map(|Json(inner)| inner).map_err(|rejection| {
        ApiError(SwitchboardError::Validation(format!(
            "Invalid request body: {}",
            rejection.body_text()
        )))
    })
}

fn required(value: Option<String>, field: &str) -> Result<String, ApiError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ApiError(SwitchboardError::Validation(format!("{field} is required"))))
}

fn channel_or(channel: Option<&str>, default: ChannelKind) -> Result<ChannelKind, ApiError> {
    channel.map_or(Ok(default), |c| c.parse().map_err(ApiError))
}

/// `POST /api/chat`
pub async fn chat(
    State(state): State<Arc<AppState>>,
    body: Result<Json<ChatBody>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let body = json_body(body)?;
    let message = required(body.message, "message")?;
    let channel = channel_or(body.channel.as_deref(), ChannelKind::Web)?;

    let outcome = state
        .router
        .handle(
            ChatRequest::new(channel, message)
                .session(body.session_id)
                .language(body.language),
        )
        .await?;
    Ok(Json(outcome.into()))
}

/// `POST /api/voice`: an already-transcribed utterance, tagged as voice.
pub async fn voice(
    State(state): State<Arc<AppState>>,
    body: Result<Json<VoiceBody>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let body = json_body(body)?;
    let audio_text = required(body.audio_text, "audio_text")?;
    let channel = channel_or(body.channel.as_deref(), ChannelKind::Twilio)?;

    let outcome = state
        .router
        .handle(
            ChatRequest::new(channel, audio_text)
                .session(body.session_id)
                .language(body.language)
                .voice(),
        )
        .await?;
    Ok(Json(outcome.into()))
}

/// `GET /api/session/{id}`
pub async fn session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let session = state
        .router
        .sessions()
        .get(&id)
        .await
        .ok_or_else(|| ApiError(SwitchboardError::NotFound("Session not found".into())))?;

    Ok(Json(serde_json::json!({
        "session_id": session.id,
        "created_at": session.created_at,
        "last_activity": session.last_activity,
        "history": session.history,
        "metadata": session.metadata,
    })))
}

/// `POST /api/handoff`
pub async fn handoff(
    State(state): State<Arc<AppState>>,
    body: Result<Json<HandoffBody>, JsonRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let body = json_body(body)?;
    let session_id = required(body.session_id, "session_id")?;
    let reason = body.reason.map(|r| r.trim().to_string()).filter(|r| !r.is_empty());
    if reason
        .as_ref()
        .is_some_and(|r| r.chars().count() > MAX_HANDOFF_REASON_CHARS)
    {
        return Err(ApiError(SwitchboardError::Validation(format!(
            "reason must be at most {MAX_HANDOFF_REASON_CHARS} characters"
        ))));
    }

    state.router.request_handoff(&session_id, reason).await?;

    Ok(Json(serde_json::json!({
        "session_id": session_id,
        "status": "handoff_initiated",
        "message": "Human agent handoff has been requested",
    })))
}

/// `GET /api/dialogue/status`
pub async fn dialogue_status(State(state): State<Arc<AppState>>) -> Response {
    match state.router.dialogue().status().await {
        Ok(status) => Json(serde_json::json!({
            "status": "connected",
            "version": status.version,
            "model_file": status.model_file,
        }))
        .into_response(),
        Err(e) => {
            tracing::error!(error = %redact(&e.to_string()), "Dialogue engine status check failed");
            let body = ErrorBody::new(e.code(), "Unable to connect to dialogue engine");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({
                    "status": "disconnected",
                    "error": body.error,
                    "code": body.code,
                    "timestamp": body.timestamp,
                })),
            )
                .into_response()
        }
    }
}
