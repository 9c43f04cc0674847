use crate::router::ChatRequest;
use crate::server::AppState;
use axum::{body::Bytes, extract::State, http::HeaderMap};
use std::sync::Arc;
use switchboard_channels::telegram::CallbackQuery;
use switchboard_channels::TelegramUpdate;
use switchboard_core::ChannelKind;
use switchboard_security::{constant_time_eq, redact};
use switchboard_speech::detect_language;
use tracing::{debug, warn};

const SECRET_TOKEN_HEADER: &str = "x-telegram-bot-api-secret-token";

/// Body every delivery is acknowledged with.
const ACK: &str = "OK";

/// `GET /api/telegram/webhook`
pub async fn liveness() -> &'static str {
    "Telegram webhook is active"
}

/// `POST /api/telegram/webhook`
///
/// Always acknowledged with 200 so Telegram does not redeliver.
pub async fn webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> &'static str {
    if let Some(expected) = &state.webhooks.telegram_secret_token {
        let presented = headers
            .get(SECRET_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if !constant_time_eq(expected, presented) {
            warn!("Dropping Telegram update with invalid secret token");
            return ACK;
        }
    }

    let update: TelegramUpdate = match serde_json::from_slice(&body) {
        Ok(update) => update,
        Err(e) => {
            warn!(error = %redact(&e.to_string()), "Malformed Telegram update");
            return ACK;
        }
    };

    if let Some(query) = update.callback_query {
        handle_callback(&state, query).await;
        return ACK;
    }

    let Some(message) = update.message else {
        debug!(update_id = update.update_id, "Ignoring update without message");
        return ACK;
    };
    let Some(text) = message.text.as_deref() else {
        debug!(update_id = update.update_id, "Ignoring non-text Telegram message");
        return ACK;
    };

    let chat_id = message.chat.id;
    let mut request = ChatRequest::new(ChannelKind::Telegram, text)
        .anchored(chat_id)
        .language(Some(detect_language(text).to_string()));
    if let Some(from) = &message.from {
        request = request.identifier("telegram_user_id", from.id);
        if let Some(username) = &from.username {
            request = request.identifier("telegram_username", username.as_str());
        }
    }

    state
        .converse(ChannelKind::Telegram, &chat_id.to_string(), request)
        .await;
    ACK
}

/// Inline-keyboard presses: the callback data is the user's message.
async fn handle_callback(state: &AppState, query: CallbackQuery) {
    let chat_id = query
        .message
        .as_ref()
        .map_or(query.from.id, |m| m.chat.id);

    if let Some(data) = query.data.as_deref().filter(|d| !d.trim().is_empty()) {
        let request = ChatRequest::new(ChannelKind::Telegram, data)
            .anchored(chat_id)
            .language(Some(detect_language(data).to_string()))
            .identifier("telegram_user_id", query.from.id)
            .identifier("is_callback", true);
        state
            .converse(ChannelKind::Telegram, &chat_id.to_string(), request)
            .await;
    } else {
        debug!(callback_id = %query.id, "Callback query without data");
    }

    if let Err(e) = state
        .channels
        .acknowledge(ChannelKind::Telegram, &query.id)
        .await
    {
        warn!(error = %redact(&e.to_string()), "Failed to answer callback query");
    }
}
