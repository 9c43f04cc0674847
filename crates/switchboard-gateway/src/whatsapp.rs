use crate::router::ChatRequest;
use crate::server::AppState;
use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use std::sync::Arc;
use switchboard_channels::WhatsAppWebhook;
use switchboard_core::ChannelKind;
use switchboard_security::{constant_time_eq, redact, verify_hub_signature};
use switchboard_speech::detect_language;
use tracing::{debug, info, warn};

const SIGNATURE_HEADER: &str = "x-hub-signature-256";

const ACK: &str = "OK";

/// Subscription handshake parameters.
#[derive(Debug, Default, Deserialize)]
pub struct VerifyQuery {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

/// `GET /api/whatsapp/webhook`: echo `hub.challenge` when the token matches.
pub async fn verify(State(state): State<Arc<AppState>>, Query(query): Query<VerifyQuery>) -> Response {
    let token_matches = query
        .verify_token
        .as_deref()
        .is_some_and(|t| constant_time_eq(&state.webhooks.whatsapp_verify_token, t));

    match (query.mode.as_deref(), query.challenge) {
        (Some("subscribe"), Some(challenge)) if token_matches => {
            info!("WhatsApp webhook verified");
            (StatusCode::OK, challenge).into_response()
        }
        _ => {
            warn!(mode = query.mode.as_deref().unwrap_or("-"), "WhatsApp webhook verification failed");
            StatusCode::FORBIDDEN.into_response()
        }
    }
}

/// `POST /api/whatsapp/webhook`
///
/// Always acknowledged with 200; bad signatures and payloads are dropped.
pub async fn webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> &'static str {
    if let Some(secret) = &state.webhooks.whatsapp_app_secret {
        let signature = headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if !verify_hub_signature(secret, &body, signature) {
            warn!("Dropping WhatsApp delivery with invalid signature");
            return ACK;
        }
    }

    let payload: WhatsAppWebhook = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            warn!(error = %redact(&e.to_string()), "Malformed WhatsApp delivery");
            return ACK;
        }
    };

    if !payload.is_business_account() {
        debug!(object = %payload.object, "Ignoring non-WhatsApp delivery");
        return ACK;
    }

    for status in payload.statuses() {
        info!(
            message_id = %status.id,
            status = %status.status,
            recipient = status.recipient_id.as_deref().unwrap_or("-"),
            "WhatsApp delivery status"
        );
    }

    for (message, phone) in payload.messages() {
        let Some(text) = message.body() else {
            debug!(message_id = %message.id, kind = %message.kind, "Ignoring non-text WhatsApp message");
            continue;
        };

        let mut request = ChatRequest::new(ChannelKind::WhatsApp, text)
            .anchored(&message.from)
            .language(Some(detect_language(text).to_string()))
            .identifier("phone_number", message.from.as_str())
            .identifier("message_id", message.id.as_str());
        if let Some(id) = phone.and_then(|p| p.phone_number_id.as_deref()) {
            request = request.identifier("phone_number_id", id);
        }

        state
            .converse(ChannelKind::WhatsApp, &message.from, request)
            .await;
    }

    ACK
}
