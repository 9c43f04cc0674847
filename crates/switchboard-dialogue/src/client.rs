use crate::config::DialogueConfig;
use crate::reply::normalize_replies;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use switchboard_core::{DialogueReply, MessageEnvelope, SwitchboardError, SwitchboardResult};
use switchboard_security::redact;

/// Reported by the engine's `/status` endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineStatus {
    #[serde(default = "unknown_version")]
    pub version: String,
    #[serde(default)]
    pub model_file: Option<String>,
}

fn unknown_version() -> String {
    "unknown".to_string()
}

/// The conversational brain behind every channel.
#[async_trait]
pub trait DialogueEngine: Send + Sync {
    /// Send one user message and return the normalized reply.
    async fn send(&self, envelope: &MessageEnvelope) -> SwitchboardResult<DialogueReply>;

    /// Check that the engine is reachable.
    async fn status(&self) -> SwitchboardResult<EngineStatus>;
}

#[derive(Serialize)]
struct WebhookRequest<'a> {
    sender: &'a str,
    message: &'a str,
    metadata: &'a switchboard_core::EnvelopeMetadata,
}

/// REST-webhook dialogue engine client.
pub struct RestDialogueClient {
    config: DialogueConfig,
    http: reqwest::Client,
}

impl RestDialogueClient {
    pub fn new(config: DialogueConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    pub fn config(&self) -> &DialogueConfig {
        &self.config
    }
}

/// Map a transport failure onto the error taxonomy.
fn transport_error(e: reqwest::Error) -> SwitchboardError {
    let message = redact(&e.to_string());
    if e.is_timeout() {
        SwitchboardError::UpstreamTimeout(format!("Dialogue engine: {message}"))
    } else if e.is_connect() || e.is_request() {
        SwitchboardError::UpstreamUnavailable(format!("Dialogue engine: {message}"))
    } else {
        SwitchboardError::upstream(e.status().map(|s| i64::from(s.as_u16())), message)
    }
}

#[async_trait]
impl DialogueEngine for RestDialogueClient {
    async fn send(&self, envelope: &MessageEnvelope) -> SwitchboardResult<DialogueReply> {
        let url = self.config.endpoint("/webhooks/rest/webhook");
        let timeout = self.config.timeout_for(envelope.metadata().is_voice);
        let body = WebhookRequest {
            sender: envelope.sender_session_id(),
            message: envelope.text(),
            metadata: envelope.metadata(),
        };

        let resp = self
            .http
            .post(&url)
            .timeout(timeout)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = resp.status();
        if !status.is_success() {
            tracing::warn!(
                session_id = %envelope.sender_session_id(),
                status = status.as_u16(),
                "Dialogue engine returned an error status"
            );
            return Err(SwitchboardError::upstream(
                Some(i64::from(status.as_u16())),
                format!("Dialogue engine responded {status}"),
            ));
        }

        let replies: serde_json::Value = resp.json().await.map_err(transport_error)?;
        let reply = normalize_replies(replies)?;
        tracing::debug!(
            session_id = %envelope.sender_session_id(),
            intent = reply.intent.as_deref().unwrap_or("-"),
            "Dialogue reply received"
        );
        Ok(reply)
    }

    async fn status(&self) -> SwitchboardResult<EngineStatus> {
        let url = self.config.endpoint("/status");
        let resp = self
            .http
            .get(&url)
            .timeout(self.config.timeout_for(true))
            .send()
            .await
            .map_err(transport_error)?;

        let status = resp.status();
        if !status.is_success() {
            return Err(SwitchboardError::upstream(
                Some(i64::from(status.as_u16())),
                format!("Dialogue engine status check responded {status}"),
            ));
        }
        resp.json::<EngineStatus>().await.map_err(transport_error)
    }
}
