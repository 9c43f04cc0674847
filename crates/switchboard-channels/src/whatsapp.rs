use crate::channel::{Channel, OutboundMessage};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use switchboard_core::{ChannelKind, SwitchboardError, SwitchboardResult};
use switchboard_security::redact;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhatsAppConfig {
    #[serde(default)]
    pub phone_number_id: String,
    #[serde(default)]
    pub access_token: String,
    /// Token echoed back by Meta during webhook subscription.
    #[serde(default = "default_verify_token")]
    pub verify_token: String,
    /// App secret for `X-Hub-Signature-256` verification, when set.
    #[serde(default)]
    pub app_secret: Option<String>,
    #[serde(default = "default_graph_base")]
    pub graph_base: String,
}

fn default_verify_token() -> String {
    "switchboard_verify_token".to_string()
}

fn default_graph_base() -> String {
    "https://graph.facebook.com/v18.0".to_string()
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            phone_number_id: String::new(),
            access_token: String::new(),
            verify_token: default_verify_token(),
            app_secret: None,
            graph_base: default_graph_base(),
        }
    }
}

impl WhatsAppConfig {
    pub fn is_configured(&self) -> bool {
        !self.phone_number_id.trim().is_empty() && !self.access_token.trim().is_empty()
    }
}

// ── Webhook payload types ───────────────────────────────────────────────────

/// A Cloud API webhook delivery.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WhatsAppWebhook {
    #[serde(default)]
    pub object: String,
    #[serde(default)]
    pub entry: Vec<WebhookEntry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookEntry {
    #[serde(default)]
    pub changes: Vec<WebhookChange>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookChange {
    #[serde(default)]
    pub value: ChangeValue,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChangeValue {
    #[serde(default)]
    pub metadata: Option<PhoneMetadata>,
    #[serde(default)]
    pub messages: Vec<InboundMessage>,
    #[serde(default)]
    pub statuses: Vec<StatusUpdate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PhoneMetadata {
    #[serde(default)]
    pub phone_number_id: Option<String>,
    #[serde(default)]
    pub display_phone_number: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InboundMessage {
    pub from: String,
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub text: Option<TextBody>,
}

impl InboundMessage {
    /// Message body, for text messages with a non-empty body.
    pub fn body(&self) -> Option<&str> {
        self.text
            .as_ref()
            .map(|t| t.body.as_str())
            .filter(|b| !b.trim().is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextBody {
    pub body: String,
}

/// Delivery receipt (`sent`, `delivered`, `read`, `failed`).
#[derive(Debug, Clone, Deserialize)]
pub struct StatusUpdate {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub recipient_id: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl WhatsAppWebhook {
    pub fn is_business_account(&self) -> bool {
        self.object == "whatsapp_business_account"
    }

    /// Every inbound message with the metadata of the number it was sent to.
    pub fn messages(&self) -> impl Iterator<Item = (&InboundMessage, Option<&PhoneMetadata>)> {
        self.changes()
            .flat_map(|v| v.messages.iter().map(move |m| (m, v.metadata.as_ref())))
    }

    pub fn statuses(&self) -> impl Iterator<Item = &StatusUpdate> {
        self.changes().flat_map(|v| v.statuses.iter())
    }

    fn changes(&self) -> impl Iterator<Item = &ChangeValue> {
        self.entry
            .iter()
            .flat_map(|e| e.changes.iter())
            .map(|c| &c.value)
    }
}

// ── Implementation ──────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct SendTextRequest<'a> {
    messaging_product: &'a str,
    to: &'a str,
    #[serde(rename = "type")]
    kind: &'a str,
    text: TextBody,
}

/// WhatsApp Cloud API channel adapter.
pub struct WhatsAppChannel {
    config: WhatsAppConfig,
    client: reqwest::Client,
}

impl WhatsAppChannel {
    pub fn new(config: WhatsAppConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/{}/messages",
            self.config.graph_base.trim_end_matches('/'),
            self.config.phone_number_id
        )
    }
}

#[async_trait]
impl Channel for WhatsAppChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::WhatsApp
    }

    async fn send(&self, message: OutboundMessage) -> SwitchboardResult<()> {
        let payload = SendTextRequest {
            messaging_product: "whatsapp",
            to: &message.recipient,
            kind: "text",
            text: TextBody { body: message.text },
        };

        let response = self
            .client
            .post(self.messages_url())
            .bearer_auth(&self.config.access_token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| SwitchboardError::Channel(redact(&format!("WhatsApp send error: {e}"))))?;

        let status = response.status();
        if !status.is_success() {
            let body: serde_json::Value = response.json().await.unwrap_or_default();
            let detail = body
                .pointer("/error/message")
                .and_then(serde_json::Value::as_str)
                .unwrap_or_default();
            return Err(SwitchboardError::Channel(format!(
                "WhatsApp send failed ({status}): {}",
                redact(detail)
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    const DELIVERY: &str = r#"{
        "object": "whatsapp_business_account",
        "entry": [{"id": "1", "changes": [{"field": "messages", "value": {
            "messaging_product": "whatsapp",
            "metadata": {"display_phone_number": "15550001111", "phone_number_id": "PN1"},
            "messages": [
                {"from": "2348012345678", "id": "wamid.1", "timestamp": "1", "type": "text", "text": {"body": "hello"}},
                {"from": "2348012345678", "id": "wamid.2", "timestamp": "2", "type": "image", "image": {"id": "m1"}}
            ],
            "statuses": [{"id": "wamid.0", "status": "delivered", "recipient_id": "2348012345678"}]
        }}]}]
    }"#;

    #[test]
    fn test_walks_entries() {
        let hook: WhatsAppWebhook = serde_json::from_str(DELIVERY).unwrap();
        assert!(hook.is_business_account());

        let messages: Vec<_> = hook.messages().collect();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].0.body(), Some("hello"));
        assert_eq!(
            messages[0].1.and_then(|m| m.phone_number_id.as_deref()),
            Some("PN1")
        );
        // Media messages carry no text body.
        assert_eq!(messages[1].0.kind, "image");
        assert!(messages[1].0.body().is_none());

        let statuses: Vec<_> = hook.statuses().collect();
        assert_eq!(statuses[0].status, "delivered");
    }

    #[test]
    fn test_empty_delivery() {
        let hook: WhatsAppWebhook = serde_json::from_str("{}").unwrap();
        assert!(!hook.is_business_account());
        assert_eq!(hook.messages().count(), 0);
    }
}
