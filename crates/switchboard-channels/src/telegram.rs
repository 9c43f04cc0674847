use crate::channel::{Channel, OutboundMessage};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use switchboard_core::{ChannelKind, SwitchboardError, SwitchboardResult};
use switchboard_security::redact;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    #[serde(default)]
    pub bot_token: String,
    /// Expected `X-Telegram-Bot-Api-Secret-Token` header, when set.
    #[serde(default)]
    pub secret_token: Option<String>,
    #[serde(default = "default_api_base")]
    pub api_base: String,
}

fn default_api_base() -> String {
    "https://api.telegram.org".to_string()
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            secret_token: None,
            api_base: default_api_base(),
        }
    }
}

impl TelegramConfig {
    pub fn is_configured(&self) -> bool {
        !self.bot_token.trim().is_empty()
    }
}

// ── Webhook payload types ───────────────────────────────────────────────────

/// One webhook delivery from the Bot API.
#[derive(Debug, Clone, Deserialize)]
pub struct TelegramUpdate {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<TelegramMessage>,
    #[serde(default)]
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramMessage {
    pub message_id: i64,
    #[serde(default)]
    pub from: Option<TelegramUser>,
    pub chat: TelegramChat,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramUser {
    pub id: i64,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub language_code: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramChat {
    pub id: i64,
}

/// An inline-keyboard button press.
#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: TelegramUser,
    #[serde(default)]
    pub message: Option<TelegramMessage>,
    #[serde(default)]
    pub data: Option<String>,
}

// ── API types ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct TelegramResponse<T> {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
    #[allow(dead_code)]
    result: Option<T>,
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'a str,
}

#[derive(Debug, Serialize)]
struct AnswerCallbackRequest<'a> {
    callback_query_id: &'a str,
}

// ── Implementation ──────────────────────────────────────────────────────────

/// Telegram Bot API channel adapter.
pub struct TelegramChannel {
    config: TelegramConfig,
    client: reqwest::Client,
}

impl TelegramChannel {
    pub fn new(config: TelegramConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    /// Acknowledge a callback query so the client stops its spinner.
    pub async fn answer_callback_query(&self, callback_query_id: &str) -> SwitchboardResult<()> {
        let payload = AnswerCallbackRequest { callback_query_id };
        self.call("answerCallbackQuery", &payload).await
    }

    async fn call<P: Serialize + Sync>(&self, method: &str, payload: &P) -> SwitchboardResult<()> {
        let response = self
            .client
            .post(self.api_url(method))
            .json(payload)
            .send()
            .await
            .map_err(|e| SwitchboardError::Channel(redact(&format!("Telegram {method} error: {e}"))))?;

        let body: TelegramResponse<serde_json::Value> = response
            .json()
            .await
            .map_err(|e| SwitchboardError::Channel(redact(&format!("Telegram parse error: {e}"))))?;

        if !body.ok {
            return Err(SwitchboardError::Channel(format!(
                "Telegram {method} failed: {}",
                redact(&body.description.unwrap_or_default())
            )));
        }
        Ok(())
    }

    fn api_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{}",
            self.config.api_base.trim_end_matches('/'),
            self.config.bot_token,
            method
        )
    }
}

#[async_trait]
impl Channel for TelegramChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Telegram
    }

    async fn send(&self, message: OutboundMessage) -> SwitchboardResult<()> {
        let payload = SendMessageRequest {
            chat_id: &message.recipient,
            text: &message.text,
            parse_mode: "Markdown",
        };
        self.call("sendMessage", &payload).await
    }

    async fn acknowledge(&self, interaction_id: &str) -> SwitchboardResult<()> {
        self.answer_callback_query(interaction_id).await
    }
}
