use serde::Deserialize;
use std::time::Duration;
use switchboard_channels::{TelegramConfig, WhatsAppConfig};
use switchboard_dialogue::DialogueConfig;
use switchboard_security::DEFAULT_MAX_MESSAGE_CHARS;
use switchboard_session::ExpiryPolicy;
use switchboard_speech::SpeechConfig;
use switchboard_voice::IvrConfig;

/// Contents of `switchboard.toml`. Every section may be omitted.
#[derive(Debug, Default, Deserialize)]
pub struct SwitchboardConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub dialogue: DialogueConfig,
    #[serde(default)]
    pub speech: SpeechConfig,
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub whatsapp: WhatsAppConfig,
    #[serde(default)]
    pub voice: IvrConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub security: SecurityConfig,
}

#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Capacity of the post-call recording queue.
    #[serde(default = "default_recording_queue")]
    pub recording_queue: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            recording_queue: default_recording_queue(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_session_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_cleanup_interval_ms")]
    pub cleanup_interval_ms: u64,
    #[serde(default)]
    pub expiry: ExpiryPolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_session_timeout_ms(),
            cleanup_interval_ms: default_cleanup_interval_ms(),
            expiry: ExpiryPolicy::default(),
        }
    }
}

impl SessionConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Never zero; a zero period would make the sweeper spin.
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_millis(self.cleanup_interval_ms.max(1_000))
    }
}

#[derive(Debug, Deserialize)]
pub struct SecurityConfig {
    #[serde(default = "default_rps")]
    pub max_requests_per_second: f64,
    #[serde(default = "default_burst")]
    pub max_burst: f64,
    #[serde(default = "default_max_msg_len")]
    pub max_message_length: usize,
    #[serde(default)]
    pub api_keys: Vec<String>,
    /// Rate-limit by `X-Forwarded-For`; enable only behind a proxy that sets it.
    #[serde(default)]
    pub trust_forwarded_for: bool,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_requests_per_second: default_rps(),
            max_burst: default_burst(),
            max_message_length: default_max_msg_len(),
            api_keys: vec![],
            trust_forwarded_for: false,
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    3000
}
fn default_recording_queue() -> usize {
    64
}
fn default_session_timeout_ms() -> u64 {
    24 * 60 * 60 * 1000
}
fn default_cleanup_interval_ms() -> u64 {
    60 * 60 * 1000
}
fn default_rps() -> f64 {
    10.0
}
fn default_burst() -> f64 {
    50.0
}
fn default_max_msg_len() -> usize {
    DEFAULT_MAX_MESSAGE_CHARS
}

impl SwitchboardConfig {
    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Overlay deployment values from the environment. Unparseable numbers
    /// are ignored and reported by name.
    pub fn apply_env<F>(&mut self, lookup: F) -> Vec<&'static str>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut invalid = Vec::new();

        if let Some(v) = get("DIALOGUE_URL").or_else(|| get("RASA_SERVER_URL")) {
            self.dialogue.base_url = v;
        }
        if let Some(v) = get("MINIMAX_API_URL") {
            self.speech.api_url = v;
        }
        if let Some(v) = get("MINIMAX_API_KEY") {
            self.speech.api_key = v;
        }
        if let Some(v) = get("MINIMAX_GROUP_ID") {
            self.speech.group_id = v;
        }
        if let Some(v) = get("MINIMAX_MODEL") {
            self.speech.model = v;
        }
        if let Some(v) = get("TELEGRAM_BOT_TOKEN") {
            self.telegram.bot_token = v;
        }
        if let Some(v) = get("TELEGRAM_SECRET_TOKEN") {
            self.telegram.secret_token = Some(v);
        }
        if let Some(v) = get("WHATSAPP_PHONE_NUMBER_ID") {
            self.whatsapp.phone_number_id = v;
        }
        if let Some(v) = get("WHATSAPP_ACCESS_TOKEN") {
            self.whatsapp.access_token = v;
        }
        if let Some(v) = get("WHATSAPP_VERIFY_TOKEN") {
            self.whatsapp.verify_token = v;
        }
        if let Some(v) = get("WHATSAPP_APP_SECRET") {
            self.whatsapp.app_secret = Some(v);
        }
        if let Some(v) = get("TWILIO_WEBHOOK_BASE_URL") {
            self.voice.webhook_base_url = v;
        }
        if let Some(v) = get("AGENT_PHONE_NUMBER") {
            self.voice.operator_number = v;
        }

        let mut number = |key: &'static str, slot: &mut u64| {
            if let Some(v) = get(key) {
                match v.parse() {
                    Ok(n) => *slot = n,
                    Err(_) => invalid.push(key),
                }
            }
        };
        number("SESSION_TIMEOUT_MS", &mut self.session.timeout_ms);
        number("CLEANUP_INTERVAL_MS", &mut self.session.cleanup_interval_ms);

        if let Some(v) = get("TRUST_FORWARDED_FOR") {
            match v.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => self.security.trust_forwarded_for = true,
                "0" | "false" | "no" => self.security.trust_forwarded_for = false,
                _ => invalid.push("TRUST_FORWARDED_FOR"),
            }
        }

        if let Some(v) = get("PORT") {
            match v.parse() {
                Ok(port) => self.server.port = port,
                Err(_) => invalid.push("PORT"),
            }
        }

        invalid
    }

    /// Every configured secret, for literal redaction.
    pub fn secrets(&self) -> Vec<String> {
        let mut secrets = vec![
            self.speech.api_key.clone(),
            self.telegram.bot_token.clone(),
            self.whatsapp.access_token.clone(),
        ];
        secrets.extend(self.telegram.secret_token.clone());
        secrets.extend(self.whatsapp.app_secret.clone());
        secrets.extend(self.security.api_keys.iter().cloned());
        secrets.retain(|s| !s.is_empty());
        secrets
    }
}
