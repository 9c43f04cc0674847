use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DialogueConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Bound for chat turns.
    #[serde(default = "default_chat_timeout_ms")]
    pub chat_timeout_ms: u64,
    /// Bound for voice turns; must leave room for speech synthesis inside
    /// the telephony provider's response window.
    #[serde(default = "default_voice_timeout_ms")]
    pub voice_timeout_ms: u64,
}

fn default_base_url() -> String {
    "http://localhost:5005".to_string()
}

fn default_chat_timeout_ms() -> u64 {
    30_000
}

fn default_voice_timeout_ms() -> u64 {
    8_000
}

impl Default for DialogueConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            chat_timeout_ms: default_chat_timeout_ms(),
            voice_timeout_ms: default_voice_timeout_ms(),
        }
    }
}

impl DialogueConfig {
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn timeout_for(&self, is_voice: bool) -> Duration {
        Duration::from_millis(if is_voice {
            self.voice_timeout_ms
        } else {
            self.chat_timeout_ms
        })
    }

    pub(crate) fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url.trim_end_matches('/'))
    }
}
