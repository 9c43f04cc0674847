use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub group_id: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Voice name used when a caller asks for none or for an unknown one.
    #[serde(default = "default_voice")]
    pub default_voice: String,
}

fn default_api_url() -> String {
    "https://api.minimax.io/v1".to_string()
}

fn default_model() -> String {
    "speech-02-hd".to_string()
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_voice() -> String {
    "odia".to_string()
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            api_key: String::new(),
            group_id: String::new(),
            model: default_model(),
            timeout_ms: default_timeout_ms(),
            default_voice: default_voice(),
        }
    }
}

impl SpeechConfig {
    /// Both the API key and the group id are required for every call.
    pub fn is_configured(&self) -> bool {
        !self.api_key.trim().is_empty() && !self.group_id.trim().is_empty()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub(crate) fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.api_url.trim_end_matches('/'))
    }
}
