use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IvrConfig {
    /// Public base URL the provider calls back on (`https://gw.example.com`).
    #[serde(default)]
    pub webhook_base_url: String,
    /// Operator number dialed on handoff.
    #[serde(default)]
    pub operator_number: String,
    /// Synthesis voice name.
    #[serde(default = "default_voice_name")]
    pub voice_name: String,
    /// Voice of the provider's own `<Say>` fallback.
    #[serde(default = "default_say_voice")]
    pub say_voice: String,
    /// Recognizer confidence below which the recording is re-transcribed.
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,
    /// Bound on each speech call made while the caller waits.
    #[serde(default = "default_speech_budget_ms")]
    pub speech_budget_ms: u64,
    /// Bound on a whole speech-capture turn, from webhook arrival to the
    /// rendered markup. Must stay under the provider's webhook timeout (15 s).
    #[serde(default = "default_turn_deadline_ms")]
    pub turn_deadline_ms: u64,
    #[serde(default = "default_greeting")]
    pub greeting: String,
}

fn default_voice_name() -> String {
    "odia".to_string()
}

fn default_say_voice() -> String {
    "alice".to_string()
}

fn default_confidence_threshold() -> f64 {
    0.5
}

fn default_speech_budget_ms() -> u64 {
    5_000
}

fn default_turn_deadline_ms() -> u64 {
    12_000
}

fn default_greeting() -> String {
    "Hello! Welcome to Call Waiting AI. How can I assist you today?".to_string()
}

impl Default for IvrConfig {
    fn default() -> Self {
        Self {
            webhook_base_url: String::new(),
            operator_number: String::new(),
            voice_name: default_voice_name(),
            say_voice: default_say_voice(),
            confidence_threshold: default_confidence_threshold(),
            speech_budget_ms: default_speech_budget_ms(),
            turn_deadline_ms: default_turn_deadline_ms(),
            greeting: default_greeting(),
        }
    }
}

impl IvrConfig {
    pub fn speech_budget(&self) -> Duration {
        Duration::from_millis(self.speech_budget_ms)
    }

    pub fn turn_deadline(&self) -> Duration {
        Duration::from_millis(self.turn_deadline_ms)
    }

    pub fn gather_url(&self) -> String {
        self.callback_url("gather")
    }

    pub fn timeout_url(&self) -> String {
        self.callback_url("timeout")
    }

    fn callback_url(&self, endpoint: &str) -> String {
        format!(
            "{}/api/twilio/{endpoint}",
            self.webhook_base_url.trim_end_matches('/')
        )
    }
}
