use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use switchboard_core::{ChannelKind, Modality, DEFAULT_LANGUAGE};

/// One exchange: what the user said and what the gateway answered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub timestamp: DateTime<Utc>,
    pub user_text: String,
    pub bot_text: String,
    pub modality: Modality,
}

/// Where the transcript of the last voice turn came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranscriptSource {
    /// The telephony provider's on-call recognizer.
    PlatformRecognizer,
    /// Re-transcribed by the speech adapter from the call recording.
    SpeechAdapterFallback,
}

/// Per-call state kept in the metadata of a telephony session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceCallContext {
    pub call_id: String,
    pub caller_identifier: String,
    pub turn_count: u32,
    pub last_transcript_source: TranscriptSource,
}

impl VoiceCallContext {
    pub fn new(call_id: impl Into<String>, caller_identifier: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            caller_identifier: caller_identifier.into(),
            turn_count: 0,
            last_transcript_source: TranscriptSource::PlatformRecognizer,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionMetadata {
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub channel: Option<ChannelKind>,
    #[serde(default)]
    pub handoff_requested: bool,
    #[serde(default)]
    pub handoff_reason: Option<String>,
    #[serde(default)]
    pub handoff_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub voice: Option<VoiceCallContext>,
    /// Free-form channel extras (usernames, phone numbers, ...).
    #[serde(default)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

fn default_language() -> String {
    DEFAULT_LANGUAGE.to_string()
}

impl Default for SessionMetadata {
    fn default() -> Self {
        Self {
            language: default_language(),
            channel: None,
            handoff_requested: false,
            handoff_reason: None,
            handoff_at: None,
            voice: None,
            extra: BTreeMap::new(),
        }
    }
}

impl SessionMetadata {
    /// Flag the session for a human operator.
    pub fn request_handoff(&mut self, reason: impl Into<String>) {
        self.handoff_requested = true;
        self.handoff_reason = Some(reason.into());
        self.handoff_at = Some(Utc::now());
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub history: Vec<Turn>,
    #[serde(default)]
    pub metadata: SessionMetadata,
}

impl Session {
    pub fn new(id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            created_at: now,
            last_activity: now,
            history: Vec::new(),
            metadata: SessionMetadata::default(),
        }
    }

    /// Append a turn, keeping history ordered by timestamp.
    pub fn push_turn(&mut self, user_text: String, bot_text: String, modality: Modality) {
        let now = Utc::now();
        // Clock steps backwards must not reorder history.
        let timestamp = match self.history.last() {
            Some(last) if last.timestamp > now => last.timestamp,
            _ => now,
        };
        self.history.push(Turn {
            timestamp,
            user_text,
            bot_text,
            modality,
        });
        self.last_activity = now;
    }

    pub fn turn_count(&self) -> usize {
        self.history.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_turn_updates_activity() {
        let mut session = Session::new("web_1");
        let before = session.last_activity;
        session.push_turn("hi".into(), "hello".into(), Modality::Text);
        assert_eq!(session.turn_count(), 1);
        assert!(session.last_activity >= before);
        assert_eq!(session.history[0].bot_text, "hello");
    }

    #[test]
    fn test_metadata_defaults_from_empty_json() {
        let meta: SessionMetadata = serde_json::from_str("{}").unwrap_or_default();
        assert_eq!(meta.language, "en");
        assert!(!meta.handoff_requested);
        assert!(meta.voice.is_none());
    }

    #[test]
    fn test_request_handoff() {
        let mut meta = SessionMetadata::default();
        meta.request_handoff("billing dispute");
        assert!(meta.handoff_requested);
        assert_eq!(meta.handoff_reason.as_deref(), Some("billing dispute"));
        assert!(meta.handoff_at.is_some());
    }

    #[test]
    fn test_transcript_source_wire_name() {
        let json = serde_json::to_string(&TranscriptSource::SpeechAdapterFallback);
        assert_eq!(json.ok().as_deref(), Some("\"speech_adapter_fallback\""));
    }
}
