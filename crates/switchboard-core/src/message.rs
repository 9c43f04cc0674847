use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::SwitchboardError;

/// Reply text used whenever the dialogue engine answers with nothing.
pub const FALLBACK_REPLY_TEXT: &str = "I'm sorry, I didn't understand that.";

/// In-band apology sent to a counterparty when processing fails.
pub const TECHNICAL_DIFFICULTIES_TEXT: &str =
    "I'm experiencing technical difficulties. Please try again later.";

/// Language tag assumed when a channel does not report one.
pub const DEFAULT_LANGUAGE: &str = "en";

const MAX_SESSION_ID_LEN: usize = 128;

/// The surface a conversation arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    /// Telephony voice calls (TwiML webhooks).
    Twilio,
    /// Telegram Bot API.
    Telegram,
    /// WhatsApp Cloud API.
    #[serde(rename = "whatsapp")]
    WhatsApp,
    /// Browser widget and the direct HTTP API.
    Web,
}

impl ChannelKind {
    /// Wire name, also used as the session id prefix.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Twilio => "twilio",
            Self::Telegram => "telegram",
            Self::WhatsApp => "whatsapp",
            Self::Web => "web",
        }
    }

    /// Build the channel-anchored session id for a platform-native identifier.
    ///
    /// `telegram` + `42` becomes `telegram_42`; the prefix keeps chat ids,
    /// phone numbers and call ids from colliding across channels.
    pub fn session_id_for(self, native_id: impl fmt::Display) -> String {
        format!("{}_{native_id}", self.as_str())
    }

    /// The channel whose prefix `session_id` carries, if any.
    pub fn from_session_prefix(session_id: &str) -> Option<Self> {
        let (prefix, rest) = session_id.split_once('_')?;
        if rest.is_empty() {
            return None;
        }
        [Self::Twilio, Self::Telegram, Self::WhatsApp, Self::Web]
            .into_iter()
            .find(|kind| kind.as_str() == prefix)
    }

    /// Whether session ids on this channel are derived from a platform-native
    /// identifier (call id, chat id, phone number) rather than chosen by the client.
    pub fn is_platform_anchored(self) -> bool {
        !matches!(self, Self::Web)
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChannelKind {
    type Err = SwitchboardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "twilio" | "voice" | "phone" => Ok(Self::Twilio),
            "telegram" => Ok(Self::Telegram),
            "whatsapp" => Ok(Self::WhatsApp),
            "web" | "webchat" => Ok(Self::Web),
            other => Err(SwitchboardError::Validation(format!(
                "Unknown channel '{other}'"
            ))),
        }
    }
}

/// How a turn was exchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    /// Typed text.
    Text,
    /// Spoken input / synthesized output.
    Voice,
}

/// Whether `id` is acceptable as a caller-supplied session identifier.
///
/// Accepts 1 to 128 characters drawn from ASCII alphanumerics and `_ . : + -`,
/// which covers generated UUIDs as well as channel-anchored ids such as
/// `whatsapp_2348012345678` or `twilio_CA1234`.
pub fn is_well_formed_session_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_SESSION_ID_LEN
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | ':' | '+' | '-'))
}

/// Channel metadata carried alongside an envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeMetadata {
    /// Originating channel.
    pub channel: ChannelKind,
    /// Language tag of the user text.
    pub language: String,
    /// Whether the text came from speech.
    pub is_voice: bool,
    /// Platform-specific identifiers (phone number, chat user id, ...).
    #[serde(flatten)]
    pub identifiers: BTreeMap<String, serde_json::Value>,
}

/// Normalized inbound message handed to the dialogue engine.
///
/// Built once by a channel adapter; fields are read-only afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageEnvelope {
    sender_session_id: String,
    text: String,
    metadata: EnvelopeMetadata,
}

impl MessageEnvelope {
    /// Creates a text envelope for `channel`.
    pub fn new(
        sender_session_id: impl Into<String>,
        text: impl Into<String>,
        channel: ChannelKind,
        language: impl Into<String>,
    ) -> Self {
        Self {
            sender_session_id: sender_session_id.into(),
            text: text.into(),
            metadata: EnvelopeMetadata {
                channel,
                language: language.into(),
                is_voice: false,
                identifiers: BTreeMap::new(),
            },
        }
    }

    /// Marks the envelope as transcribed speech.
    pub fn voice(mut self) -> Self {
        self.metadata.is_voice = true;
        self
    }

    /// Attaches a channel-specific identifier.
    pub fn with_identifier(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.metadata.identifiers.insert(key.into(), value.into());
        self
    }

    /// Session the message belongs to.
    pub fn sender_session_id(&self) -> &str {
        &self.sender_session_id
    }

    /// User text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Channel metadata.
    pub fn metadata(&self) -> &EnvelopeMetadata {
        &self.metadata
    }
}

/// Normalized reply from the dialogue engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialogueReply {
    /// Reply text; never empty.
    pub text: String,
    /// Name of the recognized intent, if reported.
    pub intent: Option<String>,
    /// Intent confidence in `[0, 1]`, if reported.
    pub confidence: Option<f64>,
    /// Whether the engine asked to hand the conversation to a human.
    pub handoff_requested: Option<bool>,
}

impl DialogueReply {
    /// Reply used when the engine returned no candidates.
    pub fn fallback() -> Self {
        Self::text(FALLBACK_REPLY_TEXT)
    }

    /// Plain reply without NLU annotations.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            intent: None,
            confidence: None,
            handoff_requested: None,
        }
    }

    /// `true` only when the engine explicitly requested a handoff.
    pub fn wants_handoff(&self) -> bool {
        self.handoff_requested.unwrap_or(false)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_session_prefix() {
        assert_eq!(ChannelKind::Telegram.session_id_for(42), "telegram_42");
        assert_eq!(
            ChannelKind::WhatsApp.session_id_for("2348012345678"),
            "whatsapp_2348012345678"
        );
        assert_eq!(ChannelKind::Twilio.session_id_for("CA1"), "twilio_CA1");
    }

    #[test]
    fn test_session_prefix_lookup() {
        assert_eq!(
            ChannelKind::from_session_prefix("telegram_42"),
            Some(ChannelKind::Telegram)
        );
        assert_eq!(
            ChannelKind::from_session_prefix("whatsapp_2348012345678"),
            Some(ChannelKind::WhatsApp)
        );
        assert_eq!(ChannelKind::from_session_prefix("web_abc"), Some(ChannelKind::Web));
        assert_eq!(ChannelKind::from_session_prefix("telegram_"), None);
        assert_eq!(ChannelKind::from_session_prefix("mysession_1"), None);
        assert_eq!(
            ChannelKind::from_session_prefix("5f0c2a7e-8c9a-4d0e-9a43-5b1f3b7a2d11"),
            None
        );
        assert!(ChannelKind::Twilio.is_platform_anchored());
        assert!(!ChannelKind::Web.is_platform_anchored());
    }

    #[test]
    fn test_channel_from_str() {
        assert_eq!("WhatsApp".parse::<ChannelKind>().unwrap(), ChannelKind::WhatsApp);
        assert_eq!("web".parse::<ChannelKind>().unwrap(), ChannelKind::Web);
        assert!("fax".parse::<ChannelKind>().is_err());
    }

    #[test]
    fn test_channel_serde_names() {
        let json = serde_json::to_string(&ChannelKind::WhatsApp).unwrap();
        assert_eq!(json, "\"whatsapp\"");
        let back: ChannelKind = serde_json::from_str("\"twilio\"").unwrap();
        assert_eq!(back, ChannelKind::Twilio);
    }

    #[test]
    fn test_session_id_shape() {
        assert!(is_well_formed_session_id("telegram_12345"));
        assert!(is_well_formed_session_id(
            "5f0c2a7e-8c9a-4d0e-9a43-5b1f3b7a2d11"
        ));
        assert!(!is_well_formed_session_id(""));
        assert!(!is_well_formed_session_id("has space"));
        assert!(!is_well_formed_session_id("../etc/passwd"));
        assert!(!is_well_formed_session_id(&"a".repeat(129)));
    }

    #[test]
    fn test_envelope_builder() {
        let env = MessageEnvelope::new("twilio_CA1", "hi", ChannelKind::Twilio, "en")
            .voice()
            .with_identifier("phone_number", "+15550001111");
        assert!(env.metadata().is_voice);
        assert_eq!(env.text(), "hi");
        assert_eq!(
            env.metadata().identifiers.get("phone_number"),
            Some(&serde_json::json!("+15550001111"))
        );

        let json = serde_json::to_value(env.metadata()).unwrap();
        assert_eq!(json["channel"], "twilio");
        assert_eq!(json["phone_number"], "+15550001111");
    }

    #[test]
    fn test_reply_fallback() {
        let reply = DialogueReply::fallback();
        assert_eq!(reply.text, FALLBACK_REPLY_TEXT);
        assert!(!reply.wants_handoff());
    }
}
