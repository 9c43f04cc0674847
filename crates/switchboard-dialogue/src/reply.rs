use serde::Deserialize;
use switchboard_core::{DialogueReply, SwitchboardError, SwitchboardResult};

/// One candidate as the engine sends it. Every field is optional and
/// `intent` arrives either as a bare name or as `{name, confidence}`.
#[derive(Debug, Default, Deserialize)]
pub struct RawReply {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub intent: Option<RawIntent>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub metadata: Option<RawReplyMetadata>,
    #[serde(default)]
    pub custom: Option<RawReplyMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum RawIntent {
    Name(String),
    Ranked {
        name: String,
        #[serde(default)]
        confidence: Option<f64>,
    },
}

#[derive(Debug, Default, Deserialize)]
pub struct RawReplyMetadata {
    #[serde(default)]
    pub handoff_requested: Option<bool>,
}

/// Normalize the engine's reply list. Only the first candidate is used; an
/// empty list or a candidate without text yields the fallback reply.
pub fn normalize_replies(body: serde_json::Value) -> SwitchboardResult<DialogueReply> {
    let serde_json::Value::Array(items) = body else {
        return Err(SwitchboardError::upstream(
            None,
            "Dialogue engine returned a non-list reply",
        ));
    };

    let Some(first) = items.into_iter().next() else {
        return Ok(DialogueReply::fallback());
    };
    let raw: RawReply = serde_json::from_value(first).map_err(|e| {
        SwitchboardError::upstream(None, format!("Malformed dialogue reply: {e}"))
    })?;

    let (intent, intent_confidence) = match raw.intent {
        Some(RawIntent::Name(name)) => (Some(name), None),
        Some(RawIntent::Ranked { name, confidence }) => (Some(name), confidence),
        None => (None, None),
    };
    let intent = intent.filter(|name| !name.trim().is_empty());
    let confidence = raw
        .confidence
        .or(intent_confidence)
        .filter(|c| c.is_finite())
        .map(|c| c.clamp(0.0, 1.0));
    let handoff_requested = raw
        .metadata
        .and_then(|m| m.handoff_requested)
        .or_else(|| raw.custom.and_then(|c| c.handoff_requested));

    let mut reply = match raw.text {
        Some(text) if !text.trim().is_empty() => DialogueReply::text(text),
        _ => DialogueReply::fallback(),
    };
    reply.intent = intent;
    reply.confidence = confidence;
    reply.handoff_requested = handoff_requested;
    Ok(reply)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;
    use switchboard_core::FALLBACK_REPLY_TEXT;

    #[test]
    fn test_empty_list_is_fallback() {
        let reply = normalize_replies(json!([])).unwrap();
        assert_eq!(reply.text, FALLBACK_REPLY_TEXT);
        assert!(reply.intent.is_none());
    }

    #[test]
    fn test_only_first_candidate_used() {
        let reply = normalize_replies(json!([
            {"recipient_id": "web_1", "text": "Hi! How can I help?"},
            {"recipient_id": "web_1", "text": "Anything else?"}
        ]))
        .unwrap();
        assert_eq!(reply.text, "Hi! How can I help?");
    }

    #[test]
    fn test_intent_as_string_or_object() {
        let reply = normalize_replies(json!([
            {"text": "ok", "intent": "greet", "confidence": 0.93}
        ]))
        .unwrap();
        assert_eq!(reply.intent.as_deref(), Some("greet"));
        assert_eq!(reply.confidence, Some(0.93));

        let reply = normalize_replies(json!([
            {"text": "ok", "intent": {"name": "book_table", "confidence": 0.71}}
        ]))
        .unwrap();
        assert_eq!(reply.intent.as_deref(), Some("book_table"));
        assert_eq!(reply.confidence, Some(0.71));
    }

    #[test]
    fn test_confidence_clamped() {
        let reply = normalize_replies(json!([{"text": "ok", "confidence": 1.7}])).unwrap();
        assert_eq!(reply.confidence, Some(1.0));
        let reply = normalize_replies(json!([{"text": "ok", "confidence": -0.2}])).unwrap();
        assert_eq!(reply.confidence, Some(0.0));
    }

    #[test]
    fn test_handoff_flag() {
        let reply = normalize_replies(json!([
            {"text": "Connecting you", "metadata": {"handoff_requested": true}}
        ]))
        .unwrap();
        assert!(reply.wants_handoff());

        let reply = normalize_replies(json!([
            {"text": "Connecting you", "custom": {"handoff_requested": true}}
        ]))
        .unwrap();
        assert!(reply.wants_handoff());
    }

    #[test]
    fn test_candidate_without_text_is_fallback() {
        let reply = normalize_replies(json!([{"image": "https://x/y.png"}])).unwrap();
        assert_eq!(reply.text, FALLBACK_REPLY_TEXT);
    }

    #[test]
    fn test_non_list_rejected() {
        let err = normalize_replies(json!({"text": "hi"})).unwrap_err();
        assert!(matches!(err, SwitchboardError::Upstream { .. }));
    }
}
