use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use switchboard_core::{
    ChannelKind, DialogueReply, MessageEnvelope, Modality, SwitchboardError, SwitchboardResult,
    DEFAULT_LANGUAGE,
};
use switchboard_dialogue::DialogueEngine;
use switchboard_security::{redact, Sanitizer};
use switchboard_session::SessionStore;
use tracing::{info, warn};

/// One user message entering the conversation flow from any text surface.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub session_id: Option<String>,
    pub text: String,
    pub language: Option<String>,
    pub channel: ChannelKind,
    pub modality: Modality,
    pub identifiers: Vec<(String, serde_json::Value)>,
    /// Set when the session id was derived from a platform-native identifier
    /// by the channel adapter rather than supplied by the client.
    pub anchored: bool,
}

impl ChatRequest {
    pub fn new(channel: ChannelKind, text: impl Into<String>) -> Self {
        Self {
            session_id: None,
            text: text.into(),
            language: None,
            channel,
            modality: Modality::Text,
            identifiers: Vec::new(),
            anchored: false,
        }
    }

    /// Client-supplied session id.
    pub fn session(mut self, session_id: Option<String>) -> Self {
        self.session_id = session_id;
        self.anchored = false;
        self
    }

    /// Session keyed by the platform-native id (`telegram_<chat id>`).
    pub fn anchored(mut self, native_id: impl fmt::Display) -> Self {
        self.session_id = Some(self.channel.session_id_for(native_id));
        self.anchored = true;
        self
    }

    pub fn language(mut self, language: Option<String>) -> Self {
        self.language = language.filter(|l| !l.trim().is_empty());
        self
    }

    /// Tag the text as transcribed speech.
    pub fn voice(mut self) -> Self {
        self.modality = Modality::Voice;
        self
    }

    pub fn identifier(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.identifiers.push((key.into(), value.into()));
        self
    }
}

/// Result of a completed turn.
#[derive(Debug, Clone)]
pub struct ChatOutcome {
    pub session_id: String,
    pub reply: DialogueReply,
}

/// Runs the shared text turn: sanitize, resolve the session, forward to the
/// dialogue engine and record the exchange.
///
/// Every text surface (direct API, web widget, Telegram, WhatsApp) goes
/// through here; the voice IVR has its own state machine.
pub struct ConversationRouter {
    sessions: Arc<dyn SessionStore>,
    dialogue: Arc<dyn DialogueEngine>,
    sanitizer: Sanitizer,
}

impl ConversationRouter {
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        dialogue: Arc<dyn DialogueEngine>,
        sanitizer: Sanitizer,
    ) -> Self {
        Self {
            sessions,
            dialogue,
            sanitizer,
        }
    }

    pub fn sessions(&self) -> &Arc<dyn SessionStore> {
        &self.sessions
    }

    pub fn dialogue(&self) -> &Arc<dyn DialogueEngine> {
        &self.dialogue
    }

    /// Handle one message. Nothing is appended to history unless the
    /// dialogue engine answered.
    pub async fn handle(&self, request: ChatRequest) -> SwitchboardResult<ChatOutcome> {
        let text = self
            .sanitizer
            .sanitize(&request.text)
            .into_result()
            .map_err(SwitchboardError::Validation)?;

        let channel = request.channel;
        if !request.anchored {
            let owner = request
                .session_id
                .as_deref()
                .map(str::trim)
                .and_then(ChannelKind::from_session_prefix);
            if let Some(owner) = owner.filter(|o| o.is_platform_anchored() || *o != channel) {
                return Err(SwitchboardError::Validation(format!(
                    "Session id is reserved for the {owner} channel"
                )));
            }
        }

        let session_id = self.sessions.resolve(request.session_id.as_deref()).await;
        let language = request.language.clone();
        let foreign = Arc::new(AtomicBool::new(false));
        let flag = foreign.clone();
        self.sessions
            .update_metadata(
                &session_id,
                Box::new(move |meta| {
                    if meta.channel.is_some_and(|owner| owner != channel) {
                        flag.store(true, Ordering::SeqCst);
                        return;
                    }
                    if let Some(language) = language {
                        meta.language = language;
                    }
                    meta.channel = Some(channel);
                }),
            )
            .await?;
        if foreign.load(Ordering::SeqCst) {
            warn!(session_id = %session_id, channel = %channel, "Rejected turn for a session owned by another channel");
            return Err(SwitchboardError::Validation(
                "Session belongs to another channel".into(),
            ));
        }

        let mut envelope = MessageEnvelope::new(
            session_id.as_str(),
            text.as_str(),
            channel,
            request.language.as_deref().unwrap_or(DEFAULT_LANGUAGE),
        );
        if request.modality == Modality::Voice {
            envelope = envelope.voice();
        }
        for (key, value) in request.identifiers {
            envelope = envelope.with_identifier(key, value);
        }

        let reply = match self.dialogue.send(&envelope).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(
                    session_id = %session_id,
                    channel = %channel,
                    error = %redact(&e.to_string()),
                    "Dialogue engine call failed"
                );
                return Err(e);
            }
        };

        if reply.wants_handoff() {
            self.sessions
                .update_metadata(
                    &session_id,
                    Box::new(|meta| meta.request_handoff("requested by dialogue engine")),
                )
                .await?;
        }

        self.sessions
            .append_turn(&session_id, &text, &reply.text, request.modality)
            .await;

        info!(
            session_id = %session_id,
            channel = %channel,
            intent = reply.intent.as_deref().unwrap_or("-"),
            "Turn completed"
        );

        Ok(ChatOutcome { session_id, reply })
    }

    /// Flag a session for human takeover.
    pub async fn request_handoff(&self, session_id: &str, reason: Option<String>) -> SwitchboardResult<()> {
        if self.sessions.get(session_id).await.is_none() {
            return Err(SwitchboardError::NotFound(format!("Session '{session_id}' not found")));
        }
        let reason = reason.unwrap_or_else(|| "requested by user".to_string());
        info!(session_id = %session_id, reason = %reason, "Handoff requested");
        self.sessions
            .update_metadata(session_id, Box::new(move |meta| meta.request_handoff(reason)))
            .await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use switchboard_dialogue::EngineStatus;
    use switchboard_session::InMemorySessionStore;

    struct EchoEngine {
        calls: AtomicUsize,
        handoff: bool,
    }

    #[async_trait]
    impl DialogueEngine for EchoEngine {
        async fn send(&self, envelope: &MessageEnvelope) -> SwitchboardResult<DialogueReply> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut reply = DialogueReply::text(format!("echo: {}", envelope.text()));
            reply.handoff_requested = Some(self.handoff);
            Ok(reply)
        }

        async fn status(&self) -> SwitchboardResult<EngineStatus> {
            Ok(EngineStatus {
                version: "test".into(),
                model_file: None,
            })
        }
    }

    fn router(handoff: bool) -> (ConversationRouter, Arc<EchoEngine>) {
        let engine = Arc::new(EchoEngine {
            calls: AtomicUsize::new(0),
            handoff,
        });
        let router = ConversationRouter::new(
            Arc::new(InMemorySessionStore::default()),
            engine.clone(),
            Sanitizer::default(),
        );
        (router, engine)
    }

    #[tokio::test]
    async fn test_handle_records_turn() {
        let (router, _) = router(false);
        let outcome = router
            .handle(ChatRequest::new(ChannelKind::Web, "  hello\u{0007} "))
            .await
            .unwrap();
        assert_eq!(outcome.reply.text, "echo: hello");

        let session = router.sessions().get(&outcome.session_id).await.unwrap();
        assert_eq!(session.history.len(), 1);
        assert_eq!(session.history[0].user_text, "hello");
        assert_eq!(session.metadata.channel, Some(ChannelKind::Web));
    }

    #[tokio::test]
    async fn test_empty_message_never_reaches_engine() {
        let (router, engine) = router(false);
        let err = router
            .handle(ChatRequest::new(ChannelKind::Web, "   "))
            .await
            .unwrap_err();
        assert!(matches!(err, SwitchboardError::Validation(_)));
        assert_eq!(engine.calls.load(Ordering::SeqCst), 0);
        assert_eq!(router.sessions().len().await, 0);
    }

    #[tokio::test]
    async fn test_voice_turn_and_language() {
        let (router, _) = router(false);
        let outcome = router
            .handle(
                ChatRequest::new(ChannelKind::Twilio, "how far")
                    .language(Some("pidgin".into()))
                    .voice(),
            )
            .await
            .unwrap();
        let session = router.sessions().get(&outcome.session_id).await.unwrap();
        assert_eq!(session.history[0].modality, Modality::Voice);
        assert_eq!(session.metadata.language, "pidgin");
    }

    #[tokio::test]
    async fn test_engine_handoff_flags_session() {
        let (router, _) = router(true);
        let outcome = router
            .handle(ChatRequest::new(ChannelKind::Telegram, "agent please").anchored(9))
            .await
            .unwrap();
        assert_eq!(outcome.session_id, "telegram_9");
        let session = router.sessions().get("telegram_9").await.unwrap();
        assert!(session.metadata.handoff_requested);
    }

    #[tokio::test]
    async fn test_client_cannot_write_platform_session() {
        let (router, engine) = router(false);
        router
            .handle(ChatRequest::new(ChannelKind::Telegram, "hi").anchored(42))
            .await
            .unwrap();

        for channel in [ChannelKind::Web, ChannelKind::Telegram] {
            let err = router
                .handle(ChatRequest::new(channel, "take over").session(Some("telegram_42".into())))
                .await
                .unwrap_err();
            assert!(matches!(err, SwitchboardError::Validation(_)));
        }

        let session = router.sessions().get("telegram_42").await.unwrap();
        assert_eq!(session.metadata.channel, Some(ChannelKind::Telegram));
        assert_eq!(session.history.len(), 1);
        assert_eq!(engine.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_reserved_prefix_never_creates_session() {
        let (router, _) = router(false);
        let err = router
            .handle(ChatRequest::new(ChannelKind::Web, "hi").session(Some("whatsapp_2348012345678".into())))
            .await
            .unwrap_err();
        assert!(matches!(err, SwitchboardError::Validation(_)));
        assert_eq!(router.sessions().len().await, 0);
    }

    #[tokio::test]
    async fn test_session_keeps_first_channel() {
        let (router, _) = router(false);
        let outcome = router
            .handle(ChatRequest::new(ChannelKind::Web, "hello"))
            .await
            .unwrap();

        let err = router
            .handle(
                ChatRequest::new(ChannelKind::Twilio, "hello again")
                    .session(Some(outcome.session_id.clone()))
                    .voice(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, SwitchboardError::Validation(_)));

        let session = router.sessions().get(&outcome.session_id).await.unwrap();
        assert_eq!(session.metadata.channel, Some(ChannelKind::Web));
        assert_eq!(session.history.len(), 1);

        // Same channel continues the conversation.
        router
            .handle(ChatRequest::new(ChannelKind::Web, "still here").session(Some(outcome.session_id.clone())))
            .await
            .unwrap();
        let session = router.sessions().get(&outcome.session_id).await.unwrap();
        assert_eq!(session.history.len(), 2);
    }

    #[tokio::test]
    async fn test_handoff_unknown_session() {
        let (router, _) = router(false);
        let err = router.request_handoff("web_missing", None).await.unwrap_err();
        assert!(matches!(err, SwitchboardError::NotFound(_)));
    }
}
