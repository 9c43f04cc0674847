use crate::config::IvrConfig;
use crate::records::{CallStatusUpdate, ConversationRecordSink};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use switchboard_channels::{Gather, TwimlResponse};
use switchboard_core::{
    ChannelKind, MessageEnvelope, Modality, SwitchboardError, SwitchboardResult,
    TECHNICAL_DIFFICULTIES_TEXT,
};
use switchboard_dialogue::DialogueEngine;
use switchboard_security::redact;
use switchboard_session::{SessionStore, TranscriptSource, VoiceCallContext};
use switchboard_speech::{SpeechService, VoiceOptions};
use tokio::time::Instant;

const LISTEN_PROMPT: &str = "Please speak your request.";
const REPROMPT: &str = "I'm sorry, I didn't catch that. Could you please repeat?";
const REPROMPT_LISTEN: &str = "Please speak again.";
const CONTINUE_PROMPT: &str = "How else can I help you?";
const HANDOFF_NOTICE: &str = "Please hold while I connect you with a human agent.";
const GOODBYE: &str =
    "I didn't receive any input. Please call back if you need assistance. Goodbye.";

/// Where a call stands after a webhook has been answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    Greeting,
    Listening,
    Transcribing,
    Dialogue,
    Responding,
    Handoff,
    Timeout,
    Hangup,
}

impl CallState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Handoff | Self::Timeout | Self::Hangup)
    }
}

/// Form fields of a speech-capture callback.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GatherInput {
    pub call_id: Option<String>,
    pub caller: Option<String>,
    pub speech_result: Option<String>,
    pub confidence: Option<f64>,
    pub recording_url: Option<String>,
}

/// The markup answering one webhook, plus the state it leaves the call in.
#[derive(Debug, Clone)]
pub struct VoiceTurn {
    pub session_id: String,
    pub state: CallState,
    /// States entered while handling the webhook, in order.
    pub path: Vec<CallState>,
    pub response: TwimlResponse,
}

impl VoiceTurn {
    pub fn render(&self) -> String {
        self.response.render()
    }
}

/// Telephony turn-taking state machine.
pub struct IvrEngine {
    sessions: Arc<dyn SessionStore>,
    dialogue: Arc<dyn DialogueEngine>,
    speech: Arc<dyn SpeechService>,
    records: Arc<dyn ConversationRecordSink>,
    config: IvrConfig,
    /// Turns of one call never overlap. An entry lives only while a turn
    /// for that call is running or waiting.
    call_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl IvrEngine {
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        dialogue: Arc<dyn DialogueEngine>,
        speech: Arc<dyn SpeechService>,
        records: Arc<dyn ConversationRecordSink>,
        config: IvrConfig,
    ) -> Self {
        Self {
            sessions,
            dialogue,
            speech,
            records,
            config,
            call_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &IvrConfig {
        &self.config
    }

    fn twiml(&self) -> TwimlResponse {
        TwimlResponse::with_voice(self.config.say_voice.as_str())
    }

    fn listen(&self, response: TwimlResponse, prompt: &str) -> TwimlResponse {
        response
            .gather(Gather::speech(self.config.gather_url()).prompt(prompt))
            .redirect(self.config.timeout_url())
    }

    async fn resolve_call(&self, call_id: Option<&str>, caller: Option<&str>) -> String {
        let session_id = self
            .sessions
            .resolve(call_id.map(|c| ChannelKind::Twilio.session_id_for(c)).as_deref())
            .await;
        let call_id = call_id.unwrap_or(session_id.as_str()).to_string();
        let caller = caller.unwrap_or_default().to_string();
        let result = self
            .sessions
            .update_metadata(
                &session_id,
                Box::new(move |meta| {
                    meta.channel = Some(ChannelKind::Twilio);
                    if meta.voice.is_none() {
                        meta.voice = Some(VoiceCallContext::new(call_id, caller));
                    }
                }),
            )
            .await;
        if let Err(e) = result {
            tracing::warn!(session_id = %session_id, error = %e, "Could not tag call session");
        }
        session_id
    }

    fn call_lock(&self, session_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.call_locks
            .lock()
            .entry(session_id.to_string())
            .or_default()
            .clone()
    }

    /// Drop the call's lock entry unless another turn is holding or waiting on it.
    fn forget_idle_call(&self, session_id: &str, lock: Arc<tokio::sync::Mutex<()>>) {
        let mut locks = self.call_locks.lock();
        let idle = locks
            .get(session_id)
            .is_some_and(|entry| Arc::ptr_eq(entry, &lock) && Arc::strong_count(&lock) == 2);
        if idle {
            locks.remove(session_id);
        }
    }

    /// Calls with a turn in flight.
    pub fn active_calls(&self) -> usize {
        self.call_locks.lock().len()
    }

    /// Answer an incoming call: greet, then listen.
    pub async fn greeting(&self, call_id: Option<&str>, caller: Option<&str>) -> VoiceTurn {
        let session_id = self.resolve_call(call_id, caller).await;
        tracing::info!(session_id = %session_id, "Incoming call");
        let response = self.listen(self.twiml().say(self.config.greeting.as_str()), LISTEN_PROMPT);
        VoiceTurn {
            session_id,
            state: CallState::Listening,
            path: vec![CallState::Greeting, CallState::Listening],
            response,
        }
    }

    /// The caller stayed silent: say goodbye and hang up.
    pub async fn timeout(&self, call_id: Option<&str>) -> VoiceTurn {
        let session_id = call_id
            .map(|c| ChannelKind::Twilio.session_id_for(c))
            .unwrap_or_default();
        tracing::info!(session_id = %session_id, "Call timed out waiting for input");
        VoiceTurn {
            session_id,
            state: CallState::Timeout,
            path: vec![CallState::Timeout],
            response: self.twiml().say(GOODBYE).hangup(),
        }
    }

    /// Handle one speech-capture callback.
    ///
    /// The whole turn, including time spent waiting behind an earlier turn of
    /// the same call, is bounded by the configured turn deadline.
    pub async fn handle_gather(&self, input: GatherInput) -> VoiceTurn {
        let deadline = Instant::now() + self.config.turn_deadline();
        let session_id = self
            .resolve_call(input.call_id.as_deref(), input.caller.as_deref())
            .await;
        let lock = self.call_lock(&session_id);
        let turn = {
            let _turn = lock.lock().await;
            self.run_turn(session_id.clone(), input, deadline).await
        };
        self.forget_idle_call(&session_id, lock);
        turn
    }

    async fn run_turn(&self, session_id: String, input: GatherInput, deadline: Instant) -> VoiceTurn {
        let mut path = vec![CallState::Listening];
        let mut transcript = input
            .speech_result
            .as_deref()
            .map(str::trim)
            .unwrap_or_default()
            .to_string();
        let mut source = TranscriptSource::PlatformRecognizer;

        let low_confidence = input
            .confidence
            .is_some_and(|c| c < self.config.confidence_threshold);
        if transcript.is_empty() || low_confidence {
            if let Some(recording) = input.recording_url.as_deref() {
                path.push(CallState::Transcribing);
                let language = self.session_language(&session_id).await;
                match self
                    .bounded(self.speech.speech_to_text(recording, &language), deadline)
                    .await
                {
                    Ok(text) if !text.trim().is_empty() => {
                        tracing::debug!(
                            session_id = %session_id,
                            confidence = input.confidence,
                            "Using speech adapter transcript"
                        );
                        transcript = text.trim().to_string();
                        source = TranscriptSource::SpeechAdapterFallback;
                    }
                    Ok(_) => {
                        tracing::debug!(session_id = %session_id, "Fallback transcript was empty");
                    }
                    Err(e) => {
                        tracing::debug!(
                            session_id = %session_id,
                            error = %redact(&e.to_string()),
                            "Fallback transcription failed, keeping recognizer transcript"
                        );
                    }
                }
            }
        }

        if transcript.is_empty() {
            path.push(CallState::Listening);
            return VoiceTurn {
                session_id,
                state: CallState::Listening,
                path,
                response: self.listen(self.twiml().say(REPROMPT), REPROMPT_LISTEN),
            };
        }

        path.push(CallState::Dialogue);
        let language = self.session_language(&session_id).await;
        let mut envelope =
            MessageEnvelope::new(session_id.as_str(), transcript.as_str(), ChannelKind::Twilio, language.as_str())
                .voice();
        if let Some(caller) = input.caller.as_deref() {
            envelope = envelope.with_identifier("phone_number", caller);
        }

        let sent = tokio::time::timeout_at(deadline, self.dialogue.send(&envelope))
            .await
            .unwrap_or_else(|_| {
                Err(SwitchboardError::UpstreamTimeout(
                    "Dialogue reply missed the call turn deadline".into(),
                ))
            });
        let reply = match sent {
            Ok(reply) => reply,
            Err(e) => {
                tracing::error!(
                    session_id = %session_id,
                    error = %redact(&e.to_string()),
                    "Dialogue failed during call"
                );
                path.push(CallState::Hangup);
                return VoiceTurn {
                    session_id,
                    state: CallState::Hangup,
                    path,
                    response: self.twiml().say(TECHNICAL_DIFFICULTIES_TEXT).hangup(),
                };
            }
        };

        path.push(CallState::Responding);
        let mut response = self.twiml();
        let remaining = deadline.saturating_duration_since(Instant::now());
        let synthesized = if remaining < self.config.speech_budget() {
            Err(SwitchboardError::UpstreamTimeout(
                "Not enough of the turn left for synthesis".into(),
            ))
        } else {
            self.bounded(
                self.speech.text_to_speech(
                    &reply.text,
                    &language,
                    Some(self.config.voice_name.as_str()),
                    &VoiceOptions::default(),
                ),
                deadline,
            )
            .await
        };
        match synthesized {
            Ok(audio) => response = response.play(audio.into_uri()),
            Err(e) => {
                tracing::warn!(
                    session_id = %session_id,
                    error = %redact(&e.to_string()),
                    "Speech synthesis failed, falling back to <Say>"
                );
                response = response.say(reply.text.as_str());
            }
        }

        self.record_turn(&session_id, &transcript, &reply.text, source)
            .await;

        if reply.wants_handoff() {
            path.push(CallState::Handoff);
            self.mark_handoff(&session_id).await;
            let response = response.say(HANDOFF_NOTICE);
            let response = if self.config.operator_number.trim().is_empty() {
                tracing::warn!(session_id = %session_id, "Handoff requested but no operator number is configured");
                response.hangup()
            } else {
                response.dial(self.config.operator_number.as_str())
            };
            return VoiceTurn {
                session_id,
                state: CallState::Handoff,
                path,
                response,
            };
        }

        path.push(CallState::Listening);
        VoiceTurn {
            session_id,
            state: CallState::Listening,
            path,
            response: self.listen(response, CONTINUE_PROMPT),
        }
    }

    /// Log a status callback and forward it to the record sink.
    pub async fn call_status(&self, update: CallStatusUpdate) {
        tracing::info!(
            call_id = %update.call_id,
            status = %update.status,
            duration_secs = update.duration_secs,
            "Call status update"
        );
        if update.is_terminal() {
            let session_id = ChannelKind::Twilio.session_id_for(&update.call_id);
            let turns = self
                .sessions
                .get(&session_id)
                .await
                .and_then(|s| s.metadata.voice)
                .map_or(0, |voice| voice.turn_count);
            tracing::info!(session_id = %session_id, turns, "Call ended");
        }
        if let Err(e) = self.records.record_call_status(&update).await {
            tracing::error!(
                call_id = %update.call_id,
                error = %redact(&e.to_string()),
                "Failed to record call status"
            );
        }
    }

    async fn session_language(&self, session_id: &str) -> String {
        self.sessions
            .get(session_id)
            .await
            .map(|s| s.metadata.language)
            .unwrap_or_else(|| switchboard_core::DEFAULT_LANGUAGE.to_string())
    }

    async fn record_turn(
        &self,
        session_id: &str,
        user_text: &str,
        bot_text: &str,
        source: TranscriptSource,
    ) {
        self.sessions
            .append_turn(session_id, user_text, bot_text, Modality::Voice)
            .await;
        let result = self
            .sessions
            .update_metadata(
                session_id,
                Box::new(move |meta| {
                    if let Some(voice) = meta.voice.as_mut() {
                        voice.turn_count += 1;
                        voice.last_transcript_source = source;
                    }
                }),
            )
            .await;
        if let Err(e) = result {
            tracing::warn!(session_id = %session_id, error = %e, "Could not update call context");
        }
    }

    async fn mark_handoff(&self, session_id: &str) {
        let result = self
            .sessions
            .update_metadata(
                session_id,
                Box::new(|meta| meta.request_handoff("Requested by dialogue engine during call")),
            )
            .await;
        if let Err(e) = result {
            tracing::warn!(session_id = %session_id, error = %e, "Could not flag handoff");
        }
    }

    /// Bound a speech call by the in-call budget and what is left of the turn.
    async fn bounded<T>(
        &self,
        call: impl Future<Output = SwitchboardResult<T>>,
        deadline: Instant,
    ) -> SwitchboardResult<T> {
        let budget = self.config.speech_budget();
        let until = deadline.min(Instant::now() + budget);
        tokio::time::timeout_at(until, call).await.map_err(|_| {
            SwitchboardError::UpstreamTimeout(format!(
                "Speech call exceeded the {}ms in-call budget",
                budget.as_millis()
            ))
        })?
    }
}
