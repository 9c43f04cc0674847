//! TwiML voice webhooks. Every answer is `text/xml`, including failures;
//! the IVR engine degrades to a spoken apology rather than an HTTP error.

use crate::server::AppState;
use axum::{
    extract::{rejection::FormRejection, State},
    http::header,
    response::IntoResponse,
    Form,
};
use serde::Deserialize;
use std::sync::Arc;
use switchboard_security::redact;
use switchboard_voice::{CallStatusUpdate, GatherInput, RecordingJob, VoiceTurn};
use tracing::{debug, info, warn};

/// The form fields the telephony provider posts. Everything is optional;
/// a missing field is treated as absent, never as a rejection.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TwilioForm {
    pub call_sid: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub speech_result: Option<String>,
    pub confidence: Option<String>,
    pub recording_url: Option<String>,
    pub recording_sid: Option<String>,
    pub recording_status: Option<String>,
    pub call_status: Option<String>,
    pub call_duration: Option<String>,
}

impl TwilioForm {
    fn parse(form: Result<Form<Self>, FormRejection>) -> Self {
        match form {
            Ok(Form(form)) => form,
            Err(rejection) => {
                warn!(error = %rejection.body_text(), "Unreadable telephony form; treating fields as absent");
                Self::default()
            }
        }
    }

    fn confidence(&self) -> Option<f64> {
        self.confidence
            .as_deref()
            .and_then(|c| c.trim().parse::<f64>().ok())
            .filter(|c| c.is_finite())
    }

    fn gather_input(self) -> GatherInput {
        let confidence = self.confidence();
        GatherInput {
            call_id: self.call_sid,
            caller: self.from,
            speech_result: self.speech_result,
            confidence,
            recording_url: self.recording_url,
        }
    }
}

fn twiml(turn: &VoiceTurn) -> impl IntoResponse {
    debug!(session_id = %turn.session_id, path = ?turn.path, "Voice turn rendered");
    ([(header::CONTENT_TYPE, "text/xml")], turn.render())
}

/// `POST /api/twilio/incoming`
pub async fn incoming(
    State(state): State<Arc<AppState>>,
    form: Result<Form<TwilioForm>, FormRejection>,
) -> impl IntoResponse {
    let form = TwilioForm::parse(form);
    info!(
        call_sid = form.call_sid.as_deref().unwrap_or("-"),
        "Incoming call"
    );
    let turn = state
        .ivr
        .greeting(form.call_sid.as_deref(), form.from.as_deref())
        .await;
    twiml(&turn)
}

/// `POST /api/twilio/gather`
pub async fn gather(
    State(state): State<Arc<AppState>>,
    form: Result<Form<TwilioForm>, FormRejection>,
) -> impl IntoResponse {
    let input = TwilioForm::parse(form).gather_input();
    let turn = state.ivr.handle_gather(input).await;
    twiml(&turn)
}

/// `POST /api/twilio/timeout`
pub async fn timeout(
    State(state): State<Arc<AppState>>,
    form: Result<Form<TwilioForm>, FormRejection>,
) -> impl IntoResponse {
    let form = TwilioForm::parse(form);
    let turn = state.ivr.timeout(form.call_sid.as_deref()).await;
    twiml(&turn)
}

/// `POST /api/twilio/status`
pub async fn status(
    State(state): State<Arc<AppState>>,
    form: Result<Form<TwilioForm>, FormRejection>,
) -> &'static str {
    let form = TwilioForm::parse(form);
    let (Some(call_id), Some(status)) = (form.call_sid, form.call_status) else {
        debug!("Status callback without call id or status");
        return "OK";
    };
    state
        .ivr
        .call_status(CallStatusUpdate {
            call_id,
            status,
            duration_secs: form.call_duration.and_then(|d| d.trim().parse().ok()),
            from: form.from,
            to: form.to,
        })
        .await;
    "OK"
}

/// `POST /api/twilio/recording`: queue completed recordings for
/// re-transcription and acknowledge immediately.
pub async fn recording(
    State(state): State<Arc<AppState>>,
    form: Result<Form<TwilioForm>, FormRejection>,
) -> &'static str {
    let form = TwilioForm::parse(form);
    let completed = form
        .recording_status
        .as_deref()
        .is_some_and(|s| s.eq_ignore_ascii_case("completed"));

    match (form.call_sid, form.recording_url) {
        (Some(call_id), Some(recording_url)) if completed => {
            let job = RecordingJob {
                call_id,
                recording_url,
                recording_sid: form.recording_sid,
            };
            if let Err(e) = state.recordings.submit(job) {
                warn!(error = %redact(&e.to_string()), "Recording not queued");
            }
        }
        _ => debug!(
            status = form.recording_status.as_deref().unwrap_or("-"),
            "Recording callback ignored"
        ),
    }
    "OK"
}
