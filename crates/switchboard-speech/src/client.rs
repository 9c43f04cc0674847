use crate::audio::{extract_audio, SynthesizedAudio};
use crate::config::SpeechConfig;
use crate::input::{normalize_language, validate_text};
use crate::voice::{resolve_voice_id, VoiceOptions, VoiceSettings};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use switchboard_core::{SwitchboardError, SwitchboardResult};
use switchboard_security::redact;

/// Speech recognition and synthesis.
#[async_trait]
pub trait SpeechService: Send + Sync {
    /// Transcribe a recording (`http(s)://` URL or `data:` URI).
    async fn speech_to_text(&self, audio_ref: &str, language: &str) -> SwitchboardResult<String>;

    /// Synthesize `text`. `voice_name` is matched case-insensitively.
    async fn text_to_speech(
        &self,
        text: &str,
        language: &str,
        voice_name: Option<&str>,
        options: &VoiceOptions,
    ) -> SwitchboardResult<SynthesizedAudio>;
}

#[derive(Serialize)]
struct TranscribeRequest<'a> {
    group_id: &'a str,
    audio_url: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    audio_base64: Option<&'a str>,
    language: &'a str,
    model: &'a str,
}

#[derive(Serialize)]
struct SynthesizeRequest<'a> {
    text: &'a str,
    model: &'a str,
    voice_setting: VoiceSettings,
    language_boost: &'a str,
}

/// HTTP client for the speech API.
pub struct SpeechClient {
    config: SpeechConfig,
    http: reqwest::Client,
}

impl SpeechClient {
    pub fn new(config: SpeechConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    pub fn config(&self) -> &SpeechConfig {
        &self.config
    }

    fn require_credentials(&self, capability: &str) -> SwitchboardResult<()> {
        if self.config.is_configured() {
            Ok(())
        } else {
            Err(SwitchboardError::Configuration(format!(
                "Speech {capability} not configured: API key and group id required"
            )))
        }
    }

    fn transport_error(&self, e: reqwest::Error) -> SwitchboardError {
        if e.is_timeout() {
            SwitchboardError::UpstreamTimeout(format!(
                "Speech request timed out after {}ms",
                self.config.timeout_ms
            ))
        } else if e.is_connect() || e.is_request() {
            SwitchboardError::UpstreamUnavailable(
                "No response from speech service. Check network connection.".to_string(),
            )
        } else {
            SwitchboardError::upstream(None, redact(&e.to_string()))
        }
    }

    /// Classify a non-2xx response, keeping only the redacted `status_msg`.
    async fn status_error(&self, resp: reqwest::Response) -> SwitchboardError {
        let status = resp.status();
        match status.as_u16() {
            429 => {
                return SwitchboardError::RateLimited(
                    "Speech API rate limit exceeded. Please retry later.".to_string(),
                )
            }
            401 | 403 => {
                return SwitchboardError::AuthFailed(
                    "Speech API authentication failed. Check API credentials.".to_string(),
                )
            }
            _ => {}
        }
        let body: Value = resp.json().await.unwrap_or(Value::Null);
        let message = body
            .pointer("/base_resp/status_msg")
            .and_then(Value::as_str)
            .map(redact)
            .unwrap_or_else(|| status.to_string());
        SwitchboardError::upstream(Some(i64::from(status.as_u16())), message)
    }
}

/// Embedded `base_resp.status_code` must be 0.
fn check_embedded_status(body: &Value) -> SwitchboardResult<()> {
    let code = body.pointer("/base_resp/status_code").and_then(Value::as_i64);
    if code == Some(0) {
        return Ok(());
    }
    let message = body
        .pointer("/base_resp/status_msg")
        .and_then(Value::as_str)
        .map(redact)
        .unwrap_or_else(|| "TTS request failed".to_string());
    Err(SwitchboardError::upstream(code, message))
}

#[async_trait]
impl SpeechService for SpeechClient {
    async fn speech_to_text(&self, audio_ref: &str, language: &str) -> SwitchboardResult<String> {
        self.require_credentials("STT")?;

        let url = self.config.endpoint("/a2t");
        let body = TranscribeRequest {
            group_id: &self.config.group_id,
            audio_url: audio_ref,
            audio_base64: audio_ref.starts_with("data:").then_some(audio_ref),
            language: normalize_language(Some(language)),
            model: &self.config.model,
        };

        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .timeout(self.config.timeout())
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = resp.status();
        if !status.is_success() {
            if status == reqwest::StatusCode::NOT_FOUND {
                tracing::warn!(
                    endpoint = %url,
                    "Speech-to-text endpoint not found, verify the speech API configuration"
                );
            }
            let err = self.status_error(resp).await;
            tracing::error!(error = %err, "Speech-to-text failed");
            return Err(err);
        }

        let body: Value = resp.json().await.map_err(|e| self.transport_error(e))?;
        let transcript = ["/text", "/result"]
            .iter()
            .find_map(|p| body.pointer(p).and_then(Value::as_str))
            .unwrap_or_default()
            .trim()
            .to_string();
        tracing::debug!(chars = transcript.len(), "Speech transcribed");
        Ok(transcript)
    }

    async fn text_to_speech(
        &self,
        text: &str,
        language: &str,
        voice_name: Option<&str>,
        options: &VoiceOptions,
    ) -> SwitchboardResult<SynthesizedAudio> {
        self.require_credentials("TTS")?;
        let text = validate_text(text)?;
        let language = normalize_language(Some(language));
        let voice_id = resolve_voice_id(voice_name, &self.config.default_voice);

        let url = self.config.endpoint("/t2a_v2");
        let body = SynthesizeRequest {
            text,
            model: &self.config.model,
            voice_setting: VoiceSettings::new(voice_id, options),
            language_boost: "auto",
        };

        let resp = self
            .http
            .post(&url)
            .query(&[("GroupId", self.config.group_id.as_str())])
            .bearer_auth(&self.config.api_key)
            .timeout(self.config.timeout())
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        if !resp.status().is_success() {
            return Err(self.status_error(resp).await);
        }

        let body: Value = resp.json().await.map_err(|e| self.transport_error(e))?;
        check_embedded_status(&body)?;
        let audio = extract_audio(&body)?;
        tracing::debug!(language, voice_id, chars = text.chars().count(), "Speech synthesized");
        Ok(audio)
    }
}
