use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::Value;
use switchboard_core::{SwitchboardError, SwitchboardResult};

/// MIME type of re-wrapped synthesized audio.
pub const AUDIO_MIME: &str = "audio/mpeg";

/// Result of a synthesis call, normalized from whichever field the backend used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SynthesizedAudio {
    /// Remote audio the telephony platform can fetch.
    Url(String),
    /// Inline `data:` URI.
    DataUri(String),
}

impl SynthesizedAudio {
    pub fn as_uri(&self) -> &str {
        match self {
            Self::Url(uri) | Self::DataUri(uri) => uri,
        }
    }

    pub fn into_uri(self) -> String {
        match self {
            Self::Url(uri) | Self::DataUri(uri) => uri,
        }
    }

    fn from_inline(value: &str) -> SwitchboardResult<Self> {
        if value.starts_with("data:") {
            Ok(Self::DataUri(value.to_string()))
        } else if value.starts_with("http://") || value.starts_with("https://") {
            Ok(Self::Url(value.to_string()))
        } else {
            let bytes = decode_hex_audio(value)?;
            Ok(Self::DataUri(format!(
                "data:{AUDIO_MIME};base64,{}",
                STANDARD.encode(bytes)
            )))
        }
    }
}

fn non_empty_str<'a>(body: &'a Value, pointer: &str) -> Option<&'a str> {
    body.pointer(pointer)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

/// Pull the audio out of a synthesis response body.
///
/// Looks in `data.audio`, `audio`, `result.audio` (URL, data URI or hex),
/// then `audio_url` at the same three levels. An `audio_id` means the backend
/// answered asynchronously, which is reported as a failure.
pub fn extract_audio(body: &Value) -> SwitchboardResult<SynthesizedAudio> {
    if !body.is_object() {
        return Err(SwitchboardError::upstream(
            None,
            "Invalid speech response: body is not an object",
        ));
    }

    for pointer in ["/data/audio", "/audio", "/result/audio"] {
        if let Some(audio) = non_empty_str(body, pointer) {
            return SynthesizedAudio::from_inline(audio);
        }
    }

    for pointer in ["/audio_url", "/data/audio_url", "/result/audio_url"] {
        if let Some(url) = non_empty_str(body, pointer) {
            return Ok(SynthesizedAudio::Url(url.to_string()));
        }
    }

    for pointer in ["/audio_id", "/data/audio_id"] {
        if let Some(audio_id) = non_empty_str(body, pointer) {
            return Err(SwitchboardError::upstream(
                None,
                format!(
                    "Speech service returned audio id {audio_id} instead of audio data; asynchronous retrieval is not supported"
                ),
            ));
        }
    }

    Err(SwitchboardError::upstream(
        None,
        "No audio data found in speech response",
    ))
}

/// Decode hex-encoded audio and check it is MP3.
///
/// Accepts an `ID3` tag or an MPEG frame sync (`0xFF` followed by a byte
/// with its top three bits set).
pub fn decode_hex_audio(hex_audio: &str) -> SwitchboardResult<Vec<u8>> {
    let bytes = hex::decode(hex_audio.trim()).map_err(|e| {
        SwitchboardError::InvalidAudioFormat(format!("Audio data is not valid hex: {e}"))
    })?;

    let has_id3 = bytes.starts_with(b"ID3");
    let has_frame_sync = matches!(bytes.as_slice(), [0xFF, second, ..] if second & 0xE0 == 0xE0);
    if !has_id3 && !has_frame_sync {
        let header: String = bytes
            .iter()
            .take(3)
            .map(|b| if b.is_ascii_graphic() { char::from(*b) } else { '.' })
            .collect();
        return Err(SwitchboardError::InvalidAudioFormat(format!(
            "expected MP3, got header \"{header}\""
        )));
    }
    Ok(bytes)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    const ID3_MP3: &[u8] = b"ID3\x04\x00\x00\x00\x00\x00\x00audio-frames";

    #[test]
    fn test_hex_round_trip() {
        let hex_audio = hex::encode(ID3_MP3);
        let audio = extract_audio(&json!({"data": {"audio": hex_audio}})).unwrap();
        let uri = audio.into_uri();
        let payload = uri.strip_prefix("data:audio/mpeg;base64,").unwrap();
        assert_eq!(STANDARD.decode(payload).unwrap(), ID3_MP3);
    }

    #[test]
    fn test_frame_sync_accepted() {
        let bytes = decode_hex_audio("FFFB9064").unwrap();
        assert_eq!(bytes, vec![0xFF, 0xFB, 0x90, 0x64]);
    }

    #[test]
    fn test_bad_header_rejected() {
        let err = decode_hex_audio(&hex::encode(b"RIFF....WAVE")).unwrap_err();
        assert!(matches!(err, SwitchboardError::InvalidAudioFormat(_)));
        assert!(err.to_string().contains("RIF"));
    }

    #[test]
    fn test_non_hex_rejected() {
        let err = decode_hex_audio("not-hex!").unwrap_err();
        assert!(matches!(err, SwitchboardError::InvalidAudioFormat(_)));
        assert!(decode_hex_audio("").is_err());
    }

    #[test]
    fn test_field_precedence() {
        let body = json!({
            "audio": "https://cdn.example.com/top.mp3",
            "data": {"audio": "https://cdn.example.com/data.mp3"}
        });
        assert_eq!(
            extract_audio(&body).unwrap(),
            SynthesizedAudio::Url("https://cdn.example.com/data.mp3".into())
        );

        let body = json!({"result": {"audio": "data:audio/mpeg;base64,SUQz"}});
        assert!(matches!(extract_audio(&body).unwrap(), SynthesizedAudio::DataUri(_)));
    }

    #[test]
    fn test_audio_url_fallback() {
        let body = json!({"data": {"audio": "", "audio_url": "https://cdn.example.com/a.mp3"}});
        assert_eq!(
            extract_audio(&body).unwrap().as_uri(),
            "https://cdn.example.com/a.mp3"
        );
    }

    #[test]
    fn test_audio_id_is_unsupported() {
        let err = extract_audio(&json!({"data": {"audio_id": "aud-123"}})).unwrap_err();
        assert!(err.to_string().contains("aud-123"));
    }

    #[test]
    fn test_no_audio() {
        let err = extract_audio(&json!({"base_resp": {"status_code": 0}})).unwrap_err();
        assert!(err.to_string().contains("No audio data"));
    }
}
