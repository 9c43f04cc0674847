use serde::{Deserialize, Serialize};

const DEFAULT_VOICE_ID: &str = "moss_audio_4e6eb029-ab89-11f0-a74c-2a7a0b4baedc";

/// Voice names (lowercase) to backend voice ids.
const VOICE_TABLE: &[(&str, &str)] = &[
    ("odia", "moss_audio_4e6eb029-ab89-11f0-a74c-2a7a0b4baedc"),
    ("odiamale", "moss_audio_4e6eb029-ab89-11f0-a74c-2a7a0b4baedc"),
    ("marcus", "moss_audio_a59cd561-ab87-11f0-a74c-2a7a0b4baedc"),
    ("marcy", "moss_audio_fdad4786-ab84-11f0-a816-023f15327f7a"),
    ("joslyn", "moss_audio_141d8c4c-a6f8-11f0-84c1-0ec6fa858d82"),
    ("alice", "moss_audio_4e6eb029-ab89-11f0-a74c-2a7a0b4baedc"),
    ("default", "moss_audio_4e6eb029-ab89-11f0-a74c-2a7a0b4baedc"),
];

fn lookup(name: &str) -> Option<&'static str> {
    let name = name.trim().to_lowercase();
    VOICE_TABLE
        .iter()
        .find(|(candidate, _)| *candidate == name)
        .map(|(_, id)| *id)
}

/// Resolve a voice name case-insensitively. Unknown names use
/// `default_voice`, and an unknown default uses the table's own default.
pub fn resolve_voice_id(name: Option<&str>, default_voice: &str) -> &'static str {
    name.and_then(lookup)
        .or_else(|| lookup(default_voice))
        .unwrap_or(DEFAULT_VOICE_ID)
}

/// Per-call overrides of the voice settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VoiceOptions {
    #[serde(default)]
    pub speed: Option<f32>,
    #[serde(default)]
    pub pitch: Option<i32>,
    #[serde(default)]
    pub emotion: Option<String>,
}

/// The `voice_setting` object sent with a synthesis request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VoiceSettings {
    pub voice_id: String,
    pub speed: f32,
    pub pitch: i32,
    pub emotion: String,
}

impl VoiceSettings {
    pub fn new(voice_id: &str, options: &VoiceOptions) -> Self {
        Self {
            voice_id: voice_id.to_string(),
            speed: options.speed.unwrap_or(1.0),
            pitch: options.pitch.unwrap_or(0),
            emotion: options
                .emotion
                .clone()
                .unwrap_or_else(|| "neutral".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_voice_lookup_case_insensitive() {
        assert_eq!(
            resolve_voice_id(Some("Marcy"), "odia"),
            "moss_audio_fdad4786-ab84-11f0-a816-023f15327f7a"
        );
        assert_eq!(
            resolve_voice_id(Some(" JOSLYN "), "odia"),
            "moss_audio_141d8c4c-a6f8-11f0-84c1-0ec6fa858d82"
        );
    }

    #[test]
    fn test_unknown_voice_uses_configured_default() {
        assert_eq!(
            resolve_voice_id(Some("hal9000"), "marcus"),
            "moss_audio_a59cd561-ab87-11f0-a74c-2a7a0b4baedc"
        );
        assert_eq!(
            resolve_voice_id(None, "nobody"),
            "moss_audio_4e6eb029-ab89-11f0-a74c-2a7a0b4baedc"
        );
    }

    #[test]
    fn test_settings_defaults_and_overrides() {
        let settings = VoiceSettings::new("v1", &VoiceOptions::default());
        assert_eq!(settings.speed, 1.0);
        assert_eq!(settings.pitch, 0);
        assert_eq!(settings.emotion, "neutral");

        let options = VoiceOptions {
            speed: Some(1.25),
            pitch: None,
            emotion: Some("happy".into()),
        };
        let settings = VoiceSettings::new("v1", &options);
        assert_eq!(settings.speed, 1.25);
        assert_eq!(settings.pitch, 0);
        assert_eq!(settings.emotion, "happy");
    }
}
