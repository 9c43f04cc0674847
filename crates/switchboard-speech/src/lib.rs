//! Speech-to-text and text-to-speech adapter.
//!
//! Talks to a MiniMax-style speech API: transcription via `/a2t`, synthesis
//! via `/t2a_v2`. Synthesis replies are adversarial (hex-encoded audio under
//! several field names, or an async `audio_id`), so they go through a single
//! parse-and-normalize step in [`audio`] before anything else sees them.
//!
//! # Main types
//!
//! - [`SpeechService`] - The trait the IVR and the gateway depend on.
//! - [`SpeechClient`] - HTTP implementation.
//! - [`SynthesizedAudio`] - Normalized synthesis result.

/// Audio extraction, hex decoding and container validation.
pub mod audio;
/// The [`SpeechService`] trait and its HTTP client.
pub mod client;
/// Speech service credentials and limits.
pub mod config;
/// Text validation and language handling.
pub mod input;
/// Voice name table and voice settings.
pub mod voice;

pub use audio::{decode_hex_audio, extract_audio, SynthesizedAudio};
pub use client::{SpeechClient, SpeechService};
pub use config::SpeechConfig;
pub use input::{detect_language, normalize_language, validate_text, MAX_TEXT_CHARS};
pub use voice::{resolve_voice_id, VoiceOptions, VoiceSettings};
