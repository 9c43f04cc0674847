//! Client for the external dialogue / NLU engine.
//!
//! The engine speaks the REST-webhook convention: an envelope goes in as
//! `{sender, message, metadata}` and a list of candidate replies comes back.
//! [`reply::normalize_replies`] turns that list into a single
//! [`switchboard_core::DialogueReply`].

/// Engine endpoint and timeout settings.
pub mod config;
/// The [`DialogueEngine`] trait and its REST implementation.
pub mod client;
/// Wire types and reply normalization.
pub mod reply;

pub use client::{DialogueEngine, EngineStatus, RestDialogueClient};
pub use config::DialogueConfig;
pub use reply::normalize_replies;
