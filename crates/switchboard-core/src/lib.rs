//! Core types and error definitions for the Switchboard gateway.
//!
//! This crate provides the foundational types shared across all Switchboard
//! crates: the error taxonomy every component reports through, the channel and
//! modality enums, and the normalized message envelope / dialogue reply that
//! flow between the channel adapters and the dialogue engine.
//!
//! # Main types
//!
//! - [`SwitchboardError`] - Unified error enum for all gateway subsystems.
//! - [`SwitchboardResult`] - Convenience alias for `Result<T, SwitchboardError>`.
//! - [`ChannelKind`] - The surface a conversation arrived on.
//! - [`MessageEnvelope`] - Normalized inbound message handed to the dialogue engine.
//! - [`DialogueReply`] - Normalized reply coming back from the dialogue engine.

/// Error taxonomy.
pub mod error;
/// Envelope, reply, channel and modality types.
pub mod message;

pub use error::{SwitchboardError, SwitchboardResult};
pub use message::{
    is_well_formed_session_id, ChannelKind, DialogueReply, EnvelopeMetadata, MessageEnvelope,
    Modality, DEFAULT_LANGUAGE, FALLBACK_REPLY_TEXT, TECHNICAL_DIFFICULTIES_TEXT,
};
