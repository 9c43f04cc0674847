//! Process-wide conversation state for the Switchboard gateway.
//!
//! Sessions are keyed by channel-anchored ids (`telegram_<chat>`,
//! `whatsapp_<phone>`, `twilio_<call>`) or generated UUIDs for the web
//! surfaces, and are reclaimed by a periodic TTL sweep.

/// Session, turn and metadata types.
pub mod session;
/// The [`SessionStore`] trait and its in-memory implementation.
pub mod store;
/// Background TTL sweep task.
pub mod sweeper;

pub use session::{Session, SessionMetadata, TranscriptSource, Turn, VoiceCallContext};
pub use store::{ExpiryPolicy, InMemorySessionStore, MetadataUpdate, SessionStore};
pub use sweeper::spawn_sweeper;
