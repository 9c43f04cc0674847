//! Voice IVR for telephony calls.
//!
//! [`IvrEngine`] drives one call turn at a time through capture,
//! transcription fallback, dialogue, synthesis and continuation, answering
//! each provider webhook with TwiML. Recordings of finished calls are
//! re-transcribed out of band by the [`RecordingWorker`].

/// IVR prompts, endpoints and budgets.
pub mod config;
/// The turn-taking state machine.
pub mod ivr;
/// Conversation-record sink and call status updates.
pub mod records;
/// Background re-transcription of call recordings.
pub mod recording;

pub use config::IvrConfig;
pub use ivr::{CallState, GatherInput, IvrEngine, VoiceTurn};
pub use recording::{log_failures, RecordingFailure, RecordingJob, RecordingWorker};
pub use records::{CallStatusUpdate, ConversationRecordSink, LoggingRecordSink};
