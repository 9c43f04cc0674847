use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use switchboard_core::SwitchboardResult;
use switchboard_session::TranscriptSource;

/// A call status callback from the telephony provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallStatusUpdate {
    pub call_id: String,
    pub status: String,
    #[serde(default)]
    pub duration_secs: Option<u32>,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
}

impl CallStatusUpdate {
    /// Whether the call is over.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.status.as_str(),
            "completed" | "busy" | "failed" | "no-answer" | "canceled"
        )
    }

    /// Conversation status as stored by the record sink.
    pub fn record_status(&self) -> &str {
        if self.status == "completed" {
            "ended"
        } else {
            &self.status
        }
    }
}

/// Where conversation records live (an external relational store in
/// production).
#[async_trait]
pub trait ConversationRecordSink: Send + Sync {
    /// Store an improved transcript for the latest turn of a call.
    async fn record_transcript(
        &self,
        call_id: &str,
        transcript: &str,
        source: TranscriptSource,
    ) -> SwitchboardResult<()>;

    async fn record_call_status(&self, update: &CallStatusUpdate) -> SwitchboardResult<()>;
}

/// Sink that only logs; used when no record store is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingRecordSink;

#[async_trait]
impl ConversationRecordSink for LoggingRecordSink {
    async fn record_transcript(
        &self,
        call_id: &str,
        transcript: &str,
        source: TranscriptSource,
    ) -> SwitchboardResult<()> {
        tracing::info!(
            call_id,
            chars = transcript.chars().count(),
            source = ?source,
            "Transcript recorded"
        );
        Ok(())
    }

    async fn record_call_status(&self, update: &CallStatusUpdate) -> SwitchboardResult<()> {
        tracing::info!(
            call_id = %update.call_id,
            status = update.record_status(),
            duration_secs = update.duration_secs,
            "Call status recorded"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(status: &str) -> CallStatusUpdate {
        CallStatusUpdate {
            call_id: "CA1".into(),
            status: status.into(),
            duration_secs: Some(42),
            from: None,
            to: None,
        }
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(update("completed").is_terminal());
        assert!(update("busy").is_terminal());
        assert!(!update("in-progress").is_terminal());
        assert!(!update("ringing").is_terminal());
    }

    #[test]
    fn test_record_status_mapping() {
        assert_eq!(update("completed").record_status(), "ended");
        assert_eq!(update("no-answer").record_status(), "no-answer");
    }
}
