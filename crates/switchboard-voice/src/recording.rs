use crate::records::ConversationRecordSink;
use std::sync::Arc;
use switchboard_core::{SwitchboardError, SwitchboardResult, DEFAULT_LANGUAGE};
use switchboard_security::redact;
use switchboard_session::TranscriptSource;
use switchboard_speech::SpeechService;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// A finished call recording awaiting re-transcription.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingJob {
    pub call_id: String,
    pub recording_url: String,
    pub recording_sid: Option<String>,
}

/// A job that could not be completed.
#[derive(Debug)]
pub struct RecordingFailure {
    pub job: RecordingJob,
    pub error: SwitchboardError,
}

/// Re-transcribes completed call recordings off the request path.
///
/// Jobs go through a bounded queue; the improved transcript is written to the
/// record sink and failures are reported on the worker's error channel.
pub struct RecordingWorker {
    tx: mpsc::Sender<RecordingJob>,
}

impl RecordingWorker {
    /// Spawn the worker. Returns its handle, the receiving end of its error
    /// channel and the worker task.
    pub fn spawn(
        speech: Arc<dyn SpeechService>,
        records: Arc<dyn ConversationRecordSink>,
        capacity: usize,
    ) -> (Self, mpsc::UnboundedReceiver<RecordingFailure>, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<RecordingJob>(capacity.max(1));
        let (err_tx, err_rx) = mpsc::unbounded_channel();

        let handle = tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                if let Err(error) = process(speech.as_ref(), records.as_ref(), &job).await {
                    let _ = err_tx.send(RecordingFailure { job, error });
                }
            }
        });

        (Self { tx }, err_rx, handle)
    }

    /// Queue a recording. Fails without blocking when the queue is full.
    pub fn submit(&self, job: RecordingJob) -> SwitchboardResult<()> {
        self.tx.try_send(job).map_err(|e| {
            let reason = match e {
                mpsc::error::TrySendError::Full(_) => "queue is full",
                mpsc::error::TrySendError::Closed(_) => "worker has stopped",
            };
            SwitchboardError::UpstreamUnavailable(format!("Recording worker {reason}"))
        })
    }
}

async fn process(
    speech: &dyn SpeechService,
    records: &dyn ConversationRecordSink,
    job: &RecordingJob,
) -> SwitchboardResult<()> {
    let transcript = speech
        .speech_to_text(&job.recording_url, DEFAULT_LANGUAGE)
        .await?;
    if transcript.is_empty() {
        tracing::debug!(call_id = %job.call_id, "Recording produced no transcript");
        return Ok(());
    }
    records
        .record_transcript(&job.call_id, &transcript, TranscriptSource::SpeechAdapterFallback)
        .await?;
    tracing::debug!(call_id = %job.call_id, "Recording transcription stored");
    Ok(())
}

/// Drain a worker's error channel into the log.
pub fn log_failures(mut failures: mpsc::UnboundedReceiver<RecordingFailure>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(failure) = failures.recv().await {
            tracing::error!(
                call_id = %failure.job.call_id,
                recording_sid = failure.job.recording_sid.as_deref().unwrap_or("-"),
                error = %redact(&failure.error.to_string()),
                "Recording transcription failed"
            );
        }
    })
}
