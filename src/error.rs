//! Typed errors for the capture and assessment subsystems.
//!
//! Errors that make a returned result meaningless (no device, failed
//! transcription) carry their own variants and propagate to the caller.
//! Recoverable conditions (recognizer hiccups, scoring failures) are
//! logged where they occur and never interrupt the conversation loop.

/// Errors surfaced by [`crate::capture::CaptureController`] and its
/// audio source.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    /// No microphone is present or permission to open it was denied.
    #[error("audio input device unavailable: {0}")]
    DeviceUnavailable(String),

    /// `start()` was called while a session is already capturing.
    #[error("recording already in progress")]
    AlreadyRecording,

    /// Neither audio capture nor speech recognition is available here.
    #[error("no supported capture mechanism in this environment")]
    UnsupportedEnvironment,

    /// The low-latency recognizer failed. Only returned from recognizer
    /// implementations; the controller downgrades this to a warning.
    #[error("speech recognizer error: {0}")]
    Recognizer(String),

    /// The high-accuracy transcription collaborator failed.
    #[error(transparent)]
    Transcription(#[from] TranscriptionError),
}

/// Failure of the external transcription call. The controller does not
/// retry; whether to re-record the utterance is the caller's decision.
#[derive(Debug, thiserror::Error)]
#[error("transcription failed: {0}")]
pub struct TranscriptionError(pub String);

/// Failure of the external pronunciation-scoring call. Always recovered
/// locally: assessment feedback is supplementary, not core.
#[derive(Debug, thiserror::Error)]
#[error("pronunciation assessment failed: {0}")]
pub struct AssessmentError(pub String);
