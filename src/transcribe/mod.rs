//! High-accuracy transcription collaborator contract.
//!
//! The capture controller invokes this at most once per completed
//! session that passes the minimum-size gate. Implementations own their
//! network shapes; retries, if any, happen above the controller.

pub mod whisper;

pub use whisper::WhisperTranscriber;

use crate::capture::AudioClip;
use crate::error::TranscriptionError;

/// Turns a finalized audio clip into text.
#[async_trait::async_trait]
pub trait Transcriber {
    /// Transcribes `clip` with the given language hint (e.g. "en").
    async fn transcribe(&self, clip: &AudioClip, language: &str)
        -> Result<String, TranscriptionError>;
}
