//! OpenAI Whisper API transcriber.
//!
//! Uploads the finalized clip as multipart form data with bearer token
//! authentication. The clip is sent in its negotiated container format;
//! Whisper accepts webm/ogg/wav directly, so no local conversion pass is
//! needed.

use serde::Deserialize;

use super::Transcriber;
use crate::capture::AudioClip;
use crate::error::TranscriptionError;

const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/audio/transcriptions";
const MODEL: &str = "whisper-1";

/// Whisper API response wrapper.
#[derive(Debug, Deserialize)]
struct WhisperResponse {
    text: String,
}

pub struct WhisperTranscriber {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
}

impl WhisperTranscriber {
    pub fn new(api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            endpoint: DEFAULT_ENDPOINT.to_string(),
        }
    }

    /// Overrides the API endpoint; used to point at compatible proxies.
    pub fn with_endpoint(mut self, endpoint: String) -> Self {
        self.endpoint = endpoint;
        self
    }
}

#[async_trait::async_trait]
impl Transcriber for WhisperTranscriber {
    async fn transcribe(
        &self,
        clip: &AudioClip,
        language: &str,
    ) -> Result<String, TranscriptionError> {
        let file_name = format!("utterance.{}", clip.format().extension());
        let file_part = reqwest::multipart::Part::bytes(clip.bytes().to_vec())
            .file_name(file_name)
            .mime_str(clip.format().mime())
            .map_err(|e| TranscriptionError(format!("failed to build upload part: {e}")))?;

        // temperature 0 keeps the decode deterministic and fast.
        let form = reqwest::multipart::Form::new()
            .part("file", file_part)
            .text("model", MODEL)
            .text("language", language.to_string())
            .text("temperature", "0")
            .text("response_format", "json");

        tracing::debug!(
            "Whisper request: {} bytes ({}) as {}",
            clip.len(),
            clip.format().mime(),
            MODEL
        );

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                let message = if e.is_connect() {
                    "failed to connect to the transcription API; check your internet connection"
                        .to_string()
                } else if e.is_timeout() {
                    "transcription API timed out".to_string()
                } else {
                    format!("transcription network error: {e}")
                };
                TranscriptionError(message)
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            let message = match status.as_u16() {
                401 => "transcription API key is invalid or expired".to_string(),
                403 => "transcription API key lacks permission".to_string(),
                429 => "transcription API rate limit hit; wait and retry".to_string(),
                500..=504 => "transcription API is having server trouble".to_string(),
                _ => format!("transcription API error (status {status}): {body}"),
            };
            return Err(TranscriptionError(message));
        }

        let parsed: WhisperResponse = response
            .json()
            .await
            .map_err(|e| TranscriptionError(format!("malformed API response: {e}")))?;

        tracing::debug!("Whisper transcript: {} chars", parsed.text.len());
        Ok(parsed.text.trim().to_string())
    }
}
