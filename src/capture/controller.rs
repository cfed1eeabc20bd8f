//! Hybrid capture controller.
//!
//! Runs one recording session at a time: raw audio capture and the
//! low-latency recognizer start together, recognizer events feed the
//! boundary detector, and when the boundary fires (or the caller stops
//! manually) both channels shut down and the finalized clip goes to the
//! high-accuracy transcriber, unless it is too small to be worth the
//! call.
//!
//! Degradation is deliberate: a recognizer that fails to start leaves
//! audio capture running with the detector in fallback mode, so the
//! session always settles within a bounded time.

use chrono::{DateTime, Utc};
use tokio::sync::oneshot;
use uuid::Uuid;

use super::clip::AudioClip;
use super::detector::{spawn_boundary_watch, BoundaryReason, BoundaryTask, DetectorConfig};
use super::mic::AudioSource;
use crate::error::CaptureError;
use crate::recognizer::SpeechRecognizer;
use crate::transcribe::Transcriber;

/// Controller tuning.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub detector: DetectorConfig,
    /// Clips smaller than this are ambient-noise captures; transcription
    /// is skipped entirely and the session yields an empty transcript.
    pub min_clip_bytes: usize,
    /// Language hint forwarded to the transcriber.
    pub language: String,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            detector: DetectorConfig::default(),
            min_clip_bytes: 15_000,
            language: "en".to_string(),
        }
    }
}

/// Lifecycle of the controller's current (or most recent) session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Capturing,
    Stopping,
    Stopped,
    Aborted,
}

/// One microphone-open period.
#[derive(Debug, Clone)]
pub struct RecordingSession {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
}

impl RecordingSession {
    fn begin() -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
        }
    }
}

/// Composes an audio source, an optional low-latency recognizer, and the
/// boundary detector. Not `Send` (the microphone stream is thread-bound);
/// lives on the task that created it.
pub struct CaptureController<S, R, T>
where
    S: AudioSource,
    R: SpeechRecognizer,
    T: Transcriber,
{
    source: S,
    recognizer: Option<R>,
    transcriber: T,
    cfg: ControllerConfig,
    state: SessionState,
    session: Option<RecordingSession>,
    detector: Option<BoundaryTask>,
    last_clip: Option<AudioClip>,
}

impl<S, R, T> CaptureController<S, R, T>
where
    S: AudioSource,
    R: SpeechRecognizer,
    T: Transcriber,
{
    pub fn new(source: S, transcriber: T, cfg: ControllerConfig) -> Self {
        Self {
            source,
            recognizer: None,
            transcriber,
            cfg,
            state: SessionState::Idle,
            session: None,
            detector: None,
            last_clip: None,
        }
    }

    /// Attaches a low-latency recognizer, which also arms automatic
    /// boundary detection for every session.
    pub fn with_recognizer(mut self, recognizer: R) -> Self {
        self.recognizer = Some(recognizer);
        self
    }

    /// Begins a session. With a recognizer attached, returns the
    /// boundary channel: it yields the [`BoundaryReason`] exactly once
    /// when the detector decides the utterance ended, after which the
    /// caller invokes [`stop`](Self::stop). Without a recognizer the
    /// caller stops manually and `None` is returned.
    pub async fn start(&mut self) -> Result<Option<oneshot::Receiver<BoundaryReason>>, CaptureError> {
        if matches!(self.state, SessionState::Capturing | SessionState::Stopping) {
            return Err(CaptureError::AlreadyRecording);
        }

        let recognizer_available = self
            .recognizer
            .as_ref()
            .map(|r| r.is_available())
            .unwrap_or(false);
        if !self.source.is_available() && !recognizer_available {
            return Err(CaptureError::UnsupportedEnvironment);
        }

        self.source.start().await?;
        let session = RecordingSession::begin();
        tracing::info!("Recording session {} started", session.id);
        self.session = Some(session);
        self.last_clip = None;

        let boundary = if let Some(recognizer) = self.recognizer.as_mut() {
            // Recognizer startup trouble is non-fatal: capture is
            // already running and the fallback ceiling guarantees the
            // session settles.
            let events = match recognizer.start().await {
                Ok(events) => Some(events),
                Err(e) => {
                    tracing::warn!("Recognizer failed to start, using fallback timer: {}", e);
                    None
                }
            };
            let (fired_tx, fired_rx) = oneshot::channel();
            self.detector = Some(spawn_boundary_watch(self.cfg.detector, events, fired_tx));
            Some(fired_rx)
        } else {
            None
        };

        self.state = SessionState::Capturing;
        Ok(boundary)
    }

    /// Ends the session and returns the transcript.
    ///
    /// The detector loop is cancelled first so no stray boundary can
    /// fire into a disposed session; then the recognizer and audio
    /// source shut down. Clips under the size gate short-circuit to an
    /// empty transcript with no transcription call. Transcription
    /// failures propagate; the session is already released by then, so
    /// the caller may simply start a new one.
    pub async fn stop(&mut self) -> Result<String, CaptureError> {
        if self.state != SessionState::Capturing {
            tracing::warn!("stop() called with no active session");
            return Ok(String::new());
        }
        self.state = SessionState::Stopping;

        if let Some(task) = self.detector.take() {
            task.cancel();
        }
        if let Some(recognizer) = self.recognizer.as_mut() {
            recognizer.stop().await;
        }

        let clip = match self.source.stop().await {
            Ok(clip) => clip,
            Err(e) => {
                self.teardown(SessionState::Aborted);
                return Err(e);
            }
        };
        self.state = SessionState::Stopped;

        if clip.len() < self.cfg.min_clip_bytes {
            tracing::info!(
                "Clip too small ({} < {} bytes), skipping transcription",
                clip.len(),
                self.cfg.min_clip_bytes
            );
            self.last_clip = Some(clip);
            return Ok(String::new());
        }

        let text = self.transcriber.transcribe(&clip, &self.cfg.language).await;
        self.last_clip = Some(clip);
        Ok(text?.trim().to_string())
    }

    /// Hard cancellation: tears down both capture channels and discards
    /// buffered state. Safe in any state; no text is produced.
    pub fn abort(&mut self) {
        self.teardown(SessionState::Aborted);
        tracing::info!("Recording session aborted");
    }

    /// The most recently finalized clip, for the pronunciation-
    /// assessment collaborator. `None` until a session has stopped, or
    /// after an abort.
    pub fn audio_clip(&self) -> Option<&AudioClip> {
        self.last_clip.as_ref().filter(|clip| !clip.is_empty())
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn session(&self) -> Option<&RecordingSession> {
        self.session.as_ref()
    }

    fn teardown(&mut self, end_state: SessionState) {
        if let Some(task) = self.detector.take() {
            task.cancel();
        }
        if let Some(recognizer) = self.recognizer.as_mut() {
            recognizer.abort();
        }
        self.source.abort();
        self.last_clip = None;
        self.session = None;
        self.state = end_state;
    }
}
