//! Energy-threshold recognizer for headless use.
//!
//! Watches the live microphone level and emits a synthetic result marker
//! whenever the signal sits above a dBFS threshold. The marker's text is
//! meaningless; downstream consumers key on event timing only, which is
//! all the boundary detector requires of a recognizer.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::{RecognizerEvent, SpeechRecognizer};
use crate::capture::mic::LiveLevel;
use crate::error::CaptureError;

/// Emitted as the result text while speech energy is present. Two
/// characters or more so the detector's noise gate accepts it.
const SPEECH_MARKER: &str = "[voice]";

/// Recognizer driven purely by input level.
pub struct EnergyRecognizer {
    level: LiveLevel,
    threshold_db: f32,
    poll: Duration,
    task: Option<JoinHandle<()>>,
}

impl EnergyRecognizer {
    /// `level` must be the handle updated by the active microphone
    /// source; `threshold_db` is the speech floor in dBFS (-50 is a
    /// reasonable default for close-mic speech).
    pub fn new(level: LiveLevel, threshold_db: f32) -> Self {
        Self {
            level,
            threshold_db,
            poll: Duration::from_millis(100),
            task: None,
        }
    }
}

#[async_trait::async_trait]
impl SpeechRecognizer for EnergyRecognizer {
    fn is_available(&self) -> bool {
        true
    }

    async fn start(&mut self) -> Result<mpsc::Receiver<RecognizerEvent>, CaptureError> {
        if self.task.is_some() {
            return Err(CaptureError::Recognizer(
                "energy recognizer already running".to_string(),
            ));
        }

        let (tx, rx) = mpsc::channel(32);
        let level = self.level.clone();
        let threshold = self.threshold_db;
        let poll = self.poll;

        self.task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(poll);
            loop {
                ticker.tick().await;
                if level.db() >= threshold {
                    let event = RecognizerEvent::Result {
                        text: SPEECH_MARKER.to_string(),
                    };
                    if tx.send(event).await.is_err() {
                        // Receiver detached; the session is over.
                        return;
                    }
                }
            }
        }));

        tracing::debug!("Energy recognizer started (threshold {} dBFS)", threshold);
        Ok(rx)
    }

    async fn stop(&mut self) {
        self.abort();
    }

    fn abort(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
