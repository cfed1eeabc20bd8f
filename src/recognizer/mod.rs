//! Low-latency speech recognizer contract.
//!
//! The boundary detector only needs result events that arrive roughly in
//! sync with speech; recognition accuracy is irrelevant to it. Events
//! flow over an mpsc channel handed out by `start()`, matching the
//! single-registration semantics of the capture pipeline: one receiver,
//! detached automatically when the session stops or aborts.

pub mod energy;

pub use energy::EnergyRecognizer;

use tokio::sync::mpsc;

use crate::error::CaptureError;

/// One event from the low-latency recognizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognizerEvent {
    /// A partial or final recognition result.
    Result { text: String },
    /// A recognizer-internal error. Consumers log and continue; these
    /// are never fatal to a capture session.
    Error { message: String },
}

/// A low-latency, possibly unreliable speech recognizer.
#[async_trait::async_trait]
pub trait SpeechRecognizer: Send {
    /// Whether this recognizer can run in the current environment.
    fn is_available(&self) -> bool;

    /// Starts recognition and returns the event stream for this session.
    async fn start(&mut self) -> Result<mpsc::Receiver<RecognizerEvent>, CaptureError>;

    /// Stops recognition, dropping the event sender so the stream ends.
    async fn stop(&mut self);

    /// Tears recognition down immediately; used for error unwinding.
    fn abort(&mut self);
}
