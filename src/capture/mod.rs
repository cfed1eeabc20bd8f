//! Hybrid speech capture: audio source, boundary detection, controller.
//!
//! Raw audio is captured independently of the low-latency recognizer so
//! that an unreliable recognizer can only affect *when* a session ends,
//! never *what* was recorded.

pub mod clip;
pub mod controller;
pub mod detector;
pub mod mic;

pub use clip::{AudioClip, ClipFormat};
pub use controller::{CaptureController, ControllerConfig, RecordingSession, SessionState};
pub use detector::{BoundaryReason, DetectorConfig, DetectorState};
pub use mic::{AudioSource, LiveLevel, MicrophoneSource};
