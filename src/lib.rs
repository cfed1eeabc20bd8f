//! parla core: hybrid speech capture and adaptive pronunciation
//! assessment for English conversation practice.
//!
//! Two subsystems carry the weight:
//!
//! - [`capture`]: records raw audio on one path while a cheap, unreliable
//!   recognizer on a second path decides when the speaker is done. The
//!   recognizer can degrade or fail without affecting the recording.
//! - [`assessment`]: a rule chain that samples utterances for cloud
//!   pronunciation scoring, trading feedback frequency against API cost.

pub mod app;
pub mod assessment;
pub mod capture;
pub mod commands;
pub mod config;
pub mod error;
pub mod logging;
pub mod recognizer;
pub mod transcribe;
