//! End-of-utterance boundary detection.
//!
//! Decides when the speaker has stopped talking by layering two
//! independent signals on top of an unreliable low-latency recognizer:
//!
//! 1. Recognizer-driven silence: every non-trivial recognition result
//!    refreshes the last-speech timestamp; a poll loop fires once the
//!    quiet span reaches the silence threshold.
//! 2. A session ceiling that bounds worst-case utterance length even if
//!    the recognizer never reports anything.
//!
//! If the recognizer could not start at all, the detector runs in
//! fallback mode: no speech signal exists to measure silence against, so
//! only a shorter fixed ceiling applies. In every mode the boundary fires
//! exactly once per armed session.

use std::time::{Duration, Instant};

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::recognizer::RecognizerEvent;

/// Recognition results shorter than this (trimmed) are background-noise
/// misfires, not speech, and do not refresh the silence timer.
const MIN_SIGNAL_CHARS: usize = 2;

/// Timing thresholds for boundary detection.
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Quiet span after the last speech signal before the boundary fires.
    /// 800 ms in production, down from an initial 1500 ms to cut
    /// perceived latency.
    pub silence_threshold_ms: u64,
    /// Hard ceiling on total session length.
    pub max_session_ms: u64,
    /// Cadence of the silence/ceiling checks.
    pub poll_interval_ms: u64,
    /// Ceiling used when the recognizer never started; shorter than
    /// `max_session_ms` so a signal-less session still settles promptly.
    pub fallback_ms: u64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            silence_threshold_ms: 800,
            max_session_ms: 15_000,
            poll_interval_ms: 200,
            fallback_ms: 10_000,
        }
    }
}

impl DetectorConfig {
    pub fn silence_threshold(&self) -> Duration {
        Duration::from_millis(self.silence_threshold_ms)
    }

    pub fn max_session(&self) -> Duration {
        Duration::from_millis(self.max_session_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn fallback(&self) -> Duration {
        Duration::from_millis(self.fallback_ms)
    }
}

/// Which condition ended the utterance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryReason {
    /// The silence threshold elapsed after the last speech signal.
    Silence,
    /// The session ceiling was reached.
    MaxSession,
    /// The fallback ceiling fired because the recognizer never started.
    Fallback,
}

/// The detector state machine: Armed until the boundary fires, then
/// Triggered for the rest of the session. A new session arms a fresh
/// instance; there is no in-place reset.
#[derive(Debug)]
pub struct DetectorState {
    armed_at: Instant,
    last_speech_at: Instant,
    fallback_only: bool,
    triggered: bool,
}

impl DetectorState {
    /// Arms the detector. `fallback_only` marks a session whose
    /// recognizer failed to start.
    pub fn arm(now: Instant, fallback_only: bool) -> Self {
        Self {
            armed_at: now,
            last_speech_at: now,
            fallback_only,
            triggered: false,
        }
    }

    /// Feeds one recognition result. Trimmed results shorter than two
    /// characters are treated as noise and ignored.
    pub fn observe_result(&mut self, text: &str, now: Instant) {
        let trimmed = text.trim();
        if trimmed.chars().count() >= MIN_SIGNAL_CHARS {
            self.last_speech_at = now;
        } else if !trimmed.is_empty() {
            tracing::debug!("Ignoring short recognizer noise: {:?}", trimmed);
        }
    }

    /// One poll tick. Returns the boundary reason the first time a stop
    /// condition holds; afterwards always `None`, even if both the
    /// silence and ceiling conditions became true in the same tick.
    pub fn poll(&mut self, now: Instant, cfg: &DetectorConfig) -> Option<BoundaryReason> {
        if self.triggered {
            return None;
        }

        let session = now.duration_since(self.armed_at);

        if self.fallback_only {
            if session >= cfg.fallback() {
                self.triggered = true;
                return Some(BoundaryReason::Fallback);
            }
            return None;
        }

        if session >= cfg.max_session() {
            self.triggered = true;
            return Some(BoundaryReason::MaxSession);
        }

        if now.duration_since(self.last_speech_at) >= cfg.silence_threshold() {
            self.triggered = true;
            return Some(BoundaryReason::Silence);
        }

        None
    }

    pub fn has_triggered(&self) -> bool {
        self.triggered
    }
}

/// Handle to a running detector task. Cancelling it stops the poll loop
/// without firing.
pub struct BoundaryTask {
    handle: JoinHandle<()>,
}

impl BoundaryTask {
    /// Cancels the poll loop immediately. Safe to call after the boundary
    /// has fired (the task has already exited).
    pub fn cancel(self) {
        self.handle.abort();
    }
}

/// Spawns the boundary poll loop for one session.
///
/// `events` carries the low-latency recognizer's results; `None` arms the
/// detector in fallback mode. The boundary reason is sent on `fired`
/// exactly once and the task exits. Recognizer errors are logged and
/// swallowed; a closed event channel degrades to polling only, it does
/// not end the session.
pub fn spawn_boundary_watch(
    cfg: DetectorConfig,
    events: Option<mpsc::Receiver<RecognizerEvent>>,
    fired: oneshot::Sender<BoundaryReason>,
) -> BoundaryTask {
    let handle = tokio::spawn(run_detector(cfg, events, fired));
    BoundaryTask { handle }
}

/// Current time on the clock that also drives the poll interval. The
/// loop must not mix clocks: under tokio's paused test clock the runtime
/// clock advances while the std clock stands still.
fn loop_now() -> Instant {
    tokio::time::Instant::now().into_std()
}

async fn run_detector(
    cfg: DetectorConfig,
    mut events: Option<mpsc::Receiver<RecognizerEvent>>,
    fired: oneshot::Sender<BoundaryReason>,
) {
    let mut state = DetectorState::arm(loop_now(), events.is_none());
    let mut ticker = tokio::time::interval(cfg.poll_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick of a tokio interval completes immediately; consume
    // it so polling starts one interval after arming.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Some(reason) = state.poll(loop_now(), &cfg) {
                    tracing::debug!("Utterance boundary: {:?}", reason);
                    // The receiver may already be gone if the caller
                    // stopped manually; nothing to do then.
                    let _ = fired.send(reason);
                    return;
                }
            }
            event = recv_event(&mut events) => {
                match event {
                    Some(RecognizerEvent::Result { text }) => {
                        state.observe_result(&text, loop_now());
                    }
                    Some(RecognizerEvent::Error { message }) => {
                        // Recognizer trouble must never end the session;
                        // audio capture continues independently.
                        tracing::warn!("Recognizer error (ignored): {}", message);
                    }
                    None => {
                        tracing::debug!("Recognizer event channel closed; polling only");
                        events = None;
                    }
                }
            }
        }
    }
}

/// Receives the next recognizer event, or parks forever once the channel
/// is gone so the select loop falls back to pure polling.
async fn recv_event(
    events: &mut Option<mpsc::Receiver<RecognizerEvent>>,
) -> Option<RecognizerEvent> {
    match events {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> DetectorConfig {
        DetectorConfig::default()
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn fires_silence_after_threshold_with_no_speech() {
        let start = Instant::now();
        let mut state = DetectorState::arm(start, false);

        assert_eq!(state.poll(start + ms(600), &cfg()), None);
        assert_eq!(
            state.poll(start + ms(800), &cfg()),
            Some(BoundaryReason::Silence)
        );
    }

    #[test]
    fn speech_signal_defers_the_silence_boundary() {
        let start = Instant::now();
        let mut state = DetectorState::arm(start, false);

        state.observe_result("hello", start + ms(700));
        assert_eq!(state.poll(start + ms(1000), &cfg()), None);
        assert_eq!(
            state.poll(start + ms(1500), &cfg()),
            Some(BoundaryReason::Silence)
        );
    }

    #[test]
    fn short_noise_does_not_refresh_the_timer() {
        let start = Instant::now();
        let mut state = DetectorState::arm(start, false);

        // One trimmed character is noise; " a " and "." must not delay
        // the boundary.
        state.observe_result(" a ", start + ms(700));
        state.observe_result(".", start + ms(750));
        assert_eq!(
            state.poll(start + ms(800), &cfg()),
            Some(BoundaryReason::Silence)
        );
    }

    #[test]
    fn two_chars_counts_as_speech() {
        let start = Instant::now();
        let mut state = DetectorState::arm(start, false);

        state.observe_result("hi", start + ms(700));
        assert_eq!(state.poll(start + ms(800), &cfg()), None);
    }

    #[test]
    fn ceiling_fires_even_with_continuous_speech() {
        let start = Instant::now();
        let mut state = DetectorState::arm(start, false);

        for i in 1..=37 {
            state.observe_result("still talking", start + ms(i * 400));
        }
        assert_eq!(
            state.poll(start + ms(15_000), &cfg()),
            Some(BoundaryReason::MaxSession)
        );
    }

    #[test]
    fn fires_exactly_once_when_both_conditions_hold() {
        let start = Instant::now();
        let mut state = DetectorState::arm(start, false);

        // Way past both the silence threshold and the ceiling.
        let first = state.poll(start + ms(20_000), &cfg());
        assert!(first.is_some());
        assert!(state.has_triggered());
        assert_eq!(state.poll(start + ms(20_200), &cfg()), None);
        assert_eq!(state.poll(start + ms(40_000), &cfg()), None);
    }

    #[test]
    fn fallback_mode_ignores_silence_and_fires_at_fallback_ceiling() {
        let start = Instant::now();
        let mut state = DetectorState::arm(start, true);

        // No recognizer means no silence signal; only the fallback
        // ceiling applies.
        assert_eq!(state.poll(start + ms(800), &cfg()), None);
        assert_eq!(state.poll(start + ms(9_800), &cfg()), None);
        assert_eq!(
            state.poll(start + ms(10_000), &cfg()),
            Some(BoundaryReason::Fallback)
        );
    }

    #[test]
    fn configured_thresholds_are_honored() {
        let custom = DetectorConfig {
            silence_threshold_ms: 1500,
            ..DetectorConfig::default()
        };
        let start = Instant::now();
        let mut state = DetectorState::arm(start, false);

        assert_eq!(state.poll(start + ms(1400), &custom), None);
        assert_eq!(
            state.poll(start + ms(1500), &custom),
            Some(BoundaryReason::Silence)
        );
    }

    // The loop below runs against the runtime clock, so it must behave
    // under a paused runtime clock too; polling against any other clock
    // would stall or race here.

    #[tokio::test(start_paused = true)]
    async fn loop_fires_silence_on_the_runtime_clock() {
        let started = tokio::time::Instant::now();
        let (_tx, rx) = mpsc::channel(4);
        let (fired_tx, fired_rx) = oneshot::channel();

        spawn_boundary_watch(cfg(), Some(rx), fired_tx);

        let reason = fired_rx.await.expect("boundary should fire");
        assert_eq!(reason, BoundaryReason::Silence);
        let elapsed = started.elapsed();
        assert!(elapsed >= ms(800), "fired at {elapsed:?}");
        assert!(elapsed <= ms(1200), "fired at {elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn loop_observes_events_on_the_runtime_clock() {
        let started = tokio::time::Instant::now();
        let (tx, rx) = mpsc::channel(4);
        let (fired_tx, fired_rx) = oneshot::channel();

        spawn_boundary_watch(cfg(), Some(rx), fired_tx);

        tokio::time::sleep(ms(500)).await;
        tx.send(RecognizerEvent::Result {
            text: "hello".to_string(),
        })
        .await
        .expect("detector should still be listening");

        let reason = fired_rx.await.expect("boundary should fire");
        assert_eq!(reason, BoundaryReason::Silence);
        let elapsed = started.elapsed();
        // Speech at 500 ms defers the boundary to ~1300 ms.
        assert!(elapsed >= ms(1300), "fired at {elapsed:?}");
        assert!(elapsed <= ms(1700), "fired at {elapsed:?}");
    }
}
