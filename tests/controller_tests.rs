//! End-to-end tests of the capture controller with scripted collaborators.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use parla::capture::{
    AudioClip, AudioSource, BoundaryReason, CaptureController, ControllerConfig, SessionState,
};
use parla::error::{CaptureError, TranscriptionError};
use parla::recognizer::{RecognizerEvent, SpeechRecognizer};
use parla::transcribe::Transcriber;

/// Source that produces a clip with a configurable sample count.
struct FakeSource {
    available: bool,
    samples: usize,
    capturing: Rc<RefCell<bool>>,
    aborts: Rc<RefCell<usize>>,
}

impl FakeSource {
    fn new(samples: usize) -> Self {
        Self {
            available: true,
            samples,
            capturing: Rc::new(RefCell::new(false)),
            aborts: Rc::new(RefCell::new(0)),
        }
    }
}

#[async_trait(?Send)]
impl AudioSource for FakeSource {
    fn is_available(&self) -> bool {
        self.available
    }

    async fn start(&mut self) -> Result<(), CaptureError> {
        *self.capturing.borrow_mut() = true;
        Ok(())
    }

    async fn stop(&mut self) -> Result<AudioClip, CaptureError> {
        if !*self.capturing.borrow() {
            return Ok(AudioClip::empty());
        }
        *self.capturing.borrow_mut() = false;
        Ok(AudioClip::from_pcm(&vec![100i16; self.samples], 16_000))
    }

    fn abort(&mut self) {
        *self.capturing.borrow_mut() = false;
        *self.aborts.borrow_mut() += 1;
    }
}

/// Recognizer that replays a script of (delay, text) events.
struct ScriptedRecognizer {
    script: Vec<(Duration, String)>,
    fail_start: bool,
}

impl ScriptedRecognizer {
    fn speaking(script: Vec<(u64, &str)>) -> Self {
        Self {
            script: script
                .into_iter()
                .map(|(ms, text)| (Duration::from_millis(ms), text.to_string()))
                .collect(),
            fail_start: false,
        }
    }

    fn broken() -> Self {
        Self {
            script: vec![],
            fail_start: true,
        }
    }
}

#[async_trait]
impl SpeechRecognizer for ScriptedRecognizer {
    fn is_available(&self) -> bool {
        true
    }

    async fn start(&mut self) -> Result<mpsc::Receiver<RecognizerEvent>, CaptureError> {
        if self.fail_start {
            return Err(CaptureError::Recognizer("not allowed".to_string()));
        }
        let (tx, rx) = mpsc::channel(16);
        let script = self.script.clone();
        tokio::spawn(async move {
            for (delay, text) in script {
                tokio::time::sleep(delay).await;
                if tx.send(RecognizerEvent::Result { text }).await.is_err() {
                    return;
                }
            }
        });
        Ok(rx)
    }

    async fn stop(&mut self) {}

    fn abort(&mut self) {}
}

/// Transcriber that counts calls and returns a fixed transcript.
#[derive(Clone)]
struct CountingTranscriber {
    calls: Arc<AtomicUsize>,
}

impl CountingTranscriber {
    fn new() -> Self {
        Self {
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl Transcriber for CountingTranscriber {
    async fn transcribe(
        &self,
        _clip: &AudioClip,
        _language: &str,
    ) -> Result<String, TranscriptionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok("  hello world  ".to_string())
    }
}

fn config() -> ControllerConfig {
    ControllerConfig::default()
}

// 8000 samples make a 16044-byte WAV, above the 15000-byte gate.
const BIG: usize = 8000;
// 1000 samples make a 2044-byte WAV, below the gate.
const SMALL: usize = 1000;

#[tokio::test]
async fn large_clip_is_transcribed_and_trimmed() {
    let transcriber = CountingTranscriber::new();
    let mut controller = CaptureController::<_, ScriptedRecognizer, _>::new(
        FakeSource::new(BIG),
        transcriber.clone(),
        config(),
    );

    controller.start().await.unwrap();
    let text = controller.stop().await.unwrap();

    assert_eq!(text, "hello world");
    assert_eq!(transcriber.calls.load(Ordering::SeqCst), 1);
    assert_eq!(controller.state(), SessionState::Stopped);
    assert!(controller.audio_clip().is_some());
}

#[tokio::test]
async fn small_clip_skips_transcription() {
    let transcriber = CountingTranscriber::new();
    let mut controller = CaptureController::<_, ScriptedRecognizer, _>::new(
        FakeSource::new(SMALL),
        transcriber.clone(),
        config(),
    );

    controller.start().await.unwrap();
    let text = controller.stop().await.unwrap();

    assert_eq!(text, "");
    assert_eq!(transcriber.calls.load(Ordering::SeqCst), 0);
    // The clip is still retained even though it was not transcribed.
    assert!(controller.audio_clip().is_some());
}

#[tokio::test]
async fn starting_twice_is_rejected() {
    let mut controller = CaptureController::<_, ScriptedRecognizer, _>::new(
        FakeSource::new(BIG),
        CountingTranscriber::new(),
        config(),
    );

    controller.start().await.unwrap();
    let err = controller.start().await.unwrap_err();
    assert!(matches!(err, CaptureError::AlreadyRecording));

    // The original session is still usable.
    let text = controller.stop().await.unwrap();
    assert_eq!(text, "hello world");
}

#[tokio::test]
async fn stop_without_a_session_returns_empty_text() {
    let transcriber = CountingTranscriber::new();
    let mut controller = CaptureController::<_, ScriptedRecognizer, _>::new(
        FakeSource::new(BIG),
        transcriber.clone(),
        config(),
    );

    let text = controller.stop().await.unwrap();
    assert_eq!(text, "");
    assert_eq!(transcriber.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn unavailable_source_without_recognizer_is_unsupported() {
    let mut source = FakeSource::new(BIG);
    source.available = false;
    let mut controller = CaptureController::<_, ScriptedRecognizer, _>::new(
        source,
        CountingTranscriber::new(),
        config(),
    );

    let err = controller.start().await.unwrap_err();
    assert!(matches!(err, CaptureError::UnsupportedEnvironment));
}

#[tokio::test(start_paused = true)]
async fn boundary_fires_after_silence_follows_speech() {
    let mut controller = CaptureController::new(
        FakeSource::new(BIG),
        CountingTranscriber::new(),
        config(),
    )
    .with_recognizer(ScriptedRecognizer::speaking(vec![(100, "hello there")]));

    let armed_at = tokio::time::Instant::now();
    let boundary = controller.start().await.unwrap().unwrap();
    let reason = boundary.await.unwrap();
    let elapsed = armed_at.elapsed();

    assert_eq!(reason, BoundaryReason::Silence);
    // Speech at 100ms plus the 800ms silence threshold, observed on a
    // 200ms polling grid.
    assert!(elapsed >= Duration::from_millis(800), "fired at {elapsed:?}");
    assert!(elapsed <= Duration::from_millis(1500), "fired at {elapsed:?}");

    let text = controller.stop().await.unwrap();
    assert_eq!(text, "hello world");
}

#[tokio::test(start_paused = true)]
async fn continuous_speech_hits_the_session_ceiling() {
    // A result every 300ms keeps the silence timer from ever expiring.
    let script: Vec<(u64, &str)> = (0..60).map(|_| (300, "still talking")).collect();
    let mut controller = CaptureController::new(
        FakeSource::new(BIG),
        CountingTranscriber::new(),
        config(),
    )
    .with_recognizer(ScriptedRecognizer::speaking(script));

    let armed_at = tokio::time::Instant::now();
    let boundary = controller.start().await.unwrap().unwrap();
    let reason = boundary.await.unwrap();

    assert_eq!(reason, BoundaryReason::MaxSession);
    assert!(armed_at.elapsed() >= Duration::from_millis(15_000));
}

#[tokio::test(start_paused = true)]
async fn broken_recognizer_degrades_to_the_fallback_timer() {
    let mut controller = CaptureController::new(
        FakeSource::new(BIG),
        CountingTranscriber::new(),
        config(),
    )
    .with_recognizer(ScriptedRecognizer::broken());

    let armed_at = tokio::time::Instant::now();
    // Recognizer startup failure is not a session failure.
    let boundary = controller.start().await.unwrap().unwrap();
    assert_eq!(controller.state(), SessionState::Capturing);

    let reason = boundary.await.unwrap();
    assert_eq!(reason, BoundaryReason::Fallback);
    assert!(armed_at.elapsed() >= Duration::from_millis(10_000));
    assert!(armed_at.elapsed() < Duration::from_millis(15_000));
}

#[tokio::test]
async fn abort_discards_everything_and_allows_a_fresh_start() {
    let source = FakeSource::new(BIG);
    let aborts = source.aborts.clone();
    let mut controller = CaptureController::<_, ScriptedRecognizer, _>::new(
        source,
        CountingTranscriber::new(),
        config(),
    );

    controller.start().await.unwrap();
    controller.abort();

    assert_eq!(controller.state(), SessionState::Aborted);
    assert!(controller.audio_clip().is_none());
    assert!(controller.session().is_none());
    assert_eq!(*aborts.borrow(), 1);

    // A new session starts cleanly after the abort.
    controller.start().await.unwrap();
    let text = controller.stop().await.unwrap();
    assert_eq!(text, "hello world");
}
