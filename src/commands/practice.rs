//! Interactive conversation practice session.
//!
//! Each turn records one utterance from the microphone, waits for the
//! boundary detector to decide the speaker is done, transcribes the
//! clip, and sometimes runs a pronunciation assessment on it. The
//! session runs until the user quits, then prints the assessment
//! statistics.

use std::io::Write;

use anyhow::anyhow;

use crate::assessment::{Assessor, AzureScorer, SamplingPolicy};
use crate::capture::{
    BoundaryReason, CaptureController, ControllerConfig, MicrophoneSource, SessionState,
};
use crate::config::ParlaConfig;
use crate::recognizer::EnergyRecognizer;
use crate::transcribe::WhisperTranscriber;

/// Whisper does not report per-utterance confidence; its transcripts are
/// treated as high-confidence so the low-confidence assessment rule only
/// fires for genuinely broken recognitions.
const WHISPER_CONFIDENCE: f64 = 0.95;

/// Energy level above which the recognizer reports speech activity.
const SPEECH_THRESHOLD_DB: f32 = -50.0;

/// Runs the practice loop until the user quits.
///
/// # Errors
/// - If no OpenAI API key is configured
/// - If the controller cannot start a session
pub async fn handle_practice(config: ParlaConfig) -> anyhow::Result<()> {
    let api_key = config.openai_api_key().ok_or_else(|| {
        anyhow!(
            "No OpenAI API key configured. Set OPENAI_API_KEY or add it to {}",
            crate::config::get_config_path()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|_| "the config file".to_string())
        )
    })?;

    let source = MicrophoneSource::new(config.audio.device.clone(), config.audio.sample_rate);
    let recognizer = EnergyRecognizer::new(source.level_handle(), SPEECH_THRESHOLD_DB);
    let transcriber = WhisperTranscriber::new(api_key);
    let controller_cfg = ControllerConfig {
        detector: config.detector,
        ..ControllerConfig::default()
    };
    let mut controller =
        CaptureController::new(source, transcriber, controller_cfg).with_recognizer(recognizer);

    let policy = SamplingPolicy::new(config.assessment.policy.clone(), config.user_level());
    let mut assessor = match config.azure_credentials() {
        Some((key, region)) => Some(Assessor::new(policy, AzureScorer::new(key, region))),
        None => {
            println!("Note: no Azure Speech credentials found, pronunciation feedback is off.");
            println!("Set AZURE_SPEECH_KEY and AZURE_SPEECH_REGION to enable it.");
            None
        }
    };

    println!();
    println!("parla: English conversation practice");
    println!("Press Enter to speak, or type 'q' to quit.");
    println!();

    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let line = read_line().await?;
        match line.trim() {
            "q" | "quit" | "exit" => break,
            "" => {}
            other => {
                println!("Unknown input '{other}'. Press Enter to speak, 'q' to quit.");
                continue;
            }
        }

        if let Err(e) = run_turn(&mut controller, &mut assessor).await {
            tracing::error!("Practice turn failed: {e}");
            eprintln!("Something went wrong: {e}");
            if controller.state() == SessionState::Capturing {
                controller.abort();
            }
        }
    }

    if let Some(assessor) = &assessor {
        let stats = assessor.policy().stats();
        println!();
        println!(
            "Session: {} utterances, {} assessed ({:.0}%), estimated cost ${:.3}",
            stats.total_messages,
            stats.assessment_count,
            stats.assessment_rate * 100.0,
            stats.estimated_cost
        );
    }
    println!("Goodbye!");

    Ok(())
}

async fn run_turn(
    controller: &mut CaptureController<MicrophoneSource, EnergyRecognizer, WhisperTranscriber>,
    assessor: &mut Option<Assessor<AzureScorer>>,
) -> anyhow::Result<()> {
    let boundary = controller.start().await?;

    println!("Listening... (finishes automatically when you stop talking)");
    if let Some(rx) = boundary {
        match rx.await {
            Ok(BoundaryReason::Silence) => {}
            Ok(BoundaryReason::MaxSession) => println!("(reached the session length limit)"),
            Ok(BoundaryReason::Fallback) => println!("(speech detection unavailable, used timer)"),
            // Sender dropped without firing; stop() below still works.
            Err(_) => tracing::debug!("Boundary channel closed without a verdict"),
        }
    }

    let text = controller.stop().await?;
    if text.is_empty() {
        println!("Didn't catch that. Try speaking a bit longer.");
        return Ok(());
    }
    println!("You said: {text}");

    if let Some(assessor) = assessor {
        if let Some(report) = assessor
            .maybe_assess(&text, WHISPER_CONFIDENCE, controller.audio_clip())
            .await
        {
            println!(
                "Pronunciation {:.0} | accuracy {:.0} | fluency {:.0} | completeness {:.0}",
                report.pronunciation, report.accuracy, report.fluency, report.completeness
            );
            if report.should_correct() {
                if let Some(feedback) = report.feedback() {
                    println!("{feedback}");
                }
            }
        }
    }

    Ok(())
}

/// Reads one line from stdin without blocking the runtime.
async fn read_line() -> anyhow::Result<String> {
    tokio::task::spawn_blocking(|| {
        let mut line = String::new();
        std::io::stdin().read_line(&mut line)?;
        Ok::<_, std::io::Error>(line)
    })
    .await
    .map_err(|e| anyhow!("stdin reader task failed: {e}"))?
    .map_err(|e| anyhow!("Failed to read stdin: {e}"))
}
