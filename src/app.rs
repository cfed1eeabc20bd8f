//! Application orchestration and command routing.
//!
//! Handles command-line argument parsing and delegates to appropriate command handlers.

use clap::{Parser, Subcommand};

use crate::commands;
use crate::config::ParlaConfig;
use crate::logging;

/// Conversation practice for English learners: speak, get transcribed,
/// and occasionally get pronunciation feedback.
#[derive(Parser)]
#[command(name = "parla")]
#[command(version)]
#[command(about = "English conversation practice with automatic speech capture")]
#[command(
    after_help = "CONFIGURATION:\n    Config file:        ~/.config/parla/parla.toml\n    Logs:               ~/.local/state/parla/parla.log.*\n\nCREDENTIALS:\n    OPENAI_API_KEY              transcription (required)\n    AZURE_SPEECH_KEY/_REGION    pronunciation feedback (optional)"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a conversation practice session (default)
    ///
    /// Records each utterance from the microphone, stops automatically
    /// when you pause, and transcribes what you said.
    #[command(visible_alias = "p")]
    Practice,

    /// Open configuration file in your preferred editor
    ///
    /// Edit audio, detector, and assessment settings.
    /// Uses $EDITOR environment variable or falls back to nano/vi.
    #[command(visible_alias = "c")]
    Config,

    /// List available audio input devices
    ///
    /// Shows device indices and names to help configure the input
    /// device in parla.toml.
    #[command(name = "list-devices")]
    ListDevices,

    /// Show recent log entries from the application
    ///
    /// Display the last 50 lines of the most recent log file.
    /// Useful for troubleshooting issues.
    Logs,
}

/// Runs the main application based on command-line arguments.
///
/// # Errors
/// - If logging initialization fails
/// - If configuration cannot be loaded
/// - If command execution fails
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // These have no use for logging or config.
    match &cli.command {
        Some(Commands::ListDevices) => return commands::handle_list_devices(),
        Some(Commands::Logs) => return commands::handle_logs(),
        _ => {}
    }

    logging::init_logging()?;

    match cli.command {
        None | Some(Commands::Practice) => {
            let config = ParlaConfig::load()?;
            commands::handle_practice(config).await?;
        }
        Some(Commands::Config) => {
            commands::handle_config()?;
        }
        Some(Commands::ListDevices) | Some(Commands::Logs) => {
            unreachable!("These commands are handled earlier")
        }
    }

    Ok(())
}
