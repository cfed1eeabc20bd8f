//! Configuration file editor command.
//!
//! Opens the parla configuration file in the user's preferred editor.

use std::process::Command;

use crate::config::{get_config_path, ParlaConfig};

/// Opens the configuration file in an editor, creating it with defaults
/// first if it does not exist yet.
///
/// Tries editors in this order:
/// 1. $EDITOR environment variable
/// 2. nano
/// 3. vi
///
/// # Errors
/// - If no editor can be found or executed
pub fn handle_config() -> anyhow::Result<()> {
    let config_path = get_config_path()?;

    if !config_path.exists() {
        ParlaConfig::default().save()?;
        println!("Created default config at {}", config_path.display());
    }

    let editor = pick_editor()?;
    tracing::debug!("Opening {} with {editor}", config_path.display());

    let status = Command::new(&editor)
        .arg(&config_path)
        .status()
        .map_err(|e| {
            anyhow::anyhow!(
                "Failed to open editor '{editor}': {e}. Make sure the editor is installed and accessible."
            )
        })?;

    if !status.success() {
        return Err(anyhow::anyhow!(
            "Editor exited with error code: {}",
            status.code().unwrap_or(-1)
        ));
    }

    Ok(())
}

/// Editor to launch: $EDITOR when set, otherwise the first of nano/vi
/// found on the PATH.
fn pick_editor() -> anyhow::Result<String> {
    std::env::var("EDITOR")
        .ok()
        .filter(|editor| !editor.is_empty())
        .or_else(|| {
            ["nano", "vi"]
                .into_iter()
                .find(|candidate| {
                    Command::new("which")
                        .arg(candidate)
                        .output()
                        .map(|output| output.status.success())
                        .unwrap_or(false)
                })
                .map(str::to_string)
        })
        .ok_or_else(|| {
            anyhow::anyhow!("No editor found. Please set the $EDITOR environment variable.")
        })
}
