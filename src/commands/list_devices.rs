//! List available audio input devices.

use anyhow::anyhow;
use cpal::traits::{DeviceTrait, HostTrait};

use crate::capture::mic::suppress_stderr;
use crate::error::CaptureError;

/// Lists all audio input devices so the user can pick one for the
/// `device` config key.
///
/// # Errors
/// - If the audio host cannot enumerate devices
pub fn handle_list_devices() -> anyhow::Result<()> {
    // Enumerate while ALSA's library chatter is silenced.
    let (host, devices) = suppress_stderr(|| {
        let host = cpal::default_host();
        let devices: Vec<cpal::Device> = host
            .input_devices()
            .map_err(|e| CaptureError::DeviceUnavailable(e.to_string()))?
            .filter(|d| d.name().is_ok())
            .collect();
        Ok((host, devices))
    })
    .map_err(|e| anyhow!("Failed to enumerate audio devices: {e}"))?;

    if devices.is_empty() {
        println!("No audio input devices found on this system.");
        return Ok(());
    }

    let default_name = host.default_input_device().and_then(|d| d.name().ok());

    println!();
    println!("Available audio input devices:");
    println!();

    for (index, device) in devices.iter().enumerate() {
        let name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        let marker = if default_name.as_ref() == Some(&name) {
            " [DEFAULT]"
        } else {
            ""
        };
        let details = match device.default_input_config() {
            Ok(config) => format!(
                "{} Hz, {} channel(s)",
                config.sample_rate().0,
                config.channels()
            ),
            Err(_) => "configuration unavailable".to_string(),
        };

        println!("  {index}: {name}{marker} ({details})");
    }
    println!();
    println!("Set `device` in the [audio] section of the config file to an index or name.");

    Ok(())
}
