//! Configuration file management for parla.
//!
//! This module handles loading and saving application configuration from TOML files.
//! Configuration is stored in the user's config directory. Provider credentials can
//! live in the file or be supplied through environment variables, which win.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::assessment::{PolicyConfig, UserLevel};
use crate::capture::DetectorConfig;

/// Audio capture configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Audio device to use. Options:
    /// - "default" for system default device
    /// - numeric index (0, 1, 2, etc.) from `parla list-devices`
    /// - device name from `parla list-devices`
    pub device: String,
    /// Preferred sample rate in Hz (16000 recommended for speech recognition).
    /// The device's native rate is used when it differs.
    pub sample_rate: u32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            device: "default".to_string(),
            sample_rate: 16_000,
        }
    }
}

/// Assessment sampling configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AssessmentConfig {
    /// Learner proficiency: "beginner", "intermediate", or "advanced".
    pub user_level: Option<UserLevel>,
    /// Rule-chain tuning. Omitted fields keep the production defaults.
    pub policy: PolicyConfig,
}

/// Cloud provider credentials. Environment variables `OPENAI_API_KEY`,
/// `AZURE_SPEECH_KEY`, and `AZURE_SPEECH_REGION` override these.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub openai_api_key: Option<String>,
    pub azure_speech_key: Option<String>,
    pub azure_speech_region: Option<String>,
}

/// Complete application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ParlaConfig {
    pub audio: AudioConfig,
    pub detector: DetectorConfig,
    pub assessment: AssessmentConfig,
    pub providers: ProvidersConfig,
}

impl ParlaConfig {
    /// Loads configuration from the user's config directory, falling back
    /// to defaults when no file exists yet.
    ///
    /// # Errors
    /// - If the config directory cannot be determined
    /// - If the config file exists but cannot be read
    /// - If the TOML is malformed
    pub fn load() -> anyhow::Result<Self> {
        let config_path = get_config_path()?;
        if !config_path.exists() {
            tracing::debug!("No config file found, using defaults");
            return Ok(Self::default());
        }
        let config_content = fs::read_to_string(&config_path)?;
        let config: ParlaConfig = toml::from_str(&config_content)?;
        Ok(config)
    }

    /// Saves configuration to the user's config directory.
    ///
    /// # Errors
    /// - If the config directory cannot be determined or created
    /// - If the file cannot be written
    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = get_config_path()?;
        let config_content = toml::to_string_pretty(self)?;
        fs::write(&config_path, config_content)?;
        tracing::info!("Configuration saved");
        Ok(())
    }

    /// OpenAI API key, preferring the environment over the file.
    pub fn openai_api_key(&self) -> Option<String> {
        std::env::var("OPENAI_API_KEY")
            .ok()
            .filter(|k| !k.is_empty())
            .or_else(|| self.providers.openai_api_key.clone())
    }

    /// Azure Speech key and region, preferring the environment.
    pub fn azure_credentials(&self) -> Option<(String, String)> {
        let key = std::env::var("AZURE_SPEECH_KEY")
            .ok()
            .filter(|k| !k.is_empty())
            .or_else(|| self.providers.azure_speech_key.clone())?;
        let region = std::env::var("AZURE_SPEECH_REGION")
            .ok()
            .filter(|r| !r.is_empty())
            .or_else(|| self.providers.azure_speech_region.clone())?;
        Some((key, region))
    }

    pub fn user_level(&self) -> UserLevel {
        self.assessment.user_level.unwrap_or(UserLevel::Beginner)
    }
}

/// Retrieves the path to the config file, creating the directory if needed.
///
/// # Errors
/// - If the home directory cannot be determined
/// - If the config directory cannot be created
pub fn get_config_path() -> Result<PathBuf, std::io::Error> {
    let home_dir = dirs::home_dir().ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "Could not find home directory",
        )
    })?;
    let config_dir = home_dir.join(".config").join("parla");
    std::fs::create_dir_all(&config_dir)?;

    Ok(config_dir.join("parla.toml"))
}
