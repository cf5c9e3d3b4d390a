use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{MixerError, Result};

/// Top-level configuration structure for the application.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub mixer: MixerConfig,
}

impl AppConfig {
    /// Reads a JSON configuration file. Missing fields fall back to defaults.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Parses and validates configuration from a JSON string.
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.mixer.validate()?;
        Ok(config)
    }
}

/// Configuration specific to the mixing engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MixerConfig {
    /// Size of the voice pool. Zero is allowed and makes every
    /// `play_sound` call fail.
    pub voice_count: usize,
    /// Output sample rate in Hz.
    pub sample_rate: u32,
    /// Frames requested per audio callback.
    pub buffer_frames: usize,
    pub music_volume: f32,
}

impl Default for MixerConfig {
    fn default() -> Self {
        Self {
            voice_count: 64,
            sample_rate: 44_100,
            buffer_frames: 256,
            music_volume: 1.0,
        }
    }
}

impl MixerConfig {
    /// Rejects zero rates and buffer sizes and non-finite volumes.
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(MixerError::InvalidInput("sample rate must be non-zero"));
        }
        if self.buffer_frames == 0 {
            return Err(MixerError::InvalidInput("buffer size must be non-zero"));
        }
        if !self.music_volume.is_finite() {
            return Err(MixerError::InvalidInput("music volume must be finite"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config = AppConfig::from_json(r#"{ "mixer": { "voice_count": 8 } }"#).unwrap();
        assert_eq!(config.mixer.voice_count, 8);
        assert_eq!(config.mixer.sample_rate, 44_100);
        assert_eq!(config.mixer.buffer_frames, 256);
    }

    #[test]
    fn rejects_zero_sample_rate() {
        let err = AppConfig::from_json(r#"{ "mixer": { "sample_rate": 0 } }"#).unwrap_err();
        assert!(matches!(err, MixerError::InvalidInput(_)));
    }

    #[test]
    fn malformed_json_is_a_config_error() {
        let err = AppConfig::from_json("{ mixer").unwrap_err();
        assert!(matches!(err, MixerError::Config(_)));
    }
}
