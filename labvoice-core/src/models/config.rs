use std::time::Duration;

use super::audio_models::{INPUT_SAMPLE_RATE, OUTPUT_SAMPLE_RATE};
use super::error::LabError;

/// Default live model identifier.
pub const DEFAULT_LIVE_MODEL: &str = "gemini-2.5-flash-native-audio-preview-09-2025";

/// Default one-shot model identifier.
pub const DEFAULT_GENERATE_MODEL: &str = "gemini-2.5-flash";

/// Configuration for the credential pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// How long a credential stays out of rotation after a quota failure (default: 60s).
    pub suspension: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            suspension: Duration::from_millis(60_000),
        }
    }
}

/// Constraints requested from the microphone.
///
/// Processing flags are applied by the hardware layer when it supports them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureConstraints {
    pub sample_rate: u32,
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    pub auto_gain_control: bool,
}

impl Default for CaptureConstraints {
    fn default() -> Self {
        Self {
            sample_rate: INPUT_SAMPLE_RATE,
            echo_cancellation: true,
            noise_suppression: true,
            auto_gain_control: true,
        }
    }
}

/// Who the model speaks as.
///
/// The instruction text is supplied by the caller; presets only fix name and voice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Persona {
    pub name: String,
    pub instruction: String,
    pub voice: String,
}

impl Persona {
    pub fn new(name: impl Into<String>, instruction: impl Into<String>, voice: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instruction: instruction.into(),
            voice: voice.into(),
        }
    }

    /// Clinical colleague persona, spoken with the "Kore" voice.
    pub fn clinical(instruction: impl Into<String>) -> Self {
        Self::new("clinical", instruction, "Kore")
    }

    /// Quality-control specialist persona, spoken with the "Fenrir" voice.
    pub fn quality_control(instruction: impl Into<String>) -> Self {
        Self::new("qc", instruction, "Fenrir")
    }
}

impl Default for Persona {
    fn default() -> Self {
        Self::clinical("")
    }
}

/// Configuration for a live voice session.
#[derive(Debug, Clone)]
pub struct LiveSessionConfig {
    /// Live model identifier.
    pub model: String,

    pub persona: Persona,

    /// Caller-supplied context rendered under `[CURRENT CONTEXT]`.
    pub context: String,

    pub capture: CaptureConstraints,

    /// Sample rate of inbound model audio (default: 24000).
    pub output_sample_rate: u32,

    /// Samples per outbound capture frame (default: 4096).
    pub frame_size: usize,

    /// Every Nth sample feeds the level estimate (default: 50).
    pub level_stride: usize,

    /// Same-role fragments within this window merge into one message (default: 5s).
    pub merge_window: Duration,
}

impl LiveSessionConfig {
    pub fn validate(&self) -> Result<(), LabError> {
        if self.model.trim().is_empty() {
            return Err(LabError::ConfigurationFailed("model must not be empty".into()));
        }
        if self.capture.sample_rate == 0 || self.output_sample_rate == 0 {
            return Err(LabError::ConfigurationFailed("sample rates must be positive".into()));
        }
        if self.frame_size == 0 {
            return Err(LabError::ConfigurationFailed("frame size must be positive".into()));
        }
        if self.level_stride == 0 || self.level_stride > self.frame_size {
            return Err(LabError::ConfigurationFailed(format!(
                "level stride {} must be within 1..={}",
                self.level_stride, self.frame_size
            )));
        }
        Ok(())
    }
}

impl Default for LiveSessionConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_LIVE_MODEL.into(),
            persona: Persona::default(),
            context: String::new(),
            capture: CaptureConstraints::default(),
            output_sample_rate: OUTPUT_SAMPLE_RATE,
            frame_size: 4096,
            level_stride: 50,
            merge_window: Duration::from_secs(5),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let config = LiveSessionConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.capture.sample_rate, 16_000);
        assert_eq!(config.output_sample_rate, 24_000);
        assert_eq!(config.frame_size, 4096);
        assert_eq!(PoolConfig::default().suspension, Duration::from_secs(60));
    }

    #[test]
    fn rejects_zero_frame_size() {
        let config = LiveSessionConfig {
            frame_size: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(LabError::ConfigurationFailed(_))));
    }

    #[test]
    fn rejects_stride_larger_than_frame() {
        let config = LiveSessionConfig {
            frame_size: 16,
            level_stride: 32,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn persona_presets_pick_voices() {
        assert_eq!(Persona::clinical("x").voice, "Kore");
        assert_eq!(Persona::quality_control("x").voice, "Fenrir");
    }
}
