//! Engine-wide settings.

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Default output sample rate in Hz.
pub const DEFAULT_SAMPLE_RATE: u32 = 44100;

/// How far ahead of "now" the sequencer schedules events, in seconds.
pub const DEFAULT_LOOKAHEAD_SECONDS: f64 = 50.5;

/// Fixed for the lifetime of an engine instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    pub sample_rate: u32,
    pub lookahead_seconds: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            sample_rate: DEFAULT_SAMPLE_RATE,
            lookahead_seconds: DEFAULT_LOOKAHEAD_SECONDS,
        }
    }
}

impl EngineConfig {
    pub fn with_sample_rate(sample_rate: u32) -> Self {
        EngineConfig {
            sample_rate,
            ..Default::default()
        }
    }

    /// Parse from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.sample_rate == 0 {
            return Err(EngineError::InvalidSampleRate);
        }
        if !self.lookahead_seconds.is_finite() || self.lookahead_seconds <= 0.0 {
            return Err(EngineError::InvalidLookahead(self.lookahead_seconds));
        }
        Ok(())
    }
}
