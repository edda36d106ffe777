//! Configuration for a [`crate::source::VideoSource`]: buffer sizing, fill
//! and consumption strategy overrides, and the adaptive-drop tolerances.
//! `Default` plus a `validate()` that range-checks every numeric field,
//! with optional TOML loading.

use serde::{Deserialize, Serialize};

use crate::consumer::{BufferConsumptionStrategy, BufferFillingStrategy};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FillingStrategyOption {
    Wait,
    DropOldest,
    DropLatest,
    AdaptiveDropOldest,
    AdaptiveDropLatest,
}

impl From<FillingStrategyOption> for BufferFillingStrategy {
    fn from(value: FillingStrategyOption) -> Self {
        match value {
            FillingStrategyOption::Wait => Self::Wait,
            FillingStrategyOption::DropOldest => Self::DropOldest,
            FillingStrategyOption::DropLatest => Self::DropLatest,
            FillingStrategyOption::AdaptiveDropOldest => Self::AdaptiveDropOldest,
            FillingStrategyOption::AdaptiveDropLatest => Self::AdaptiveDropLatest,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConsumptionStrategyOption {
    Lazy,
    Eager,
}

impl From<ConsumptionStrategyOption> for BufferConsumptionStrategy {
    fn from(value: ConsumptionStrategyOption) -> Self {
        match value {
            ConsumptionStrategyOption::Lazy => Self::Lazy,
            ConsumptionStrategyOption::Eager => Self::Eager,
        }
    }
}

/// Every field here has a spec-mandated default, so a bare
/// `VideoSourceConfig::default()` is always a valid starting point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoSourceConfig {
    pub buffer_size: usize,
    /// Left unset (`None`) to let the source pick by source kind at `start`.
    pub buffer_filling_strategy: Option<FillingStrategyOption>,
    pub buffer_consumption_strategy: Option<ConsumptionStrategyOption>,
    pub adaptive_mode_stream_pace_tolerance: f64,
    pub adaptive_mode_reader_pace_tolerance: f64,
    pub minimum_adaptive_mode_samples: usize,
    pub maximum_adaptive_frames_dropped_in_row: usize,
}

impl Default for VideoSourceConfig {
    fn default() -> Self {
        Self {
            buffer_size: 64,
            buffer_filling_strategy: None,
            buffer_consumption_strategy: None,
            adaptive_mode_stream_pace_tolerance: 0.1,
            adaptive_mode_reader_pace_tolerance: 5.0,
            minimum_adaptive_mode_samples: 10,
            maximum_adaptive_frames_dropped_in_row: 16,
        }
    }
}

impl VideoSourceConfig {
    /// Range-checks every field. Returns a human-readable reason on the
    /// first violation.
    pub fn validate(&self) -> Result<(), String> {
        if self.buffer_size == 0 {
            return Err("buffer_size must be greater than 0".to_string());
        }
        if self.minimum_adaptive_mode_samples < crate::pace::MIN_ADAPTIVE_SAMPLES_FLOOR {
            return Err(format!(
                "minimum_adaptive_mode_samples must be at least {}",
                crate::pace::MIN_ADAPTIVE_SAMPLES_FLOOR
            ));
        }
        if self.adaptive_mode_stream_pace_tolerance < 0.0
            || self.adaptive_mode_reader_pace_tolerance < 0.0
        {
            return Err("pace tolerances must be non-negative".to_string());
        }
        Ok(())
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }

    pub fn from_toml_file(path: impl AsRef<std::path::Path>) -> Result<Self, String> {
        let raw = std::fs::read_to_string(&path)
            .map_err(|err| format!("reading {}: {err}", path.as_ref().display()))?;
        Self::from_toml_str(&raw).map_err(|err| err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(VideoSourceConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_buffer_size_is_rejected() {
        let mut config = VideoSourceConfig::default();
        config.buffer_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn minimum_adaptive_samples_below_floor_is_rejected() {
        let mut config = VideoSourceConfig::default();
        config.minimum_adaptive_mode_samples = 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn negative_tolerance_is_rejected() {
        let mut config = VideoSourceConfig::default();
        config.adaptive_mode_stream_pace_tolerance = -0.1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn round_trips_through_toml() {
        let config = VideoSourceConfig::default();
        let raw = toml::to_string(&config).unwrap();
        let parsed = VideoSourceConfig::from_toml_str(&raw).unwrap();
        assert_eq!(parsed, config);
    }
}
