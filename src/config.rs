// Transcriber configuration
// Signal geometry plus the tunable parameters of every decoding stage

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::contour::{BeamConfig, SparseConfig};
use crate::events::SegmentConfig;
use crate::groove::TempoConfig;
use crate::model::ModelConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("Invalid config value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

impl ConfigError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            field,
            reason: reason.into(),
        }
    }
}

/// Sample rate, analysis window and MIDI range shared by every stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalConfig {
    /// Nominal input sample rate in Hz
    pub sample_rate: u32,

    /// Samples per analysis window (one frame per window, no overlap)
    pub window_size: usize,

    /// Lowest MIDI note covered by the energy frames
    pub midi_low: u8,

    /// Highest MIDI note covered by the energy frames (inclusive)
    pub midi_high: u8,

    /// Linear sub-bins per semitone in the resampled spectrum
    pub bins_per_midi: usize,
}

impl Default for SignalConfig {
    fn default() -> Self {
        SignalConfig {
            sample_rate: 48000,
            window_size: 1024,
            midi_low: 48,
            midi_high: 95,
            bins_per_midi: 3,
        }
    }
}

impl SignalConfig {
    /// Number of MIDI notes in the range (width of a dense energy frame)
    pub fn midi_count(&self) -> usize {
        (self.midi_high as usize + 1).saturating_sub(self.midi_low as usize)
    }

    /// Number of bins in a resampled spectral frame
    pub fn spectrum_bins(&self) -> usize {
        self.midi_count() * self.bins_per_midi
    }

    /// Frame rate of the analysis in frames per second
    pub fn frames_per_second(&self) -> f64 {
        self.sample_rate as f64 / self.window_size as f64
    }
}

/// Complete configuration for one transcription request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriberConfig {
    pub signal: SignalConfig,
    pub sparse: SparseConfig,
    pub beam: BeamConfig,
    pub segment: SegmentConfig,
    pub tempo: TempoConfig,
    pub model: ModelConfig,
}

impl TranscriberConfig {
    /// Check the invariants every stage relies on
    pub fn validate(&self) -> Result<(), ConfigError> {
        let signal = &self.signal;
        if signal.sample_rate == 0 {
            return Err(ConfigError::invalid("signal.sample_rate", "must be non-zero"));
        }
        if signal.window_size < 2 || !signal.window_size.is_power_of_two() {
            return Err(ConfigError::invalid(
                "signal.window_size",
                format!("{} is not a power of two >= 2", signal.window_size),
            ));
        }
        if signal.midi_low > signal.midi_high || signal.midi_high > 127 {
            return Err(ConfigError::invalid(
                "signal.midi_high",
                format!(
                    "range {}..={} is not a valid MIDI range",
                    signal.midi_low, signal.midi_high
                ),
            ));
        }
        if signal.bins_per_midi == 0 {
            return Err(ConfigError::invalid("signal.bins_per_midi", "must be non-zero"));
        }

        if self.sparse.count == 0 {
            return Err(ConfigError::invalid("sparse.count", "must be non-zero"));
        }
        if !(0.0..=1.0).contains(&self.sparse.relative_floor) {
            return Err(ConfigError::invalid(
                "sparse.relative_floor",
                "must lie in [0, 1]",
            ));
        }

        if self.beam.max_beams == 0 {
            return Err(ConfigError::invalid("beam.max_beams", "must be non-zero"));
        }
        if !self.beam.energy_vs_transition_weight.is_finite() {
            return Err(ConfigError::invalid(
                "beam.energy_vs_transition_weight",
                "must be finite",
            ));
        }

        if self.tempo.step_bpm == 0 {
            return Err(ConfigError::invalid("tempo.step_bpm", "must be non-zero"));
        }
        if self.tempo.min_bpm == 0 || self.tempo.min_bpm > self.tempo.max_bpm {
            return Err(ConfigError::invalid(
                "tempo.min_bpm",
                format!(
                    "range {}..={} BPM is empty",
                    self.tempo.min_bpm, self.tempo.max_bpm
                ),
            ));
        }

        Ok(())
    }
}

/// Load a configuration from a JSON file
/// Missing fields fall back to their defaults
pub fn load_config(path: &Path) -> Result<TranscriberConfig, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    let config: TranscriberConfig = serde_json::from_str(&contents)?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_is_valid() {
        let config = TranscriberConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.signal.midi_count(), 48);
        assert_eq!(config.signal.spectrum_bins(), 144);
        assert!((config.signal.frames_per_second() - 46.875).abs() < 1e-9);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");
        fs::write(&path, r#"{"beam": {"max_beams": 8}, "tempo": {"step_bpm": 10}}"#).unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.beam.max_beams, 8);
        assert_eq!(config.beam.min_event_length, 5);
        assert_eq!(config.tempo.step_bpm, 10);
        assert_eq!(config.tempo.min_bpm, 50);
        assert_eq!(config.signal.sample_rate, 48000);
    }

    #[test]
    fn test_rejects_window_not_power_of_two() {
        let mut config = TranscriberConfig::default();
        config.signal.window_size = 1000;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { field: "signal.window_size", .. })
        ));
    }

    #[test]
    fn test_rejects_empty_tempo_range() {
        let mut config = TranscriberConfig::default();
        config.tempo.min_bpm = 200;
        config.tempo.max_bpm = 100;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_config_reports_parse_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("broken.json");
        fs::write(&path, "{ not json").unwrap();

        assert!(matches!(load_config(&path), Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_config_round_trips_through_json() {
        let config = TranscriberConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: TranscriberConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }
}
