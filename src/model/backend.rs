// Pitch energy model backend
// Boundary between spectral frames and the per-note energy frames the decoder consumes

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::SignalConfig;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Spectral frame {frame} has {found} bins, expected {expected}")]
    InputWidth {
        frame: usize,
        expected: usize,
        found: usize,
    },

    #[error("Model backend failed: {0}")]
    Backend(String),
}

/// Configuration for the built-in pooled model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Move energy up an octave wherever the upper octave is stronger
    pub fold_octaves: bool,
}

impl Default for ModelConfig {
    fn default() -> Self {
        ModelConfig { fold_octaves: true }
    }
}

/// Estimates per-note energies from a spectrogram
///
/// Input frames hold `signal.spectrum_bins()` linear-MIDI bins; output
/// frames hold one non-negative energy per MIDI note, lowest note first.
/// Implementations may look at neighbouring frames (a denoising network
/// usually does), which is why the whole spectrogram is passed at once.
pub trait PitchEnergyModel: Send {
    /// Short name for logs and traces
    fn name(&self) -> &str;

    /// Produce one dense energy frame per spectral frame
    fn infer(
        &self,
        spectrogram: &[Vec<f32>],
        signal: &SignalConfig,
    ) -> Result<Vec<Vec<f32>>, ModelError>;
}
