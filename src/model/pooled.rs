// Pooled spectrum model
// Sums each note's sub-bins and folds harmonic energy onto the fundamental octave

use crate::config::SignalConfig;
use crate::model::backend::{ModelConfig, ModelError, PitchEnergyModel};

/// Model that works directly on the spectral frames, without a network
#[derive(Debug, Clone, Default)]
pub struct PooledSpectrumModel {
    config: ModelConfig,
}

impl PooledSpectrumModel {
    pub fn new(config: ModelConfig) -> Self {
        PooledSpectrumModel { config }
    }

    /// Sum every note's sub-bins into a single energy
    pub fn pool(frame: &[f32], bins_per_midi: usize) -> Vec<f32> {
        frame
            .chunks(bins_per_midi.max(1))
            .map(|note| note.iter().sum())
            .collect()
    }

    /// Shift energy up whole octaves where the higher octave is stronger
    ///
    /// Comparisons use the energies before any shift, shifts then cascade
    /// upward, so e1 < e2 < e3 ends with everything on e3 while e2 < e1 < e3
    /// only moves e2. Total energy is preserved.
    pub fn fold_octaves(notes: &mut [f32]) {
        if notes.len() <= 12 {
            return;
        }

        for key in 0..12 {
            let lower: Vec<usize> = (key..notes.len() - 12).step_by(12).collect();
            let shifts: Vec<bool> = lower.iter().map(|&i| notes[i + 12] > notes[i]).collect();

            for (&i, shift) in lower.iter().zip(shifts) {
                if shift {
                    notes[i + 12] += notes[i];
                    notes[i] = 0.0;
                }
            }
        }
    }
}

impl PitchEnergyModel for PooledSpectrumModel {
    fn name(&self) -> &str {
        "pooled-spectrum"
    }

    fn infer(
        &self,
        spectrogram: &[Vec<f32>],
        signal: &SignalConfig,
    ) -> Result<Vec<Vec<f32>>, ModelError> {
        let expected = signal.spectrum_bins();

        spectrogram
            .iter()
            .enumerate()
            .map(|(frame, bins)| {
                if bins.len() != expected {
                    return Err(ModelError::InputWidth {
                        frame,
                        expected,
                        found: bins.len(),
                    });
                }

                let mut notes = Self::pool(bins, signal.bins_per_midi);
                if self.config.fold_octaves {
                    Self::fold_octaves(&mut notes);
                }
                Ok(notes)
            })
            .collect()
    }
}
