// Beam search contour decoder
// Finds a smooth, plausible MIDI contour through a sequence of sparse pitch frames

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use thiserror::Error;

use crate::contour::beam::{Beam, BeamCandidate};
use crate::contour::sparse::{extract_sparse_frames, SparseConfig, SparseFrame};

#[derive(Debug, Error, PartialEq)]
pub enum ContourError {
    #[error("No frames (or no candidate pitches) to decode")]
    EmptyInput,

    #[error("Frame {frame} has {found} bins, expected {expected}")]
    FrameWidthMismatch {
        frame: usize,
        expected: usize,
        found: usize,
    },

    #[error("Frame {frame} references bin {bin}, outside the {midi_count}-note range")]
    BinOutOfRange {
        frame: usize,
        bin: usize,
        midi_count: usize,
    },
}

/// Configuration for the contour beam search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BeamConfig {
    /// Maximum number of live beams (also caps the seed pitches)
    pub max_beams: usize,

    /// Minimum number of frames between two pitch changes
    pub min_event_length: usize,

    /// Weight of the average energy against the average transition
    /// log likelihood, calibrated to the energy scale of the model
    pub energy_vs_transition_weight: f64,
}

impl Default for BeamConfig {
    fn default() -> Self {
        BeamConfig {
            max_beams: 5,
            min_event_length: 5,
            energy_vs_transition_weight: 130.0,
        }
    }
}

/// Decoded pitch contour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contour {
    /// MIDI pitch for every frame
    pub midis: Vec<u8>,

    /// Sparse-frame energy at the chosen pitch (0 where the pitch was absent)
    pub energies: Vec<f32>,
}

impl Contour {
    pub fn len(&self) -> usize {
        self.midis.len()
    }

    pub fn is_empty(&self) -> bool {
        self.midis.is_empty()
    }
}

/// Constrained beam search over sparse pitch frames
#[derive(Debug, Clone)]
pub struct BeamSearchDecoder {
    config: BeamConfig,
    midi_low: u8,
    midi_count: usize,
}

impl BeamSearchDecoder {
    /// Create a decoder for frames covering `midi_count` notes from `midi_low`
    pub fn new(config: BeamConfig, midi_low: u8, midi_count: usize) -> Self {
        BeamSearchDecoder {
            config,
            midi_low,
            midi_count,
        }
    }

    pub fn config(&self) -> &BeamConfig {
        &self.config
    }

    /// Check dense frame widths and reduce them to sparse frames
    pub fn sparsify(
        &self,
        frames: &[Vec<f32>],
        sparse: &SparseConfig,
    ) -> Result<Vec<SparseFrame>, ContourError> {
        if let Some((frame, dense)) = frames
            .iter()
            .enumerate()
            .find(|(_, dense)| dense.len() != self.midi_count)
        {
            return Err(ContourError::FrameWidthMismatch {
                frame,
                expected: self.midi_count,
                found: dense.len(),
            });
        }

        Ok(extract_sparse_frames(frames, sparse))
    }

    /// Decode the single best contour
    pub fn decode(&self, frames: &[SparseFrame]) -> Result<Contour, ContourError> {
        let best = self
            .search(frames)?
            .into_iter()
            .next()
            .ok_or(ContourError::EmptyInput)?;

        let midis = best.into_contour();
        let energies = midis
            .iter()
            .zip(frames)
            .map(|(&midi, frame)| frame.get((midi - self.midi_low) as usize).unwrap_or(0.0))
            .collect();

        log::debug!(
            "Decoded contour of {} frames over {} sparse frames",
            midis.len(),
            frames.len()
        );

        Ok(Contour { midis, energies })
    }

    /// Run the search and return the surviving beams, best first
    ///
    /// With a single frame the seeds are ranked by their energy, strongest
    /// first, ties keeping seed order.
    pub fn search(&self, frames: &[SparseFrame]) -> Result<Vec<Beam>, ContourError> {
        let first = frames.first().ok_or(ContourError::EmptyInput)?;
        for (index, frame) in frames.iter().enumerate() {
            for (bin, _) in frame.iter() {
                self.check_bin(index, bin)?;
            }
        }

        let seeds = self.seed_pitches(frames);
        if seeds.is_empty() {
            return Err(ContourError::EmptyInput);
        }
        log::debug!("Seeded {} beams: {:?}", seeds.len(), seeds);

        let mut beams: Vec<Beam> = seeds
            .iter()
            .map(|&pitch| {
                let energy = first.get(self.bin_of(pitch)).unwrap_or(0.0);
                Beam::seed(pitch, energy, &self.config)
            })
            .collect();

        // A lone frame never reaches pruning, so rank the seeds here
        if frames.len() == 1 {
            beams.sort_by(|a, b| {
                b.cum_energy()
                    .partial_cmp(&a.cum_energy())
                    .unwrap_or(Ordering::Equal)
            });
        }

        for frame in &frames[1..] {
            let candidates = self.collect_candidates(&beams, frame);
            let survivors = self.prune(candidates);
            beams = survivors
                .iter()
                .map(|candidate| beams[candidate.beam_index].extend(candidate))
                .collect();
        }

        Ok(beams)
    }

    /// Distinct pitches in frame order, ascending within a frame,
    /// up to the beam width
    fn seed_pitches(&self, frames: &[SparseFrame]) -> Vec<u8> {
        let mut seeds: Vec<u8> = Vec::with_capacity(self.config.max_beams);

        'frames: for frame in frames {
            for (bin, _) in frame.iter() {
                let pitch = self.pitch_of(bin);
                if !seeds.contains(&pitch) {
                    seeds.push(pitch);
                    if seeds.len() >= self.config.max_beams {
                        break 'frames;
                    }
                }
            }
        }

        seeds
    }

    fn collect_candidates(&self, beams: &[Beam], frame: &SparseFrame) -> Vec<BeamCandidate> {
        let mut candidates = Vec::with_capacity((frame.len() + 1) * beams.len());

        for (bin, energy) in frame.iter() {
            let pitch = self.pitch_of(bin);
            for (index, beam) in beams.iter().enumerate() {
                if let Some(candidate) = beam.propose(index, pitch, energy, &self.config) {
                    candidates.push(candidate);
                }
            }
        }

        // Holding the current pitch is always allowed, at zero energy when absent
        for (index, beam) in beams.iter().enumerate() {
            if !frame.contains(self.bin_of(beam.last_pitch())) {
                if let Some(candidate) = beam.propose(index, beam.last_pitch(), 0.0, &self.config)
                {
                    candidates.push(candidate);
                }
            }
        }

        candidates
    }

    /// Keep at most `max_beams` non-redundant candidates
    ///
    /// A candidate is redundant when a better-scoring candidate on the same
    /// pitch has been free of changes for at least as long.
    fn prune(&self, mut candidates: Vec<BeamCandidate>) -> Vec<BeamCandidate> {
        candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));

        let mut best_fslc: HashMap<u8, i64> = HashMap::new();
        let mut survivors = Vec::with_capacity(self.config.max_beams);

        for candidate in candidates {
            if survivors.len() >= self.config.max_beams {
                break;
            }

            let fslc = candidate.new_frames_since_last_change;
            match best_fslc.get(&candidate.pitch) {
                Some(&best) if fslc <= best => continue,
                _ => {
                    best_fslc.insert(candidate.pitch, fslc);
                    survivors.push(candidate);
                }
            }
        }

        survivors
    }

    fn check_bin(&self, frame: usize, bin: usize) -> Result<(), ContourError> {
        if bin >= self.midi_count || self.midi_low as usize + bin > u8::MAX as usize {
            return Err(ContourError::BinOutOfRange {
                frame,
                bin,
                midi_count: self.midi_count,
            });
        }
        Ok(())
    }

    /// Bins are range-checked before the search starts
    fn pitch_of(&self, bin: usize) -> u8 {
        self.midi_low + bin as u8
    }

    fn bin_of(&self, pitch: u8) -> usize {
        (pitch - self.midi_low) as usize
    }
}
