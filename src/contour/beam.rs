// Beam search hypotheses
// A Beam is a partial contour; a BeamCandidate proposes extending it by one frame

use crate::contour::search::BeamConfig;
use crate::contour::transition::{no_change_likelihood, transition_likelihood};

/// Partial contour hypothesis
#[derive(Debug, Clone, PartialEq)]
pub struct Beam {
    /// MIDI pitch chosen for every frame so far (never empty)
    contour: Vec<u8>,

    /// Pitch of the latest frame
    last_pitch: u8,

    /// Sum of the sparse-frame energies along the contour
    cum_energy: f64,

    /// Sum of the transition log likelihoods of every change
    cum_transition: f64,

    /// Number of pitch changes
    num_changes: usize,

    /// Contour index of the latest change (negative before the first one)
    last_change: i64,
}

/// Proposal to extend one beam by one frame
#[derive(Debug, Clone, PartialEq)]
pub struct BeamCandidate {
    /// Index of the beam this candidate extends
    pub beam_index: usize,

    /// Pitch proposed for the next frame
    pub pitch: u8,

    /// Whether the pitch differs from the beam's latest pitch
    pub changed: bool,

    pub new_cum_energy: f64,
    pub new_cum_transition: f64,
    pub new_num_changes: usize,

    /// Frames since the latest change once this candidate is applied
    pub new_frames_since_last_change: i64,

    /// Weighted average energy plus average transition likelihood
    pub score: f64,
}

impl Beam {
    /// Start a beam on a seed pitch
    /// Seeding is not a change, so the beam may change on the very next frame
    pub fn seed(pitch: u8, energy: f32, config: &BeamConfig) -> Self {
        Beam {
            contour: vec![pitch],
            last_pitch: pitch,
            cum_energy: energy as f64,
            cum_transition: 0.0,
            num_changes: 0,
            last_change: -(config.min_event_length as i64),
        }
    }

    pub fn contour(&self) -> &[u8] {
        &self.contour
    }

    pub fn into_contour(self) -> Vec<u8> {
        self.contour
    }

    pub fn last_pitch(&self) -> u8 {
        self.last_pitch
    }

    pub fn len(&self) -> usize {
        self.contour.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contour.is_empty()
    }

    pub fn num_changes(&self) -> usize {
        self.num_changes
    }

    pub fn cum_energy(&self) -> f64 {
        self.cum_energy
    }

    pub fn frames_since_last_change(&self) -> i64 {
        self.contour.len() as i64 - self.last_change
    }

    pub fn can_change(&self, config: &BeamConfig) -> bool {
        self.frames_since_last_change() >= config.min_event_length as i64
    }

    /// Score the extension of this beam by `pitch` with `energy`
    /// Returns None when the change would come too soon after the previous one
    pub fn propose(
        &self,
        beam_index: usize,
        pitch: u8,
        energy: f32,
        config: &BeamConfig,
    ) -> Option<BeamCandidate> {
        let changed = pitch != self.last_pitch;
        if changed && !self.can_change(config) {
            return None;
        }

        let new_cum_energy = self.cum_energy + energy as f64;
        let (new_cum_transition, new_num_changes) = if changed {
            (
                self.cum_transition + transition_likelihood(self.last_pitch, pitch),
                self.num_changes + 1,
            )
        } else {
            (self.cum_transition, self.num_changes)
        };

        let new_len = (self.contour.len() + 1) as f64;
        let avg_energy = new_cum_energy / new_len;
        let avg_transition = if new_num_changes == 0 {
            no_change_likelihood()
        } else {
            new_cum_transition / new_num_changes as f64
        };

        Some(BeamCandidate {
            beam_index,
            pitch,
            changed,
            new_cum_energy,
            new_cum_transition,
            new_num_changes,
            new_frames_since_last_change: if changed {
                1
            } else {
                1 + self.frames_since_last_change()
            },
            score: config.energy_vs_transition_weight * avg_energy + avg_transition,
        })
    }

    /// Build the next-generation beam from one of this beam's candidates
    pub fn extend(&self, candidate: &BeamCandidate) -> Beam {
        let mut contour = Vec::with_capacity(self.contour.len() + 1);
        contour.extend_from_slice(&self.contour);
        contour.push(candidate.pitch);

        let last_change = contour.len() as i64 - candidate.new_frames_since_last_change;

        Beam {
            contour,
            last_pitch: candidate.pitch,
            cum_energy: candidate.new_cum_energy,
            cum_transition: candidate.new_cum_transition,
            num_changes: candidate.new_num_changes,
            last_change,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contour::transition::interval_likelihood;

    #[test]
    fn test_seed_can_change_immediately() {
        let config = BeamConfig::default();
        let beam = Beam::seed(60, 1.0, &config);

        assert_eq!(beam.len(), 1);
        assert_eq!(beam.num_changes(), 0);
        assert_eq!(beam.frames_since_last_change(), 6);
        assert!(beam.can_change(&config));
    }

    #[test]
    fn test_continuation_score() {
        let config = BeamConfig::default();
        let beam = Beam::seed(60, 1.0, &config);
        let candidate = beam.propose(0, 60, 0.5, &config).unwrap();

        assert!(!candidate.changed);
        assert_eq!(candidate.new_num_changes, 0);
        assert_eq!(candidate.new_frames_since_last_change, 7);
        let expected = 130.0 * 1.5 / 2.0 + interval_likelihood(2);
        assert!((candidate.score - expected).abs() < 1e-9);
    }

    #[test]
    fn test_change_score_uses_average_transition() {
        let config = BeamConfig::default();
        let beam = Beam::seed(60, 1.0, &config);
        let candidate = beam.propose(3, 67, 1.0, &config).unwrap();

        assert!(candidate.changed);
        assert_eq!(candidate.beam_index, 3);
        assert_eq!(candidate.new_num_changes, 1);
        assert_eq!(candidate.new_frames_since_last_change, 1);
        let expected = 130.0 * 2.0 / 2.0 + interval_likelihood(7);
        assert!((candidate.score - expected).abs() < 1e-9);
    }

    #[test]
    fn test_change_blocked_until_min_event_length() {
        let config = BeamConfig::default();
        let seed = Beam::seed(60, 1.0, &config);
        let mut beam = seed.extend(&seed.propose(0, 62, 1.0, &config).unwrap());
        assert_eq!(beam.frames_since_last_change(), 1);

        // Frames 2..=5 hold the new pitch, changes are refused
        for _ in 0..4 {
            assert!(beam.propose(0, 64, 1.0, &config).is_none());
            beam = beam.extend(&beam.propose(0, 62, 1.0, &config).unwrap());
        }

        assert_eq!(beam.frames_since_last_change(), 5);
        assert!(beam.propose(0, 64, 1.0, &config).is_some());
        assert_eq!(beam.contour(), &[60, 62, 62, 62, 62, 62]);
    }

    #[test]
    fn test_extend_moves_last_change_only_on_change() {
        let config = BeamConfig::default();
        let seed = Beam::seed(60, 0.0, &config);
        let held = seed.extend(&seed.propose(0, 60, 0.0, &config).unwrap());
        assert_eq!(held.frames_since_last_change(), 7);

        let changed = held.extend(&held.propose(0, 59, 0.0, &config).unwrap());
        assert_eq!(changed.frames_since_last_change(), 1);
        assert_eq!(changed.num_changes(), 1);
        assert_eq!(changed.last_pitch(), 59);
    }
}
