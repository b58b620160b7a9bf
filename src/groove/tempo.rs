// Tempo search - Scores every tempo on a BPM grid and keeps the best fit
// Each hypothesis quantizes the same events independently

use serde::{Deserialize, Serialize};

use crate::events::Event;
use crate::groove::quantize::{quantize_at_tempo, TempoCandidate};

/// Configuration for the tempo grid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TempoConfig {
    /// Slowest tempo considered, in crotchet BPM
    pub min_bpm: u32,

    /// Fastest tempo considered (inclusive)
    pub max_bpm: u32,

    /// Spacing of the grid in BPM
    pub step_bpm: u32,
}

impl Default for TempoConfig {
    fn default() -> Self {
        TempoConfig {
            min_bpm: 50,
            max_bpm: 300,
            step_bpm: 5,
        }
    }
}

impl TempoConfig {
    /// Tempo hypotheses in ascending order
    pub fn tempos(&self) -> impl Iterator<Item = u32> {
        (self.min_bpm..=self.max_bpm).step_by(self.step_bpm.max(1) as usize)
    }
}

/// Find the best-fitting tempo with the default grid
pub fn select_best_tempo(events: &[Event], frames_per_second: f64) -> Option<TempoCandidate> {
    select_best_tempo_with_config(events, frames_per_second, &TempoConfig::default())
}

/// Find the best-fitting tempo on a custom grid
///
/// Hypotheses where nothing quantizes are skipped. Returns None when
/// every hypothesis is skipped.
pub fn select_best_tempo_with_config(
    events: &[Event],
    frames_per_second: f64,
    config: &TempoConfig,
) -> Option<TempoCandidate> {
    let candidates = config
        .tempos()
        .filter_map(|bpm| match quantize_at_tempo(events, bpm, frames_per_second) {
            Ok(candidate) => Some(candidate),
            Err(e) => {
                log::trace!("Skipping tempo: {}", e);
                None
            }
        });

    let best = pick_best(candidates);
    if let Some(ref candidate) = best {
        log::debug!(
            "Best tempo {} BPM (score {:.4}, quantization error {:.3})",
            candidate.tempo,
            candidate.score,
            candidate.quant_error
        );
    }
    best
}

/// Highest score wins; on equal scores the earliest candidate is kept
pub fn pick_best(candidates: impl IntoIterator<Item = TempoCandidate>) -> Option<TempoCandidate> {
    let mut best: Option<TempoCandidate> = None;
    for candidate in candidates {
        let improves = best
            .as_ref()
            .map_or(true, |current| candidate.score > current.score);
        if improves {
            best = Some(candidate);
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(tempo: u32, score: f64) -> TempoCandidate {
        TempoCandidate {
            decoded: vec![60],
            score,
            tempo,
            quant_error: 0.0,
            frames_per_quaver: 1.0,
        }
    }

    fn alternating_events(count: usize, length: usize) -> Vec<Event> {
        (0..count)
            .map(|i| Event {
                start: i * length,
                duration: length,
                pitch: if i % 2 == 0 { 60 } else { 62 },
                energy: length as f64,
                power: 1.0,
            })
            .collect()
    }

    #[test]
    fn test_default_grid() {
        let tempos: Vec<u32> = TempoConfig::default().tempos().collect();
        assert_eq!(tempos.len(), 51);
        assert_eq!(tempos[0], 50);
        assert_eq!(tempos[50], 300);
    }

    #[test]
    fn test_recovers_120_bpm() {
        // 48 frames per second, so a 120 BPM quaver is exactly 12 frames
        let events = alternating_events(8, 12);
        let best = select_best_tempo(&events, 48.0).unwrap();

        assert_eq!(best.tempo, 120);
        assert!(best.quant_error.abs() < 1e-9);
        assert!((best.score - 2.5).abs() < 1e-9);
        assert_eq!(best.decoded.len(), 8);
    }

    #[test]
    fn test_ties_keep_first_seen() {
        let best = pick_best(vec![
            candidate(100, 1.0),
            candidate(105, 2.0),
            candidate(110, 2.0),
            candidate(115, 1.5),
        ])
        .unwrap();
        assert_eq!(best.tempo, 105);
    }

    #[test]
    fn test_negative_scores_still_selected() {
        let best = pick_best(vec![candidate(50, -3.0), candidate(55, -1.0)]).unwrap();
        assert_eq!(best.tempo, 55);
    }

    #[test]
    fn test_no_valid_hypothesis() {
        // Single-frame events never reach a third of a quaver on the default grid
        let events = alternating_events(6, 1);
        assert!(select_best_tempo(&events, 48.0).is_none());
        assert!(pick_best(Vec::<TempoCandidate>::new()).is_none());
    }

    #[test]
    fn test_custom_grid() {
        let config = TempoConfig {
            min_bpm: 100,
            max_bpm: 110,
            step_bpm: 10,
        };
        let events = alternating_events(8, 12);
        let best = select_best_tempo_with_config(&events, 48.0, &config).unwrap();
        // 110 BPM is closer to the 12-frame quaver than 100 BPM
        assert_eq!(best.tempo, 110);
    }
}
