// Groove engine - Tempo search and quaver quantization
// Turns note events into a tempo-normalized note sequence

pub mod quantize;
pub mod tempo;

pub use quantize::{
    frames_per_quaver, quantize_at_tempo, quantize_duration, InvalidTempoHypothesis,
    TempoCandidate,
};
pub use tempo::{pick_best, select_best_tempo, select_best_tempo_with_config, TempoConfig};
