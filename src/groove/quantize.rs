// Quaver quantization - Converts note events into a whole-quaver sequence
// Scores how well a single tempo hypothesis explains the event durations

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::events::Event;

/// Raised when no event lasts long enough to become a quaver at a tempo
/// Such hypotheses never compete for the best tempo
#[derive(Debug, Error, PartialEq)]
#[error("No event quantizes to a quaver at {bpm} BPM")]
pub struct InvalidTempoHypothesis {
    pub bpm: u32,
}

/// A decoded note sequence under one tempo hypothesis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TempoCandidate {
    /// One MIDI pitch per quaver, run-length expanded
    pub decoded: Vec<u8>,

    /// Tempo fit score (higher is better)
    pub score: f64,

    /// Tempo in crotchet beats per minute
    pub tempo: u32,

    /// Power-weighted rounding error summed over all events
    pub quant_error: f64,

    /// Frames per quaver at this tempo
    pub frames_per_quaver: f64,
}

/// Frames per quaver at `bpm`, a quaver being half a crotchet beat
pub fn frames_per_quaver(bpm: u32, frames_per_second: f64) -> f64 {
    let quavers_per_second = 2.0 * bpm as f64 / 60.0;
    frames_per_second / quavers_per_second
}

/// Round an event duration to whole quavers
///
/// Events longer than a third of a quaver get at least one quaver;
/// shorter ones vanish. Returns (quavers, exact quaver count).
pub fn quantize_duration(duration: usize, frames_per_quaver: f64) -> (usize, f64) {
    let exact = duration as f64 / frames_per_quaver;
    let quavers = if exact > 1.0 / 3.0 {
        (exact.round() as usize).max(1)
    } else {
        0
    };
    (quavers, exact)
}

/// Quantize events at one tempo and score the result
///
/// The score multiplies three factors:
/// - quantization scale, 1 minus the power-weighted rounding error per input frame
/// - a linear log likelihood of note lengths, each quaver count x scoring 3 - x/2
/// - overall time error, 1 minus the relative mismatch between output and input length
pub fn quantize_at_tempo(
    events: &[Event],
    bpm: u32,
    frames_per_second: f64,
) -> Result<TempoCandidate, InvalidTempoHypothesis> {
    let last = events.last().ok_or(InvalidTempoHypothesis { bpm })?;
    let total_input_frames = last.end() as f64;
    if total_input_frames == 0.0 {
        return Err(InvalidTempoHypothesis { bpm });
    }

    let fpq = frames_per_quaver(bpm, frames_per_second);
    let mut decoded = Vec::new();
    let mut quaver_counts = Vec::with_capacity(events.len());
    let mut quant_error = 0.0;

    for event in events {
        let (quavers, exact) = quantize_duration(event.duration, fpq);
        decoded.extend(std::iter::repeat(event.pitch).take(quavers));
        quaver_counts.push(quavers);
        quant_error += (exact - quavers as f64).abs() * event.power;
    }

    let nonzero: Vec<usize> = quaver_counts.iter().copied().filter(|&q| q > 0).collect();
    if nonzero.is_empty() {
        return Err(InvalidTempoHypothesis { bpm });
    }

    // Normalized by every event, not just the nonzero ones
    let log_likelihood_approx = nonzero
        .iter()
        .map(|&q| 3.0 - 0.5 * q as f64)
        .sum::<f64>()
        / quaver_counts.len() as f64;

    let quant_scale = 1.0 - quant_error / total_input_frames;
    let total_frame_delta = (fpq * decoded.len() as f64 - total_input_frames).abs();
    let overall_time_error = 1.0 - total_frame_delta / total_input_frames;

    Ok(TempoCandidate {
        decoded,
        score: quant_scale * log_likelihood_approx * overall_time_error,
        tempo: bpm,
        quant_error,
        frames_per_quaver: fpq,
    })
}
