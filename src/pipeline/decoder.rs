// Melody decoder
// Turns dense per-note energy frames into a quantized melody and its ABC notation

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::config::TranscriberConfig;
use crate::contour::{BeamSearchDecoder, ContourError};
use crate::events::{segment_contour_with_config, SegmentError};
use crate::groove::select_best_tempo_with_config;
use crate::notation::decoded_to_abc;
use crate::pipeline::trace::{Stage, TraceError, TranscriptionTrace};

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Contour decoding failed: {0}")]
    Contour(#[from] ContourError),

    #[error("Failed to write trace: {0}")]
    Trace(#[from] TraceError),
}

/// A successfully decoded melody
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodedAudio {
    /// One MIDI pitch per quaver
    pub midis: Vec<u8>,

    /// Tempo in crotchet BPM
    pub tempo: u32,

    /// Run-length encoded ABC body
    pub abc: String,

    /// Fit score of the winning tempo
    pub score: f64,
}

/// Why a request produced no melody
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum NoMusicReason {
    SilentInput,
    InsufficientEvents { found: usize },
    NoTempoFits,
}

impl fmt::Display for NoMusicReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NoMusicReason::SilentInput => write!(f, "input is silent"),
            NoMusicReason::InsufficientEvents { found } => {
                write!(f, "only {} usable notes", found)
            }
            NoMusicReason::NoTempoFits => write!(f, "no tempo fits the notes"),
        }
    }
}

/// Result of a transcription request
///
/// "No music" is an expected answer, not an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "result", rename_all = "snake_case")]
pub enum TranscriptionOutcome {
    Decoded(DecodedAudio),
    NoMusic(NoMusicReason),
}

impl TranscriptionOutcome {
    pub fn decoded(&self) -> Option<&DecodedAudio> {
        match self {
            TranscriptionOutcome::Decoded(decoded) => Some(decoded),
            TranscriptionOutcome::NoMusic(_) => None,
        }
    }

    pub fn is_music(&self) -> bool {
        self.decoded().is_some()
    }
}

/// Runs sparse extraction, beam search, segmentation, tempo search and
/// ABC encoding over a complete set of dense energy frames
#[derive(Debug, Clone)]
pub struct MelodyDecoder {
    config: TranscriberConfig,
    beam: BeamSearchDecoder,
}

impl MelodyDecoder {
    pub fn new(config: TranscriberConfig) -> Self {
        let beam = BeamSearchDecoder::new(
            config.beam.clone(),
            config.signal.midi_low,
            config.signal.midi_count(),
        );
        MelodyDecoder { config, beam }
    }

    pub fn config(&self) -> &TranscriberConfig {
        &self.config
    }

    /// Decode frames of `signal.midi_count()` energies each, lowest note first
    pub fn decode(&self, frames: &[Vec<f32>]) -> Result<TranscriptionOutcome, DecodeError> {
        self.decode_traced(frames, None)
    }

    /// Decode, writing one trace entry per completed stage
    pub fn decode_traced(
        &self,
        frames: &[Vec<f32>],
        trace: Option<&TranscriptionTrace>,
    ) -> Result<TranscriptionOutcome, DecodeError> {
        let sparse = self.beam.sparsify(frames, &self.config.sparse)?;
        record(
            trace,
            Stage::SparseFrames,
            "Sparse frames extracted",
            serde_json::json!({ "frames": sparse.len() }),
        )?;

        let contour = self.beam.decode(&sparse)?;
        record(
            trace,
            Stage::Contour,
            "Contour decoded",
            serde_json::json!({ "frames": contour.len() }),
        )?;

        let events = match segment_contour_with_config(&contour, &self.config.segment) {
            Ok(events) => events,
            Err(SegmentError::SilentInput) => {
                return no_music(trace, Stage::Segmentation, NoMusicReason::SilentInput);
            }
            Err(SegmentError::InsufficientEvents { found, .. }) => {
                return no_music(
                    trace,
                    Stage::Segmentation,
                    NoMusicReason::InsufficientEvents { found },
                );
            }
        };
        record(
            trace,
            Stage::Segmentation,
            "Events segmented",
            serde_json::json!({ "events": events.len() }),
        )?;

        let fps = self.config.signal.frames_per_second();
        let best = match select_best_tempo_with_config(&events, fps, &self.config.tempo) {
            Some(best) => best,
            None => return no_music(trace, Stage::TempoSearch, NoMusicReason::NoTempoFits),
        };
        record(
            trace,
            Stage::TempoSearch,
            "Tempo selected",
            serde_json::json!({
                "tempo": best.tempo,
                "score": best.score,
                "quant_error": best.quant_error,
            }),
        )?;

        let abc = decoded_to_abc(&best.decoded);
        record(
            trace,
            Stage::Notation,
            "ABC encoded",
            serde_json::json!({ "quavers": best.decoded.len() }),
        )?;

        log::info!(
            "Decoded {} quavers at {} BPM from {} frames",
            best.decoded.len(),
            best.tempo,
            frames.len()
        );

        Ok(TranscriptionOutcome::Decoded(DecodedAudio {
            midis: best.decoded,
            tempo: best.tempo,
            abc,
            score: best.score,
        }))
    }
}

fn record(
    trace: Option<&TranscriptionTrace>,
    stage: Stage,
    message: &str,
    data: serde_json::Value,
) -> Result<(), TraceError> {
    match trace {
        Some(trace) => trace.complete(stage, message, data),
        None => Ok(()),
    }
}

fn no_music(
    trace: Option<&TranscriptionTrace>,
    stage: Stage,
    reason: NoMusicReason,
) -> Result<TranscriptionOutcome, DecodeError> {
    log::info!("No music detected: {}", reason);
    record(
        trace,
        stage,
        "No music detected",
        serde_json::to_value(&reason).unwrap_or(serde_json::Value::Null),
    )?;
    Ok(TranscriptionOutcome::NoMusic(reason))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::trace::read_trace_file;
    use tempfile::TempDir;

    /// 48 frames per second with the default window size
    fn config() -> TranscriberConfig {
        let mut config = TranscriberConfig::default();
        config.signal.sample_rate = 49152;
        config
    }

    /// One-hot frames holding each pitch for `frames_per_note` frames
    fn melody(pitches: &[u8], frames_per_note: usize) -> Vec<Vec<f32>> {
        let config = config();
        pitches
            .iter()
            .flat_map(|&pitch| {
                let mut frame = vec![0.0; config.signal.midi_count()];
                frame[(pitch - config.signal.midi_low) as usize] = 1.0;
                std::iter::repeat(frame).take(frames_per_note)
            })
            .collect()
    }

    #[test]
    fn test_decodes_alternating_melody() {
        let frames = melody(&[60, 62, 60, 62, 60, 62, 60, 62], 12);
        let outcome = MelodyDecoder::new(config()).decode(&frames).unwrap();

        let decoded = outcome.decoded().unwrap();
        assert_eq!(decoded.tempo, 120);
        assert_eq!(decoded.midis, vec![60, 62, 60, 62, 60, 62, 60, 62]);
        assert_eq!(decoded.abc, " C D C D C D C D");
        assert!((decoded.score - 2.5).abs() < 1e-9);
    }

    #[test]
    fn test_silence_is_no_music() {
        let frames = vec![vec![0.0; 48]; 40];
        let outcome = MelodyDecoder::new(config()).decode(&frames).unwrap();
        assert_eq!(
            outcome,
            TranscriptionOutcome::NoMusic(NoMusicReason::SilentInput)
        );
        assert!(!outcome.is_music());
    }

    #[test]
    fn test_too_few_notes_is_no_music() {
        let frames = melody(&[60, 62, 60], 12);
        let outcome = MelodyDecoder::new(config()).decode(&frames).unwrap();
        assert_eq!(
            outcome,
            TranscriptionOutcome::NoMusic(NoMusicReason::InsufficientEvents { found: 3 })
        );
    }

    #[test]
    fn test_no_tempo_fits() {
        let mut config = config();
        config.tempo.min_bpm = 50;
        config.tempo.max_bpm = 50;

        // Six frames is a fifth of a quaver at 50 BPM
        let frames = melody(&[60, 62, 60, 62, 60], 6);
        let outcome = MelodyDecoder::new(config).decode(&frames).unwrap();
        assert_eq!(
            outcome,
            TranscriptionOutcome::NoMusic(NoMusicReason::NoTempoFits)
        );
    }

    #[test]
    fn test_empty_input_is_an_error() {
        let result = MelodyDecoder::new(config()).decode(&[]);
        assert!(matches!(
            result,
            Err(DecodeError::Contour(ContourError::EmptyInput))
        ));
    }

    #[test]
    fn test_wrong_frame_width_is_an_error() {
        let result = MelodyDecoder::new(config()).decode(&[vec![1.0; 12]]);
        assert!(matches!(
            result,
            Err(DecodeError::Contour(ContourError::FrameWidthMismatch {
                frame: 0,
                expected: 48,
                found: 12
            }))
        ));
    }

    #[test]
    fn test_traced_decode_records_every_stage() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("trace.jsonl");
        let trace = TranscriptionTrace::new(path.clone());

        let frames = melody(&[60, 62, 60, 62, 60, 62, 60, 62], 12);
        MelodyDecoder::new(config())
            .decode_traced(&frames, Some(&trace))
            .unwrap();

        let stages: Vec<Stage> = read_trace_file(&path)
            .unwrap()
            .into_iter()
            .map(|entry| entry.stage)
            .collect();
        assert_eq!(
            stages,
            vec![
                Stage::SparseFrames,
                Stage::Contour,
                Stage::Segmentation,
                Stage::TempoSearch,
                Stage::Notation
            ]
        );
    }

    #[test]
    fn test_outcome_serializes_with_status_tag() {
        let outcome = TranscriptionOutcome::NoMusic(NoMusicReason::InsufficientEvents { found: 2 });
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "no_music");
        assert_eq!(json["result"]["reason"], "insufficient_events");
        assert_eq!(json["result"]["found"], 2);
    }
}
