// Transcription pipeline module
// Melody decoding, the streaming transcriber, and per-request tracing

pub mod decoder;
pub mod trace;
pub mod transcriber;

pub use decoder::{DecodeError, DecodedAudio, MelodyDecoder, NoMusicReason, TranscriptionOutcome};
pub use trace::{
    read_trace_file, Stage, TraceBuilder, TraceEntry, TraceError, TraceWriter, TranscriptionTrace,
};
pub use transcriber::{TranscribeError, Transcriber};
