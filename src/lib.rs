// Tunescribe - Monophonic melody transcription
// Module declarations

pub mod audio;
pub mod config;
pub mod contour;
pub mod events;
pub mod groove;
pub mod model;
pub mod notation;
pub mod pipeline;

pub use config::{load_config, ConfigError, SignalConfig, TranscriberConfig};
pub use model::{PitchEnergyModel, PooledSpectrumModel};
pub use pipeline::{
    DecodeError, DecodedAudio, MelodyDecoder, NoMusicReason, TranscribeError, Transcriber,
    TranscriptionOutcome, TranscriptionTrace,
};
