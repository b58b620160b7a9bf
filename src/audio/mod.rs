// Audio processing module
// WAV ingestion, spectral frame processing and linear-MIDI resampling

pub mod ingest;
pub mod resample;
pub mod spectral;

pub use ingest::{ingest_wav, ingest_wav_file, AudioData, AudioError};
pub use resample::{
    autocorrelation_bin_midi, generate_coefficients, linear_midi_bins, ResampleCoefficients,
    ResampleError, Resampler,
};
pub use spectral::{hann_window, SpectralProcessor};
