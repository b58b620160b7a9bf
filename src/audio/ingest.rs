// Audio ingestion module
// Reads WAV recordings into normalized samples and splits them into analysis windows

use hound::{SampleFormat, WavReader};
use std::io::{Cursor, Read};
use std::path::Path;
use thiserror::Error;

use crate::audio::resample::ResampleError;

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("Failed to read WAV file: {0}")]
    WavReadError(#[from] hound::Error),

    #[error("Failed to open audio file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),

    #[error("FFT failed: {0}")]
    FftError(#[from] realfft::FftError),

    #[error("Resampling failed: {0}")]
    ResampleError(#[from] ResampleError),

    #[error("Window has {found} samples, expected {expected}")]
    WindowLength { expected: usize, found: usize },

    #[error("Invalid audio data")]
    InvalidData,
}

#[derive(Debug, Clone)]
pub struct AudioData {
    /// Interleaved samples normalized to f32 in range [-1.0, 1.0]
    pub samples: Vec<f32>,

    /// Sample rate in Hz (e.g., 44100, 48000)
    pub sample_rate: u32,

    /// Number of channels (1 = mono, 2 = stereo)
    pub channels: u16,

    /// Bit depth of the source file (8, 16, 24, 32)
    pub bit_depth: u16,

    /// Total number of frames (samples / channels)
    pub frame_count: usize,
}

impl AudioData {
    /// Duration in seconds
    pub fn duration_secs(&self) -> f64 {
        self.frame_count as f64 / self.sample_rate as f64
    }

    /// Convert to mono by averaging channels
    pub fn to_mono(&self) -> Vec<f32> {
        if self.channels <= 1 {
            return self.samples.clone();
        }

        self.samples
            .chunks_exact(self.channels as usize)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect()
    }

    /// Consecutive non-overlapping mono windows in arrival order
    /// A trailing partial window is discarded
    pub fn windows(&self, window_size: usize) -> Vec<Vec<f32>> {
        if window_size == 0 {
            return Vec::new();
        }

        self.to_mono()
            .chunks_exact(window_size)
            .map(|chunk| chunk.to_vec())
            .collect()
    }
}

/// Ingest a WAV file from raw bytes
pub fn ingest_wav(data: &[u8]) -> Result<AudioData, AudioError> {
    read_wav(WavReader::new(Cursor::new(data))?)
}

/// Ingest a WAV file from disk
pub fn ingest_wav_file(path: &Path) -> Result<AudioData, AudioError> {
    let bytes = std::fs::read(path)?;
    let audio = ingest_wav(&bytes)?;
    log::info!(
        "Loaded {} ({} Hz, {} ch, {:.2}s)",
        path.display(),
        audio.sample_rate,
        audio.channels,
        audio.duration_secs()
    );
    Ok(audio)
}

fn read_wav<R: Read>(mut reader: WavReader<R>) -> Result<AudioData, AudioError> {
    let spec = reader.spec();
    if spec.channels == 0 {
        return Err(AudioError::InvalidData);
    }

    let samples: Vec<f32> = match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Int, bits @ (8 | 16 | 24 | 32)) => {
            // Signed full scale for the bit depth
            let scale = (1u64 << (bits - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()?
        }
        (SampleFormat::Float, 32) => reader.samples::<f32>().collect::<Result<_, _>>()?,
        (format, bits) => {
            return Err(AudioError::UnsupportedFormat(format!(
                "{:?} {}-bit audio",
                format, bits
            )));
        }
    };

    let frame_count = samples.len() / spec.channels as usize;

    Ok(AudioData {
        samples,
        sample_rate: spec.sample_rate,
        channels: spec.channels,
        bit_depth: spec.bits_per_sample,
        frame_count,
    })
}
