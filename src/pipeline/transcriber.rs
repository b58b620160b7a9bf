// Streaming transcriber
// Accumulates spectral frames from PCM windows and decodes them on demand

use thiserror::Error;

use crate::audio::{AudioData, AudioError, SpectralProcessor};
use crate::config::{ConfigError, TranscriberConfig};
use crate::model::{ModelError, PitchEnergyModel, PooledSpectrumModel};
use crate::pipeline::decoder::{DecodeError, MelodyDecoder, TranscriptionOutcome};
use crate::pipeline::trace::{Stage, TraceError, TranscriptionTrace};

#[derive(Debug, Error)]
pub enum TranscribeError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Audio processing failed: {0}")]
    Audio(#[from] AudioError),

    #[error("Pitch model failed: {0}")]
    Model(#[from] ModelError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("Frame {found} arrived out of order, expected frame {expected}")]
    OutOfOrder { expected: usize, found: usize },

    #[error("Cannot switch from {current} Hz to {requested} Hz with {frames} frames pending")]
    RateChangedMidSession {
        current: u32,
        requested: u32,
        frames: usize,
    },
}

impl From<TraceError> for TranscribeError {
    fn from(e: TraceError) -> Self {
        TranscribeError::Decode(DecodeError::Trace(e))
    }
}

/// One transcription session
///
/// Frames are fed in arrival order and held until `transcribe` runs the
/// model and the melody decoder over all of them.
pub struct Transcriber {
    config: TranscriberConfig,
    processor: SpectralProcessor,
    model: Box<dyn PitchEnergyModel>,
    spectrogram: Vec<Vec<f32>>,
}

impl Transcriber {
    /// Create a transcriber using the built-in pooled spectrum model
    pub fn new(config: TranscriberConfig) -> Result<Self, TranscribeError> {
        let model = PooledSpectrumModel::new(config.model.clone());
        Self::with_model(config, Box::new(model))
    }

    /// Create a transcriber around any pitch energy model
    pub fn with_model(
        config: TranscriberConfig,
        model: Box<dyn PitchEnergyModel>,
    ) -> Result<Self, TranscribeError> {
        config.validate()?;
        let processor = SpectralProcessor::new(&config.signal)?;

        log::debug!(
            "Transcriber ready: {} Hz, window {}, model {}",
            config.signal.sample_rate,
            config.signal.window_size,
            model.name()
        );

        Ok(Transcriber {
            config,
            processor,
            model,
            spectrogram: Vec::new(),
        })
    }

    pub fn config(&self) -> &TranscriberConfig {
        &self.config
    }

    pub fn sample_rate(&self) -> u32 {
        self.processor.sample_rate()
    }

    /// Switch the input sample rate
    /// Only allowed while no frames are pending; the same rate is a no-op
    pub fn set_sample_rate(&mut self, sample_rate: u32) -> Result<(), TranscribeError> {
        let current = self.processor.sample_rate();
        if sample_rate != current && !self.spectrogram.is_empty() {
            return Err(TranscribeError::RateChangedMidSession {
                current,
                requested: sample_rate,
                frames: self.spectrogram.len(),
            });
        }
        self.processor.set_sample_rate(sample_rate)?;
        Ok(())
    }

    /// Process one window of `window_size` mono samples
    pub fn feed_pcm_window(&mut self, window: &[f32]) -> Result<(), TranscribeError> {
        let frame = self.processor.process(window)?;
        self.spectrogram.push(frame);
        Ok(())
    }

    /// Feed an already processed spectral frame with its sequence index
    pub fn feed_spectral_frame(
        &mut self,
        index: usize,
        frame: Vec<f32>,
    ) -> Result<(), TranscribeError> {
        if index != self.spectrogram.len() {
            return Err(TranscribeError::OutOfOrder {
                expected: self.spectrogram.len(),
                found: index,
            });
        }
        if frame.len() != self.processor.output_bins() {
            return Err(AudioError::WindowLength {
                expected: self.processor.output_bins(),
                found: frame.len(),
            }
            .into());
        }
        self.spectrogram.push(frame);
        Ok(())
    }

    /// Split a mono signal into consecutive windows and feed them all
    /// A trailing partial window is discarded. Returns the windows fed.
    pub fn feed_pcm_signal(&mut self, samples: &[f32]) -> Result<usize, TranscribeError> {
        let mut fed = 0;
        for window in samples.chunks_exact(self.processor.window_size()) {
            self.feed_pcm_window(window)?;
            fed += 1;
        }
        log::debug!("Fed {} windows ({} total)", fed, self.spectrogram.len());
        Ok(fed)
    }

    /// Feed a whole recording at its own sample rate
    pub fn feed_audio(&mut self, audio: &AudioData) -> Result<usize, TranscribeError> {
        self.set_sample_rate(audio.sample_rate)?;

        let windows = audio.windows(self.processor.window_size());
        for window in &windows {
            self.feed_pcm_window(window)?;
        }
        log::debug!(
            "Fed {} windows of {:.2}s recording",
            windows.len(),
            audio.duration_secs()
        );
        Ok(windows.len())
    }

    pub fn frames_fed(&self) -> usize {
        self.spectrogram.len()
    }

    /// Drop all frames fed so far
    pub fn flush(&mut self) {
        self.spectrogram.clear();
    }

    /// Decode everything fed so far, then flush
    pub fn transcribe(&mut self) -> Result<TranscriptionOutcome, TranscribeError> {
        self.transcribe_traced(None)
    }

    pub fn transcribe_traced(
        &mut self,
        trace: Option<&TranscriptionTrace>,
    ) -> Result<TranscriptionOutcome, TranscribeError> {
        let spectrogram = std::mem::take(&mut self.spectrogram);

        // Frame rate follows the rate the audio was actually fed at
        let mut config = self.config.clone();
        config.signal.sample_rate = self.processor.sample_rate();

        let energies = self.model.infer(&spectrogram, &config.signal)?;
        log::debug!(
            "Model {} produced {} energy frames",
            self.model.name(),
            energies.len()
        );
        if let Some(trace) = trace {
            trace.complete(
                Stage::Features,
                "Pitch energies estimated",
                serde_json::json!({
                    "frames": energies.len(),
                    "model": self.model.name(),
                    "sample_rate": config.signal.sample_rate,
                }),
            )?;
        }

        let outcome = MelodyDecoder::new(config).decode_traced(&energies, trace)?;
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SignalConfig;
    use crate::contour::ContourError;

    /// Returns fixed energy frames regardless of input
    struct FixedModel {
        frames: Vec<Vec<f32>>,
    }

    impl PitchEnergyModel for FixedModel {
        fn name(&self) -> &str {
            "fixed"
        }

        fn infer(
            &self,
            _spectrogram: &[Vec<f32>],
            _signal: &SignalConfig,
        ) -> Result<Vec<Vec<f32>>, ModelError> {
            Ok(self.frames.clone())
        }
    }

    fn assert_send<T: Send>() {}

    #[test]
    fn test_transcriber_is_send() {
        assert_send::<Transcriber>();
    }

    #[test]
    fn test_rejects_invalid_config() {
        let mut config = TranscriberConfig::default();
        config.signal.window_size = 1000;
        assert!(matches!(
            Transcriber::new(config),
            Err(TranscribeError::Config(_))
        ));
    }

    #[test]
    fn test_feed_signal_drops_partial_window() {
        let mut transcriber = Transcriber::new(TranscriberConfig::default()).unwrap();
        let fed = transcriber.feed_pcm_signal(&vec![0.0; 1024 * 3 + 100]).unwrap();

        assert_eq!(fed, 3);
        assert_eq!(transcriber.frames_fed(), 3);

        transcriber.flush();
        assert_eq!(transcriber.frames_fed(), 0);
    }

    #[test]
    fn test_feed_window_checks_length() {
        let mut transcriber = Transcriber::new(TranscriberConfig::default()).unwrap();
        assert!(matches!(
            transcriber.feed_pcm_window(&[0.0; 512]),
            Err(TranscribeError::Audio(AudioError::WindowLength {
                expected: 1024,
                found: 512
            }))
        ));
    }

    #[test]
    fn test_spectral_frames_must_arrive_in_order() {
        let mut transcriber = Transcriber::new(TranscriberConfig::default()).unwrap();
        transcriber.feed_spectral_frame(0, vec![0.0; 144]).unwrap();

        assert!(matches!(
            transcriber.feed_spectral_frame(2, vec![0.0; 144]),
            Err(TranscribeError::OutOfOrder {
                expected: 1,
                found: 2
            })
        ));
        assert!(transcriber.feed_spectral_frame(1, vec![0.0; 10]).is_err());
        assert_eq!(transcriber.frames_fed(), 1);
    }

    #[test]
    fn test_transcribe_without_frames_is_an_error() {
        let mut transcriber = Transcriber::new(TranscriberConfig::default()).unwrap();
        assert!(matches!(
            transcriber.transcribe(),
            Err(TranscribeError::Decode(DecodeError::Contour(
                ContourError::EmptyInput
            )))
        ));
    }

    #[test]
    fn test_silent_signal_is_no_music_and_flushes() {
        let mut transcriber = Transcriber::new(TranscriberConfig::default()).unwrap();
        transcriber.feed_pcm_signal(&vec![0.0; 1024 * 20]).unwrap();

        let outcome = transcriber.transcribe().unwrap();
        assert!(!outcome.is_music());
        assert_eq!(transcriber.frames_fed(), 0);
    }

    #[test]
    fn test_custom_model_uses_fed_sample_rate() {
        // 49152 Hz over 1024-sample windows is 48 frames per second
        let frames: Vec<Vec<f32>> = [60u8, 62, 60, 62, 60, 62, 60, 62]
            .iter()
            .flat_map(|&pitch| {
                let mut frame = vec![0.0; 48];
                frame[(pitch - 48) as usize] = 1.0;
                std::iter::repeat(frame).take(12)
            })
            .collect();

        let mut transcriber = Transcriber::with_model(
            TranscriberConfig::default(),
            Box::new(FixedModel { frames }),
        )
        .unwrap();
        transcriber.set_sample_rate(49152).unwrap();
        transcriber.feed_pcm_window(&[0.0; 1024]).unwrap();

        let outcome = transcriber.transcribe().unwrap();
        let decoded = outcome.decoded().unwrap();
        assert_eq!(decoded.tempo, 120);
        assert_eq!(decoded.abc, " C D C D C D C D");
    }

    #[test]
    fn test_rate_change_with_pending_frames_is_rejected() {
        let mut transcriber = Transcriber::new(TranscriberConfig::default()).unwrap();
        transcriber.set_sample_rate(49152).unwrap();
        transcriber.feed_pcm_signal(&vec![0.0; 1024 * 4]).unwrap();

        // Same rate is still fine
        transcriber.set_sample_rate(49152).unwrap();

        assert!(matches!(
            transcriber.set_sample_rate(24576),
            Err(TranscribeError::RateChangedMidSession {
                current: 49152,
                requested: 24576,
                frames: 4
            })
        ));
        assert_eq!(transcriber.sample_rate(), 49152);
        assert_eq!(transcriber.frames_fed(), 4);

        transcriber.flush();
        transcriber.set_sample_rate(24576).unwrap();
        assert_eq!(transcriber.sample_rate(), 24576);
    }

    #[test]
    fn test_second_recording_at_other_rate_is_rejected() {
        let audio = |sample_rate| AudioData {
            samples: vec![0.0; 2048],
            sample_rate,
            channels: 1,
            bit_depth: 16,
            frame_count: 2048,
        };

        let mut transcriber = Transcriber::new(TranscriberConfig::default()).unwrap();
        assert_eq!(transcriber.feed_audio(&audio(48000)).unwrap(), 2);
        assert!(matches!(
            transcriber.feed_audio(&audio(44100)),
            Err(TranscribeError::RateChangedMidSession { frames: 2, .. })
        ));
        assert_eq!(transcriber.frames_fed(), 2);
    }

    #[test]
    fn test_pending_frames_keep_their_frame_rate() {
        let frames: Vec<Vec<f32>> = [60u8, 62, 60, 62, 60, 62, 60, 62]
            .iter()
            .flat_map(|&pitch| {
                let mut frame = vec![0.0; 48];
                frame[(pitch - 48) as usize] = 1.0;
                std::iter::repeat(frame).take(12)
            })
            .collect();

        let mut transcriber = Transcriber::with_model(
            TranscriberConfig::default(),
            Box::new(FixedModel { frames }),
        )
        .unwrap();
        transcriber.set_sample_rate(49152).unwrap();
        transcriber.feed_pcm_signal(&vec![0.0; 1024 * 96]).unwrap();
        assert!(transcriber.set_sample_rate(24576).is_err());

        let outcome = transcriber.transcribe().unwrap();
        assert_eq!(outcome.decoded().unwrap().tempo, 120);
    }

    /// Backend that always fails, like a network that could not load
    struct BrokenModel;

    impl PitchEnergyModel for BrokenModel {
        fn name(&self) -> &str {
            "broken"
        }

        fn infer(
            &self,
            _spectrogram: &[Vec<f32>],
            _signal: &SignalConfig,
        ) -> Result<Vec<Vec<f32>>, ModelError> {
            Err(ModelError::Backend("weights not loaded".to_string()))
        }
    }

    #[test]
    fn test_model_backend_failure_is_reported() {
        let mut transcriber =
            Transcriber::with_model(TranscriberConfig::default(), Box::new(BrokenModel)).unwrap();
        transcriber.feed_pcm_window(&[0.0; 1024]).unwrap();

        let result = transcriber.transcribe();
        assert!(matches!(
            result,
            Err(TranscribeError::Model(ModelError::Backend(ref reason))) if reason == "weights not loaded"
        ));
        assert_eq!(transcriber.frames_fed(), 0);
    }
}
