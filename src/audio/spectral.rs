// Spectral frame processing
// Turns one PCM window into a compressed autocorrelation frame on linear-MIDI bins

use realfft::num_complex::Complex;
use realfft::{RealFftPlanner, RealToComplex};
use std::sync::Arc;

use crate::audio::ingest::AudioError;
use crate::audio::resample::Resampler;
use crate::config::SignalConfig;

/// Hann window of length n with an (n - 1) denominator
pub fn hann_window(n: usize) -> Vec<f32> {
    if n < 2 {
        return vec![1.0; n];
    }
    let denom = (n - 1) as f32;
    (0..n)
        .map(|i| 0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / denom).cos()))
        .collect()
}

/// Per-window spectral processor
///
/// Steps: Hann window, FFT, cube root of the magnitude, mirrored back to a
/// full real spectrum, a second FFT whose real part is a compressed
/// autocorrelation, then interpolation onto linear-MIDI bins clamped at zero.
pub struct SpectralProcessor {
    window_size: usize,
    hann: Vec<f32>,
    fft: Arc<dyn RealToComplex<f32>>,
    resampler: Resampler,
    input: Vec<f32>,
    spectrum: Vec<Complex<f32>>,
    compressed: Vec<f32>,
    autocorrelation: Vec<Complex<f32>>,
}

impl SpectralProcessor {
    pub fn new(signal: &SignalConfig) -> Result<Self, AudioError> {
        let window_size = signal.window_size;
        let mut planner = RealFftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(window_size);

        Ok(SpectralProcessor {
            window_size,
            hann: hann_window(window_size),
            input: fft.make_input_vec(),
            spectrum: fft.make_output_vec(),
            compressed: fft.make_input_vec(),
            autocorrelation: fft.make_output_vec(),
            fft,
            resampler: Resampler::new(signal)?,
        })
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn sample_rate(&self) -> u32 {
        self.resampler.sample_rate()
    }

    /// Number of bins in every processed frame
    pub fn output_bins(&self) -> usize {
        self.resampler.output_bins()
    }

    /// Switch the input sample rate; no-op if unchanged
    pub fn set_sample_rate(&mut self, sample_rate: u32) -> Result<(), AudioError> {
        self.resampler.set_sample_rate(sample_rate)?;
        Ok(())
    }

    /// Process one window of mono PCM samples
    pub fn process(&mut self, samples: &[f32]) -> Result<Vec<f32>, AudioError> {
        if samples.len() != self.window_size {
            return Err(AudioError::WindowLength {
                expected: self.window_size,
                found: samples.len(),
            });
        }

        for ((dst, &sample), &w) in self.input.iter_mut().zip(samples).zip(&self.hann) {
            *dst = sample * w;
        }
        self.fft.process(&mut self.input, &mut self.spectrum)?;

        // The spectrum of a real signal is symmetric: [DC, A, B, ..., Nyquist, ..., B, A]
        let n = self.window_size;
        for (i, bin) in self.spectrum.iter().enumerate() {
            let magnitude = bin.norm().cbrt();
            self.compressed[i] = magnitude;
            self.compressed[(n - i) % n] = magnitude;
        }

        self.fft
            .process(&mut self.compressed, &mut self.autocorrelation)?;

        let raw: Vec<f32> = self.autocorrelation[..n / 2].iter().map(|c| c.re).collect();
        let mut frame = self.resampler.apply(&raw)?;
        for value in &mut frame {
            *value = value.max(0.0);
        }

        Ok(frame)
    }
}
