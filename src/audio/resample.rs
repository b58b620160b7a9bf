// Linear-MIDI resampling of autocorrelation frames
// Maps raw autocorrelation bins onto evenly spaced MIDI sub-bins by 2-tap interpolation

use thiserror::Error;

use crate::config::SignalConfig;

#[derive(Debug, Error, PartialEq)]
pub enum ResampleError {
    #[error("Sample rate must be non-zero")]
    InvalidSampleRate,

    #[error("Output bin {bin} (MIDI {midi:.2}) is below the lowest usable autocorrelation bin")]
    TargetTooLow { bin: usize, midi: f64 },

    #[error("Output bin {bin} (MIDI {midi:.2}) is above the highest autocorrelation bin")]
    TargetTooHigh { bin: usize, midi: f64 },

    #[error("Interpolation weights out of range for bin {bin}: {lo_weight}, {hi_weight}")]
    InvalidWeights {
        bin: usize,
        lo_weight: f64,
        hi_weight: f64,
    },

    #[error("Raw frame has {found} bins, expected {expected}")]
    FrameLength { expected: usize, found: usize },
}

/// Interpolation coefficients, one entry per output bin
#[derive(Debug, Clone, PartialEq)]
pub struct ResampleCoefficients {
    /// Raw bin just below the target pitch
    pub lo_index: Vec<usize>,

    /// Raw bin just above the target pitch (always lo_index - 1)
    pub hi_index: Vec<usize>,

    pub lo_weight: Vec<f32>,
    pub hi_weight: Vec<f32>,
}

impl ResampleCoefficients {
    pub fn len(&self) -> usize {
        self.lo_index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lo_index.is_empty()
    }
}

/// MIDI value of every output bin, ascending
///
/// Sub-bins are centred on each note, so the first bins sit slightly
/// below `midi_low`.
pub fn linear_midi_bins(signal: &SignalConfig) -> Vec<f64> {
    let width = 1.0 / signal.bins_per_midi as f64;
    let offset = (signal.bins_per_midi / 2) as f64;

    (0..signal.spectrum_bins())
        .map(|i| signal.midi_low as f64 + (i as f64 - offset) * width)
        .collect()
}

/// MIDI value of an autocorrelation lag, whose frequency is sample_rate / lag
/// Lag 0 (DC) is treated as lag 1
pub fn autocorrelation_bin_midi(lag: usize, sample_rate: u32) -> f64 {
    let lag = lag.max(1) as f64;
    69.0 + 12.0 * (sample_rate as f64 / (440.0 * lag)).log2()
}

/// Compute interpolation coefficients for a sample rate
pub fn generate_coefficients(
    sample_rate: u32,
    signal: &SignalConfig,
) -> Result<ResampleCoefficients, ResampleError> {
    if sample_rate == 0 {
        return Err(ResampleError::InvalidSampleRate);
    }

    let raw_len = signal.window_size / 2;
    // Decreasing in lag
    let raw_midis: Vec<f64> = (0..raw_len)
        .map(|lag| autocorrelation_bin_midi(lag, sample_rate))
        .collect();
    let lowest_usable = raw_midis
        .get(raw_len.saturating_sub(2))
        .copied()
        .unwrap_or(f64::INFINITY);

    let targets = linear_midi_bins(signal);
    let mut coefficients = ResampleCoefficients {
        lo_index: Vec::with_capacity(targets.len()),
        hi_index: Vec::with_capacity(targets.len()),
        lo_weight: Vec::with_capacity(targets.len()),
        hi_weight: Vec::with_capacity(targets.len()),
    };

    for (bin, &target) in targets.iter().enumerate() {
        if target < lowest_usable {
            return Err(ResampleError::TargetTooLow { bin, midi: target });
        }

        let lo = match raw_midis.iter().position(|&midi| target > midi) {
            Some(lo) if lo > 0 => lo,
            _ => return Err(ResampleError::TargetTooHigh { bin, midi: target }),
        };
        let hi = lo - 1;

        let delta = raw_midis[hi] - raw_midis[lo];
        let lo_weight = (raw_midis[hi] - target) / delta;
        let hi_weight = (target - raw_midis[lo]) / delta;

        if !(0.0..=1.0).contains(&lo_weight) || !(0.0..=1.0).contains(&hi_weight) {
            return Err(ResampleError::InvalidWeights {
                bin,
                lo_weight,
                hi_weight,
            });
        }

        coefficients.lo_index.push(lo);
        coefficients.hi_index.push(hi);
        coefficients.lo_weight.push(lo_weight as f32);
        coefficients.hi_weight.push(hi_weight as f32);
    }

    Ok(coefficients)
}

/// Resampler bound to one sample rate at a time
#[derive(Debug, Clone)]
pub struct Resampler {
    signal: SignalConfig,
    sample_rate: u32,
    coefficients: ResampleCoefficients,
}

impl Resampler {
    /// Build a resampler for the configured nominal sample rate
    pub fn new(signal: &SignalConfig) -> Result<Self, ResampleError> {
        let coefficients = generate_coefficients(signal.sample_rate, signal)?;
        Ok(Resampler {
            signal: signal.clone(),
            sample_rate: signal.sample_rate,
            coefficients,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn coefficients(&self) -> &ResampleCoefficients {
        &self.coefficients
    }

    /// Number of raw autocorrelation bins expected per frame
    pub fn input_bins(&self) -> usize {
        self.signal.window_size / 2
    }

    /// Number of linear-MIDI bins produced per frame
    pub fn output_bins(&self) -> usize {
        self.coefficients.len()
    }

    /// Recompute coefficients for a new sample rate
    /// Returns false (and does nothing) if the rate is unchanged
    pub fn set_sample_rate(&mut self, sample_rate: u32) -> Result<bool, ResampleError> {
        if sample_rate == self.sample_rate {
            return Ok(false);
        }

        self.coefficients = generate_coefficients(sample_rate, &self.signal)?;
        self.sample_rate = sample_rate;
        log::info!("Updated resampling coefficients for {} Hz", sample_rate);
        Ok(true)
    }

    /// Interpolate one raw autocorrelation frame onto the linear-MIDI bins
    pub fn apply(&self, raw: &[f32]) -> Result<Vec<f32>, ResampleError> {
        if raw.len() < self.input_bins() {
            return Err(ResampleError::FrameLength {
                expected: self.input_bins(),
                found: raw.len(),
            });
        }

        let c = &self.coefficients;
        Ok((0..c.len())
            .map(|i| c.lo_weight[i] * raw[c.lo_index[i]] + c.hi_weight[i] * raw[c.hi_index[i]])
            .collect())
    }
}
