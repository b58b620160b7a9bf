// Sparse frame extraction
// Keeps only the few most energetic pitch bins of each dense energy frame

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Orientation of incoming dense frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinOrder {
    /// Index 0 is the lowest pitch
    LowToHigh,
    /// Index 0 is the highest pitch, frames are reversed before extraction
    HighToLow,
}

/// Configuration for sparse frame extraction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SparseConfig {
    /// Maximum number of bins kept per frame
    pub count: usize,

    /// Bins below this fraction of the frame maximum are dropped
    pub relative_floor: f32,

    /// Orientation of the dense frames handed to the extractor
    pub bin_order: BinOrder,
}

impl Default for SparseConfig {
    fn default() -> Self {
        SparseConfig {
            count: 4,
            relative_floor: 0.1,
            bin_order: BinOrder::LowToHigh,
        }
    }
}

/// Top-K pitch bins of one frame
/// Keys are bin offsets from the lowest MIDI note, iteration is ascending
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SparseFrame {
    bins: BTreeMap<usize, f32>,
}

impl SparseFrame {
    /// Energy at a bin, if the bin survived extraction
    pub fn get(&self, bin: usize) -> Option<f32> {
        self.bins.get(&bin).copied()
    }

    pub fn contains(&self, bin: usize) -> bool {
        self.bins.contains_key(&bin)
    }

    /// (bin, energy) pairs in ascending bin order
    pub fn iter(&self) -> impl Iterator<Item = (usize, f32)> + '_ {
        self.bins.iter().map(|(&bin, &energy)| (bin, energy))
    }

    pub fn len(&self) -> usize {
        self.bins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    /// Energy of the strongest bin (0 for an empty frame)
    pub fn max_energy(&self) -> f32 {
        self.bins.values().copied().fold(0.0, f32::max)
    }
}

impl FromIterator<(usize, f32)> for SparseFrame {
    fn from_iter<I: IntoIterator<Item = (usize, f32)>>(iter: I) -> Self {
        SparseFrame {
            bins: iter.into_iter().collect(),
        }
    }
}

/// Extract a sparse frame with the default configuration
pub fn extract_sparse_frame(dense: &[f32]) -> SparseFrame {
    extract_sparse_frame_with_config(dense, &SparseConfig::default())
}

/// Extract a sparse frame with custom configuration
///
/// The strongest bin is always kept. Each of the next `count - 1` strongest
/// bins is kept only if its energy reaches `relative_floor` of the maximum.
/// Ties are broken toward the lower pitch.
pub fn extract_sparse_frame_with_config(dense: &[f32], config: &SparseConfig) -> SparseFrame {
    if dense.is_empty() || config.count == 0 {
        return SparseFrame::default();
    }

    let width = dense.len();
    let bin_of = |index: usize| match config.bin_order {
        BinOrder::LowToHigh => index,
        BinOrder::HighToLow => width - 1 - index,
    };

    let mut ranked: Vec<(usize, f32)> = dense
        .iter()
        .enumerate()
        .map(|(i, &energy)| (bin_of(i), energy.max(0.0)))
        .collect();
    ranked.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(Ordering::Equal)
            .then(a.0.cmp(&b.0))
    });
    ranked.truncate(config.count);

    let max_energy = ranked[0].1;
    let floor = config.relative_floor * max_energy;

    ranked
        .into_iter()
        .enumerate()
        .filter(|(rank, (_, energy))| *rank == 0 || *energy >= floor)
        .map(|(_, entry)| entry)
        .collect()
}

/// Extract sparse frames for a whole sequence, preserving frame order
pub fn extract_sparse_frames(frames: &[Vec<f32>], config: &SparseConfig) -> Vec<SparseFrame> {
    frames
        .iter()
        .map(|frame| extract_sparse_frame_with_config(frame, config))
        .collect()
}
