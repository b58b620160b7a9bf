// Pitch contour module
// Sparse frame extraction and beam search decoding of a MIDI contour

pub mod beam;
pub mod search;
pub mod sparse;
pub mod transition;

pub use beam::{Beam, BeamCandidate};
pub use search::{BeamConfig, BeamSearchDecoder, Contour, ContourError};
pub use sparse::{
    extract_sparse_frame, extract_sparse_frame_with_config, extract_sparse_frames, BinOrder,
    SparseConfig, SparseFrame,
};
pub use transition::{interval_likelihood, transition_likelihood};
