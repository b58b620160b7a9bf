// Pitch energy model module
// Pluggable estimators of per-note energy, with a built-in pooled spectrum model

pub mod backend;
pub mod pooled;

pub use backend::{ModelConfig, ModelError, PitchEnergyModel};
pub use pooled::PooledSpectrumModel;
