// Melody event types
// A note event is a maximal run of frames sharing one contour pitch

use serde::{Deserialize, Serialize};

/// A run of identical pitch in the decoded contour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Index of the first frame of the run
    pub start: usize,

    /// Length of the run in frames
    pub duration: usize,

    /// MIDI pitch of the run
    pub pitch: u8,

    /// Sum of the normalized frame energies over the run
    /// Normalization makes the average energy per frame 1.0 across the contour
    pub energy: f64,

    /// Average normalized energy per frame (energy / duration)
    pub power: f64,
}

impl Event {
    /// Index one past the last frame of the run
    pub fn end(&self) -> usize {
        self.start + self.duration
    }
}
