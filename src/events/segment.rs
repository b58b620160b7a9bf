// Contour segmentation
// Groups a decoded contour into note events and filters out short or dim ones

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::contour::Contour;
use crate::events::types::Event;

#[derive(Debug, Error, PartialEq)]
pub enum SegmentError {
    #[error("Contour carries no energy")]
    SilentInput,

    #[error("Only {found} usable note events, need at least {required}")]
    InsufficientEvents { found: usize, required: usize },
}

/// Configuration for event filtering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentConfig {
    /// Events with power at or below this are dropped
    pub min_power: f64,

    /// Events lasting this many frames or fewer are dropped
    pub min_duration: usize,

    /// Fewest surviving events that still count as music
    pub min_events: usize,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        SegmentConfig {
            min_power: 0.02,
            min_duration: 4,
            min_events: 5,
        }
    }
}

/// Coalesce a contour into events with normalized energy
///
/// Energies are scaled so the average energy per frame over the whole
/// contour is 1.0. Fails with `SilentInput` if the total energy is zero.
pub fn contour_to_events(contour: &Contour) -> Result<Vec<Event>, SegmentError> {
    let total_energy: f64 = contour.energies.iter().map(|&e| e as f64).sum();
    if total_energy == 0.0 {
        return Err(SegmentError::SilentInput);
    }

    let energy_norm = contour.energies.len() as f64 / total_energy;
    let mut events: Vec<Event> = Vec::new();

    for (i, (&pitch, &energy)) in contour.midis.iter().zip(&contour.energies).enumerate() {
        let energy = energy as f64 * energy_norm;
        match events.last_mut() {
            Some(last) if last.pitch == pitch => {
                last.duration += 1;
                last.energy += energy;
            }
            _ => events.push(Event {
                start: i,
                duration: 1,
                pitch,
                energy,
                power: 0.0,
            }),
        }
    }

    for event in &mut events {
        event.power = event.energy / event.duration as f64;
    }

    Ok(events)
}

/// Segment a contour with the default configuration
pub fn segment_contour(contour: &Contour) -> Result<Vec<Event>, SegmentError> {
    segment_contour_with_config(contour, &SegmentConfig::default())
}

/// Segment a contour and keep only events that are long and loud enough
pub fn segment_contour_with_config(
    contour: &Contour,
    config: &SegmentConfig,
) -> Result<Vec<Event>, SegmentError> {
    let events = contour_to_events(contour)?;
    let total = events.len();

    let kept: Vec<Event> = events
        .into_iter()
        .filter(|e| e.power > config.min_power && e.duration > config.min_duration)
        .collect();

    log::debug!("Kept {} of {} events", kept.len(), total);

    if kept.len() < config.min_events {
        return Err(SegmentError::InsufficientEvents {
            found: kept.len(),
            required: config.min_events,
        });
    }

    Ok(kept)
}
