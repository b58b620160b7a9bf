// MIDI Export - Convert decoded melodies to MIDI files using midly crate
// One note per run of equal pitch, each quaver lasting half a beat

use midly::{Header, MetaMessage, MidiMessage, Smf, Timing, Track, TrackEvent, TrackEventKind};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pipeline::decoder::DecodedAudio;

#[derive(Debug, Error)]
pub enum MidiExportError {
    #[error("Nothing to export: decoded sequence is empty")]
    EmptySequence,

    #[error("Invalid tempo: {0} BPM")]
    InvalidTempo(u32),

    #[error("{field} out of range: {value} (allowed {min}-{max})")]
    OutOfRange {
        field: &'static str,
        value: u32,
        min: u32,
        max: u32,
    },

    #[error("Failed to write MIDI: {0}")]
    WriteFailed(String),
}

/// MIDI export options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MidiExportOptions {
    /// Pulses per quarter note (PPQ), must be even so a quaver is whole ticks
    pub ppq: u16,

    /// Include tempo metadata
    pub include_tempo: bool,

    /// Track name, if any
    pub track_name: Option<String>,

    /// MIDI channel (0-15), checked on export
    pub channel: u8,

    /// Note-on velocity (1-127), checked on export
    pub velocity: u8,
}

impl Default for MidiExportOptions {
    fn default() -> Self {
        MidiExportOptions {
            ppq: 480,
            include_tempo: true,
            track_name: Some("Melody".to_string()),
            channel: 0,
            velocity: 96,
        }
    }
}

fn check_range(field: &'static str, value: u32, min: u32, max: u32) -> Result<(), MidiExportError> {
    if value < min || value > max {
        return Err(MidiExportError::OutOfRange {
            field,
            value,
            min,
            max,
        });
    }
    Ok(())
}

/// Export a decoded melody to MIDI file bytes
///
/// Produces a single-track SMF: optional track name and tempo, then one
/// note per run of equal pitch.
pub fn export_midi(
    decoded: &DecodedAudio,
    options: &MidiExportOptions,
) -> Result<Vec<u8>, MidiExportError> {
    if decoded.midis.is_empty() {
        return Err(MidiExportError::EmptySequence);
    }
    if decoded.tempo == 0 {
        return Err(MidiExportError::InvalidTempo(decoded.tempo));
    }
    check_range("ppq", options.ppq as u32, 1, 0x7FFF)?;
    check_range("channel", options.channel as u32, 0, 15)?;
    check_range("velocity", options.velocity as u32, 1, 127)?;
    for &pitch in &decoded.midis {
        check_range("pitch", pitch as u32, 0, 127)?;
    }

    let header = Header {
        format: midly::Format::SingleTrack,
        timing: Timing::Metrical(options.ppq.into()),
    };

    let mut track = Track::new();
    if let Some(name) = &options.track_name {
        add_track_name(&mut track, 0, name);
    }
    if options.include_tempo {
        add_tempo(&mut track, 0, decoded.tempo);
    }

    let ticks_per_quaver = (options.ppq / 2).max(1) as u32;
    let mut events: Vec<(u32, TrackEventKind)> = Vec::new();
    let mut tick = 0u32;

    for (pitch, run) in runs(&decoded.midis) {
        let tick_off = tick + run as u32 * ticks_per_quaver;

        events.push((
            tick,
            TrackEventKind::Midi {
                channel: options.channel.into(),
                message: MidiMessage::NoteOn {
                    key: pitch.into(),
                    vel: options.velocity.into(),
                },
            },
        ));
        events.push((
            tick_off,
            TrackEventKind::Midi {
                channel: options.channel.into(),
                message: MidiMessage::NoteOff {
                    key: pitch.into(),
                    vel: 0.into(),
                },
            },
        ));

        tick = tick_off;
    }

    // Convert to delta times
    let mut last_tick = 0;
    for (tick, kind) in events {
        track.push(TrackEvent {
            delta: tick.saturating_sub(last_tick).into(),
            kind,
        });
        last_tick = tick;
    }

    add_end_of_track(&mut track, 0);

    let smf = Smf {
        header,
        tracks: vec![track],
    };

    let mut bytes = Vec::new();
    smf.write(&mut bytes)
        .map_err(|e| MidiExportError::WriteFailed(e.to_string()))?;

    log::debug!(
        "Exported {} quavers at {} BPM as {} MIDI bytes",
        decoded.midis.len(),
        decoded.tempo,
        bytes.len()
    );

    Ok(bytes)
}

/// (pitch, length) for every run of equal pitch
fn runs(midis: &[u8]) -> Vec<(u8, usize)> {
    let mut runs: Vec<(u8, usize)> = Vec::new();
    for &midi in midis {
        match runs.last_mut() {
            Some((pitch, len)) if *pitch == midi => *len += 1,
            _ => runs.push((midi, 1)),
        }
    }
    runs
}

/// Add track name to track
fn add_track_name<'a>(track: &mut Track<'a>, delta: u32, name: &'a str) {
    track.push(TrackEvent {
        delta: delta.into(),
        kind: TrackEventKind::Meta(MetaMessage::TrackName(name.as_bytes())),
    });
}

/// Add tempo meta message
fn add_tempo(track: &mut Track<'_>, delta: u32, bpm: u32) {
    // Microseconds per quarter note, stored as 24 bits
    let us_per_quarter = (60_000_000 / bpm).min(0x00FF_FFFF);

    track.push(TrackEvent {
        delta: delta.into(),
        kind: TrackEventKind::Meta(MetaMessage::Tempo(us_per_quarter.into())),
    });
}

/// Add end of track message
fn add_end_of_track(track: &mut Track<'_>, delta: u32) {
    track.push(TrackEvent {
        delta: delta.into(),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });
}
