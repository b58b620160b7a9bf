// Notation module
// ABC text, contour query strings and MIDI file export

pub mod abc;
pub mod midi;

pub use abc::{contour_string, decoded_to_abc, midi_to_abc};
pub use midi::{export_midi, MidiExportError, MidiExportOptions};
