// ABC notation
// Pitch spelling and run-length encoding of a decoded quaver sequence

/// Spellings of the octave starting at MIDI 72 (c)
const BASE_OCTAVE: [&str; 12] = [
    "c", "^c", "d", "^d", "e", "f", "^f", "g", "^g", "a", "^a", "b",
];

const BASE_LOW: u8 = 72;
const BASE_HIGH: u8 = 83;

/// Characters of the contour query alphabet, one per MIDI note from the lowest
const QUERY_ALPHABET: &[u8; 48] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUV";

/// Spell one MIDI pitch in ABC
///
/// Each octave above the base octave adds an apostrophe. Each octave below
/// adds a comma, except that the first one is written by upper-casing.
pub fn midi_to_abc(midi: u8) -> String {
    let mut midi = midi;
    let mut apostrophes = 0;
    let mut commas = 0;

    while midi > BASE_HIGH {
        apostrophes += 1;
        midi -= 12;
    }
    while midi < BASE_LOW {
        commas += 1;
        midi += 12;
    }

    let base = BASE_OCTAVE[(midi - BASE_LOW) as usize];
    let mut abc = if commas >= 1 {
        commas -= 1;
        base.to_uppercase()
    } else {
        base.to_string()
    };

    abc.push_str(&",".repeat(commas));
    abc.push_str(&"'".repeat(apostrophes));
    abc
}

/// Run-length encode a quaver sequence as ABC
///
/// Every run starts with a space and its pitch; runs longer than one quaver
/// are followed by their length.
pub fn decoded_to_abc(decoded: &[u8]) -> String {
    let mut abc = String::new();
    let mut rest = decoded;

    while let Some(&pitch) = rest.first() {
        let run = rest.iter().take_while(|&&m| m == pitch).count();
        abc.push(' ');
        abc.push_str(&midi_to_abc(pitch));
        if run > 1 {
            abc.push_str(&run.to_string());
        }
        rest = &rest[run..];
    }

    abc
}

/// Encode a contour as a query string, one character per value
/// Values outside the 48-note range starting at `midi_low` are skipped
pub fn contour_string(midis: &[u8], midi_low: u8) -> String {
    midis
        .iter()
        .filter_map(|&midi| {
            let offset = midi.checked_sub(midi_low)? as usize;
            QUERY_ALPHABET.get(offset).map(|&c| c as char)
        })
        .collect()
}
