use crate::name::{Letter, NoteName};
use serde::{Deserialize, Serialize};

/// `global_index` of a note heard live rather than taken from a sequence.
pub const LIVE_INDEX: i64 = -1;

pub const A4_MIDI: u8 = 69;
pub const A4_HZ: f64 = 440.0;

/// Pitch-class table for one octave, starting at C.
pub const NOTE_NAMES: [NoteName; 12] = [
    NoteName::natural(Letter::C),
    NoteName::sharp(Letter::C),
    NoteName::natural(Letter::D),
    NoteName::sharp(Letter::D),
    NoteName::natural(Letter::E),
    NoteName::natural(Letter::F),
    NoteName::sharp(Letter::F),
    NoteName::natural(Letter::G),
    NoteName::sharp(Letter::G),
    NoteName::natural(Letter::A),
    NoteName::sharp(Letter::A),
    NoteName::natural(Letter::B),
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NoteDuration {
    Whole,
    Half,
    Quarter,
    Eighth,
    Sixteenth,
}

impl NoteDuration {
    /// Length in quarter-note beats.
    pub fn beats(self) -> f32 {
        match self {
            NoteDuration::Whole => 4.0,
            NoteDuration::Half => 2.0,
            NoteDuration::Quarter => 1.0,
            NoteDuration::Eighth => 0.5,
            NoteDuration::Sixteenth => 0.25,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub name: NoteName,
    pub octave: i32,
    pub midi: u8,
    pub frequency: f64,
    pub global_index: i64,
    pub duration: Option<NoteDuration>,
}

impl Note {
    pub fn is_live(&self) -> bool {
        self.global_index == LIVE_INDEX
    }
}

/// Build a note from its MIDI number. Callers keep `midi` within 0..=127.
pub fn create_note_from_midi(midi: u8, global_index: i64, duration: Option<NoteDuration>) -> Note {
    Note {
        name: NOTE_NAMES[(midi % 12) as usize],
        octave: (midi / 12) as i32 - 1,
        midi,
        frequency: midi_to_frequency(midi),
        global_index,
        duration,
    }
}

pub fn midi_to_frequency(midi: u8) -> f64 {
    A4_HZ * 2f64.powf((midi as f64 - A4_MIDI as f64) / 12.0)
}

/// Nearest MIDI number for `frequency_hz`; may fall outside 0..=127.
pub fn frequency_to_midi(frequency_hz: f64) -> i32 {
    (12.0 * (frequency_hz / A4_HZ).log2() + A4_MIDI as f64).round() as i32
}
