use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::graph::node::midi_note_to_freq;

/*
Note Names
==========

Pitches are stored as MIDI note numbers and written in scientific pitch
notation, which is also how they appear in saved projects:

    note_number = 12 * (octave + 1) + semitone

    C=0 C#=1 D=2 D#=3 E=4 F=5 F#=6 G=7 G#=8 A=9 A#=10 B=11

So C4 (middle C) is 60 and A4 is 69. Flats are accepted on input ("Eb3" is
the same note as "D#3") but names are always printed with sharps.
*/

const NAMES: [&str; 12] = ["C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B"];

/// A pitch on the melodic track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Note(u8);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid note name {0:?}")]
pub struct ParseNoteError(String);

impl Note {
    /// Middle C, the default pitch of every melodic step.
    pub const C4: Note = Note(60);
    pub const A4: Note = Note(69);

    pub fn from_midi(number: u8) -> Option<Self> {
        (number <= 127).then_some(Self(number))
    }

    pub fn midi(self) -> u8 {
        self.0
    }

    pub fn frequency(self) -> f32 {
        midi_note_to_freq(self.0)
    }
}

impl Default for Note {
    fn default() -> Self {
        Self::C4
    }
}

impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let octave = self.0 as i32 / 12 - 1;
        write!(f, "{}{}", NAMES[(self.0 % 12) as usize], octave)
    }
}

impl FromStr for Note {
    type Err = ParseNoteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseNoteError(s.to_string());
        let mut chars = s.trim().chars().peekable();

        let letter = chars.next().ok_or_else(err)?.to_ascii_uppercase();
        let mut semitone: i32 = match letter {
            'C' => 0,
            'D' => 2,
            'E' => 4,
            'F' => 5,
            'G' => 7,
            'A' => 9,
            'B' => 11,
            _ => return Err(err()),
        };

        match chars.peek() {
            Some('#') => {
                semitone += 1;
                chars.next();
            }
            Some('b') => {
                semitone -= 1;
                chars.next();
            }
            _ => {}
        }

        let octave: i32 = chars.collect::<String>().parse().map_err(|_| err())?;
        let number = 12 * (octave + 1) + semitone;

        u8::try_from(number)
            .ok()
            .and_then(Note::from_midi)
            .ok_or_else(err)
    }
}

impl Serialize for Note {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Note {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(serde::de::Error::custom)
    }
}
