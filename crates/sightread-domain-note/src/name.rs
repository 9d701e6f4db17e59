use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum NoteParseError {
    #[error("empty note name")]
    Empty,
    #[error("unknown note letter: {0}")]
    Letter(char),
    #[error("unknown accidental: {0}")]
    Accidental(String),
}

/// The seven letters of the natural scale, in scale order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Letter {
    C,
    D,
    E,
    F,
    G,
    A,
    B,
}

impl Letter {
    pub const ALL: [Letter; 7] = [
        Letter::C,
        Letter::D,
        Letter::E,
        Letter::F,
        Letter::G,
        Letter::A,
        Letter::B,
    ];

    pub fn index(self) -> u8 {
        self as u8
    }

    pub fn as_char(self) -> char {
        match self {
            Letter::C => 'C',
            Letter::D => 'D',
            Letter::E => 'E',
            Letter::F => 'F',
            Letter::G => 'G',
            Letter::A => 'A',
            Letter::B => 'B',
        }
    }

    fn from_char(c: char) -> Option<Self> {
        let letter = match c.to_ascii_uppercase() {
            'C' => Letter::C,
            'D' => Letter::D,
            'E' => Letter::E,
            'F' => Letter::F,
            'G' => Letter::G,
            'A' => Letter::A,
            'B' => Letter::B,
            _ => return None,
        };
        Some(letter)
    }

    /// Steps between two letters on the wrapping 7-letter scale (0..=3).
    pub fn distance(self, other: Letter) -> u8 {
        let d = (self.index() as i8 - other.index() as i8).rem_euclid(7) as u8;
        d.min(7 - d)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Accidental {
    #[default]
    Natural,
    Sharp,
    Flat,
}

/// Pitch-class spelling such as `C`, `F#` or `Bb`.
///
/// Spelling is significant: `C#` and `Db` are different names.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NoteName {
    pub letter: Letter,
    pub accidental: Accidental,
}

impl NoteName {
    pub const fn natural(letter: Letter) -> Self {
        Self {
            letter,
            accidental: Accidental::Natural,
        }
    }

    pub const fn sharp(letter: Letter) -> Self {
        Self {
            letter,
            accidental: Accidental::Sharp,
        }
    }

    pub const fn flat(letter: Letter) -> Self {
        Self {
            letter,
            accidental: Accidental::Flat,
        }
    }

    pub fn is_accidental(&self) -> bool {
        self.accidental != Accidental::Natural
    }

    /// Letter-scale neighbours, e.g. E/F or B/C (wrapping). Accidentals are ignored.
    pub fn is_adjacent_to(&self, other: &NoteName) -> bool {
        self.letter.distance(other.letter) == 1
    }
}

impl fmt::Display for NoteName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter.as_char())?;
        match self.accidental {
            Accidental::Natural => Ok(()),
            Accidental::Sharp => write!(f, "#"),
            Accidental::Flat => write!(f, "b"),
        }
    }
}

impl FromStr for NoteName {
    type Err = NoteParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let mut chars = s.chars();
        let first = chars.next().ok_or(NoteParseError::Empty)?;
        let letter = Letter::from_char(first).ok_or(NoteParseError::Letter(first))?;
        let accidental = match chars.as_str() {
            "" => Accidental::Natural,
            "#" | "♯" => Accidental::Sharp,
            "b" | "♭" => Accidental::Flat,
            other => return Err(NoteParseError::Accidental(other.to_string())),
        };
        Ok(Self { letter, accidental })
    }
}

impl TryFrom<String> for NoteName {
    type Error = NoteParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<NoteName> for String {
    fn from(value: NoteName) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn letter_distance_wraps() {
        assert_eq!(Letter::B.distance(Letter::C), 1);
        assert_eq!(Letter::C.distance(Letter::B), 1);
        assert_eq!(Letter::C.distance(Letter::G), 3);
        assert_eq!(Letter::E.distance(Letter::E), 0);
    }

    #[test]
    fn every_letter_has_two_natural_neighbours() {
        for (i, letter) in Letter::ALL.iter().enumerate() {
            assert_eq!(letter.index() as usize, i);
            let neighbours = Letter::ALL
                .iter()
                .filter(|other| letter.distance(**other) == 1)
                .count();
            assert_eq!(neighbours, 2, "{letter:?}");
            let name: NoteName = letter.as_char().to_string().parse().unwrap();
            assert_eq!(name, NoteName::natural(*letter));
        }
    }

    #[test]
    fn parse_rejects_unknown_accidental() {
        assert_eq!(
            "Cx".parse::<NoteName>(),
            Err(NoteParseError::Accidental("x".to_string()))
        );
        assert_eq!("".parse::<NoteName>(), Err(NoteParseError::Empty));
        assert_eq!("H".parse::<NoteName>(), Err(NoteParseError::Letter('H')));
    }
}
