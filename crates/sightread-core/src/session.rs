use crate::hints::{AdaptiveHints, MistakeInfo};
use rand::Rng;
use sightread_domain_note::{create_note_from_midi, Note, NoteDuration};
use std::collections::VecDeque;
use std::sync::Arc;

#[derive(Clone, Debug, PartialEq)]
pub enum Judgement {
    Correct { note: Note, streak: u32 },
    Mistake { expected: Note, played: Note },
    Finished,
}

/// Random quarter-note sequence within `low..=high` (MIDI numbers).
pub fn random_sequence<R: Rng>(rng: &mut R, len: usize, low: u8, high: u8) -> Vec<Note> {
    let (low, high) = (low.min(high).min(127), low.max(high).min(127));
    (0..len)
        .map(|i| {
            let midi = rng.gen_range(low..=high);
            create_note_from_midi(midi, i as i64, Some(NoteDuration::Quarter))
        })
        .collect()
}

/// Judges played notes against an expected sequence and feeds the hints engine.
pub struct PracticeSession {
    expected: VecDeque<Note>,
    streak: u32,
    correct: usize,
    mistakes: usize,
    hints: Arc<AdaptiveHints>,
}

impl PracticeSession {
    pub fn new(sequence: Vec<Note>, hints: Arc<AdaptiveHints>) -> Self {
        Self {
            expected: sequence.into(),
            streak: 0,
            correct: 0,
            mistakes: 0,
            hints,
        }
    }

    pub fn current(&self) -> Option<&Note> {
        self.expected.front()
    }

    pub fn streak(&self) -> u32 {
        self.streak
    }

    pub fn correct(&self) -> usize {
        self.correct
    }

    pub fn mistakes(&self) -> usize {
        self.mistakes
    }

    pub fn is_finished(&self) -> bool {
        self.expected.is_empty()
    }

    /// Judge one played MIDI note. A wrong note keeps the same target.
    pub fn play(&mut self, midi: u8) -> Judgement {
        let Some(expected) = self.expected.front().cloned() else {
            return Judgement::Finished;
        };

        if expected.midi == midi {
            self.expected.pop_front();
            self.streak += 1;
            self.correct += 1;
            self.hints.on_practice_update(self.streak, None);
            Judgement::Correct {
                note: expected,
                streak: self.streak,
            }
        } else {
            let played = create_note_from_midi(midi, expected.global_index, None);
            self.streak = 0;
            self.mistakes += 1;
            self.hints
                .on_practice_update(0, Some(MistakeInfo::new(expected.name, played.name)));
            Judgement::Mistake { expected, played }
        }
    }
}
