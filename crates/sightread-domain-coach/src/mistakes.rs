use serde::{Deserialize, Serialize};
use sightread_domain_note::NoteName;
use sightread_ports::clock::{Clock, SystemClock};
use sightread_ports::types::Millis;
use std::collections::VecDeque;
use std::sync::Arc;

pub const MISTAKE_CAPACITY: usize = 10;

const ACCIDENTAL_MIN: usize = 3;
const PAIR_MIN: usize = 2;
const ADJACENT_MIN: usize = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MistakeEntry {
    pub expected: NoteName,
    pub played: NoteName,
    pub timestamp_ms: Millis,
}

/// An unordered {a, b} confusion, spelled in the order it was first seen.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Confusion {
    pub note_a: NoteName,
    pub note_b: NoteName,
    pub count: usize,
}

impl Confusion {
    fn matches(&self, x: NoteName, y: NoteName) -> bool {
        (self.note_a == x && self.note_b == y) || (self.note_a == y && self.note_b == x)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteErrorCount {
    pub note: NoteName,
    pub count: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Pattern {
    Accidentals {
        count: usize,
    },
    NotePair {
        note_a: NoteName,
        note_b: NoteName,
        count: usize,
    },
    Adjacent {
        count: usize,
    },
}

/// Ring buffer of the last `MISTAKE_CAPACITY` (expected, played) mistakes.
pub struct MistakeTracker {
    entries: VecDeque<MistakeEntry>,
    clock: Arc<dyn Clock>,
}

impl MistakeTracker {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock::new()))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: VecDeque::with_capacity(MISTAKE_CAPACITY),
            clock,
        }
    }

    pub fn add_mistake(&mut self, expected: NoteName, played: NoteName) {
        if self.entries.len() >= MISTAKE_CAPACITY {
            self.entries.pop_front();
        }
        self.entries.push_back(MistakeEntry {
            expected,
            played,
            timestamp_ms: self.clock.now_ms(),
        });
    }

    pub fn entries(&self) -> impl Iterator<Item = &MistakeEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Most frequent unordered pairs; ties keep discovery order.
    pub fn top_confusions(&self, limit: usize) -> Vec<Confusion> {
        let mut groups = self.confusions();
        groups.sort_by(|a, b| b.count.cmp(&a.count));
        groups.truncate(limit);
        groups
    }

    /// Expected notes ranked by how often they were missed.
    pub fn difficult_notes(&self, limit: usize) -> Vec<NoteErrorCount> {
        let mut groups: Vec<NoteErrorCount> = Vec::new();
        for entry in &self.entries {
            match groups.iter_mut().find(|g| g.note == entry.expected) {
                Some(group) => group.count += 1,
                None => groups.push(NoteErrorCount {
                    note: entry.expected,
                    count: 1,
                }),
            }
        }
        groups.sort_by(|a, b| b.count.cmp(&a.count));
        groups.truncate(limit);
        groups
    }

    /// Checks run in priority order: accidentals, repeated pair, adjacent letters.
    pub fn detect_patterns(&self) -> Option<Pattern> {
        if self.entries.len() < 2 {
            return None;
        }

        let accidentals = self
            .entries
            .iter()
            .filter(|e| e.expected.is_accidental() || e.played.is_accidental())
            .count();
        if accidentals >= ACCIDENTAL_MIN {
            return Some(Pattern::Accidentals { count: accidentals });
        }

        if let Some(top) = self.top_confusions(1).first() {
            if top.count >= PAIR_MIN {
                return Some(Pattern::NotePair {
                    note_a: top.note_a,
                    note_b: top.note_b,
                    count: top.count,
                });
            }
        }

        let adjacent = self
            .entries
            .iter()
            .filter(|e| e.expected.is_adjacent_to(&e.played))
            .count();
        if adjacent >= ADJACENT_MIN {
            return Some(Pattern::Adjacent { count: adjacent });
        }

        None
    }

    fn confusions(&self) -> Vec<Confusion> {
        let mut groups: Vec<Confusion> = Vec::new();
        for entry in &self.entries {
            match groups
                .iter_mut()
                .find(|g| g.matches(entry.expected, entry.played))
            {
                Some(group) => group.count += 1,
                None => groups.push(Confusion {
                    note_a: entry.expected,
                    note_b: entry.played,
                    count: 1,
                }),
            }
        }
        groups
    }
}

impl Default for MistakeTracker {
    fn default() -> Self {
        Self::new()
    }
}
