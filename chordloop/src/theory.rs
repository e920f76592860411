// Music theory model: pitch classes, keys, and chord pitch-class sets.
//
// Everything in here is a pure function of its inputs. Pitch-class sets are
// 12-bit masks (`PcSet`) so that the builder can test diatonicity and shared
// tones millions of times per batch without touching the heap.
//
// Keys are the twelve major keys with their conventional spellings, e.g. Gb
// major is spelled Gb Ab Bb Cb Db Eb F. Scale degrees are 0-based (0 = tonic).
//
// The loop-aware checks treat a progression as a cycle: the last chord must
// connect to the first exactly like any internal pair, because the output is
// meant to repeat seamlessly.

use crate::quality::Quality;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Map a spelled note name (`"C"`, `"F#"`, `"Bb"`, `"Cb"`, ...) to its pitch
/// class 0-11.
pub fn pitch_class(note: &str) -> Option<u8> {
    let pc = match note {
        "C" | "B#" => 0,
        "C#" | "Db" => 1,
        "D" => 2,
        "D#" | "Eb" => 3,
        "E" | "Fb" => 4,
        "E#" | "F" => 5,
        "F#" | "Gb" => 6,
        "G" => 7,
        "G#" | "Ab" => 8,
        "A" => 9,
        "A#" | "Bb" => 10,
        "B" | "Cb" => 11,
        _ => return None,
    };
    Some(pc)
}

/// A set of pitch classes as a 12-bit mask (bit `pc` set when present).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PcSet(u16);

impl PcSet {
    pub const EMPTY: PcSet = PcSet(0);

    pub fn from_pcs(pcs: impl IntoIterator<Item = u8>) -> Self {
        let mut bits = 0u16;
        for pc in pcs {
            bits |= 1 << (pc % 12);
        }
        PcSet(bits)
    }

    pub fn contains(self, pc: u8) -> bool {
        self.0 & (1 << (pc % 12)) != 0
    }

    pub fn insert(&mut self, pc: u8) {
        self.0 |= 1 << (pc % 12);
    }

    pub fn len(self) -> u32 {
        self.0.count_ones()
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn is_subset(self, other: PcSet) -> bool {
        self.0 & !other.0 == 0
    }

    pub fn intersection(self, other: PcSet) -> PcSet {
        PcSet(self.0 & other.0)
    }

    /// Pitch classes in ascending order.
    pub fn iter(self) -> impl Iterator<Item = u8> {
        (0u8..12).filter(move |&pc| self.contains(pc))
    }
}

/// One of the twelve major keys of the key table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Key(u8);

/// Key table order. Index into this table is the `Key` id.
const KEY_NAMES: [&str; 12] = [
    "C", "Db", "D", "Eb", "E", "F", "Gb", "G", "Ab", "A", "Bb", "B",
];

/// Spelled major scales, index-aligned with `KEY_NAMES`.
const SCALES: [[&str; 7]; 12] = [
    ["C", "D", "E", "F", "G", "A", "B"],
    ["Db", "Eb", "F", "Gb", "Ab", "Bb", "C"],
    ["D", "E", "F#", "G", "A", "B", "C#"],
    ["Eb", "F", "G", "Ab", "Bb", "C", "D"],
    ["E", "F#", "G#", "A", "B", "C#", "D#"],
    ["F", "G", "A", "Bb", "C", "D", "E"],
    ["Gb", "Ab", "Bb", "Cb", "Db", "Eb", "F"],
    ["G", "A", "B", "C", "D", "E", "F#"],
    ["Ab", "Bb", "C", "Db", "Eb", "F", "G"],
    ["A", "B", "C#", "D", "E", "F#", "G#"],
    ["Bb", "C", "D", "Eb", "F", "G", "A"],
    ["B", "C#", "D#", "E", "F#", "G#", "A#"],
];

impl Key {
    pub const C: Key = Key(0);

    /// All twelve keys in table order.
    pub fn all() -> impl Iterator<Item = Key> {
        (0..12).map(Key)
    }

    /// Look a key up by its table name (`"C"`, `"Db"`, ...).
    pub fn from_name(name: &str) -> Option<Key> {
        KEY_NAMES.iter().position(|&n| n == name).map(|i| Key(i as u8))
    }

    /// Position in the key table.
    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn name(self) -> &'static str {
        KEY_NAMES[self.0 as usize]
    }

    /// The seven spelled scale notes, tonic first.
    pub fn scale(self) -> &'static [&'static str; 7] {
        &SCALES[self.0 as usize]
    }

    /// Spelled root note of a 0-based scale degree (wraps modulo 7).
    pub fn degree_note(self, degree: u8) -> &'static str {
        self.scale()[(degree % 7) as usize]
    }

    /// Pitch class of a 0-based scale degree.
    pub fn degree_pc(self, degree: u8) -> u8 {
        pitch_class(self.degree_note(degree)).unwrap_or(0)
    }

    pub fn tonic_pc(self) -> u8 {
        self.degree_pc(0)
    }

    /// The key's diatonic pitch-class set.
    pub fn pc_set(self) -> PcSet {
        PcSet::from_pcs((0..7).map(|d| self.degree_pc(d)))
    }
}

impl From<Key> for String {
    fn from(key: Key) -> String {
        key.name().to_string()
    }
}

impl TryFrom<String> for Key {
    type Error = String;

    fn try_from(name: String) -> Result<Self, Self::Error> {
        Key::from_name(&name).ok_or_else(|| format!("unknown key '{name}'"))
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Pitch-class set of a chord built on `root_pc`.
pub fn chord_pcs(root_pc: u8, quality: Quality) -> PcSet {
    PcSet::from_pcs(quality.intervals().iter().map(|&iv| root_pc + iv))
}

/// True when every chord tone belongs to the key's scale.
pub fn is_diatonic(key: Key, root_pc: u8, quality: Quality) -> bool {
    chord_pcs(root_pc, quality).is_subset(key.pc_set())
}

/// Size of the intersection of two chords' pitch-class sets.
pub fn shared_tones(a: PcSet, b: PcSet) -> u32 {
    a.intersection(b).len()
}

/// Iterate over every transition of a chord cycle, including the loop edge
/// from the last chord back to the first. A single chord has no transitions.
pub fn loop_pairs<T: Copy>(items: &[T]) -> impl Iterator<Item = (T, T)> + '_ {
    let n = items.len();
    let count = if n >= 2 { n } else { 0 };
    (0..count).map(move |i| (items[i], items[(i + 1) % n]))
}

/// Every adjacent pair, including the loop edge, shares at least `need`
/// pitch classes.
pub fn shared_tone_ok_loop(chords: &[PcSet], need: u32) -> bool {
    loop_pairs(chords).all(|(a, b)| shared_tones(a, b) >= need)
}

/// Number of fully disjoint ("low-similarity") transitions, loop edge
/// included.
pub fn low_similarity_count_loop(chords: &[PcSet]) -> usize {
    loop_pairs(chords)
        .filter(|&(a, b)| shared_tones(a, b) == 0)
        .count()
}

/// Smallest distance between two pitch classes around the circle (0-6).
pub fn pc_interval(a: u8, b: u8) -> u8 {
    let iv = (b + 12 - a % 12) % 12;
    iv.min(12 - iv)
}
