// Chord symbols and accepted progressions.
//
// A `ChordSymbol` is a spelled root plus a quality (`Fmaj9`, `C#min7`). Roots
// keep the key's spelling (Gb major yields `Cbmaj7`, not `Bmaj7`) because the
// symbols are user-facing and appear in file names.
//
// A `Progression` is produced only by the builder after every rule has
// passed, and is immutable from then on. Its parallel vectors are
// index-aligned: chord `i` sits on scale degree `degrees[i]` with quality
// `qualities[i]` and lasts `durations[i]` bars.

use crate::quality::Quality;
use crate::theory::{Key, PcSet, chord_pcs, pitch_class};
use serde::{Deserialize, Deserializer, Serialize, de};
use std::fmt;

/// Every note spelling the symbol parser accepts, so roots can be stored as
/// `&'static str`.
const SPELLINGS: [&str; 21] = [
    "C", "C#", "Db", "D", "D#", "Eb", "E", "Fb", "E#", "F", "F#", "Gb", "G", "G#", "Ab", "A",
    "A#", "Bb", "B", "Cb", "B#",
];

/// Intern a note spelling. `None` for anything that is not a note name.
pub fn spelling(note: &str) -> Option<&'static str> {
    SPELLINGS.iter().copied().find(|&s| s == note)
}

/// A chord as root + quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(into = "String")]
pub struct ChordSymbol {
    root: &'static str,
    quality: Quality,
}

impl ChordSymbol {
    /// `None` when `root` is not a note spelling.
    pub fn new(root: &str, quality: Quality) -> Option<Self> {
        spelling(root).map(|root| ChordSymbol { root, quality })
    }

    pub fn root(self) -> &'static str {
        self.root
    }

    pub fn root_pc(self) -> u8 {
        pitch_class(self.root).unwrap_or(0)
    }

    pub fn quality(self) -> Quality {
        self.quality
    }

    pub fn pcs(self) -> PcSet {
        chord_pcs(self.root_pc(), self.quality)
    }
}

impl fmt::Display for ChordSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.root, self.quality)
    }
}

impl From<ChordSymbol> for String {
    fn from(symbol: ChordSymbol) -> String {
        symbol.to_string()
    }
}

impl TryFrom<String> for ChordSymbol {
    type Error = String;

    fn try_from(text: String) -> Result<Self, Self::Error> {
        crate::chord_name::parse_chord_name(&text)
            .map(|parsed| parsed.symbol)
            .map_err(|e| e.to_string())
    }
}

// Written by hand: the derive's `try_from` path would tie `'de` to the
// interned `'static` root.
impl<'de> Deserialize<'de> for ChordSymbol {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        ChordSymbol::try_from(text).map_err(de::Error::custom)
    }
}

/// An accepted, validated progression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progression {
    pub key: Key,
    pub chords: Vec<ChordSymbol>,
    /// Bars per chord; sums to 4, 8 or 16.
    pub durations: Vec<u8>,
    /// 0-based scale degree of each chord root.
    pub degrees: Vec<u8>,
    pub qualities: Vec<Quality>,
}

impl Progression {
    pub fn len(&self) -> usize {
        self.chords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chords.is_empty()
    }

    pub fn total_bars(&self) -> u32 {
        self.durations.iter().map(|&d| d as u32).sum()
    }

    /// Pitch-class set of every chord, in order.
    pub fn pcs(&self) -> Vec<PcSet> {
        self.chords.iter().map(|c| c.pcs()).collect()
    }

    /// Chord symbols joined with `sep`.
    pub fn chord_list(&self, sep: &str) -> String {
        self.chords
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(sep)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbol_display_and_pcs() {
        let f = ChordSymbol::new("F", Quality::Maj9).unwrap();
        assert_eq!(f.to_string(), "Fmaj9");
        assert_eq!(f.pcs(), PcSet::from_pcs([5, 9, 0, 4, 7]));
        assert!(ChordSymbol::new("H", Quality::Maj).is_none());
    }

    #[test]
    fn symbol_serde_round_trip() {
        let s = ChordSymbol::new("Cb", Quality::Maj7).unwrap();
        let json = serde_json::to_string(&s).unwrap();
        assert_eq!(json, "\"Cbmaj7\"");
        let back: ChordSymbol = serde_json::from_str(&json).unwrap();
        assert_eq!(back, s);
    }

    #[test]
    fn symbol_rejects_unknown_names() {
        assert!(serde_json::from_str::<ChordSymbol>("\"Hmaj7\"").is_err());
        assert!(serde_json::from_str::<ChordSymbol>("7").is_err());
    }

    #[test]
    fn progression_serde_round_trip() {
        let p = Progression {
            key: Key::from_name("Eb").unwrap(),
            chords: vec![
                ChordSymbol::new("Eb", Quality::Maj9).unwrap(),
                ChordSymbol::new("Ab", Quality::Maj7).unwrap(),
            ],
            durations: vec![2, 2],
            degrees: vec![0, 3],
            qualities: vec![Quality::Maj9, Quality::Maj7],
        };
        let json = serde_json::to_string(&p).unwrap();
        let back: Progression = serde_json::from_str(&json).unwrap();
        assert_eq!(back, p);
    }

    #[test]
    fn progression_totals() {
        let c = ChordSymbol::new("C", Quality::Maj).unwrap();
        let f = ChordSymbol::new("F", Quality::Maj).unwrap();
        let p = Progression {
            key: Key::from_name("C").unwrap(),
            chords: vec![c, f],
            durations: vec![2, 2],
            degrees: vec![0, 3],
            qualities: vec![Quality::Maj, Quality::Maj],
        };
        assert_eq!(p.total_bars(), 4);
        assert_eq!(p.chord_list("-"), "Cmaj-Fmaj");
    }
}
