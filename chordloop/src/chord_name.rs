// Chord-name parsing and raw (unvoiced) note placement.
//
// Accepted names are a root `[A-G](#|b)?`, a quality suffix from the table
// (whitespace ignored, case-insensitive, `6/9` accepted for `6add9`), and an
// optional slash bass: `Fmaj9`, `C#min7`, `Eb6/9`, `Amin7/G`.
//
// `raw_chord_notes` gives the chord's "raw shape": the root placed at
// `12 * (base_octave + 1) + pc`, every offset folded by octaves into the
// register band, sorted and de-duplicated. The voicing engine starts from
// this shape and, in re-voicing mode, is penalized for reproducing it.

use crate::error::{Error, Result};
use crate::progression::{ChordSymbol, spelling};
use crate::quality::Quality;
use crate::theory::pitch_class;
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

static CHORD_RE: LazyLock<std::result::Result<Regex, regex::Error>> = LazyLock::new(|| {
    Regex::new(r"^([A-G](?:#|b)?)([^/]*)(?:/\s*([A-G](?:#|b)?))?$")
});

/// A parsed chord name: symbol plus optional slash bass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParsedChord {
    pub symbol: ChordSymbol,
    pub bass: Option<&'static str>,
}

impl fmt::Display for ParsedChord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.bass {
            Some(bass) => write!(f, "{}/{}", self.symbol, bass),
            None => write!(f, "{}", self.symbol),
        }
    }
}

/// Parse a chord name.
pub fn parse_chord_name(name: &str) -> Result<ParsedChord> {
    let re = CHORD_RE
        .as_ref()
        .map_err(|e| Error::ChordName(format!("chord pattern failed to compile: {e}")))?;

    let normalized = name.trim().replace("6/9", "6add9");
    let caps = re
        .captures(&normalized)
        .ok_or_else(|| Error::ChordName(format!("bad chord root in '{name}'")))?;

    let root = caps.get(1).map_or("", |m| m.as_str());
    let rest = caps.get(2).map_or("", |m| m.as_str());
    let quality: Quality = rest
        .parse()
        .map_err(|e| Error::ChordName(format!("{e} in '{name}'")))?;
    let symbol = ChordSymbol::new(root, quality)
        .ok_or_else(|| Error::ChordName(format!("bad root '{root}' in '{name}'")))?;
    let bass = caps.get(3).and_then(|m| spelling(m.as_str()));

    Ok(ParsedChord { symbol, bass })
}

/// Fold `pitch` by octaves into `[floor, ceiling]`.
pub fn fold_into(pitch: i32, floor: i32, ceiling: i32) -> i32 {
    let mut p = pitch;
    while p < floor {
        p += 12;
    }
    while p > ceiling {
        p -= 12;
    }
    p
}

/// Absolute pitches of the unvoiced chord, ascending and distinct.
///
/// A slash bass is placed at `12 * base_octave + pc` and dropped by octaves
/// until it sits below every chord tone, so it may lie under `floor`.
pub fn raw_chord_notes(chord: &ParsedChord, base_octave: u8, floor: u8, ceiling: u8) -> Vec<i32> {
    let root_midi = 12 * (base_octave as i32 + 1) + chord.symbol.root_pc() as i32;
    let mut notes: Vec<i32> = chord
        .symbol
        .quality()
        .intervals()
        .iter()
        .map(|&iv| fold_into(root_midi + iv as i32, floor as i32, ceiling as i32))
        .collect();

    if let Some(bass) = chord.bass.and_then(pitch_class) {
        let mut bass_midi = 12 * base_octave as i32 + bass as i32;
        if let Some(&lowest) = notes.iter().min() {
            while bass_midi >= lowest {
                bass_midi -= 12;
            }
        }
        notes.push(bass_midi);
    }

    notes.sort_unstable();
    notes.dedup();
    notes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::theory::PcSet;

    #[test]
    fn parses_table_names() {
        let p = parse_chord_name("C#min7").unwrap();
        assert_eq!(p.symbol.root(), "C#");
        assert_eq!(p.symbol.quality(), Quality::Min7);
        assert_eq!(p.bass, None);

        let p = parse_chord_name(" Eb6/9 ").unwrap();
        assert_eq!(p.symbol.quality(), Quality::SixAdd9);
        assert_eq!(p.to_string(), "Eb6add9");

        let p = parse_chord_name("Amin7/G").unwrap();
        assert_eq!(p.bass, Some("G"));
        assert_eq!(p.to_string(), "Amin7/G");

        assert!(parse_chord_name("Fmaj 9").is_ok());
        assert!(parse_chord_name("CMAJ9").is_ok());
    }

    #[test]
    fn rejects_unknown_names() {
        assert!(matches!(parse_chord_name("Hmaj7"), Err(Error::ChordName(_))));
        assert!(matches!(parse_chord_name("Cdim7"), Err(Error::ChordName(_))));
        assert!(matches!(parse_chord_name("C"), Err(Error::ChordName(_))));
        assert!(parse_chord_name("").is_err());
    }

    #[test]
    fn raw_notes_fold_into_band() {
        // Cmin11 from C3 (48): C Eb G Bb D F, all inside the band.
        let p = parse_chord_name("Cmin11").unwrap();
        let notes = raw_chord_notes(&p, 3, 48, 84);
        assert_eq!(notes, vec![48, 51, 55, 58, 62, 65]);
        assert_eq!(
            PcSet::from_pcs(notes.iter().map(|&n| (n % 12) as u8)),
            PcSet::from_pcs([0, 3, 7, 10, 2, 5])
        );

        let b = parse_chord_name("Bmaj9").unwrap();
        let notes = raw_chord_notes(&b, 3, 48, 84);
        assert!(notes.iter().all(|&n| (48..=84).contains(&n)));
        assert_eq!(notes.len(), 5);
    }

    #[test]
    fn slash_bass_sits_below_chord() {
        let p = parse_chord_name("Amin7/G").unwrap();
        let notes = raw_chord_notes(&p, 3, 48, 84);
        assert_eq!(notes.len(), 5);
        assert_eq!(notes[0] % 12, 7);
        assert!(notes[0] < notes[1]);
    }

    #[test]
    fn fold_is_octave_preserving() {
        assert_eq!(fold_into(30, 48, 84), 54);
        assert_eq!(fold_into(90, 48, 84), 78);
        assert_eq!(fold_into(60, 48, 84), 60);
    }
}
