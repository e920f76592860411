// Chord quality table.
//
// The fourteen chord qualities the generator knows about, each defined by its
// semitone offsets from the root. The set is closed: progressions, balance
// sliders, and voicing all speak in terms of these qualities, so a quality
// outside the table is a parse error rather than something to approximate.
//
// Qualities fall into three families (major, minor, sus). The sus family
// drives the sus-safety rules in builder.rs; the sus4 sub-family gets the
// strictest overlap requirements because its fourth clashes with most
// diatonic neighbors.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A chord quality from the fixed quality table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Quality {
    #[serde(rename = "maj9")]
    Maj9,
    #[serde(rename = "maj7")]
    Maj7,
    #[serde(rename = "add9")]
    Add9,
    #[serde(rename = "6add9", alias = "6/9")]
    SixAdd9,
    #[serde(rename = "6")]
    Six,
    #[serde(rename = "maj")]
    Maj,
    #[serde(rename = "min9")]
    Min9,
    #[serde(rename = "min7")]
    Min7,
    #[serde(rename = "min11")]
    Min11,
    #[serde(rename = "min")]
    Min,
    #[serde(rename = "sus2add9")]
    Sus2Add9,
    #[serde(rename = "sus4add9")]
    Sus4Add9,
    #[serde(rename = "sus2")]
    Sus2,
    #[serde(rename = "sus4")]
    Sus4,
}

impl Quality {
    /// Every quality, in canonical order (major family, minor family, sus
    /// family). Balance tables and usage histograms are reported in this order.
    pub const ALL: [Quality; 14] = [
        Quality::Maj9,
        Quality::Maj7,
        Quality::Add9,
        Quality::SixAdd9,
        Quality::Six,
        Quality::Maj,
        Quality::Min9,
        Quality::Min7,
        Quality::Min11,
        Quality::Min,
        Quality::Sus2Add9,
        Quality::Sus4Add9,
        Quality::Sus2,
        Quality::Sus4,
    ];

    /// The sus family, used by the sus-start and sus-heavy rules.
    pub const SUS: [Quality; 4] = [
        Quality::Sus2,
        Quality::Sus4,
        Quality::Sus2Add9,
        Quality::Sus4Add9,
    ];

    /// Semitone offsets from the root, lowest first.
    pub fn intervals(self) -> &'static [u8] {
        match self {
            Quality::Maj => &[0, 4, 7],
            Quality::Min => &[0, 3, 7],
            Quality::Maj7 => &[0, 4, 7, 11],
            Quality::Maj9 => &[0, 4, 7, 11, 14],
            Quality::Add9 => &[0, 4, 7, 14],
            Quality::Six => &[0, 4, 7, 9],
            Quality::SixAdd9 => &[0, 4, 7, 9, 14],
            Quality::Min7 => &[0, 3, 7, 10],
            Quality::Min9 => &[0, 3, 7, 10, 14],
            Quality::Min11 => &[0, 3, 7, 10, 14, 17],
            Quality::Sus2 => &[0, 2, 7],
            Quality::Sus4 => &[0, 5, 7],
            Quality::Sus2Add9 => &[0, 2, 7, 14],
            Quality::Sus4Add9 => &[0, 5, 7, 14],
        }
    }

    /// Number of chord tones.
    pub fn note_count(self) -> usize {
        self.intervals().len()
    }

    /// Symbol suffix, e.g. `"maj9"`.
    pub fn name(self) -> &'static str {
        match self {
            Quality::Maj9 => "maj9",
            Quality::Maj7 => "maj7",
            Quality::Add9 => "add9",
            Quality::SixAdd9 => "6add9",
            Quality::Six => "6",
            Quality::Maj => "maj",
            Quality::Min9 => "min9",
            Quality::Min7 => "min7",
            Quality::Min11 => "min11",
            Quality::Min => "min",
            Quality::Sus2Add9 => "sus2add9",
            Quality::Sus4Add9 => "sus4add9",
            Quality::Sus2 => "sus2",
            Quality::Sus4 => "sus4",
        }
    }

    pub fn is_sus(self) -> bool {
        matches!(
            self,
            Quality::Sus2 | Quality::Sus4 | Quality::Sus2Add9 | Quality::Sus4Add9
        )
    }

    /// sus4 and sus4add9.
    pub fn is_sus4_family(self) -> bool {
        matches!(self, Quality::Sus4 | Quality::Sus4Add9)
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error for a quality suffix that is not in the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownQuality(pub String);

impl fmt::Display for UnknownQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unrecognized chord quality '{}'", self.0)
    }
}

impl std::error::Error for UnknownQuality {}

impl FromStr for Quality {
    type Err = UnknownQuality;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let cleaned: String = s.chars().filter(|c| !c.is_whitespace()).collect();
        let lowered = cleaned.to_ascii_lowercase();
        if lowered == "6/9" {
            return Ok(Quality::SixAdd9);
        }
        Quality::ALL
            .into_iter()
            .find(|q| q.name() == lowered)
            .ok_or(UnknownQuality(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn note_counts_match_intervals() {
        assert_eq!(Quality::Maj.note_count(), 3);
        assert_eq!(Quality::Maj9.note_count(), 5);
        assert_eq!(Quality::Min11.note_count(), 6);
        assert_eq!(Quality::Sus4Add9.note_count(), 4);
    }

    #[test]
    fn parse_names_and_aliases() {
        assert_eq!("maj9".parse::<Quality>(), Ok(Quality::Maj9));
        assert_eq!("MIN11".parse::<Quality>(), Ok(Quality::Min11));
        assert_eq!("6/9".parse::<Quality>(), Ok(Quality::SixAdd9));
        assert_eq!("6 add9".parse::<Quality>(), Ok(Quality::SixAdd9));
        assert!("dim7".parse::<Quality>().is_err());
    }

    #[test]
    fn every_name_round_trips() {
        for q in Quality::ALL {
            assert_eq!(q.name().parse::<Quality>(), Ok(q), "{q} did not round-trip");
        }
    }

    #[test]
    fn sus_families() {
        let sus: Vec<_> = Quality::ALL.into_iter().filter(|q| q.is_sus()).collect();
        assert_eq!(sus.len(), 4);
        assert!(Quality::Sus4Add9.is_sus4_family());
        assert!(!Quality::Sus2Add9.is_sus4_family());
        assert!(!Quality::Maj.is_sus());
    }

    #[test]
    fn serde_uses_symbol_names() {
        let json = serde_json::to_string(&Quality::SixAdd9).unwrap();
        assert_eq!(json, "\"6add9\"");
        let q: Quality = serde_json::from_str("\"sus4add9\"").unwrap();
        assert_eq!(q, Quality::Sus4Add9);
    }
}
