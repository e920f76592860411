// Banned chord sequences.
//
// The generator only needs a membership predicate (`BannedSequences`); this
// module also provides the line-oriented text format users write by hand:
//
//     # one loop per line, any of - – , | or whitespace between chords
//     Cmaj7 - Amin7 - Fmaj7 - Gadd9
//     Dmin7, G6/9
//
// Symbols are normalized through the chord-name parser before comparison,
// so `G6/9` and `G6add9` ban the same chord. Matching is exact ordered
// equality of the whole sequence. A line that does not parse is skipped
// with a warning; a bad banlist never stops a batch. Generated chords never
// carry a slash bass, so a bass in the banlist (`Amin7/G`) is dropped with a
// warning and the line bans the plain chord.

use crate::chord_name::parse_chord_name;
use crate::error::{Error, Result};
use crate::progression::ChordSymbol;
use log::warn;
use regex::Regex;
use rustc_hash::FxHashSet;
use std::path::Path;
use std::sync::LazyLock;

static SEPARATOR_RE: LazyLock<std::result::Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"[-–,|\s]+"));

/// Predicate consulted for every otherwise-accepted progression.
pub trait BannedSequences {
    fn is_banned(&self, chords: &[ChordSymbol]) -> bool;
}

/// Bans nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoBans;

impl BannedSequences for NoBans {
    fn is_banned(&self, _chords: &[ChordSymbol]) -> bool {
        false
    }
}

/// A parsed set of banned sequences.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BanList {
    sequences: FxHashSet<Vec<ChordSymbol>>,
    basses_dropped: usize,
}

impl BanList {
    /// Parse banlist text. Only a failure to compile the separator pattern
    /// is an error; bad lines are logged and skipped.
    pub fn parse(text: &str) -> Result<Self> {
        let separator = SEPARATOR_RE
            .as_ref()
            .map_err(|e| Error::Config(format!("banlist separator failed to compile: {e}")))?;

        let mut sequences = FxHashSet::default();
        let mut basses_dropped = 0;
        for (line_no, raw) in text.lines().enumerate() {
            let line = strip_comment(raw).trim();
            if line.is_empty() {
                continue;
            }
            // `6/9` contains a slash, not a separator; protect it first.
            let line = line.replace("6/9", "6add9");
            let parsed: Result<Vec<ChordSymbol>> = separator
                .split(&line)
                .filter(|tok| !tok.is_empty())
                .map(|tok| {
                    let parsed = parse_chord_name(tok)?;
                    if let Some(bass) = parsed.bass {
                        warn!(
                            "banlist line {}: '{}' bans {} (bass {} ignored)",
                            line_no + 1,
                            tok,
                            parsed.symbol,
                            bass
                        );
                        basses_dropped += 1;
                    }
                    Ok(parsed.symbol)
                })
                .collect();
            match parsed {
                Ok(seq) if !seq.is_empty() => {
                    sequences.insert(seq);
                }
                Ok(_) => {}
                Err(e) => warn!("banlist line {}: {} (skipped)", line_no + 1, e),
            }
        }
        Ok(BanList { sequences, basses_dropped })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }

    pub fn len(&self) -> usize {
        self.sequences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty()
    }

    /// Slash basses removed while parsing.
    pub fn basses_dropped(&self) -> usize {
        self.basses_dropped
    }

    pub fn insert(&mut self, chords: Vec<ChordSymbol>) {
        self.sequences.insert(chords);
    }
}

/// Cut a `#` comment. A `#` glued to a note letter is a sharp, not a
/// comment.
fn strip_comment(line: &str) -> &str {
    let mut prev_is_space = true;
    for (i, c) in line.char_indices() {
        if c == '#' && prev_is_space {
            return &line[..i];
        }
        prev_is_space = c.is_whitespace();
    }
    line
}

impl BannedSequences for BanList {
    fn is_banned(&self, chords: &[ChordSymbol]) -> bool {
        self.sequences.contains(chords)
    }
}
