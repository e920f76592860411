// Voicing pipeline: chord symbols to absolute pitches, and timing.
//
// Two modes:
//
// - `Raw`: each chord's unvoiced shape (see chord_name.rs), passed through
//   the register hard pass only.
// - `Revoiced`: per chord, in order, generate candidates, filter them (glue,
//   cross-semitone repair against the previous choice, glue again, shared
//   pitch cap) and pick the cheapest; then run the register optimizer once
//   over the whole sequence.
//
// A filter that would remove every candidate is skipped. Glue draws come
// from a per-progression sub-stream, `LoopRng::new(seed).fork(index)`, so
// the voicing of progression `i` does not depend on how many draws the other
// progressions consumed.

use crate::candidates::{sanitize, voicing_candidates};
use crate::chord_name::{ParsedChord, parse_chord_name, raw_chord_notes};
use crate::config::{ExportConfig, VoicingConfig};
use crate::cost::{CostContext, glue_ok, max_shared_allowed, shared_pitch_count, voicing_cost};
use crate::error::Result;
use crate::progression::Progression;
use crate::quality::Quality;
use crate::register::{enforce_register, optimize_register};
use crate::repair::{allowed_resolution_pcs, clash_count, repair_cross_semitones};
use crate::theory::{Key, PcSet};
use chordloop_prng::LoopRng;
use log::{trace, warn};
use serde::{Deserialize, Serialize};

/// Whether chords are exported as raw shapes or re-voiced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoicingMode {
    #[default]
    Raw,
    Revoiced,
}

impl VoicingMode {
    pub fn from_flag(revoice: bool) -> Self {
        if revoice { VoicingMode::Revoiced } else { VoicingMode::Raw }
    }

    /// Suffix for exported file names.
    pub fn file_tag(self) -> &'static str {
        match self {
            VoicingMode::Raw => "",
            VoicingMode::Revoiced => "_Revoiced",
        }
    }
}

/// One scheduled chord.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChordEvent {
    pub notes: Vec<i32>,
    pub start_bar: u32,
    pub bars: u32,
    pub start_seconds: f64,
    pub length_seconds: f64,
}

/// Lay voicings out in time: each chord starts after the bars of the chords
/// before it and lasts its own bar count.
pub fn schedule(voicings: &[Vec<i32>], durations: &[u8], export: &ExportConfig) -> Vec<ChordEvent> {
    let seconds_per_bar = export.seconds_per_bar();
    let mut start_bar = 0u32;
    voicings
        .iter()
        .zip(durations)
        .map(|(notes, &bars)| {
            let bars = bars as u32;
            let event = ChordEvent {
                notes: notes.clone(),
                start_bar,
                bars,
                start_seconds: start_bar as f64 * seconds_per_bar,
                length_seconds: bars as f64 * seconds_per_bar,
            };
            start_bar += bars;
            event
        })
        .collect()
}

/// Stable 64-bit FNV-1a hash, used to key sub-streams by chord name.
fn stable_hash(text: &str) -> u64 {
    text.bytes().fold(0xcbf2_9ce4_8422_2325, |h, b| {
        (h ^ b as u64).wrapping_mul(0x0000_0100_0000_01b3)
    })
}

/// Keep the candidates that pass `keep`, unless none do.
fn filter_or_keep(cands: Vec<Vec<i32>>, mut keep: impl FnMut(&[i32]) -> bool) -> Vec<Vec<i32>> {
    let filtered: Vec<Vec<i32>> = cands.iter().filter(|v| keep(v.as_slice())).cloned().collect();
    if filtered.is_empty() { cands } else { filtered }
}

/// The voicing engine, bound to one configuration.
#[derive(Debug, Clone, Copy)]
pub struct VoicingEngine<'a> {
    config: &'a VoicingConfig,
}

impl<'a> VoicingEngine<'a> {
    pub fn new(config: &'a VoicingConfig) -> Self {
        VoicingEngine { config }
    }

    pub fn raw_notes(&self, chord: &ParsedChord) -> Vec<i32> {
        let register = &self.config.register;
        raw_chord_notes(chord, self.config.base_octave, register.floor, register.ceiling)
    }

    /// Pick the best voicing for `chord` after `prev` (notes and quality of
    /// the previous chord's choice).
    pub fn choose_voicing(
        &self,
        prev: Option<(&[i32], Quality)>,
        chord: &ParsedChord,
        key: Key,
        rng: &mut LoopRng,
    ) -> Vec<i32> {
        let config = self.config;
        let raw = self.raw_notes(chord);
        let raw_clean = sanitize(&raw, &config.register);
        let allowed = allowed_resolution_pcs(key, config);

        let cands = voicing_candidates(&raw, &config.register);
        let cands = self.filter_candidates(cands, prev, chord.symbol.quality(), allowed, rng);

        let ctx = CostContext { prev: prev.map(|(notes, _)| notes), raw: &raw_clean, allowed };
        let count = cands.len();
        let best = cands
            .into_iter()
            .map(|v| (voicing_cost(&v, &ctx, config), v))
            .min_by(|a, b| a.0.total_cmp(&b.0));

        let Some((cost, chosen)) = best else {
            return raw_clean;
        };
        trace!("{chord}: {count} candidates, chose {chosen:?} at cost {cost:.1}");
        if let Some((prev_notes, _)) = prev {
            let left = clash_count(prev_notes, &chosen, allowed);
            if left > 0 {
                warn!("{chord}: {left} cross-semitone clash(es) could not be repaired");
            }
        }
        chosen
    }

    /// Glue, cross-semitone repair against `prev`, glue again, then the
    /// shared-pitch cap. Each filter falls back to its input when it would
    /// leave nothing.
    fn filter_candidates(
        &self,
        cands: Vec<Vec<i32>>,
        prev: Option<(&[i32], Quality)>,
        quality: Quality,
        allowed: PcSet,
        rng: &mut LoopRng,
    ) -> Vec<Vec<i32>> {
        let config = self.config;
        let mut cands = filter_or_keep(cands, |v| glue_ok(v, config, rng));
        if let Some((prev_notes, _)) = prev {
            cands = cands
                .into_iter()
                .map(|v| repair_cross_semitones(prev_notes, &v, allowed, config))
                .collect();
        }
        cands = filter_or_keep(cands, |v| glue_ok(v, config, rng));
        if let Some((prev_notes, prev_quality)) = prev {
            let limit = max_shared_allowed(prev_quality, quality, config);
            cands = filter_or_keep(cands, |v| shared_pitch_count(prev_notes, v) <= limit);
        }
        cands
    }

    /// Voice a chord sequence in `key` with the given stream.
    pub fn voice_chords(
        &self,
        chords: &[ParsedChord],
        key: Key,
        mode: VoicingMode,
        rng: &mut LoopRng,
    ) -> Vec<Vec<i32>> {
        let register = &self.config.register;
        match mode {
            VoicingMode::Raw => chords
                .iter()
                .map(|c| enforce_register(&self.raw_notes(c), register))
                .collect(),
            VoicingMode::Revoiced => {
                let mut voiced: Vec<Vec<i32>> = Vec::with_capacity(chords.len());
                for (i, chord) in chords.iter().enumerate() {
                    let prev = voiced
                        .last()
                        .map(|notes| (notes.as_slice(), chords[i - 1].symbol.quality()));
                    let v = self.choose_voicing(prev, chord, key, rng);
                    voiced.push(v);
                }
                optimize_register(&voiced, register)
            }
        }
    }

    /// Voice progression number `index` of a batch generated from `seed`.
    pub fn voice_progression(
        &self,
        progression: &Progression,
        mode: VoicingMode,
        seed: u64,
        index: usize,
    ) -> Vec<Vec<i32>> {
        let chords: Vec<ParsedChord> = progression
            .chords
            .iter()
            .map(|&symbol| ParsedChord { symbol, bass: None })
            .collect();
        let mut rng = LoopRng::new(seed).fork(index as u64);
        self.voice_chords(&chords, progression.key, mode, &mut rng)
    }

    /// Voice one chord name in isolation (key of C, no previous chord).
    pub fn voice_single_chord(&self, name: &str, mode: VoicingMode, seed: u64) -> Result<Vec<i32>> {
        let chord = parse_chord_name(name)?;
        let mut rng = LoopRng::new(seed).fork(stable_hash(&chord.to_string()));
        Ok(self
            .voice_chords(&[chord], Key::C, mode, &mut rng)
            .into_iter()
            .next()
            .unwrap_or_default())
    }
}
