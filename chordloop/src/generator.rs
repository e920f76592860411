// Batch generation: key assignment, bounded retry loop, batch quotas.
//
// `Generator::generate` fills `n` slots. Keys are spread as evenly as
// possible over the twelve-key table (each key `n / 12` times, the remainder
// drawn from a shuffled key list, then the whole list shuffled). Each slot
// then loops: sample a shape and a template, run the builder, and accept the
// result only if it also passes the batch-level checks:
//
// - no earlier progression has the identical chord-symbol sequence;
// - its (degrees, qualities) fingerprint has been seen at most
//   `pattern_max_repeats` times, and a repeat is only allowed while the
//   batch-wide allowance `floor(n * max_pattern_duplicate_ratio)` lasts;
// - the banned-sequence predicate does not match it.
//
// A slot that exhausts `max_tries_per_progression` aborts the whole batch
// with `Error::Unsatisfiable`; there is no partial output. All randomness
// comes from the single caller-supplied `LoopRng`, consumed in a fixed order
// (keys first, then slot by slot), so a seed reproduces the batch exactly.

use crate::balance::{ChordBalance, DegreePools};
use crate::banlist::{BannedSequences, NoBans};
use crate::builder::{BuildOutcome, Builder};
use crate::config::GeneratorConfig;
use crate::error::{Error, Result};
use crate::progression::{ChordSymbol, Progression};
use crate::quality::Quality;
use crate::sampler::{ShapeTable, sample_template};
use crate::theory::{Key, low_similarity_count_loop};
use chordloop_prng::LoopRng;
use log::{debug, info};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Aggregate statistics for one batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchDiagnostics {
    /// Fingerprint repeats accepted.
    pub pattern_dupe_used: usize,
    /// Fingerprint repeats allowed for this batch size.
    pub max_pattern_dupes: usize,
    /// Zero-shared-tone transitions across the batch. Must be 0.
    pub low_sim_total: usize,
    /// Chords generated per quality.
    pub quality_usage: BTreeMap<Quality, usize>,
    /// Builder attempts across all slots.
    pub total_tries: usize,
}

/// A validated batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    pub progressions: Vec<Progression>,
    pub diagnostics: BatchDiagnostics,
}

type Fingerprint = (Vec<u8>, Vec<Quality>);

/// Batch generator. Borrowed configuration, no internal randomness.
pub struct Generator<'a> {
    config: &'a GeneratorConfig,
    balance: Option<&'a ChordBalance>,
    bans: &'a dyn BannedSequences,
}

impl<'a> Generator<'a> {
    pub fn new(config: &'a GeneratorConfig) -> Self {
        Generator { config, balance: None, bans: &NoBans }
    }

    pub fn with_balance(mut self, balance: Option<&'a ChordBalance>) -> Self {
        self.balance = balance;
        self
    }

    pub fn with_bans(mut self, bans: &'a dyn BannedSequences) -> Self {
        self.bans = bans;
        self
    }

    /// Generate `n` progressions from `rng`.
    pub fn generate(&self, n: usize, rng: &mut LoopRng) -> Result<Batch> {
        self.config.validate()?;

        // Pools for every key up front: a balance that disables everything
        // fails here, before any search.
        let pools = Key::all()
            .map(|key| DegreePools::for_key(key, self.balance, self.config.strict_balance))
            .collect::<Result<Vec<_>>>()?;

        let shapes = ShapeTable::new(self.config);
        if shapes.is_empty() {
            return Err(Error::Config(
                "no (total bars, chord count) combination has both templates and durations".into(),
            ));
        }

        let builder = Builder::new(self.config, self.balance);
        let keys = pick_keys_even(n, rng);

        let mut diagnostics = BatchDiagnostics {
            max_pattern_dupes: (n as f64 * self.config.max_pattern_duplicate_ratio).floor() as usize,
            ..Default::default()
        };
        let mut used_exact: FxHashSet<Vec<ChordSymbol>> = FxHashSet::default();
        let mut pattern_counts: FxHashMap<Fingerprint, usize> = FxHashMap::default();
        let mut progressions = Vec::with_capacity(n);

        for (slot, &key) in keys.iter().enumerate() {
            let key_pools = &pools[key.index()];
            let mut accepted = None;
            let mut tries = 0;

            while tries < self.config.max_tries_per_progression {
                tries += 1;

                let Some(shape) = shapes.sample(rng) else { break };
                let Some(template) = sample_template(rng, self.config, shape.chords) else {
                    continue;
                };
                let progression = match builder.build(rng, key_pools, template, shape.total_bars) {
                    BuildOutcome::Accepted(p) => p,
                    BuildOutcome::Rejected(_) => continue,
                };

                if used_exact.contains(&progression.chords) {
                    continue;
                }
                let fingerprint = (progression.degrees.clone(), progression.qualities.clone());
                let seen = pattern_counts.get(&fingerprint).copied().unwrap_or(0);
                if seen > self.config.pattern_max_repeats
                    || (seen >= 1 && diagnostics.pattern_dupe_used >= diagnostics.max_pattern_dupes)
                {
                    continue;
                }
                if self.bans.is_banned(&progression.chords) {
                    debug!("slot {}: skipping banned {}", slot + 1, progression.chord_list(" - "));
                    continue;
                }

                used_exact.insert(progression.chords.clone());
                if seen >= 1 {
                    diagnostics.pattern_dupe_used += 1;
                }
                *pattern_counts.entry(fingerprint).or_default() += 1;
                diagnostics.low_sim_total += low_similarity_count_loop(&progression.pcs());
                for &q in &progression.qualities {
                    *diagnostics.quality_usage.entry(q).or_default() += 1;
                }
                accepted = Some(progression);
                break;
            }

            diagnostics.total_tries += tries;
            let Some(progression) = accepted else {
                return Err(Error::Unsatisfiable { slot: slot + 1, tries });
            };
            debug!(
                "slot {} in {} after {} tries: {}",
                slot + 1,
                key,
                tries,
                progression.chord_list(" - ")
            );
            progressions.push(progression);
        }

        if diagnostics.low_sim_total != 0 {
            return Err(Error::Validation(format!(
                "{} zero-shared-tone transitions in batch",
                diagnostics.low_sim_total
            )));
        }

        info!(
            "generated {} progressions in {} tries ({} pattern repeats of {} allowed)",
            progressions.len(),
            diagnostics.total_tries,
            diagnostics.pattern_dupe_used,
            diagnostics.max_pattern_dupes
        );
        Ok(Batch { progressions, diagnostics })
    }
}

/// Generate a batch from a seed with the given configuration.
pub fn generate_batch(
    n: usize,
    seed: u64,
    config: &GeneratorConfig,
    balance: Option<&ChordBalance>,
    bans: &dyn BannedSequences,
) -> Result<Batch> {
    let mut rng = LoopRng::new(seed);
    Generator::new(config)
        .with_balance(balance)
        .with_bans(bans)
        .generate(n, &mut rng)
}

/// Assign one key per slot, as evenly as the batch size allows.
pub fn pick_keys_even(n: usize, rng: &mut LoopRng) -> Vec<Key> {
    let all: Vec<Key> = Key::all().collect();
    let mut keys = Vec::with_capacity(n);
    for &key in &all {
        keys.extend(std::iter::repeat_n(key, n / all.len()));
    }
    let mut extra = all.clone();
    rng.shuffle(&mut extra);
    keys.extend_from_slice(&extra[..n % all.len()]);
    rng.shuffle(&mut keys);
    keys
}
