// Progression builder: one constrained attempt at a candidate progression.
//
// Given a key, a scale-degree template, and the key's degree pools, an
// attempt runs these stages in order and stops at the first failure:
//
// 1. Sample one quality per degree from its pool (empty pool: reject).
// 2. Reject a sus opening chord unless some sus slider is strongly boosted.
// 3. De-duplicate repeated (root, quality) symbols: try another quality at
//    the same degree (shuffled fallback order), else move to a neighboring
//    degree keeping the quality, else a fallback quality at that neighbor.
// 4. Re-check diatonicity.
// 5. Loop-aware shared-tone minimum.
// 6. Sus safety, in the default or sus-heavy regime.
// 7. Limit big note-count jumps across adjacent and loop pairs.
// 8. Draw the bar partition, then reject any remaining zero-shared-tone
//    transition.
//
// A failed rule is not an error: `build` returns `BuildOutcome::Rejected`
// and the generator simply tries again. Everything before acceptance lives
// in inline `SmallVec`s, so a rejected attempt performs no heap allocation
// for chord sizes up to eight.
//
// Under strict balance the de-duplication repair only considers qualities
// the degree pools allow, so repair can never smuggle in a disabled quality.

use crate::balance::{ChordBalance, DegreePools, average_sus_factor, sus_start_allowed};
use crate::config::GeneratorConfig;
use crate::progression::{ChordSymbol, Progression};
use crate::quality::Quality;
use crate::sampler::{Shape, sample_durations};
use crate::theory::{PcSet, is_diatonic, loop_pairs, low_similarity_count_loop, pc_interval, shared_tone_ok_loop, shared_tones};
use chordloop_prng::LoopRng;
use log::trace;
use smallvec::SmallVec;

type Slots<T> = SmallVec<[T; 8]>;

/// Why an attempt was rejected. Used for trace logging and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// A template degree has no allowed quality under the active balance.
    EmptyPool { degree: u8 },
    SusStart,
    /// A repeated symbol had no diatonic, unused alternative.
    Unrepairable { index: usize },
    NotDiatonic,
    SharedTones,
    SusRatio,
    Sus4Count,
    SusOverlap,
    Sus4Pair,
    NoStepOrRepeat,
    BigJumps,
    NoDurations,
    LowSimilarity,
}

/// Result of one builder attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum BuildOutcome {
    Accepted(Progression),
    Rejected(RejectReason),
}

impl BuildOutcome {
    pub fn accepted(self) -> Option<Progression> {
        match self {
            BuildOutcome::Accepted(p) => Some(p),
            BuildOutcome::Rejected(_) => None,
        }
    }
}

/// Which set of sus-safety rules an attempt runs under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SusRegime {
    Default,
    /// Sus qualities boosted on average: sus chords may dominate, but every
    /// transition must overlap strongly.
    Heavy,
}

/// Builder configuration resolved once per batch.
#[derive(Debug, Clone)]
pub struct Builder<'a> {
    config: &'a GeneratorConfig,
    sus_start_allowed: bool,
    regime: SusRegime,
}

impl<'a> Builder<'a> {
    pub fn new(config: &'a GeneratorConfig, balance: Option<&ChordBalance>) -> Self {
        let regime = if average_sus_factor(balance) >= config.sus.heavy_activation_factor {
            SusRegime::Heavy
        } else {
            SusRegime::Default
        };
        Builder {
            config,
            sus_start_allowed: sus_start_allowed(balance, config.sus.start_slider_threshold),
            regime,
        }
    }

    pub fn regime(&self) -> SusRegime {
        self.regime
    }

    /// Run one attempt for `template` in the pools' key.
    pub fn build(
        &self,
        rng: &mut LoopRng,
        pools: &DegreePools,
        template: &[u8],
        total_bars: u8,
    ) -> BuildOutcome {
        match self.try_build(rng, pools, template, total_bars) {
            Ok(p) => BuildOutcome::Accepted(p),
            Err(reason) => {
                trace!("reject {:?} for template {:?}", reason, template);
                BuildOutcome::Rejected(reason)
            }
        }
    }

    fn try_build(
        &self,
        rng: &mut LoopRng,
        pools: &DegreePools,
        template: &[u8],
        total_bars: u8,
    ) -> Result<Progression, RejectReason> {
        let key = pools.key();

        // 1. Qualities.
        let mut degrees: Slots<u8> = template.iter().map(|&d| d % 7).collect();
        let mut qualities: Slots<Quality> = SmallVec::with_capacity(degrees.len());
        for &degree in &degrees {
            let pool = pools.pool(degree);
            let weights: SmallVec<[f64; 16]> = pool.iter().map(|&(_, w)| w).collect();
            let idx = rng
                .weighted_index(&weights)
                .ok_or(RejectReason::EmptyPool { degree })?;
            qualities.push(pool[idx].0);
        }

        // 2. Sus opening.
        if qualities[0].is_sus() && !self.sus_start_allowed {
            return Err(RejectReason::SusStart);
        }

        // 3. Repeated symbols.
        self.dedupe(rng, pools, &mut degrees, &mut qualities)?;

        let roots: Slots<u8> = degrees.iter().map(|&d| key.degree_pc(d)).collect();

        // 4. Diatonicity.
        if roots
            .iter()
            .zip(&qualities)
            .any(|(&r, &q)| !is_diatonic(key, r, q))
        {
            return Err(RejectReason::NotDiatonic);
        }

        // 5. Shared tones, loop edge included.
        let pcs: Slots<PcSet> = roots
            .iter()
            .zip(&qualities)
            .map(|(&r, &q)| crate::theory::chord_pcs(r, q))
            .collect();
        if !shared_tone_ok_loop(&pcs, self.config.min_shared_tones) {
            return Err(RejectReason::SharedTones);
        }

        // 6. Sus safety.
        self.check_sus(&roots, &qualities, &pcs)?;

        // 7. Note-count jumps.
        if self.config.limit_note_count_jumps {
            let big = loop_pairs(&qualities)
                .filter(|&(a, b)| a.note_count().abs_diff(b.note_count()) >= self.config.big_jump_notes)
                .count();
            if big > self.config.max_big_jumps {
                return Err(RejectReason::BigJumps);
            }
        }

        // 8. Durations, then the final zero-overlap check.
        let shape = Shape { total_bars, chords: degrees.len() };
        let durations = sample_durations(rng, self.config, shape).ok_or(RejectReason::NoDurations)?;

        if low_similarity_count_loop(&pcs) != 0 {
            return Err(RejectReason::LowSimilarity);
        }

        let chords = degrees
            .iter()
            .zip(&qualities)
            .map(|(&d, &q)| {
                ChordSymbol::new(key.degree_note(d), q).ok_or(RejectReason::NotDiatonic)
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Progression {
            key,
            chords,
            durations: durations.to_vec(),
            degrees: degrees.to_vec(),
            qualities: qualities.to_vec(),
        })
    }

    /// Whether `quality` may replace a repeat at `degree`.
    fn repair_allows(&self, pools: &DegreePools, degree: u8, quality: Quality) -> bool {
        if self.config.strict_balance {
            pools.allows(degree, quality)
        } else {
            let key = pools.key();
            is_diatonic(key, key.degree_pc(degree), quality)
        }
    }

    fn dedupe(
        &self,
        rng: &mut LoopRng,
        pools: &DegreePools,
        degrees: &mut Slots<u8>,
        qualities: &mut Slots<Quality>,
    ) -> Result<(), RejectReason> {
        let mut used: Slots<(u8, Quality)> = SmallVec::new();

        for i in 0..degrees.len() {
            let degree = degrees[i];
            let quality = qualities[i];
            if !used.contains(&(degree, quality)) {
                used.push((degree, quality));
                continue;
            }

            // (a) Another quality on the same degree.
            let mut candidates: SmallVec<[Quality; 16]> =
                SmallVec::from_slice(&self.config.fallback_order);
            rng.shuffle(&mut candidates);
            let same_degree = candidates.iter().copied().find(|&q2| {
                q2 != quality
                    && self.repair_allows(pools, degree, q2)
                    && !used.contains(&(degree, q2))
            });
            if let Some(q2) = same_degree {
                qualities[i] = q2;
                used.push((degree, q2));
                continue;
            }

            // (b) A neighboring degree.
            let mut steps: SmallVec<[i8; 8]> = SmallVec::from_slice(&self.config.neighbor_steps);
            rng.shuffle(&mut steps);
            let mut fixed = false;
            for &step in &steps {
                let d2 = (degree as i16 + step as i16).rem_euclid(7) as u8;

                if self.repair_allows(pools, d2, quality) && !used.contains(&(d2, quality)) {
                    degrees[i] = d2;
                    used.push((d2, quality));
                    fixed = true;
                    break;
                }

                let mut fallback: SmallVec<[Quality; 16]> =
                    SmallVec::from_slice(&self.config.fallback_order);
                rng.shuffle(&mut fallback);
                let neighbor = fallback
                    .iter()
                    .copied()
                    .find(|&q2| self.repair_allows(pools, d2, q2) && !used.contains(&(d2, q2)));
                if let Some(q2) = neighbor {
                    degrees[i] = d2;
                    qualities[i] = q2;
                    used.push((d2, q2));
                    fixed = true;
                    break;
                }
            }

            if !fixed {
                return Err(RejectReason::Unrepairable { index: i });
            }
        }
        Ok(())
    }

    fn check_sus(&self, roots: &[u8], qualities: &[Quality], pcs: &[PcSet]) -> Result<(), RejectReason> {
        let rules = &self.config.sus;
        let m = qualities.len();
        let heavy = self.regime == SusRegime::Heavy;

        if !heavy {
            let sus_count = qualities.iter().filter(|q| q.is_sus()).count();
            let sus4_count = qualities.iter().filter(|q| q.is_sus4_family()).count();
            if sus_count as f64 / m.max(1) as f64 > rules.default_max_ratio {
                return Err(RejectReason::SusRatio);
            }
            if sus4_count > rules.default_max_sus4 {
                return Err(RejectReason::Sus4Count);
            }
        }

        let mut step_moves = 0usize;
        let transitions = if m >= 2 { m } else { 0 };
        for i in 0..transitions {
            let j = (i + 1) % m;
            let (qa, qb) = (qualities[i], qualities[j]);
            let shared = shared_tones(pcs[i], pcs[j]);
            let interval = pc_interval(roots[i], roots[j]);
            if interval <= rules.step_interval {
                step_moves += 1;
            }

            let mut need = if heavy {
                rules.heavy_need
            } else if qa.is_sus() || qb.is_sus() {
                rules.default_need_if_sus
            } else {
                self.config.min_shared_tones
            };
            if qa.is_sus4_family() || qb.is_sus4_family() {
                need = need.max(rules.need_if_sus4);
            }
            if shared < need {
                return Err(RejectReason::SusOverlap);
            }

            if qa.is_sus4_family() && qb.is_sus4_family() {
                let safe = shared >= rules.sus4_pair_safe_shared
                    || interval <= rules.step_interval
                    || roots[i] == roots[j];
                if !(rules.allow_sus4_to_sus4_if_safe && safe) {
                    return Err(RejectReason::Sus4Pair);
                }
            }
        }

        if heavy && rules.heavy_require_step_or_repeat {
            let repeated_root = roots
                .iter()
                .enumerate()
                .any(|(i, r)| roots[..i].contains(r));
            if step_moves == 0 && !repeated_root {
                return Err(RejectReason::NoStepOrRepeat);
            }
        }
        Ok(())
    }
}
