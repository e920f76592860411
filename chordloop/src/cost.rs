// Voicing cost model and candidate selection filters.
//
// The cost of a candidate is a weighted sum of independent penalty terms
// (lower is better). Weights come from `CostWeights`:
//
//   register     |center - target| * register
//   span         |span - ideal| * span, plus the below-min / above-max tiers
//   spacing      per adjacent gap: too tight, too open, severely open
//   movement     voice-leading distance to the previous voicing * movement
//   bass jump    semitones of bass motion beyond max_bass_jump * bass_jump
//   repeat       flat penalty for repeating the previous voicing exactly
//   raw shape    flat penalty for reproducing the unvoiced shape
//   clashes      per unresolved cross-semitone clash (dominant term)
//   soft bass    semitones of bass outside the soft window
//
// Voice-leading distance between equal-size chords is the minimum over all
// note pairings of the summed absolute motion. On a line, pairing the
// sorted notes in order is always optimal, so that is what we compute; the
// tests check it against brute force. Unequal sizes use the nearest
// previous note for each current note.

use crate::config::{CostWeights, RegisterConfig, VoicingConfig};
use crate::quality::Quality;
use crate::repair::clash_count;
use crate::theory::PcSet;
use chordloop_prng::LoopRng;

/// `max - min`, 0 for an empty chord.
pub fn span(notes: &[i32]) -> i32 {
    match (notes.iter().min(), notes.iter().max()) {
        (Some(lo), Some(hi)) => hi - lo,
        _ => 0,
    }
}

/// Midpoint of the outer notes, `fallback` for an empty chord.
pub fn center(notes: &[i32], fallback: f64) -> f64 {
    match (notes.iter().min(), notes.iter().max()) {
        (Some(&lo), Some(&hi)) => (lo as f64 + hi as f64) / 2.0,
        _ => fallback,
    }
}

/// Lower note of every semitone-adjacent pair (notes must be ascending).
fn semitone_pairs(notes: &[i32]) -> impl Iterator<Item = (i32, i32)> + '_ {
    notes
        .windows(2)
        .filter(|w| w[1] - w[0] == 1)
        .map(|w| (w[0], w[1]))
}

/// The glue rule. Chords without a semitone pair always pass. A semitone
/// pair touching the low register always fails. Anything else passes with
/// `glue_probability`, using one draw.
pub fn glue_ok(notes: &[i32], config: &VoicingConfig, rng: &mut LoopRng) -> bool {
    let cutoff = config.glue_low_cutoff as i32;
    let mut any = false;
    for (a, b) in semitone_pairs(notes) {
        if a < cutoff || b < cutoff {
            return false;
        }
        any = true;
    }
    !any || rng.next_f64() < config.glue_probability
}

/// Pitches held at the same absolute pitch in both chords.
pub fn shared_pitch_count(a: &[i32], b: &[i32]) -> usize {
    b.iter().filter(|n| a.contains(n)).count()
}

/// Shared-pitch cap for a transition.
pub fn max_shared_allowed(prev: Quality, cur: Quality, config: &VoicingConfig) -> usize {
    if config.extended_qualities.contains(&prev) || config.extended_qualities.contains(&cur) {
        config.max_shared_extended
    } else {
        config.max_shared_default
    }
}

pub fn spacing_penalty(notes: &[i32], w: &CostWeights) -> f64 {
    notes
        .windows(2)
        .map(|pair| {
            let gap = pair[1] - pair[0];
            let mut pen = 0.0;
            if gap < w.min_adjacent_gap {
                pen += (w.min_adjacent_gap - gap) as f64 * w.gap_too_tight;
            }
            if gap > w.max_adjacent_gap {
                pen += (gap - w.max_adjacent_gap) as f64 * w.gap_too_open;
            }
            if gap > w.hard_max_adjacent_gap {
                pen += (gap - w.hard_max_adjacent_gap) as f64 * w.gap_severely_open;
            }
            pen
        })
        .sum()
}

pub fn bass_penalty(prev: &[i32], cur: &[i32], w: &CostWeights) -> f64 {
    let (Some(b0), Some(b1)) = (prev.iter().min(), cur.iter().min()) else {
        return 0.0;
    };
    let jump = (b1 - b0).abs();
    if jump <= w.max_bass_jump {
        0.0
    } else {
        (jump - w.max_bass_jump) as f64 * w.bass_jump
    }
}

/// Voice-leading distance between two chords.
pub fn min_assignment_move(prev: &[i32], cur: &[i32]) -> i32 {
    if prev.is_empty() || cur.is_empty() {
        return 0;
    }
    let mut p = prev.to_vec();
    let mut c = cur.to_vec();
    p.sort_unstable();
    c.sort_unstable();

    if p.len() == c.len() {
        p.iter().zip(&c).map(|(a, b)| (a - b).abs()).sum()
    } else {
        c.iter()
            .map(|x| p.iter().map(|y| (x - y).abs()).min().unwrap_or(0))
            .sum()
    }
}

/// Context a candidate is scored in.
#[derive(Debug, Clone, Copy)]
pub struct CostContext<'a> {
    pub prev: Option<&'a [i32]>,
    /// Sanitized unvoiced shape, for the raw-shape penalty.
    pub raw: &'a [i32],
    /// Resolution pitch classes exempt from the clash rule.
    pub allowed: PcSet,
}

/// Total cost of one candidate. `notes` must be ascending.
pub fn voicing_cost(notes: &[i32], ctx: &CostContext<'_>, config: &VoicingConfig) -> f64 {
    let w = &config.cost;
    let register: &RegisterConfig = &config.register;

    let mut total = (center(notes, register.target_center) - register.target_center).abs() * w.register;

    let sp = span(notes);
    total += (sp - w.ideal_span).abs() as f64 * w.span;
    if sp < w.min_span {
        total += (w.min_span - sp) as f64 * w.span_below_min;
    }
    if sp > w.max_span {
        total += (sp - w.max_span) as f64 * w.span_above_max;
    }

    total += spacing_penalty(notes, w);

    if let Some(prev) = ctx.prev {
        total += min_assignment_move(prev, notes) as f64 * w.movement;
        total += bass_penalty(prev, notes, w);
        if prev == notes {
            total += w.exact_repeat;
        }
        total += clash_count(prev, notes, ctx.allowed) as f64 * w.cross_semitone;
    }

    if config.enforce_not_raw && notes == ctx.raw {
        total += w.raw_shape;
    }

    if let Some(&bass) = notes.first() {
        total += register.soft_bass_window.distance(bass) as f64 * w.bass_outside_soft_window;
    }

    total
}
