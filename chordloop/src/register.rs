// Register enforcement and the progression-wide register optimizer.
//
// `enforce_register` is the hard pass every output chord goes through. It
// only moves the whole chord by octaves, so the shape survives:
//
// 1. up until the bass clears the floor;
// 2. into the bass window (down only while the floor still holds);
// 3. down while the top exceeds the ceiling and the floor still holds.
//
// A chord too wide for the band after step 3 falls back to per-note folding
// (see `candidates::sanitize`), which is the only step that can reshape it.
//
// `optimize_register` then walks the voiced sequence left to right. For
// each chord after the first it tries whole-chord shifts of up to
// `optimizer_octaves` octaves, enforces each, and keeps the shift that
// ranks best against the chord before it:
//
//   1. most pitches held at the same absolute pitch,
//   2. most notes one or two semitones from a previous note,
//   3. least voice-leading movement,
//   4. smallest bass jump.
//
// Ties go to the smaller shift.

use crate::candidates::{sanitize, shifts_by_size};
use crate::config::RegisterConfig;
use crate::cost::{min_assignment_move, shared_pitch_count};
use std::cmp::Ordering;

fn shifted(notes: &[i32], semitones: i32) -> Vec<i32> {
    notes.iter().map(|&n| n + semitones).collect()
}

/// Hard floor / bass window / ceiling pass. Returns an ascending chord with
/// every note in `[floor, ceiling]`.
pub fn enforce_register(notes: &[i32], register: &RegisterConfig) -> Vec<i32> {
    let mut v = notes.to_vec();
    v.sort_unstable();
    let Some(&first) = v.first() else {
        return v;
    };
    let floor = register.floor as i32;
    let ceiling = register.ceiling as i32;
    let window = register.bass_window;

    let mut bass = first;
    let mut shift = 0;
    while bass + shift < floor {
        shift += 12;
    }
    while bass + shift > window.high as i32 && bass + shift - 12 >= floor {
        shift -= 12;
    }
    while bass + shift < window.low as i32 {
        shift += 12;
    }
    v = shifted(&v, shift);
    bass = v[0];

    let mut top = v[v.len() - 1];
    while top > ceiling && bass - 12 >= floor {
        v = shifted(&v, -12);
        bass -= 12;
        top -= 12;
    }

    if top > ceiling || bass < floor {
        return sanitize(&v, register);
    }
    v
}

/// Ranking of one optimizer option against the previous chord.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterScore {
    pub shared: usize,
    pub near: usize,
    pub movement: i32,
    pub bass_jump: i32,
}

impl RegisterScore {
    pub fn new(prev: &[i32], cur: &[i32]) -> Self {
        let near = cur
            .iter()
            .filter(|&&n| prev.iter().any(|&p| matches!((n - p).abs(), 1 | 2)))
            .count();
        let bass_jump = match (prev.first(), cur.first()) {
            (Some(a), Some(b)) => (a - b).abs(),
            _ => 0,
        };
        RegisterScore {
            shared: shared_pitch_count(prev, cur),
            near,
            movement: min_assignment_move(prev, cur),
            bass_jump,
        }
    }

    /// `Less` when `self` is the better option.
    pub fn rank(&self, other: &Self) -> Ordering {
        other
            .shared
            .cmp(&self.shared)
            .then_with(|| other.near.cmp(&self.near))
            .then_with(|| self.movement.cmp(&other.movement))
            .then_with(|| self.bass_jump.cmp(&other.bass_jump))
    }
}

/// Register-optimize a voiced sequence. Every output chord has passed
/// `enforce_register`.
pub fn optimize_register(voicings: &[Vec<i32>], register: &RegisterConfig) -> Vec<Vec<i32>> {
    let mut out: Vec<Vec<i32>> = Vec::with_capacity(voicings.len());
    for v in voicings {
        let chosen = match out.last() {
            None => enforce_register(v, register),
            Some(prev) => shifts_by_size(register.optimizer_octaves)
                .map(|s| enforce_register(&shifted(v, 12 * s), register))
                .map(|option| (RegisterScore::new(prev, &option), option))
                .min_by(|a, b| a.0.rank(&b.0))
                .map(|(_, option)| option)
                .unwrap_or_else(|| enforce_register(v, register)),
        };
        out.push(chosen);
    }
    out
}
