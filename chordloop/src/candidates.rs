// Voicing candidate generation.
//
// From one chord's raw shape we derive a small family of musical
// alternatives rather than free per-note octave choices:
//
// - the base shape;
// - every inversion (lowest note up an octave, repeated);
// - open voicings: the top k notes up an octave, or the bottom k notes down,
//   for k in 1..n;
// - the whole shape shifted an octave down, unchanged, and up.
//
// Each candidate is sanitized into the register band (notes folded by
// octaves, collisions nudged an octave away) and must keep the base shape's
// note count. It then goes through the bass-preference pass, which moves the
// whole chord by octaves so the bass lands in the hard bass window, as close
// as possible to the soft window's center.
//
// Candidates are collected in a `BTreeSet`, so the output order depends only
// on the pitches and selection ties break the same way on every run.

use crate::chord_name::fold_into;
use crate::config::RegisterConfig;
use std::collections::BTreeSet;

/// Fold every note into the register band and resolve collisions.
///
/// A note that lands on an occupied pitch is moved an octave up, then an
/// octave down; if both are taken or out of range it is dropped. The result
/// is ascending and duplicate-free, so callers compare its length with the
/// input's to detect a lost note.
pub fn sanitize(notes: &[i32], register: &RegisterConfig) -> Vec<i32> {
    let floor = register.floor as i32;
    let ceiling = register.ceiling as i32;

    let mut folded: Vec<i32> = notes.iter().map(|&n| fold_into(n, floor, ceiling)).collect();
    folded.sort_unstable();

    let mut placed: Vec<i32> = Vec::with_capacity(folded.len());
    for n in folded {
        let slot = [n, n + 12, n - 12]
            .into_iter()
            .find(|&p| p >= floor && p <= ceiling && !placed.contains(&p));
        if let Some(p) = slot {
            placed.push(p);
        }
    }
    placed.sort_unstable();
    placed
}

/// Shift the whole chord by octaves so its bass sits in the hard bass
/// window, nearest to the soft window's center. Shapes that cannot reach
/// the window without leaving the band are returned unchanged.
pub fn prefer_bass(notes: &[i32], register: &RegisterConfig) -> Vec<i32> {
    let (Some(&low), Some(&high)) = (notes.iter().min(), notes.iter().max()) else {
        return notes.to_vec();
    };
    let soft_center = register.soft_bass_window.center();
    let k = register.bass_search_octaves;

    let best = shifts_by_size(k)
        .filter(|&s| {
            let bass = low + 12 * s;
            register.bass_window.contains(bass)
                && bass >= register.floor as i32
                && high + 12 * s <= register.ceiling as i32
        })
        .min_by(|&a, &b| {
            let da = (f64::from(low + 12 * a) - soft_center).abs();
            let db = (f64::from(low + 12 * b) - soft_center).abs();
            da.total_cmp(&db)
        });

    match best {
        Some(s) => notes.iter().map(|&n| n + 12 * s).collect(),
        None => notes.to_vec(),
    }
}

/// Octave shifts `0, -1, 1, -2, 2, ...` up to `±k`. Smaller moves first, so
/// ties go to the least disruptive shift.
pub fn shifts_by_size(k: i32) -> impl Iterator<Item = i32> {
    std::iter::once(0).chain((1..=k.max(0)).flat_map(|s| [-s, s]))
}

/// All distinct voicing candidates for a raw chord shape.
pub fn voicing_candidates(raw: &[i32], register: &RegisterConfig) -> Vec<Vec<i32>> {
    let base = sanitize(raw, register);
    let n = base.len();
    if n == 0 {
        return Vec::new();
    }

    let mut out: BTreeSet<Vec<i32>> = BTreeSet::new();
    let mut add = |shape: Vec<i32>| {
        let clean = sanitize(&shape, register);
        if clean.len() == n {
            out.insert(prefer_bass(&clean, register));
        }
    };

    add(base.clone());

    let mut inversion = base.clone();
    for _ in 1..n {
        let lowest = inversion.remove(0);
        inversion.push(lowest + 12);
        add(inversion.clone());
    }

    for k in 1..n {
        let mut top_up = base.clone();
        for note in &mut top_up[n - k..] {
            *note += 12;
        }
        add(top_up);

        let mut bottom_down = base.clone();
        for note in &mut bottom_down[..k] {
            *note -= 12;
        }
        add(bottom_down);
    }

    for shift in [-12, 0, 12] {
        add(base.iter().map(|&x| x + shift).collect());
    }

    if out.is_empty() {
        return vec![base];
    }
    out.into_iter().collect()
}
