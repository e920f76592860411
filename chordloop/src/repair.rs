// Cross-semitone repair.
//
// A note of the current voicing that sits exactly one semitone from any note
// of the previous voicing is a clash, unless its pitch class is one of the
// key's resolution targets (tonic, optionally third and fifth). Repair moves
// clashing notes by an octave, one note at a time, keeping the option that
// leaves the fewest clashes; ties go to the better-centered shape, then the
// narrower one, then the one whose bass sits nearest the soft bass window.
// It stops when nothing clashes, when a pass changes nothing, or after
// `repair_max_iters` passes.

use crate::config::VoicingConfig;
use crate::cost::{center, span};
use crate::theory::{Key, PcSet};
use smallvec::SmallVec;

/// Pitch classes a half-step move may resolve onto in `key`.
pub fn allowed_resolution_pcs(key: Key, config: &VoicingConfig) -> PcSet {
    let mut pcs = PcSet::from_pcs([key.tonic_pc()]);
    if config.allow_resolve_to_third {
        pcs.insert(key.degree_pc(2));
    }
    if config.allow_resolve_to_fifth {
        pcs.insert(key.degree_pc(4));
    }
    pcs
}

fn is_clash(note: i32, prev: &[i32], allowed: PcSet) -> bool {
    (prev.contains(&(note - 1)) || prev.contains(&(note + 1)))
        && !allowed.contains(note.rem_euclid(12) as u8)
}

/// Indices of clashing notes in `cur`.
pub fn clash_indices(prev: &[i32], cur: &[i32], allowed: PcSet) -> SmallVec<[usize; 8]> {
    cur.iter()
        .enumerate()
        .filter(|&(_, &n)| is_clash(n, prev, allowed))
        .map(|(i, _)| i)
        .collect()
}

pub fn clash_count(prev: &[i32], cur: &[i32], allowed: PcSet) -> usize {
    cur.iter().filter(|&&n| is_clash(n, prev, allowed)).count()
}

/// Move clashing notes of `cur` by octaves until none clash with `prev`.
/// Returns an ascending voicing with the same number of notes.
pub fn repair_cross_semitones(
    prev: &[i32],
    cur: &[i32],
    allowed: PcSet,
    config: &VoicingConfig,
) -> Vec<i32> {
    let register = &config.register;
    let floor = register.floor as i32;
    let ceiling = register.ceiling as i32;
    let soft_center = register.soft_bass_window.center();
    let target = register.target_center;

    let rank = |v: &[i32]| {
        (
            clash_count(prev, v, allowed),
            (center(v, target) - target).abs(),
            span(v),
            (v.first().map_or(soft_center, |&b| b as f64) - soft_center).abs(),
        )
    };

    let mut v = cur.to_vec();
    v.sort_unstable();

    for _ in 0..config.repair_max_iters {
        let bad = clash_indices(prev, &v, allowed);
        if bad.is_empty() {
            break;
        }

        let mut changed = false;
        for &idx in &bad {
            // An earlier move in this pass may have re-sorted the chord.
            let Some(&n) = v.get(idx) else { continue };
            if !is_clash(n, prev, allowed) {
                continue;
            }

            let best = [12, -12]
                .into_iter()
                .map(|delta| n + delta)
                .filter(|&n2| n2 >= floor && n2 <= ceiling && !v.contains(&n2))
                .map(|n2| {
                    let mut test = v.clone();
                    test[idx] = n2;
                    test.sort_unstable();
                    test
                })
                .min_by(|a, b| {
                    let (ra, rb) = (rank(a.as_slice()), rank(b.as_slice()));
                    ra.0.cmp(&rb.0)
                        .then_with(|| ra.1.total_cmp(&rb.1))
                        .then_with(|| ra.2.cmp(&rb.2))
                        .then_with(|| ra.3.total_cmp(&rb.3))
                });

            if let Some(test) = best {
                v = test;
                changed = true;
            }
        }

        if !changed {
            break;
        }
    }
    v
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c_major() -> Key {
        Key::from_name("C").unwrap()
    }

    #[test]
    fn resolution_targets() {
        let config = VoicingConfig::default();
        let pcs = allowed_resolution_pcs(c_major(), &config);
        assert_eq!(pcs, PcSet::from_pcs([0, 4]));

        let mut config = config;
        config.allow_resolve_to_fifth = true;
        config.allow_resolve_to_third = false;
        assert_eq!(allowed_resolution_pcs(c_major(), &config), PcSet::from_pcs([0, 7]));
    }

    #[test]
    fn clash_detection_respects_targets() {
        let allowed = PcSet::from_pcs([0, 4]);
        // 65 (F) is a half step above 64: clash. 60 (C) is a half step above
        // 59 but C is the tonic: allowed.
        assert_eq!(clash_indices(&[59, 64], &[60, 65, 69], allowed).as_slice(), &[1]);
        assert_eq!(clash_count(&[59, 64], &[60, 65, 69], allowed), 1);
        assert_eq!(clash_count(&[59, 64], &[60, 67], allowed), 0);
    }

    #[test]
    fn repair_moves_clash_by_octave() {
        let config = VoicingConfig::default();
        let allowed = PcSet::from_pcs([0, 4]);
        let prev = [48, 55, 64];
        let fixed = repair_cross_semitones(&prev, &[53, 57, 65], allowed, &config);
        assert_eq!(fixed.len(), 3);
        assert_eq!(clash_count(&prev, &fixed, allowed), 0);
        assert_eq!(fixed, vec![53, 57, 77]);
    }

    #[test]
    fn repair_is_identity_without_clashes() {
        let config = VoicingConfig::default();
        let fixed = repair_cross_semitones(&[48, 55, 64], &[57, 60, 64], PcSet::EMPTY, &config);
        assert_eq!(fixed, vec![57, 60, 64]);
    }

    #[test]
    fn unfixable_clash_is_left_for_the_cost_model() {
        let config = VoicingConfig::default();
        // Previous chord covers every octave of E around F.
        let prev = [52, 64, 76];
        let fixed = repair_cross_semitones(&prev, &[53, 65, 77], PcSet::EMPTY, &config);
        assert_eq!(fixed.len(), 3);
        assert_eq!(clash_count(&prev, &fixed, PcSet::EMPTY), 3);
    }
}
