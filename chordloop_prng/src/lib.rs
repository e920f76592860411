// Deterministic, portable pseudo-random stream for chord progression search.
//
// Implements xoshiro256++ (Blackman & Vigna, 2019) with SplitMix64 seeding.
// Hand-rolled with zero external dependencies so that a given seed produces
// the same progressions and voicings on every platform and toolchain.
//
// The generator is advanced strictly sequentially: key assignment, template
// and duration sampling, quality sampling, and repair shuffles all draw from
// one `LoopRng` in a fixed order. Anything that needs randomness on a
// separate track (per-progression voicing, chord library voicing, parallel
// slots) calls `fork` to derive an independent sub-stream instead of sharing
// the parent.
//
// **Critical constraint: determinism.** Every method on `LoopRng` must
// produce identical output given the same prior state. Do not use
// floating-point arithmetic inside `next_u64`, and do not pull entropy from
// the OS or the stdlib hasher anywhere in this crate.

use serde::{Deserialize, Serialize};

/// Multiplier used to spread stream ids before seeding a fork.
const STREAM_SPREAD: u64 = 0x9e37_79b9_7f4a_7c15;

/// Xoshiro256++ PRNG, the sole source of randomness for generation and
/// voicing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopRng {
    s: [u64; 4],
}

impl LoopRng {
    /// Create a new stream seeded from a `u64`.
    ///
    /// Uses SplitMix64 to expand the seed into the 256-bit internal state.
    /// Two streams created with the same seed produce identical sequences.
    pub fn new(seed: u64) -> Self {
        let mut sm = seed;
        Self {
            s: [
                splitmix64(&mut sm),
                splitmix64(&mut sm),
                splitmix64(&mut sm),
                splitmix64(&mut sm),
            ],
        }
    }

    /// Derive an independent sub-stream identified by `stream`.
    ///
    /// The parent is not advanced, so forking never perturbs the draw order
    /// of the sequential search. Forks of the same parent state with the same
    /// id are identical; different ids give unrelated streams.
    pub fn fork(&self, stream: u64) -> Self {
        let folded = self.s[0]
            ^ self.s[1].rotate_left(17)
            ^ self.s[2].rotate_left(31)
            ^ self.s[3].rotate_left(47);
        let mut sm = folded ^ stream.wrapping_add(1).wrapping_mul(STREAM_SPREAD);
        // Burn one output so that stream 0 does not share its first state
        // word with a plain `new(folded)`.
        splitmix64(&mut sm);
        Self {
            s: [
                splitmix64(&mut sm),
                splitmix64(&mut sm),
                splitmix64(&mut sm),
                splitmix64(&mut sm),
            ],
        }
    }

    /// Generate the next `u64` in the sequence.
    pub fn next_u64(&mut self) -> u64 {
        let result = (self.s[0].wrapping_add(self.s[3]))
            .rotate_left(23)
            .wrapping_add(self.s[0]);

        let t = self.s[1] << 17;

        self.s[2] ^= self.s[0];
        self.s[3] ^= self.s[1];
        self.s[1] ^= self.s[2];
        self.s[0] ^= self.s[3];

        self.s[2] ^= t;
        self.s[3] = self.s[3].rotate_left(45);

        result
    }

    /// Generate a uniform `f64` in [0, 1) from the upper 53 bits.
    pub fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Generate a uniform random integer in `[low, high)`.
    ///
    /// Uses rejection sampling to avoid modulo bias.
    /// Panics if `low >= high`.
    pub fn range_u64(&mut self, low: u64, high: u64) -> u64 {
        assert!(low < high, "range_u64: low must be less than high");
        let range = high - low;
        if range.is_power_of_two() {
            return low + (self.next_u64() & (range - 1));
        }
        let threshold = range.wrapping_neg() % range;
        loop {
            let r = self.next_u64();
            if r >= threshold {
                return low + (r % range);
            }
        }
    }

    /// Generate a uniform random `usize` in `[low, high)`.
    ///
    /// Panics if `low >= high`.
    pub fn range_usize(&mut self, low: usize, high: usize) -> usize {
        self.range_u64(low as u64, high as u64) as usize
    }

    /// Return `true` with probability `p`.
    ///
    /// `p <= 0.0` always returns false, `p >= 1.0` always returns true.
    pub fn random_bool(&mut self, p: f64) -> bool {
        self.next_f64() < p
    }

    /// Pick an index with probability proportional to `weights[i]`.
    ///
    /// Consumes exactly one `next_f64` draw whenever the total weight is
    /// positive. Non-positive and non-finite weights are never chosen.
    /// Returns `None` for an empty slice or a non-positive total.
    pub fn weighted_index(&mut self, weights: &[f64]) -> Option<usize> {
        let usable = |w: f64| if w.is_finite() && w > 0.0 { w } else { 0.0 };
        let total: f64 = weights.iter().copied().map(usable).sum();
        if total <= 0.0 {
            return None;
        }
        let target = self.next_f64() * total;
        let mut acc = 0.0;
        let mut last_positive = None;
        for (i, &w) in weights.iter().enumerate() {
            let w = usable(w);
            if w == 0.0 {
                continue;
            }
            acc += w;
            last_positive = Some(i);
            if target < acc {
                return Some(i);
            }
        }
        // Rounding can leave `target` a hair above the accumulated total.
        last_positive
    }

    /// Shuffle a slice in place (Fisher–Yates, back to front).
    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        for i in (1..items.len()).rev() {
            let j = self.range_usize(0, i + 1);
            items.swap(i, j);
        }
    }
}

/// SplitMix64, used only for seeding xoshiro256++ from a single `u64`.
fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn determinism_same_seed_same_output() {
        let mut a = LoopRng::new(42);
        let mut b = LoopRng::new(42);
        for _ in 0..1000 {
            assert_eq!(a.next_u64(), b.next_u64());
        }
    }

    #[test]
    fn different_seeds_different_output() {
        let mut a = LoopRng::new(42);
        let mut b = LoopRng::new(43);
        assert_ne!(a.next_u64(), b.next_u64());
    }

    #[test]
    fn f64_in_unit_range() {
        let mut rng = LoopRng::new(12345);
        for _ in 0..10_000 {
            let v = rng.next_f64();
            assert!((0.0..1.0).contains(&v), "f64 out of range: {v}");
        }
    }

    #[test]
    fn range_usize_within_bounds() {
        let mut rng = LoopRng::new(555);
        for _ in 0..10_000 {
            let v = rng.range_usize(5, 15);
            assert!((5..15).contains(&v), "range_usize out of range: {v}");
        }
    }

    #[test]
    fn random_bool_extremes() {
        let mut rng = LoopRng::new(42);
        for _ in 0..100 {
            assert!(!rng.random_bool(0.0));
        }
        for _ in 0..100 {
            assert!(rng.random_bool(1.0));
        }
    }

    #[test]
    fn weighted_index_skips_zero_weights() {
        let mut rng = LoopRng::new(7);
        for _ in 0..5_000 {
            let i = rng.weighted_index(&[0.0, 3.0, 0.0, 1.0]).unwrap();
            assert!(i == 1 || i == 3, "picked zero-weight index {i}");
        }
    }

    #[test]
    fn weighted_index_empty_or_zero_total() {
        let mut rng = LoopRng::new(7);
        assert_eq!(rng.weighted_index(&[]), None);
        assert_eq!(rng.weighted_index(&[0.0, 0.0]), None);
    }

    #[test]
    fn weighted_index_follows_weights() {
        let mut rng = LoopRng::new(99);
        let mut hits = [0usize; 2];
        let n = 20_000;
        for _ in 0..n {
            hits[rng.weighted_index(&[3.0, 1.0]).unwrap()] += 1;
        }
        let ratio = hits[0] as f64 / n as f64;
        assert!(
            (0.72..0.78).contains(&ratio),
            "expected ~75% for weight 3:1, got {:.1}%",
            ratio * 100.0
        );
    }

    #[test]
    fn shuffle_is_a_permutation() {
        let mut rng = LoopRng::new(3);
        let mut items: Vec<u32> = (0..20).collect();
        rng.shuffle(&mut items);
        let mut sorted = items.clone();
        sorted.sort();
        assert_eq!(sorted, (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn fork_does_not_advance_parent() {
        let mut a = LoopRng::new(11);
        let b = a.clone();
        let _child = a.fork(5);
        assert_eq!(a, b);
        assert_eq!(a.next_u64(), b.clone().next_u64());
    }

    #[test]
    fn fork_streams_are_reproducible_and_distinct() {
        let parent = LoopRng::new(2024);
        let mut x1 = parent.fork(1);
        let mut x2 = parent.fork(1);
        let mut y = parent.fork(2);
        let xs: Vec<u64> = (0..8).map(|_| x1.next_u64()).collect();
        let xs2: Vec<u64> = (0..8).map(|_| x2.next_u64()).collect();
        let ys: Vec<u64> = (0..8).map(|_| y.next_u64()).collect();
        assert_eq!(xs, xs2);
        assert_ne!(xs, ys);
    }

    #[test]
    fn serialization_roundtrip() {
        let mut rng = LoopRng::new(42);
        for _ in 0..100 {
            rng.next_u64();
        }
        let json = serde_json::to_string(&rng).unwrap();
        let mut restored: LoopRng = serde_json::from_str(&json).unwrap();
        for _ in 0..100 {
            assert_eq!(rng.next_u64(), restored.next_u64());
        }
    }
}
