// Template and duration sampling.
//
// Three weighted draws, all from the caller's `LoopRng`:
// - shape: a (total bars, chord count) pair from the product of the two
//   marginal distributions, restricted to pairs that have a duration table;
// - template: a scale-degree sequence of the chosen length;
// - durations: a bar partition of the total with one entry per chord.
//
// Each draw consumes exactly one `next_f64`, so a run is reproducible given
// the stream's prior consumption. Tables come from `GeneratorConfig`.

use crate::config::{GeneratorConfig, Weighted};
use chordloop_prng::LoopRng;

/// The size of one candidate progression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shape {
    pub total_bars: u8,
    pub chords: usize,
}

/// Joint (total bars, chord count) weights, precomputed once per batch.
#[derive(Debug, Clone)]
pub struct ShapeTable {
    shapes: Vec<Shape>,
    weights: Vec<f64>,
}

impl ShapeTable {
    /// Product of the marginals over combinations with a duration entry and
    /// templates of the right length, in duration-table order sorted by
    /// (chords, total bars).
    pub fn new(config: &GeneratorConfig) -> Self {
        let mut combos: Vec<Shape> = config
            .durations
            .iter()
            .filter(|e| !e.partitions.is_empty())
            .filter(|e| config.templates.get(&e.chords).is_some_and(|t| !t.is_empty()))
            .map(|e| Shape { total_bars: e.total_bars, chords: e.chords })
            .collect();
        combos.sort_by_key(|s| (s.chords, s.total_bars));
        combos.dedup();

        let mut shapes = Vec::new();
        let mut weights = Vec::new();
        for shape in combos {
            let bars_w = config.total_bars_distribution.get(&shape.total_bars).copied().unwrap_or(0.0);
            let count_w = config.chord_count_distribution.get(&shape.chords).copied().unwrap_or(0.0);
            let w = bars_w * count_w;
            if w > 0.0 {
                shapes.push(shape);
                weights.push(w);
            }
        }
        ShapeTable { shapes, weights }
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    /// Draw a shape. `None` only when the table is empty.
    pub fn sample(&self, rng: &mut LoopRng) -> Option<Shape> {
        rng.weighted_index(&self.weights).map(|i| self.shapes[i])
    }
}

/// Draw one entry of a weighted table.
pub fn choose_weighted<'a, T>(rng: &mut LoopRng, table: &'a [Weighted<T>]) -> Option<&'a T> {
    // Tables are short; collecting the weights keeps `weighted_index` generic.
    let weights: smallvec::SmallVec<[f64; 16]> = table.iter().map(|e| e.weight).collect();
    rng.weighted_index(&weights).map(|i| &table[i].value)
}

/// Draw a scale-degree template of length `chords`.
pub fn sample_template<'a>(
    rng: &mut LoopRng,
    config: &'a GeneratorConfig,
    chords: usize,
) -> Option<&'a [u8]> {
    let table = config.templates.get(&chords)?;
    choose_weighted(rng, table).map(Vec::as_slice)
}

/// Draw a bar partition of `shape.total_bars` into `shape.chords` entries.
pub fn sample_durations<'a>(
    rng: &mut LoopRng,
    config: &'a GeneratorConfig,
    shape: Shape,
) -> Option<&'a [u8]> {
    let table = config.partitions(shape.chords, shape.total_bars)?;
    choose_weighted(rng, table).map(Vec::as_slice)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_table_covers_known_combinations() {
        let config = GeneratorConfig::default();
        let table = ShapeTable::new(&config);
        // 5 chord counts x 3 bar totals, minus 5 and 6 chords in 4 bars.
        assert_eq!(table.len(), 13);
        assert!(config.partitions(5, 4).is_none());
        assert!(config.partitions(6, 4).is_none());
        let mut rng = LoopRng::new(3);
        for _ in 0..2_000 {
            let shape = table.sample(&mut rng).unwrap();
            assert!(!(shape.total_bars == 4 && shape.chords >= 5), "{shape:?}");
        }
    }

    #[test]
    fn shapes_only_from_known_combinations() {
        let config = GeneratorConfig::default();
        let table = ShapeTable::new(&config);
        let mut rng = LoopRng::new(1);
        for _ in 0..2_000 {
            let shape = table.sample(&mut rng).unwrap();
            assert!(config.partitions(shape.chords, shape.total_bars).is_some());
        }
    }

    #[test]
    fn zero_marginal_excludes_combination() {
        let mut config = GeneratorConfig::default();
        config.total_bars_distribution.insert(16, 0.0);
        let table = ShapeTable::new(&config);
        let mut rng = LoopRng::new(9);
        for _ in 0..2_000 {
            assert_ne!(table.sample(&mut rng).unwrap().total_bars, 16);
        }
    }

    #[test]
    fn templates_and_durations_match_shape() {
        let config = GeneratorConfig::default();
        let table = ShapeTable::new(&config);
        let mut rng = LoopRng::new(77);
        for _ in 0..2_000 {
            let shape = table.sample(&mut rng).unwrap();
            let template = sample_template(&mut rng, &config, shape.chords).unwrap();
            let durations = sample_durations(&mut rng, &config, shape).unwrap();
            assert_eq!(template.len(), shape.chords);
            assert_eq!(durations.len(), shape.chords);
            let sum: u32 = durations.iter().map(|&d| d as u32).sum();
            assert_eq!(sum, shape.total_bars as u32);
        }
    }

    #[test]
    fn sampling_is_reproducible() {
        let config = GeneratorConfig::default();
        let table = ShapeTable::new(&config);
        let draw = |seed| {
            let mut rng = LoopRng::new(seed);
            (0..50)
                .map(|_| {
                    let shape = table.sample(&mut rng).unwrap();
                    sample_template(&mut rng, &config, shape.chords).unwrap().to_vec()
                })
                .collect::<Vec<_>>()
        };
        assert_eq!(draw(5), draw(5));
    }
}
