// Data-driven generator, voicing, and export configuration.
//
// Every table and tunable the engines read lives here: the (bars, chord
// count) marginals, scale-degree templates, bar-duration partitions,
// fallback order, sus-safety thresholds, register bounds, cost weights, and
// export timing. The engines never hard-code these values; they receive a
// config reference and read from it, so a JSON file can retune the
// generator without recompiling.
//
// `Default` for each struct reproduces the stock tables. `#[serde(default)]`
// lets a JSON file override only the fields it names.
//
// `GeneratorConfig::validate` checks the cross-table invariants the sampler
// relies on (template lengths match chord counts, partitions sum to their
// bar total). It runs before any search, so a broken table surfaces as a
// configuration error instead of a slot that can never succeed.

use crate::error::{Error, Result};
use crate::quality::Quality;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Bar totals a progression may have.
pub const VALID_TOTAL_BARS: [u8; 3] = [4, 8, 16];

/// A table entry with a relative sampling weight.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Weighted<T> {
    pub value: T,
    pub weight: f64,
}

impl<T> Weighted<T> {
    pub fn new(value: T, weight: f64) -> Self {
        Weighted { value, weight }
    }
}

/// Bar-duration partitions for one (chord count, total bars) combination.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DurationEntry {
    pub chords: usize,
    pub total_bars: u8,
    pub partitions: Vec<Weighted<Vec<u8>>>,
}

// ---------------------------------------------------------------------------
// Sus safety
// ---------------------------------------------------------------------------

/// Thresholds for the two sus-chord regimes applied by the builder.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SusRules {
    /// A progression may open on a sus chord only when some sus slider
    /// exceeds this raw value.
    pub start_slider_threshold: u8,
    /// Average balance factor over the sus qualities that switches the
    /// builder into the sus-heavy regime.
    pub heavy_activation_factor: f64,
    /// Default regime: maximum share of sus chords in one progression.
    pub default_max_ratio: f64,
    /// Default regime: maximum count of sus4-family chords.
    pub default_max_sus4: usize,
    /// Default regime: shared tones required when either side is sus.
    pub default_need_if_sus: u32,
    /// Both regimes: shared tones required when either side is sus4-family.
    pub need_if_sus4: u32,
    /// Sus-heavy regime: shared tones required on every transition.
    pub heavy_need: u32,
    /// Sus-heavy regime: require a step-wise root move or a repeated root.
    pub heavy_require_step_or_repeat: bool,
    /// sus4 to sus4 transitions are allowed only when safe (enough overlap,
    /// step-wise root motion, or the same root).
    pub allow_sus4_to_sus4_if_safe: bool,
    /// Shared tones that make a sus4 to sus4 transition safe.
    pub sus4_pair_safe_shared: u32,
    /// Root interval (semitones) that counts as step-wise motion.
    pub step_interval: u8,
}

impl Default for SusRules {
    fn default() -> Self {
        SusRules {
            start_slider_threshold: 80,
            heavy_activation_factor: 1.35,
            default_max_ratio: 0.45,
            default_max_sus4: 1,
            default_need_if_sus: 2,
            need_if_sus4: 3,
            heavy_need: 2,
            heavy_require_step_or_repeat: true,
            allow_sus4_to_sus4_if_safe: true,
            sus4_pair_safe_shared: 3,
            step_interval: 2,
        }
    }
}

// ---------------------------------------------------------------------------
// Generator
// ---------------------------------------------------------------------------

/// Tables and limits for progression search.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Marginal distribution over total bars.
    pub total_bars_distribution: BTreeMap<u8, f64>,
    /// Marginal distribution over chord count.
    pub chord_count_distribution: BTreeMap<usize, f64>,
    /// Scale-degree templates keyed by length.
    pub templates: BTreeMap<usize, Vec<Weighted<Vec<u8>>>>,
    pub durations: Vec<DurationEntry>,
    /// Preference order for de-duplication repair.
    pub fallback_order: Vec<Quality>,
    /// Scale-degree steps tried when a repeat has to move to a neighbor.
    pub neighbor_steps: Vec<i8>,
    pub min_shared_tones: u32,
    pub limit_note_count_jumps: bool,
    /// Note-count difference that counts as a big jump.
    pub big_jump_notes: usize,
    pub max_big_jumps: usize,
    pub max_tries_per_progression: usize,
    /// Repeats allowed per (degrees, qualities) fingerprint.
    pub pattern_max_repeats: usize,
    /// Batch-wide fingerprint duplicate allowance as a fraction of n.
    pub max_pattern_duplicate_ratio: f64,
    /// Balance sliders act as hard rules: no silent fallback to disabled
    /// qualities.
    pub strict_balance: bool,
    pub sus: SusRules,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        let w = |degrees: &[u8], weight: f64| Weighted::new(degrees.to_vec(), weight);

        let mut templates = BTreeMap::new();
        templates.insert(
            2,
            vec![w(&[0, 3], 10.0), w(&[0, 5], 7.0), w(&[5, 3], 5.0), w(&[3, 0], 4.0), w(&[0, 4], 3.0)],
        );
        templates.insert(
            3,
            vec![
                w(&[0, 5, 3], 14.0),
                w(&[0, 3, 4], 12.0),
                w(&[0, 3, 5], 10.0),
                w(&[0, 5, 4], 9.0),
                w(&[0, 2, 3], 7.0),
                w(&[0, 2, 5], 6.0),
                w(&[3, 5, 0], 5.0),
                w(&[5, 3, 0], 5.0),
                w(&[0, 1, 3], 3.0),
                w(&[0, 6, 3], 2.0),
            ],
        );
        templates.insert(
            4,
            vec![
                w(&[0, 5, 3, 4], 18.0),
                w(&[0, 5, 3, 0], 12.0),
                w(&[0, 3, 4, 3], 12.0),
                w(&[0, 3, 5, 3], 12.0),
                w(&[0, 2, 5, 3], 10.0),
                w(&[0, 2, 3, 4], 10.0),
                w(&[0, 1, 3, 4], 6.0),
                w(&[0, 1, 3, 0], 5.0),
                w(&[5, 3, 4, 0], 5.0),
                w(&[3, 4, 0, 5], 4.0),
                w(&[0, 4, 3, 5], 4.0),
            ],
        );
        templates.insert(
            5,
            vec![w(&[0, 5, 3, 4, 3], 4.0), w(&[0, 3, 0, 5, 3], 3.0), w(&[0, 2, 3, 4, 3], 3.0)],
        );
        templates.insert(6, vec![w(&[0, 5, 3, 4, 3, 0], 3.0), w(&[0, 3, 0, 5, 3, 0], 3.0)]);

        let d = |chords: usize, total_bars: u8, partitions: &[(&[u8], f64)]| DurationEntry {
            chords,
            total_bars,
            partitions: partitions
                .iter()
                .map(|&(bars, weight)| Weighted::new(bars.to_vec(), weight))
                .collect(),
        };
        let durations = vec![
            d(2, 4, &[(&[2, 2], 10.0)]),
            d(3, 4, &[(&[2, 1, 1], 10.0), (&[1, 1, 2], 8.0)]),
            d(4, 4, &[(&[1, 1, 1, 1], 12.0)]),
            d(2, 8, &[(&[4, 4], 12.0)]),
            d(3, 8, &[(&[4, 2, 2], 10.0), (&[2, 2, 4], 9.0), (&[2, 4, 2], 2.0), (&[3, 3, 2], 1.0)]),
            d(
                4,
                8,
                &[
                    (&[2, 2, 2, 2], 12.0),
                    (&[4, 2, 1, 1], 3.0),
                    (&[2, 1, 1, 4], 2.0),
                    (&[1, 1, 2, 4], 2.0),
                    (&[4, 1, 1, 2], 1.0),
                ],
            ),
            d(
                5,
                8,
                &[
                    (&[2, 2, 2, 1, 1], 3.0),
                    (&[1, 2, 2, 2, 1], 1.0),
                    (&[2, 1, 2, 1, 2], 7.0),
                    (&[2, 2, 1, 2, 1], 3.0),
                ],
            ),
            d(
                6,
                8,
                &[
                    (&[2, 1, 1, 2, 1, 1], 5.0),
                    (&[1, 1, 1, 1, 2, 2], 1.0),
                    (&[1, 1, 2, 1, 1, 2], 4.0),
                    (&[2, 1, 2, 1, 1, 1], 3.0),
                ],
            ),
            d(2, 16, &[(&[8, 8], 8.0)]),
            d(3, 16, &[(&[8, 4, 4], 4.0), (&[4, 4, 8], 3.0), (&[6, 6, 4], 3.0)]),
            d(4, 16, &[(&[4, 4, 4, 4], 12.0), (&[6, 4, 4, 2], 4.0)]),
            d(
                5,
                16,
                &[
                    (&[4, 4, 4, 2, 2], 3.0),
                    (&[2, 2, 4, 4, 4], 3.0),
                    (&[4, 2, 4, 2, 4], 7.0),
                    (&[2, 4, 4, 4, 2], 3.0),
                ],
            ),
            d(
                6,
                16,
                &[
                    (&[4, 2, 2, 4, 2, 2], 5.0),
                    (&[4, 2, 2, 2, 2, 4], 4.0),
                    (&[2, 4, 2, 4, 2, 2], 5.0),
                ],
            ),
        ];

        GeneratorConfig {
            total_bars_distribution: BTreeMap::from([(8, 0.40), (4, 0.35), (16, 0.25)]),
            chord_count_distribution: BTreeMap::from([
                (4, 0.40),
                (3, 0.35),
                (2, 0.20),
                (5, 0.03),
                (6, 0.02),
            ]),
            templates,
            durations,
            fallback_order: vec![
                Quality::Maj9,
                Quality::Maj7,
                Quality::Add9,
                Quality::SixAdd9,
                Quality::Six,
                Quality::Min9,
                Quality::Min7,
                Quality::Min11,
                Quality::Maj,
                Quality::Min,
                Quality::Sus2Add9,
                Quality::Sus4Add9,
                Quality::Sus2,
                Quality::Sus4,
            ],
            neighbor_steps: vec![1, -1, 2, -2, 3, -3],
            min_shared_tones: 1,
            limit_note_count_jumps: true,
            big_jump_notes: 3,
            max_big_jumps: 1,
            max_tries_per_progression: 40_000,
            pattern_max_repeats: 1,
            max_pattern_duplicate_ratio: 0.01,
            strict_balance: true,
            sus: SusRules::default(),
        }
    }
}

impl GeneratorConfig {
    /// Load generator tables alone from a JSON file and validate them.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: GeneratorConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Partitions for a (chord count, total bars) combination, if any.
    pub fn partitions(&self, chords: usize, total_bars: u8) -> Option<&[Weighted<Vec<u8>>]> {
        self.durations
            .iter()
            .find(|e| e.chords == chords && e.total_bars == total_bars)
            .map(|e| e.partitions.as_slice())
    }

    /// Check cross-table invariants. Any violation is a configuration error.
    pub fn validate(&self) -> Result<()> {
        for (&len, templates) in &self.templates {
            for t in templates {
                if t.value.len() != len {
                    return Err(Error::Config(format!(
                        "template {:?} is listed under length {len}",
                        t.value
                    )));
                }
                if let Some(&bad) = t.value.iter().find(|&&d| d > 6) {
                    return Err(Error::Config(format!(
                        "template {:?} uses scale degree {bad} (expected 0-6)",
                        t.value
                    )));
                }
            }
        }
        for entry in &self.durations {
            if !VALID_TOTAL_BARS.contains(&entry.total_bars) {
                return Err(Error::Config(format!(
                    "duration table entry for {} bars (expected 4, 8 or 16)",
                    entry.total_bars
                )));
            }
            for p in &entry.partitions {
                let sum: u32 = p.value.iter().map(|&b| b as u32).sum();
                if p.value.len() != entry.chords || sum != entry.total_bars as u32 {
                    return Err(Error::Config(format!(
                        "partition {:?} does not split {} bars into {} chords",
                        p.value, entry.total_bars, entry.chords
                    )));
                }
            }
        }
        if self.fallback_order.is_empty() {
            return Err(Error::Config("fallback order is empty".into()));
        }
        if self.max_tries_per_progression == 0 {
            return Err(Error::Config("max_tries_per_progression must be positive".into()));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Voicing
// ---------------------------------------------------------------------------

/// An inclusive MIDI pitch window.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PitchWindow {
    pub low: u8,
    pub high: u8,
}

impl PitchWindow {
    pub fn contains(self, pitch: i32) -> bool {
        pitch >= self.low as i32 && pitch <= self.high as i32
    }

    pub fn center(self) -> f64 {
        (self.low as f64 + self.high as f64) / 2.0
    }

    /// Semitones from `pitch` to the nearest edge, 0 when inside.
    pub fn distance(self, pitch: i32) -> i32 {
        if pitch < self.low as i32 {
            self.low as i32 - pitch
        } else if pitch > self.high as i32 {
            pitch - self.high as i32
        } else {
            0
        }
    }
}

/// Absolute pitch band every voicing must respect.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegisterConfig {
    pub floor: u8,
    pub ceiling: u8,
    /// The lowest note must land here.
    pub bass_window: PitchWindow,
    /// Preferred sub-window for the lowest note.
    pub soft_bass_window: PitchWindow,
    /// Target midpoint between lowest and highest note.
    pub target_center: f64,
    /// Whole-chord octave shifts (±) searched by the bass-preference pass.
    pub bass_search_octaves: i32,
    /// Whole-chord octave shifts (±) tried by the progression optimizer.
    pub optimizer_octaves: i32,
}

impl Default for RegisterConfig {
    fn default() -> Self {
        RegisterConfig {
            floor: 48,
            ceiling: 84,
            bass_window: PitchWindow { low: 48, high: 62 },
            soft_bass_window: PitchWindow { low: 50, high: 57 },
            target_center: 60.0,
            bass_search_octaves: 3,
            optimizer_octaves: 2,
        }
    }
}

impl RegisterConfig {
    /// Check that the windows nest inside the floor/ceiling band and that the
    /// band holds at least an octave.
    pub fn validate(&self) -> Result<()> {
        if (self.ceiling as i32) - (self.floor as i32) < 12 {
            return Err(Error::Config(format!(
                "register {}..={} spans less than an octave",
                self.floor, self.ceiling
            )));
        }
        for (name, window) in [("bass_window", self.bass_window), ("soft_bass_window", self.soft_bass_window)] {
            if window.low > window.high || window.low < self.floor || window.high > self.ceiling {
                return Err(Error::Config(format!(
                    "{name} {}..={} does not fit inside register {}..={}",
                    window.low, window.high, self.floor, self.ceiling
                )));
            }
        }
        if self.bass_search_octaves < 0 || self.optimizer_octaves < 0 {
            return Err(Error::Config("octave search ranges must not be negative".into()));
        }
        Ok(())
    }
}

/// Weights and thresholds for the voicing cost function.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostWeights {
    pub register: f64,
    pub ideal_span: i32,
    pub min_span: i32,
    pub max_span: i32,
    pub span: f64,
    pub span_below_min: f64,
    pub span_above_max: f64,
    pub min_adjacent_gap: i32,
    pub max_adjacent_gap: i32,
    pub hard_max_adjacent_gap: i32,
    pub gap_too_tight: f64,
    pub gap_too_open: f64,
    pub gap_severely_open: f64,
    pub movement: f64,
    pub max_bass_jump: i32,
    pub bass_jump: f64,
    pub exact_repeat: f64,
    pub raw_shape: f64,
    pub cross_semitone: f64,
    pub bass_outside_soft_window: f64,
}

impl Default for CostWeights {
    fn default() -> Self {
        CostWeights {
            register: 120.0,
            ideal_span: 12,
            min_span: 8,
            max_span: 19,
            span: 80.0,
            span_below_min: 700.0,
            span_above_max: 220.0,
            min_adjacent_gap: 2,
            max_adjacent_gap: 9,
            hard_max_adjacent_gap: 12,
            gap_too_tight: 900.0,
            gap_too_open: 420.0,
            gap_severely_open: 1200.0,
            movement: 3.2,
            max_bass_jump: 7,
            bass_jump: 260.0,
            exact_repeat: 900.0,
            raw_shape: 1800.0,
            cross_semitone: 25_000.0,
            bass_outside_soft_window: 150.0,
        }
    }
}

/// Everything the voicing engine reads.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoicingConfig {
    /// Octave of the raw chord root (root MIDI = 12 * (octave + 1) + pc).
    pub base_octave: u8,
    pub register: RegisterConfig,
    pub cost: CostWeights,
    /// Semitone pairs with a note below this pitch are always rejected.
    pub glue_low_cutoff: u8,
    /// Chance of keeping a candidate with a semitone pair above the cutoff.
    pub glue_probability: f64,
    pub max_shared_default: usize,
    pub max_shared_extended: usize,
    /// Qualities that get the higher shared-pitch cap.
    pub extended_qualities: Vec<Quality>,
    pub allow_resolve_to_third: bool,
    pub allow_resolve_to_fifth: bool,
    pub repair_max_iters: usize,
    /// Penalize reproducing the unvoiced shape when re-voicing.
    pub enforce_not_raw: bool,
}

impl Default for VoicingConfig {
    fn default() -> Self {
        VoicingConfig {
            base_octave: 3,
            register: RegisterConfig::default(),
            cost: CostWeights::default(),
            glue_low_cutoff: 48,
            glue_probability: 0.30,
            max_shared_default: 2,
            max_shared_extended: 3,
            extended_qualities: vec![Quality::Min11],
            allow_resolve_to_third: true,
            allow_resolve_to_fifth: false,
            repair_max_iters: 8,
            enforce_not_raw: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Export
// ---------------------------------------------------------------------------

/// Tempo, meter, and note attributes for MIDI export.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub bpm: f64,
    pub beats_per_bar: u8,
    /// Denominator of the time signature (4 = quarter note beat).
    pub beat_unit: u8,
    pub ticks_per_quarter: u16,
    pub velocity: u8,
    pub program: u8,
    /// Length of each file in the chord library.
    pub chord_length_bars: u8,
}

impl Default for ExportConfig {
    fn default() -> Self {
        ExportConfig {
            bpm: 85.0,
            beats_per_bar: 4,
            beat_unit: 4,
            ticks_per_quarter: 480,
            velocity: 100,
            program: 0,
            chord_length_bars: 4,
        }
    }
}

impl VoicingConfig {
    pub fn validate(&self) -> Result<()> {
        self.register.validate()?;
        if !(0.0..=1.0).contains(&self.glue_probability) {
            return Err(Error::Config(format!(
                "glue_probability {} is outside 0..=1",
                self.glue_probability
            )));
        }
        Ok(())
    }
}

impl ExportConfig {
    pub fn seconds_per_bar(&self) -> f64 {
        60.0 / self.bpm * self.beats_per_bar as f64
    }
}

// ---------------------------------------------------------------------------
// Top level
// ---------------------------------------------------------------------------

/// The full configuration file: one section per engine.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub generator: GeneratorConfig,
    pub voicing: VoicingConfig,
    pub export: ExportConfig,
}

impl AppConfig {
    /// Load from a JSON file and validate every section.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: AppConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.generator.validate()?;
        self.voicing.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_tables_are_consistent() {
        GeneratorConfig::default().validate().unwrap();
    }

    #[test]
    fn every_chord_count_has_templates() {
        let config = GeneratorConfig::default();
        for &m in config.chord_count_distribution.keys() {
            assert!(config.templates.contains_key(&m), "no templates of length {m}");
        }
    }

    #[test]
    fn partial_json_overrides_only_named_fields() {
        let json = r#"{ "generator": { "max_tries_per_progression": 500 },
                        "export": { "bpm": 120.0 } }"#;
        let config: AppConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.generator.max_tries_per_progression, 500);
        assert_eq!(config.generator.min_shared_tones, 1);
        assert_eq!(config.export.bpm, 120.0);
        assert_eq!(config.voicing.register.floor, 48);
    }

    #[test]
    fn bad_partition_is_rejected() {
        let mut config = GeneratorConfig::default();
        config.durations.push(DurationEntry {
            chords: 2,
            total_bars: 4,
            partitions: vec![Weighted::new(vec![3, 3], 1.0)],
        });
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn misfiled_template_is_rejected() {
        let mut config = GeneratorConfig::default();
        config.templates.insert(3, vec![Weighted::new(vec![0, 3], 1.0)]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn default_register_is_valid() {
        AppConfig::default().validate().unwrap();
    }

    #[test]
    fn bass_window_outside_register_is_rejected() {
        let mut config = AppConfig::default();
        config.voicing.register.bass_window = PitchWindow { low: 40, high: 62 };
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let mut config = AppConfig::default();
        config.voicing.register.bass_window = PitchWindow { low: 60, high: 90 };
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let mut config = AppConfig::default();
        config.voicing.register.soft_bass_window = PitchWindow { low: 57, high: 50 };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn register_narrower_than_an_octave_is_rejected() {
        let json = r#"{ "voicing": { "register": {
                          "floor": 60, "ceiling": 70,
                          "bass_window": { "low": 60, "high": 64 },
                          "soft_bass_window": { "low": 60, "high": 62 } } } }"#;
        let path = std::env::temp_dir().join(format!("chordloop-register-{}.json", std::process::id()));
        std::fs::write(&path, json).unwrap();
        let loaded = AppConfig::load(&path);
        std::fs::remove_file(&path).unwrap();
        assert!(matches!(loaded, Err(Error::Config(_))), "{loaded:?}");
    }

    #[test]
    fn seconds_per_bar_at_85_bpm() {
        let export = ExportConfig::default();
        assert!((export.seconds_per_bar() - 240.0 / 85.0).abs() < 1e-9);
    }

    #[test]
    fn pitch_window_distance() {
        let w = PitchWindow { low: 50, high: 57 };
        assert_eq!(w.distance(48), 2);
        assert_eq!(w.distance(55), 0);
        assert_eq!(w.distance(60), 3);
        assert!(w.contains(50) && w.contains(57) && !w.contains(58));
    }
}
