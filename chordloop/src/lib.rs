// Chordloop: ambient chord-loop generator.
//
// Produces batches of short diatonic chord progressions (4, 8 or 16 bars)
// that loop seamlessly, then voices them with a register-aware voicing engine
// and writes them out as MIDI packs.
//
// Architecture:
// - quality.rs: Chord-quality table (intervals, names, sus families)
// - theory.rs: Keys, spelled scales, pitch-class sets, loop-aware similarity
// - config.rs: Generator, voicing and export configuration with defaults
// - balance.rs: Quality sliders and the per-key degree pools built from them
// - sampler.rs: Weighted shape, template and duration sampling
// - progression.rs: Chord symbols and accepted progressions
// - builder.rs: One build attempt: degree template to checked progression
// - generator.rs: Batch loop (key spread, retries, dedup, pattern quota)
// - banlist.rs: Banned chord sequences loaded from text
// - chord_name.rs: Chord-name parsing and raw (unvoiced) notes
// - candidates.rs: Voicing candidates and register sanitizing
// - cost.rs: Voicing cost model and selection filters
// - repair.rs: Cross-semitone clash repair
// - register.rs: Register hard pass and progression-wide optimizer
// - voicing.rs: Raw / revoiced pipelines and chord scheduling
// - midi.rs: SMF output for scheduled chords
// - export.rs: Pack layout, validation and summary
// - error.rs: Crate error type
//
// All randomness flows through `chordloop_prng::LoopRng`, so a seed
// reproduces a batch and its voicings exactly.

pub mod balance;
pub mod banlist;
pub mod builder;
pub mod candidates;
pub mod chord_name;
pub mod config;
pub mod cost;
pub mod error;
pub mod export;
pub mod generator;
pub mod midi;
pub mod progression;
pub mod quality;
pub mod register;
pub mod repair;
pub mod sampler;
pub mod theory;
pub mod voicing;

pub use error::{Error, Result};
