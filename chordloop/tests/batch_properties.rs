// Batch-level properties over seeded runs.
//
// Generates full batches through the public API and checks what every
// batch must satisfy: diatonic chords, loop-safe transitions, bar sums,
// uniqueness, the pattern quota, strict balance, banlists, and the
// register invariants of both voicing modes. Also writes one pack to a
// scratch directory and reads the files back.

use std::collections::HashMap;

use chordloop::balance::ChordBalance;
use chordloop::banlist::{BanList, NoBans};
use chordloop::config::{AppConfig, GeneratorConfig};
use chordloop::export::{PackExporter, PackSummary};
use chordloop::generator::{Batch, generate_batch};
use chordloop::progression::ChordSymbol;
use chordloop::quality::Quality;
use chordloop::theory::{is_diatonic, loop_pairs, shared_tones};
use chordloop::voicing::{VoicingEngine, VoicingMode};
use chordloop::Error;

fn batch(n: usize, seed: u64) -> Batch {
    generate_batch(n, seed, &GeneratorConfig::default(), None, &NoBans)
        .unwrap_or_else(|e| panic!("seed {seed}: {e}"))
}

#[test]
fn chords_are_diatonic_and_loop_safe() {
    for seed in [1, 2, 3] {
        let b = batch(24, seed);
        assert_eq!(b.progressions.len(), 24);
        for p in &b.progressions {
            for c in &p.chords {
                assert!(is_diatonic(p.key, c.root_pc(), c.quality()), "{c} not in {}", p.key);
            }
            for (a, b) in loop_pairs(&p.pcs()) {
                assert!(shared_tones(a, b) >= 1, "{}: zero shared tones", p.chord_list(" "));
            }
        }
        assert_eq!(b.diagnostics.low_sim_total, 0);
    }
}

#[test]
fn bar_sums_and_lengths_agree() {
    let b = batch(30, 7);
    for p in &b.progressions {
        assert!(matches!(p.total_bars(), 4 | 8 | 16), "{:?}", p.durations);
        assert_eq!(p.durations.len(), p.chords.len());
        assert_eq!(p.degrees.len(), p.chords.len());
        assert_eq!(p.qualities.len(), p.chords.len());
    }
}

#[test]
fn sequences_unique_and_pattern_quota_respected() {
    let n = 60;
    let b = batch(n, 11);
    let mut sequences: Vec<&[ChordSymbol]> = b.progressions.iter().map(|p| p.chords.as_slice()).collect();
    sequences.sort();
    sequences.dedup();
    assert_eq!(sequences.len(), n, "duplicate chord sequence in batch");

    let repeats: usize = fingerprint_counts(&b).values().map(|&c| c - 1).sum();
    let allowed = (n as f64 * GeneratorConfig::default().max_pattern_duplicate_ratio).floor() as usize;
    assert!(repeats <= allowed, "{repeats} repeats > {allowed}");
    assert_eq!(repeats, b.diagnostics.pattern_dupe_used);
}

fn fingerprint_counts(b: &Batch) -> HashMap<(Vec<u8>, Vec<Quality>), usize> {
    let mut counts: HashMap<(Vec<u8>, Vec<Quality>), usize> = HashMap::new();
    for p in &b.progressions {
        *counts.entry((p.degrees.clone(), p.qualities.clone())).or_default() += 1;
    }
    counts
}

#[test]
fn large_batch_stays_within_pattern_quota() {
    let n = 200;
    let b = batch(n, 17);
    assert_eq!(b.progressions.len(), n);
    let d = &b.diagnostics;
    assert_eq!(d.max_pattern_dupes, 2);
    assert!(d.pattern_dupe_used <= d.max_pattern_dupes, "{d:?}");

    let counts = fingerprint_counts(&b);
    let most = counts.values().copied().max().unwrap_or(0);
    assert!(most <= 2, "a fingerprint appears {most} times");
    let repeats: usize = counts.values().map(|&c| c - 1).sum();
    assert_eq!(repeats, d.pattern_dupe_used);
}

#[test]
fn per_fingerprint_cap_binds_under_generous_ratio() {
    let mut config = GeneratorConfig::default();
    config.max_pattern_duplicate_ratio = 0.5;
    let n = 120;
    let b = generate_batch(n, 23, &config, None, &NoBans).unwrap();
    assert_eq!(b.diagnostics.max_pattern_dupes, 60);
    let counts = fingerprint_counts(&b);
    assert!(
        counts.values().all(|&c| c <= config.pattern_max_repeats + 1),
        "{:?}",
        counts.values().max()
    );
}

#[test]
fn strict_single_quality_never_substitutes() {
    let mut config = GeneratorConfig::default();
    config.strict_balance = true;
    config.max_tries_per_progression = 4000;
    for quality in [Quality::Min7, Quality::Maj7] {
        let balance = ChordBalance::only(quality);
        match generate_batch(6, 5, &config, Some(&balance), &NoBans) {
            Ok(b) => {
                for p in &b.progressions {
                    assert!(p.qualities.iter().all(|&q| q == quality), "{}", p.chord_list(" "));
                }
            }
            Err(Error::Unsatisfiable { .. }) => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    let mut none = ChordBalance::new();
    for q in Quality::ALL {
        none.set(q, 0);
    }
    assert!(matches!(
        generate_batch(3, 5, &config, Some(&none), &NoBans),
        Err(Error::Config(_))
    ));
}

#[test]
fn banned_sequences_are_skipped() {
    let first = batch(8, 21);
    let banned: Vec<Vec<ChordSymbol>> = first.progressions.iter().take(3).map(|p| p.chords.clone()).collect();
    let text: String = banned
        .iter()
        .map(|seq| seq.iter().map(ToString::to_string).collect::<Vec<_>>().join(" - ") + "\n")
        .collect();
    let bans = BanList::parse(&text).unwrap();
    assert_eq!(bans.len(), 3);

    let second = generate_batch(8, 21, &GeneratorConfig::default(), None, &bans).unwrap();
    for p in &second.progressions {
        assert!(!banned.contains(&p.chords), "banned {} generated", p.chord_list(" "));
    }
}

#[test]
fn same_seed_same_batch() {
    assert_eq!(batch(12, 99), batch(12, 99));
    assert_ne!(batch(12, 99).progressions, batch(12, 100).progressions);
}

#[test]
fn voicings_stay_in_register() {
    let config = AppConfig::default();
    let engine = VoicingEngine::new(&config.voicing);
    let floor = config.voicing.register.floor as i32;
    let ceiling = config.voicing.register.ceiling as i32;
    let bass_window = config.voicing.register.bass_window;
    let b = batch(16, 31);
    for mode in [VoicingMode::Raw, VoicingMode::Revoiced] {
        for (i, p) in b.progressions.iter().enumerate() {
            let voiced = engine.voice_progression(p, mode, 31, i + 1);
            assert_eq!(voiced.len(), p.len());
            for (notes, chord) in voiced.iter().zip(&p.chords) {
                assert_eq!(notes.len(), chord.quality().note_count(), "{chord} {mode:?}: {notes:?}");
                assert!(
                    notes.iter().all(|&n| (floor..=ceiling).contains(&n)),
                    "{chord} {mode:?}: {notes:?}"
                );
                let bass = notes.iter().copied().min().unwrap();
                assert!(
                    (48..=62).contains(&bass) && bass_window.contains(bass),
                    "{chord} {mode:?}: bass {bass} outside the bass window"
                );
            }
        }
    }
}

#[test]
fn isolated_chord_revoicing() {
    let config = AppConfig::default();
    let engine = VoicingEngine::new(&config.voicing);
    let a = engine.voice_single_chord("Cmin11", VoicingMode::Revoiced, 2024).unwrap();
    let b = engine.voice_single_chord("Cmin11", VoicingMode::Revoiced, 2024).unwrap();
    assert_eq!(a, b);
    let mut pcs: Vec<i32> = a.iter().map(|n| n.rem_euclid(12)).collect();
    pcs.sort_unstable();
    assert_eq!(pcs, vec![0, 2, 3, 5, 7, 10]);
    assert!(a.iter().all(|&n| (48..=84).contains(&n)), "{a:?}");
}

#[test]
fn pack_export_writes_layout() {
    let config = AppConfig::default();
    let b = batch(5, 8);
    let out = std::env::temp_dir().join(format!("chordloop-pack-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&out);

    let exporter = PackExporter::new(&config, VoicingMode::Revoiced, 8);
    let report = exporter.write_pack(&b, &out).unwrap();
    assert_eq!(report.progression_files.len(), 5);
    assert!(!report.chord_files.is_empty());
    for path in report.progression_files.iter().chain(&report.chord_files) {
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.ends_with("_Revoiced.mid"), "{name}");
        let bytes = std::fs::read(path).unwrap();
        assert_eq!(&bytes[..4], b"MThd");
    }
    assert!(report.progression_files[0].starts_with(out.join("Progressions")));

    let summary: PackSummary =
        serde_json::from_str(&std::fs::read_to_string(&report.summary_file).unwrap()).unwrap();
    assert_eq!(summary.seed, 8);
    assert_eq!(summary.mode, VoicingMode::Revoiced);
    assert_eq!(summary.rows.len(), 5);
    assert_eq!(summary.diagnostics, b.diagnostics);

    std::fs::remove_dir_all(&out).unwrap();
}
