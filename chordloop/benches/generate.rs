//! Benchmarks for batch generation and voicing

use chordloop::banlist::NoBans;
use chordloop::config::{GeneratorConfig, VoicingConfig};
use chordloop::generator::generate_batch;
use chordloop::voicing::{VoicingEngine, VoicingMode};
use criterion::{Criterion, black_box, criterion_group, criterion_main};

fn bench_generate(c: &mut Criterion) {
    let config = GeneratorConfig::default();

    c.bench_function("generate_batch_10", |b| {
        b.iter(|| generate_batch(black_box(10), black_box(42), &config, None, &NoBans));
    });

    c.bench_function("generate_batch_100", |b| {
        b.iter(|| generate_batch(black_box(100), black_box(42), &config, None, &NoBans));
    });
}

fn bench_voicing(c: &mut Criterion) {
    let generator = GeneratorConfig::default();
    let voicing = VoicingConfig::default();
    let engine = VoicingEngine::new(&voicing);
    let Ok(batch) = generate_batch(20, 7, &generator, None, &NoBans) else {
        return;
    };

    c.bench_function("revoice_20_progressions", |b| {
        b.iter(|| {
            for (i, p) in batch.progressions.iter().enumerate() {
                black_box(engine.voice_progression(p, VoicingMode::Revoiced, 7, i + 1));
            }
        });
    });

    c.bench_function("revoice_single_cmin11", |b| {
        b.iter(|| engine.voice_single_chord(black_box("Cmin11"), VoicingMode::Revoiced, 7));
    });
}

criterion_group!(benches, bench_generate, bench_voicing);
criterion_main!(benches);
