//! Criterion benchmarks for polysynth-engine components
//!
//! Run with: cargo bench -p polysynth-engine

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use polysynth_engine::{
    Arena, Envelope, EnvelopeParams, SynthConfig, Synthesizer, WaveformId, WaveformRegistry,
};

const SAMPLE_RATE: f32 = 44100.0;
const BLOCK_SIZES: &[usize] = &[64, 128, 256, 512, 1024];

// ============================================================================
// Waveform benchmarks
// ============================================================================

fn bench_registry_sample(c: &mut Criterion) {
    let mut group = c.benchmark_group("WaveformRegistry");
    let mut registry = WaveformRegistry::new();
    let custom = registry
        .register_custom("parabola", |p: f32| 1.0 - 8.0 * (p - 0.5) * (p - 0.5))
        .unwrap();

    let waveforms = [
        ("Sine", WaveformId::SINE),
        ("Square", WaveformId::SQUARE),
        ("Saw", WaveformId::SAW),
        ("Triangle", WaveformId::TRIANGLE),
        ("Custom", custom),
    ];

    for (name, id) in waveforms {
        for &block_size in BLOCK_SIZES {
            group.bench_with_input(
                BenchmarkId::new(name, block_size),
                &block_size,
                |b, &size| {
                    b.iter(|| {
                        let mut sum = 0.0f32;
                        for i in 0..size {
                            sum += registry.sample(id, i as f32 / size as f32);
                        }
                        black_box(sum)
                    })
                },
            );
        }
    }

    group.finish();
}

// ============================================================================
// Envelope benchmarks
// ============================================================================

fn bench_envelope(c: &mut Criterion) {
    let mut group = c.benchmark_group("Envelope");

    for &block_size in BLOCK_SIZES {
        let mut env = Envelope::new(SAMPLE_RATE, EnvelopeParams::new(0.01, 0.05, 0.7, 0.2));
        env.gate_on();

        group.bench_with_input(
            BenchmarkId::from_parameter(block_size),
            &block_size,
            |b, &size| {
                b.iter(|| {
                    let mut sum = 0.0f32;
                    for _ in 0..size {
                        sum += env.advance();
                    }
                    black_box(sum)
                })
            },
        );
    }

    group.finish();
}

// ============================================================================
// Mixer benchmarks
// ============================================================================

fn bench_process_buffer(c: &mut Criterion) {
    let mut group = c.benchmark_group("Synthesizer_ProcessBuffer");

    for voices in [1usize, 8, 32, 64] {
        let synth = Synthesizer::new(SynthConfig {
            max_voices: 64,
            envelope: EnvelopeParams::new(0.01, 0.1, 0.8, 0.5),
            ..SynthConfig::default()
        })
        .unwrap();
        for i in 0..voices {
            synth
                .trigger_note(110.0 + i as f32 * 7.0, 0.2, WaveformId::SAW)
                .unwrap();
        }
        let mut buffer = vec![0.0f32; 512 * 2];

        group.bench_with_input(BenchmarkId::new("voices", voices), &voices, |b, _| {
            b.iter(|| black_box(synth.process_buffer(&mut buffer, 512)))
        });
    }

    group.finish();
}

fn bench_trigger_release(c: &mut Criterion) {
    let mut group = c.benchmark_group("Synthesizer_TriggerRelease");
    let synth = Synthesizer::init(64, SAMPLE_RATE, 2).unwrap();

    group.bench_function("trigger_release", |b| {
        b.iter(|| {
            synth.all_notes_off();
            for i in 0..64 {
                let index = synth
                    .trigger_note(black_box(220.0 + i as f32), 0.5, WaveformId::SINE)
                    .unwrap();
                synth.release_note(index).unwrap();
            }
        })
    });

    group.finish();
}

fn bench_arena_alloc(c: &mut Criterion) {
    c.bench_function("Arena_alloc_reset", |b| {
        let arena = Arena::default();
        b.iter(|| {
            for _ in 0..256 {
                black_box(arena.alloc(black_box(100)).ok());
            }
            arena.reset();
        })
    });
}

criterion_group!(
    benches,
    bench_registry_sample,
    bench_envelope,
    bench_process_buffer,
    bench_trigger_release,
    bench_arena_alloc,
);

criterion_main!(benches);
