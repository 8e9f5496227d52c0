//! Benchmarks for the audio timeline.
//!
//! Run with: cargo bench
//!
//! Reference timing at 48kHz sample rate:
//!   - 64 samples  = 1.33ms deadline
//!   - 128 samples = 2.67ms deadline
//!   - 256 samples = 5.33ms deadline
//!   - 512 samples = 10.67ms deadline
//!
//! Benchmark groups:
//!   - engine/renderer   Full block: clock, triggers, voices, effects
//!   - engine/effects    The master chain alone
//!   - engine/voices     The voice pool alone, every track busy

use std::hint::black_box;

use beatgrid::{
    effects::{DefaultStageFactory, EffectParams, EffectsChain},
    engine::{scope_channel, Renderer, RendererParts},
    sequencing::{SessionLayout, StepSequencer, TrackId, TriggerSink},
    synth::{VoiceId, VoicePool, VoiceRef},
    transport::TransportClock,
    voices::VoiceSpec,
    EngineConfig,
};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

const SR: f32 = 48_000.0;

/// Common buffer sizes used in audio applications.
const BLOCK_SIZES: &[usize] = &[64, 128, 256, 512];

fn lead_voice() -> VoiceRef {
    VoiceRef {
        track: TrackId(4),
        id: VoiceId(0),
    }
}

/// Every step of every track active.
fn busy_sequencer(layout: &SessionLayout) -> StepSequencer {
    let mut sequencer = StepSequencer::new(layout);
    for track in 0..layout.len() {
        for step in 0..16 {
            let _ = sequencer.toggle_step(TrackId(track), step);
        }
    }
    sequencer
}

fn busy_renderer(config: &EngineConfig) -> Renderer {
    let layout = SessionLayout::default();
    let pool = VoicePool::new(&layout, &VoiceSpec::default(), SR, config).expect("pool");
    let chain = EffectsChain::build(lead_voice(), EffectParams::default(), SR, &DefaultStageFactory)
        .expect("chain");
    let (tap, _visualizer) = scope_channel(config.scope_window, SR, config.spectrum_bins);

    let mut clock = TransportClock::new(SR);
    clock.set_bpm(240.0);
    clock.start();

    let parts = RendererParts {
        clock,
        sequencer: Box::new(busy_sequencer(&layout)),
        pool: Box::new(pool),
        chain: Some(Box::new(chain)),
        tap,
        master_gain: config.master_gain,
    };
    Renderer::new(parts, config).0
}

pub fn bench_renderer(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine/renderer");
    let config = EngineConfig::default();

    for &size in BLOCK_SIZES {
        let mut renderer = busy_renderer(&config);
        let mut buffer = vec![0.0f32; size * 2];

        group.bench_with_input(BenchmarkId::new("stereo_busy", size), &size, |b, _| {
            b.iter(|| renderer.render_interleaved(black_box(&mut buffer), 2))
        });
    }

    group.finish();
}

pub fn bench_effects(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine/effects");

    for &size in BLOCK_SIZES {
        let mut chain =
            EffectsChain::build(lead_voice(), EffectParams::default(), SR, &DefaultStageFactory)
                .expect("chain");
        let mut buffer: Vec<f32> = (0..size).map(|i| (i as f32 * 0.05).sin() * 0.5).collect();

        group.bench_with_input(BenchmarkId::new("full_chain", size), &size, |b, _| {
            b.iter(|| chain.process(black_box(&mut buffer)))
        });
    }

    group.finish();
}

pub fn bench_voices(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine/voices");
    let config = EngineConfig::default();
    let layout = SessionLayout::default();

    for &size in BLOCK_SIZES {
        let mut pool = VoicePool::new(&layout, &VoiceSpec::default(), SR, &config).expect("pool");
        let mut buffer = vec![0.0f32; size];

        group.bench_with_input(BenchmarkId::new("all_tracks", size), &size, |b, _| {
            b.iter(|| {
                let frame = pool.position();
                for track in 0..layout.len() {
                    let _ = pool.trigger_voice(TrackId(track), 0.8, None, frame);
                }
                pool.render(black_box(&mut buffer));
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_renderer, bench_effects, bench_voices);
criterion_main!(benches);
