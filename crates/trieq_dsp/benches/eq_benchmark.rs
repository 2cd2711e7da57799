//! Performance benchmarks for the DSP module
//!
//! Run with: cargo bench -p trieq_dsp

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use trieq_dsp::{design_chain, ChainSettings, Equalizer, Slope};

fn steep_settings() -> ChainSettings {
    ChainSettings {
        peak_freq: 1000.0,
        peak_gain_db: 6.0,
        low_cut_freq: 80.0,
        high_cut_freq: 12000.0,
        low_cut_slope: Slope::Slope48,
        high_cut_slope: Slope::Slope48,
        ..Default::default()
    }
}

fn benchmark_eq_processing(c: &mut Criterion) {
    let mut group = c.benchmark_group("equalizer");

    // Common buffer sizes in audio applications
    let buffer_sizes = [64, 128, 256, 512, 1024, 2048];
    let settings = steep_settings();
    let coeffs = design_chain(&settings, 48000.0).unwrap();

    for size in buffer_sizes {
        // Stereo buffer (interleaved)
        let sample_count = size * 2;

        group.throughput(Throughput::Elements(size as u64));

        group.bench_function(format!("process_interleaved_{}_frames", size), |b| {
            let mut eq = Equalizer::new(48000.0);
            eq.apply(&settings, &coeffs);
            let mut buffer: Vec<f32> = (0..sample_count)
                .map(|i| (i as f32 * 0.001).sin())
                .collect();

            b.iter(|| {
                eq.process_interleaved(black_box(&mut buffer));
            });
        });

        group.bench_function(format!("process_planar_{}_frames", size), |b| {
            let mut eq = Equalizer::new(48000.0);
            eq.apply(&settings, &coeffs);
            let mut left: Vec<f32> = (0..size).map(|i| (i as f32 * 0.001).sin()).collect();
            let mut right: Vec<f32> = (0..size).map(|i| (i as f32 * 0.002).sin()).collect();

            b.iter(|| {
                eq.process_planar(black_box(&mut left), black_box(&mut right));
            });
        });
    }

    group.finish();
}

fn benchmark_coefficient_design(c: &mut Criterion) {
    c.bench_function("design_chain_48db", |b| {
        let mut settings = steep_settings();
        let mut gain = 0.0_f32;

        b.iter(|| {
            // Simulate dragging the gain knob
            settings.peak_gain_db = gain;
            black_box(design_chain(black_box(&settings), 48000.0).unwrap());
            gain = (gain + 0.5) % 24.0;
        });
    });
}

fn benchmark_coefficient_swap(c: &mut Criterion) {
    c.bench_function("equalizer_apply", |b| {
        let settings = steep_settings();
        let coeffs = design_chain(&settings, 48000.0).unwrap();
        let mut eq = Equalizer::new(48000.0);

        b.iter(|| {
            eq.apply(black_box(&settings), black_box(&coeffs));
        });
    });
}

criterion_group!(
    benches,
    benchmark_eq_processing,
    benchmark_coefficient_design,
    benchmark_coefficient_swap
);

criterion_main!(benches);
