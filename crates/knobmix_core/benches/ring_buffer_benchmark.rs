//! Hot-path benchmarks: the Ring Buffer, the Sample-Rate Converter, and a
//! Bus render cycle — the three places a real-time audio thread spends its
//! time per callback.

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use knobmix_core::{Bus, InputChannel, Resampler, RingBuffer};

fn benchmark_ring_buffer(c: &mut Criterion) {
    let mut group = c.benchmark_group("ring_buffer");

    for buffer_frames in [64, 128, 256, 512, 1024].iter() {
        let samples = buffer_frames * 2;
        let ring = RingBuffer::new(48_000 * 2 * 2);
        let src: Vec<f32> = (0..samples).map(|i| (i as f32 * 0.001).sin()).collect();
        let mut dst = vec![0.0_f32; samples];

        group.throughput(Throughput::Elements(samples as u64));
        group.bench_function(format!("write_read_{}_frames", buffer_frames), |b| {
            b.iter(|| {
                ring.write(black_box(&src));
                ring.read(black_box(&mut dst));
            })
        });
    }

    group.finish();
}

fn benchmark_resampler(c: &mut Criterion) {
    let mut group = c.benchmark_group("resampler");

    for out_frames in [64, 128, 256, 512].iter() {
        let mut resampler = Resampler::new(44_100, 48_000, 2);
        let in_frames = resampler.required_input_frames(*out_frames);
        let input: Vec<f32> = (0..in_frames * 2).map(|i| (i as f32 * 0.01).sin()).collect();
        let mut output = vec![0.0_f32; out_frames * 2];

        group.throughput(Throughput::Elements((*out_frames * 2) as u64));
        group.bench_function(format!("process_{}_out_frames", out_frames), |b| {
            b.iter(|| {
                resampler.process(black_box(&input), *out_frames, black_box(&mut output));
            })
        });
    }

    group.finish();
}

fn benchmark_bus_render(c: &mut Criterion) {
    let bus = Bus::new("bench", "Bench Bus");
    for i in 0..9 {
        let ch = Arc::new(InputChannel::new(format!("k{i}"), 48_000, 48_000));
        ch.ingest(&vec![0.1; 512 * 2]);
        bus.add_member(ch);
    }
    bus.set_sink(None).unwrap();
    bus.start(48_000, 512).unwrap();

    let mut out = vec![0.0_f32; 512 * 2];
    c.bench_function("bus_render_9_channels_512_frames", |b| {
        b.iter(|| {
            bus.render(black_box(&mut out));
        })
    });
}

criterion_group!(benches, benchmark_ring_buffer, benchmark_resampler, benchmark_bus_render);
criterion_main!(benches);
