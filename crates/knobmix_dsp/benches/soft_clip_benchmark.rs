use criterion::{black_box, criterion_group, criterion_main, Criterion};
use knobmix_dsp::SoftClipper;

fn bench_process_interleaved(c: &mut Criterion) {
    let clipper = SoftClipper::unit();
    let mut buffer: Vec<f32> = (0..1024)
        .map(|i| ((i as f32) * 0.01).sin() * 1.2)
        .collect();

    c.bench_function("soft_clip_1024_frames", |b| {
        b.iter(|| {
            clipper.process_interleaved(black_box(&mut buffer));
        });
    });
}

criterion_group!(benches, bench_process_interleaved);
criterion_main!(benches);
