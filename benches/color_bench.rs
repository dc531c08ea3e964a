use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rfbake::color::{analyze_rgba, auto_levels};
use rfbake::shadow::shadow_padding;
use rfbake::Clip;

fn bench_analyze(c: &mut Criterion) {
    // 512x512 gradient
    let pixels: Vec<u8> = (0..512u32 * 512)
        .flat_map(|i| {
            let v = (i % 256) as u8;
            [v, v / 2, 255 - v, 255]
        })
        .collect();

    c.bench_function("analyze_rgba_512", |b| {
        b.iter(|| {
            let stats = analyze_rgba(black_box(&pixels));
            auto_levels(stats.as_ref())
        })
    });
}

fn bench_geometry(c: &mut Criterion) {
    c.bench_function("clip_normalize", |b| {
        b.iter(|| Clip::padded(black_box(-12.3), black_box(40.7), black_box(320.5), black_box(180.2), black_box(14.0)))
    });
    c.bench_function("shadow_padding", |b| {
        b.iter(|| {
            shadow_padding(
                black_box(Some("rgba(0, 0, 0, 0.2) 0px 4px 12px 2px, rgb(0, 0, 0) 0px 0px 1px 0px")),
                black_box(None),
                black_box(Some("blur(3px) drop-shadow(2px 2px 4px black)")),
            )
        })
    });
}

criterion_group!(benches, bench_analyze, bench_geometry);
criterion_main!(benches);
