use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use image_analyzer::background::{BackgroundModel, BhattaSettings};
use image_analyzer::capture::{CaptureConfig, Frame, FrameSource, SyntheticSource};

fn scene(width: u32, height: u32, motion: bool) -> Frame {
    let mut source = SyntheticSource::new();
    if motion {
        source = source.with_motion_after(0);
    }
    source
        .open(&CaptureConfig::with_dimensions(width, height))
        .expect("synthetic source opens");
    source.capture().expect("synthetic frame")
}

fn benchmark_populate(c: &mut Criterion) {
    let mut group = c.benchmark_group("populate");
    for &size_patch in &[3u32, 5, 9] {
        let settings = BhattaSettings {
            size_patch,
            ..Default::default()
        };
        let frame = scene(320, 240, false);
        let mut model = BackgroundModel::new(settings, 320, 240).expect("model allocates");

        group.bench_with_input(BenchmarkId::from_parameter(size_patch), &frame, |b, frame| {
            b.iter(|| model.populate(black_box(frame)))
        });
    }
    group.finish();
}

fn benchmark_estimate(c: &mut Criterion) {
    let settings = BhattaSettings::default();
    let background = scene(320, 240, false);
    let current = scene(320, 240, true);

    let mut model = BackgroundModel::new(settings.clone(), 320, 240).expect("model allocates");
    let mut output = Frame::zeros(320, 240);
    for index in 0..u64::from(settings.num_bg_frames) {
        model.tick(index, &background, &mut output);
    }

    c.bench_function("estimate_320x240", |b| {
        b.iter(|| model.estimate(black_box(&current)))
    });
}

criterion_group!(benches, benchmark_populate, benchmark_estimate);
criterion_main!(benches);
