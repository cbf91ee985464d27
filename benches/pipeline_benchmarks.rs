use bgremove_service::{
    services::OutputFormatHandler, BackgroundColor, ColorKeySegmenter, ImageStager,
    MattingOptions, Segmenter, ServiceConfig,
};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use std::io::Cursor;

/// Gradient test card; the border ring is uniform so the colour key has a clean background
fn test_image(width: u32, height: u32) -> DynamicImage {
    let img = RgbaImage::from_fn(width, height, |x, y| {
        let inside = x > width / 4 && x < width * 3 / 4 && y > height / 4 && y < height * 3 / 4;
        if inside {
            Rgba([(x % 256) as u8, (y % 256) as u8, 128, 255])
        } else {
            Rgba([250, 250, 250, 255])
        }
    });
    DynamicImage::ImageRgba8(img)
}

fn encode_png(image: &DynamicImage) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    image
        .write_to(&mut buf, ImageFormat::Png)
        .expect("encode benchmark input");
    buf.into_inner()
}

fn benchmark_staging(c: &mut Criterion) {
    let stager = ImageStager::new(&ServiceConfig::default());
    let mut group = c.benchmark_group("staging");
    group.sample_size(20);

    for &(width, height) in &[(640, 480), (1920, 1080), (3000, 2000)] {
        let bytes = encode_png(&test_image(width, height));
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{width}x{height}")),
            &bytes,
            |b, bytes| {
                b.iter(|| stager.stage(black_box(bytes), "bench.png").expect("stage"));
            },
        );
    }
    group.finish();
}

fn benchmark_segmentation(c: &mut Criterion) {
    let segmenter = ColorKeySegmenter::new();
    let image = test_image(800, 600);
    let mut group = c.benchmark_group("color_key");
    group.sample_size(20);

    group.bench_function("plain", |b| {
        b.iter(|| segmenter.segment(black_box(&image), &MattingOptions::default()));
    });
    group.bench_function("alpha_matting", |b| {
        let options = MattingOptions::default().with_alpha_matting(true);
        b.iter(|| segmenter.segment(black_box(&image), &options));
    });
    group.finish();
}

fn benchmark_compositing(c: &mut Criterion) {
    let segmenter = ColorKeySegmenter::new();
    let cutout = segmenter
        .segment(&test_image(1920, 1080), &MattingOptions::default())
        .expect("segment benchmark input");

    c.bench_function("composite_over_white_1920x1080", |b| {
        b.iter(|| {
            OutputFormatHandler::composite_over(black_box(&cutout), BackgroundColor::white())
        });
    });
}

criterion_group!(
    pipeline_benches,
    benchmark_staging,
    benchmark_segmentation,
    benchmark_compositing
);
criterion_main!(pipeline_benches);
