use criterion::{black_box, criterion_group, criterion_main, Criterion};
use cropdoc::classifier::preprocess::{preprocess, InputLayout};
use cropdoc::classifier::DEFAULT_IMAGE_SIZE;
use cropdoc::Prediction;
use image::{DynamicImage, Rgb, RgbImage};

fn leaf_photo(width: u32, height: u32) -> DynamicImage {
    let image = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, 120 + (y % 100) as u8, ((x + y) % 64) as u8])
    });
    DynamicImage::ImageRgb8(image)
}

fn bench_preprocess(c: &mut Criterion) {
    let mut group = c.benchmark_group("Preprocess");
    group.sample_size(50);
    group.warm_up_time(std::time::Duration::from_secs(1));

    let small = leaf_photo(256, 256);
    group.bench_function("256px_nchw", |b| b.iter(|| {
        preprocess(black_box(&small), DEFAULT_IMAGE_SIZE, InputLayout::Nchw).unwrap()
    }));

    // Typical phone camera upload
    let phone = leaf_photo(1600, 1200);
    group.bench_function("1600x1200_nchw", |b| b.iter(|| {
        preprocess(black_box(&phone), DEFAULT_IMAGE_SIZE, InputLayout::Nchw).unwrap()
    }));
    group.bench_function("1600x1200_nhwc", |b| b.iter(|| {
        preprocess(black_box(&phone), DEFAULT_IMAGE_SIZE, InputLayout::Nhwc).unwrap()
    }));

    group.finish();
}

fn bench_prediction(c: &mut Criterion) {
    let class_names: Vec<String> = cropdoc::diseases::all().into_iter().map(|e| e.name).collect();
    let mut probs = vec![0.01f32; class_names.len()];
    probs[3] = 1.0 - 0.01 * (class_names.len() - 1) as f32;

    let mut group = c.benchmark_group("Prediction");
    group.bench_function("top_3", |b| b.iter(|| {
        Prediction::from_probabilities(black_box(&probs), &class_names, 3).unwrap()
    }));
    group.bench_function("top_15", |b| b.iter(|| {
        Prediction::from_probabilities(black_box(&probs), &class_names, 15).unwrap()
    }));
    group.finish();
}

criterion_group!(benches, bench_preprocess, bench_prediction);
criterion_main!(benches);
