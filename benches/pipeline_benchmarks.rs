use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use bgremove_server::{
    error::Result,
    inference::InferenceBackend,
    models::{ModelInfo, PreprocessingConfig},
    BackgroundRemovalProcessor, ImagePreprocessor, InferenceConfig,
};
use image::{DynamicImage, Rgb, RgbImage};
use instant::Duration;
use ndarray::Array4;

const MODEL_SIZE: u32 = 1024;

/// Backend that returns a constant half-opaque mask without running a model
struct ConstantBackend;

impl InferenceBackend for ConstantBackend {
    fn initialize(&mut self, _config: &InferenceConfig) -> Result<Option<Duration>> {
        Ok(None)
    }

    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>> {
        let shape = input.shape();
        Ok(Array4::from_elem((1, 1, shape[2], shape[3]), 0.5))
    }

    fn input_shape(&self) -> (usize, usize, usize, usize) {
        (1, 3, MODEL_SIZE as usize, MODEL_SIZE as usize)
    }

    fn output_shape(&self) -> (usize, usize, usize, usize) {
        (1, 1, MODEL_SIZE as usize, MODEL_SIZE as usize)
    }

    fn get_preprocessing_config(&self) -> Result<PreprocessingConfig> {
        Ok(preprocessing_config())
    }

    fn get_model_info(&self) -> Result<ModelInfo> {
        Ok(ModelInfo {
            name: "constant-fp32".to_string(),
            precision: "fp32".to_string(),
            size_bytes: 0,
            input_shape: self.input_shape(),
            output_shape: self.output_shape(),
        })
    }

    fn is_initialized(&self) -> bool {
        true
    }
}

fn preprocessing_config() -> PreprocessingConfig {
    PreprocessingConfig {
        target_size: [MODEL_SIZE, MODEL_SIZE],
        normalization_mean: [0.5, 0.5, 0.5],
        normalization_std: [1.0, 1.0, 1.0],
    }
}

fn gradient_image(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    }))
}

const SIZES: &[(u32, u32)] = &[(640, 480), (1920, 1080), (4000, 3000)];

fn bench_preprocessing(c: &mut Criterion) {
    let config = preprocessing_config();
    let mut group = c.benchmark_group("preprocessing");

    for &(width, height) in SIZES {
        let image = gradient_image(width, height);
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{width}x{height}")),
            &image,
            |b, image| {
                b.iter(|| {
                    ImagePreprocessor::preprocess_for_inference(black_box(image), &config).unwrap()
                });
            },
        );
    }

    group.finish();
}

fn bench_full_pipeline(c: &mut Criterion) {
    let processor =
        BackgroundRemovalProcessor::from_backend(Box::new(ConstantBackend), &InferenceConfig::default())
            .unwrap();
    let mut group = c.benchmark_group("process_image");
    group.sample_size(20);

    for &(width, height) in SIZES {
        let image = gradient_image(width, height);
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{width}x{height}")),
            &image,
            |b, image| {
                b.iter(|| processor.process_image(black_box(image)).unwrap());
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_preprocessing, bench_full_pipeline);
criterion_main!(benches);
