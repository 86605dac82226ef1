//! Shared fixtures for router-level tests

#![allow(dead_code)]
#![allow(unreachable_pub)]

use axum::{
    body::Body,
    http::{header, Method, Request},
    Router,
};
use bgremove_server::{
    create_app, AppState, BackgroundRemovalProcessor, BackgroundRemover, BgRemovalError,
    InferenceBackend, InferenceConfig, ModelInfo, ProcessingTimings, RemovalResult, Result,
    SegmentationMask, ServerConfig,
};
use bgremove_server::models::PreprocessingConfig;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage, RgbaImage};
use instant::Duration;
use ndarray::Array4;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

pub const BOUNDARY: &str = "bgremove-test-boundary";

/// Backend whose mask is foreground wherever the red channel is bright
pub struct RedThresholdBackend {
    size: usize,
    initialized: bool,
}

impl RedThresholdBackend {
    pub fn new(size: usize) -> Self {
        Self {
            size,
            initialized: false,
        }
    }
}

impl InferenceBackend for RedThresholdBackend {
    fn initialize(&mut self, _config: &InferenceConfig) -> Result<Option<Duration>> {
        if self.initialized {
            return Ok(None);
        }
        self.initialized = true;
        Ok(Some(Duration::from_millis(0)))
    }

    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>> {
        let shape = input.shape();
        let (height, width) = (shape[2], shape[3]);
        Ok(Array4::from_shape_fn((1, 1, height, width), |(_, _, y, x)| {
            if input[[0, 0, y, x]] > 0.0 {
                1.0
            } else {
                0.0
            }
        }))
    }

    fn input_shape(&self) -> (usize, usize, usize, usize) {
        (1, 3, self.size, self.size)
    }

    fn output_shape(&self) -> (usize, usize, usize, usize) {
        (1, 1, self.size, self.size)
    }

    fn get_preprocessing_config(&self) -> Result<PreprocessingConfig> {
        Ok(PreprocessingConfig {
            target_size: [self.size as u32, self.size as u32],
            normalization_mean: [0.5, 0.5, 0.5],
            normalization_std: [1.0, 1.0, 1.0],
        })
    }

    fn get_model_info(&self) -> Result<ModelInfo> {
        Ok(ModelInfo {
            name: "red-threshold-fp32".to_string(),
            precision: "fp32".to_string(),
            size_bytes: 0,
            input_shape: self.input_shape(),
            output_shape: self.output_shape(),
        })
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }
}

/// What a `RecordingRemover` saw for one call
#[derive(Debug, Clone)]
pub struct SeenInput {
    pub path: PathBuf,
    pub existed: bool,
    pub bytes: Vec<u8>,
}

/// Remover that records its inputs and echoes them back as an image
///
/// The result is one pixel high with one pixel per input byte, the byte
/// stored in the red channel, so every response can be traced to its upload.
#[derive(Default)]
pub struct RecordingRemover {
    pub seen: Mutex<Vec<SeenInput>>,
    pub fail_with: Option<String>,
    pub panic: bool,
}

impl RecordingRemover {
    pub fn failing(message: &str) -> Self {
        Self {
            fail_with: Some(message.to_string()),
            ..Self::default()
        }
    }

    pub fn panicking() -> Self {
        Self {
            panic: true,
            ..Self::default()
        }
    }

    pub fn seen(&self) -> Vec<SeenInput> {
        self.seen.lock().unwrap().clone()
    }
}

impl BackgroundRemover for RecordingRemover {
    fn remove_background(&self, input_path: &Path) -> Result<RemovalResult> {
        let bytes = std::fs::read(input_path).unwrap_or_default();
        self.seen.lock().unwrap().push(SeenInput {
            path: input_path.to_path_buf(),
            existed: input_path.exists(),
            bytes: bytes.clone(),
        });

        if self.panic {
            panic!("remover exploded");
        }
        if let Some(message) = &self.fail_with {
            return Err(BgRemovalError::inference(message.clone()));
        }

        let width = bytes.len().max(1) as u32;
        let image = RgbaImage::from_fn(width, 1, |x, _| {
            let value = bytes.get(x as usize).copied().unwrap_or_default();
            image::Rgba([value, 0, 0, 255])
        });
        Ok(RemovalResult::new(
            image,
            SegmentationMask::new(vec![255; width as usize], (width, 1)),
            (width, 1),
            ProcessingTimings::default(),
        ))
    }

    fn model_name(&self) -> String {
        "recording".to_string()
    }
}

/// Router wired to `remover`, with temp files under a fresh directory
pub struct TestApp {
    pub router: Router,
    pub temp_dir: TempDir,
}

impl TestApp {
    pub fn new(remover: Arc<dyn BackgroundRemover>) -> Self {
        Self::with_limit(remover, None)
    }

    pub fn with_limit(remover: Arc<dyn BackgroundRemover>, max_upload_bytes: Option<usize>) -> Self {
        let temp_dir = TempDir::new().unwrap();
        let config = ServerConfig::builder()
            .temp_dir(Some(temp_dir.path().to_path_buf()))
            .max_upload_bytes(max_upload_bytes)
            .build()
            .unwrap();
        let router = create_app(AppState::new(remover, &config), &config);
        Self { router, temp_dir }
    }

    pub fn with_processor(size: usize) -> Self {
        let processor = BackgroundRemovalProcessor::from_backend(
            Box::new(RedThresholdBackend::new(size)),
            &InferenceConfig::default(),
        )
        .unwrap();
        Self::new(Arc::new(processor))
    }

    /// Files currently left in the temp directory
    pub fn leftover_files(&self) -> Vec<PathBuf> {
        std::fs::read_dir(self.temp_dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect()
    }
}

/// Multipart body with a single file part
pub fn multipart_body(field: &str, filename: Option<&str>, bytes: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    match filename {
        Some(name) => body.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"{field}\"; filename=\"{name}\"\r\n")
                .as_bytes(),
        ),
        None => body.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"{field}\"\r\n").as_bytes(),
        ),
    }
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub fn upload_request(field: &str, filename: Option<&str>, bytes: &[u8]) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/remove")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_body(field, filename, bytes)))
        .unwrap()
}

/// 8x4 image: left half red, right half blue
pub fn half_red_png() -> Vec<u8> {
    let image = RgbImage::from_fn(8, 4, |x, _| {
        if x < 4 {
            Rgb([255, 0, 0])
        } else {
            Rgb([0, 0, 255])
        }
    });
    encode(&DynamicImage::ImageRgb8(image), ImageFormat::Png)
}

/// Input bytes recovered from a `RecordingRemover` result PNG
pub fn echoed_bytes(png: &[u8]) -> Vec<u8> {
    let image = image::load_from_memory(png).unwrap().to_rgba8();
    image.pixels().map(|pixel| pixel[0]).collect()
}

pub fn small_jpeg() -> Vec<u8> {
    let image = RgbImage::from_pixel(6, 6, Rgb([220, 30, 30]));
    encode(&DynamicImage::ImageRgb8(image), ImageFormat::Jpeg)
}

fn encode(image: &DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut bytes = Vec::new();
    image.write_to(&mut Cursor::new(&mut bytes), format).unwrap();
    bytes
}
