//! Background removal processor
//!
//! `BackgroundRemovalProcessor` owns the initialized inference backend and
//! runs the full file-to-image pipeline: decode, preprocess, infer, map the
//! mask back onto the original pixels and composite the alpha channel.

use crate::{
    config::InferenceConfig,
    error::{BgRemovalError, Result},
    inference::InferenceBackend,
    models::{ModelInfo, ModelManager, PreprocessingConfig},
    services::ImageIOService,
    types::{ProcessingTimings, RemovalResult, SegmentationMask},
    utils::{ImagePreprocessor, LetterboxTransform},
};
use image::{DynamicImage, GenericImageView, RgbaImage};
use instant::Instant;
use ndarray::Array4;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Mutex;
use tracing::{debug, info, instrument};

/// Backend type for runtime selection
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum BackendType {
    /// ONNX Runtime backend (supports GPU acceleration)
    Onnx,
    /// Tract backend (pure Rust, no external dependencies)
    Tract,
}

impl Default for BackendType {
    fn default() -> Self {
        if cfg!(feature = "tract") || !cfg!(feature = "onnx") {
            Self::Tract
        } else {
            Self::Onnx
        }
    }
}

impl fmt::Display for BackendType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Onnx => write!(f, "onnx"),
            Self::Tract => write!(f, "tract"),
        }
    }
}

impl FromStr for BackendType {
    type Err = BgRemovalError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "onnx" => Ok(Self::Onnx),
            "tract" => Ok(Self::Tract),
            other => Err(BgRemovalError::invalid_config(format!(
                "Unknown backend '{other}' (expected onnx or tract)"
            ))),
        }
    }
}

/// Factory trait for creating inference backends
pub trait BackendFactory: Send + Sync {
    /// Create an uninitialized backend of the given type
    ///
    /// # Errors
    /// - Backend type not available in this build
    fn create_backend(
        &self,
        backend_type: BackendType,
        model_manager: ModelManager,
    ) -> Result<Box<dyn InferenceBackend>>;

    /// Backend types this factory can create
    fn available_backends(&self) -> Vec<BackendType>;
}

/// Converts an image file into a background-free RGBA image
///
/// Implementations are shared across request handlers and must tolerate
/// concurrent calls.
pub trait BackgroundRemover: Send + Sync {
    /// Decode the image at `input_path` and remove its background
    ///
    /// # Errors
    /// - `Io`/`Decode` if the file cannot be read as an image
    /// - `Inference` if the model fails
    fn remove_background(&self, input_path: &Path) -> Result<RemovalResult>;

    /// Human-readable model name
    fn model_name(&self) -> String;
}

/// Processor holding one initialized backend
pub struct BackgroundRemovalProcessor {
    backend: Mutex<Box<dyn InferenceBackend>>,
    preprocessing: PreprocessingConfig,
    model_info: ModelInfo,
}

impl fmt::Debug for BackgroundRemovalProcessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackgroundRemovalProcessor")
            .field("model_info", &self.model_info)
            .field("preprocessing", &self.preprocessing)
            .finish_non_exhaustive()
    }
}

impl BackgroundRemovalProcessor {
    /// Create the backend through `factory` and initialize it
    ///
    /// # Errors
    /// - Backend unavailable in this build
    /// - Model loading or initialization failure
    pub fn new(
        factory: &dyn BackendFactory,
        backend_type: BackendType,
        model_manager: ModelManager,
        config: &InferenceConfig,
    ) -> Result<Self> {
        info!(backend = %backend_type, variant = model_manager.variant(), "Creating inference backend");
        let backend = factory.create_backend(backend_type, model_manager)?;
        Self::from_backend(backend, config)
    }

    /// Initialize an already-built backend
    ///
    /// # Errors
    /// - Backend initialization failure
    /// - Missing preprocessing or model metadata
    pub fn from_backend(
        mut backend: Box<dyn InferenceBackend>,
        config: &InferenceConfig,
    ) -> Result<Self> {
        if let Some(load_time) = backend.initialize(config)? {
            debug!(load_ms = load_time.as_millis() as u64, "Backend initialized");
        }

        let preprocessing = backend.get_preprocessing_config()?;
        let model_info = backend.get_model_info()?;

        Ok(Self {
            backend: Mutex::new(backend),
            preprocessing,
            model_info,
        })
    }

    /// Metadata of the loaded model
    #[must_use]
    pub fn model_info(&self) -> &ModelInfo {
        &self.model_info
    }

    /// Remove the background from a decoded image
    ///
    /// # Errors
    /// - Preprocessing failure (zero-sized image)
    /// - Inference failure or unexpected output shape
    /// - Backend lock poisoned by an earlier panic
    #[instrument(
        skip(self, image),
        fields(
            model = %self.model_info.name,
            dimensions = %format!("{}x{}", image.width(), image.height())
        )
    )]
    pub fn process_image(&self, image: &DynamicImage) -> Result<RemovalResult> {
        let mut timings = ProcessingTimings::default();
        let total_start = Instant::now();
        let original_dimensions = image.dimensions();

        let preprocess_start = Instant::now();
        let input_tensor = ImagePreprocessor::preprocess_for_inference(image, &self.preprocessing)?;
        timings.preprocessing_ms = preprocess_start.elapsed().as_millis() as u64;

        let inference_start = Instant::now();
        let output_tensor = self.infer(&input_tensor)?;
        timings.inference_ms = inference_start.elapsed().as_millis() as u64;

        let postprocess_start = Instant::now();
        let mask = Self::tensor_to_mask(&output_tensor, original_dimensions)?;
        let result_image = Self::apply_background_removal(image, &mask);
        timings.postprocessing_ms = postprocess_start.elapsed().as_millis() as u64;

        timings.total_ms = total_start.elapsed().as_millis() as u64;
        debug!(
            preprocessing_ms = timings.preprocessing_ms,
            inference_ms = timings.inference_ms,
            postprocessing_ms = timings.postprocessing_ms,
            total_ms = timings.total_ms,
            foreground_ratio = mask.foreground_ratio(),
            "Background removed"
        );

        Ok(RemovalResult::new(
            result_image,
            mask,
            original_dimensions,
            timings,
        ))
    }

    /// Backend calls are serialized; the lock is held only for inference
    fn infer(&self, input: &Array4<f32>) -> Result<Array4<f32>> {
        let mut backend = self
            .backend
            .lock()
            .map_err(|_| BgRemovalError::internal("Inference backend lock poisoned"))?;
        backend.infer(input)
    }

    /// Convert the output tensor to a mask over the original pixels
    fn tensor_to_mask(
        tensor: &Array4<f32>,
        original_dimensions: (u32, u32),
    ) -> Result<SegmentationMask> {
        let &[1, 1, mask_height, mask_width] = tensor.shape() else {
            return Err(BgRemovalError::inference(format!(
                "Invalid output tensor shape {:?}, expected [1, 1, H, W]",
                tensor.shape()
            )));
        };

        let (orig_width, orig_height) = original_dimensions;
        let transform = LetterboxTransform::fit(
            original_dimensions,
            (mask_width as u32, mask_height as u32),
        );

        let mut mask_data = Vec::with_capacity(orig_width as usize * orig_height as usize);
        for y in 0..orig_height {
            for x in 0..orig_width {
                let (tensor_x, tensor_y) = transform.to_canvas(x, y);
                let value = tensor
                    .get([0, 0, tensor_y as usize, tensor_x as usize])
                    .copied()
                    .unwrap_or(0.0);
                mask_data.push((value.clamp(0.0, 1.0) * 255.0) as u8);
            }
        }

        Ok(SegmentationMask::new(mask_data, original_dimensions))
    }

    /// Fully transparent where the mask is 0, mask alpha elsewhere
    fn apply_background_removal(image: &DynamicImage, mask: &SegmentationMask) -> RgbaImage {
        let mut rgba_image = image.to_rgba8();
        for (pixel, &alpha) in rgba_image.pixels_mut().zip(mask.data.iter()) {
            *pixel = if alpha > 0 {
                image::Rgba([pixel[0], pixel[1], pixel[2], alpha])
            } else {
                image::Rgba([0, 0, 0, 0])
            };
        }
        rgba_image
    }
}

impl BackgroundRemover for BackgroundRemovalProcessor {
    fn remove_background(&self, input_path: &Path) -> Result<RemovalResult> {
        let decode_start = Instant::now();
        let image = ImageIOService::load_image(input_path)?;
        let image_decode_ms = decode_start.elapsed().as_millis() as u64;

        let mut result = self.process_image(&image)?;
        result.timings.image_decode_ms = image_decode_ms;
        result.timings.total_ms += image_decode_ms;
        Ok(result)
    }

    fn model_name(&self) -> String {
        self.model_info.name.clone()
    }
}
