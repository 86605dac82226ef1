//! Inference backend abstraction

use crate::config::InferenceConfig;
use crate::error::Result;
use crate::models::{ModelInfo, PreprocessingConfig};
use ndarray::Array4;

// Use instant crate for cross-platform time compatibility
use instant::Duration;

/// Trait for inference backends
///
/// Backends are driven from blocking worker threads, one call at a time,
/// so they only need to be `Send`.
pub trait InferenceBackend: Send {
    /// Initialize the backend with the given configuration
    ///
    /// Returns the model load time, or `None` if already initialized.
    ///
    /// # Errors
    /// - Model loading or validation errors
    /// - Execution provider setup failures
    fn initialize(&mut self, config: &InferenceConfig) -> Result<Option<Duration>>;

    /// Run inference on an NCHW input tensor
    ///
    /// # Errors
    /// - Backend not initialized
    /// - Model inference failures
    /// - Unexpected output tensor shape
    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>>;

    /// Expected input shape (NCHW)
    fn input_shape(&self) -> (usize, usize, usize, usize);

    /// Expected output shape (NCHW)
    fn output_shape(&self) -> (usize, usize, usize, usize);

    /// Preprocessing parameters for the loaded model
    ///
    /// # Errors
    /// - Invalid or missing preprocessing configuration
    fn get_preprocessing_config(&self) -> Result<PreprocessingConfig>;

    /// Model metadata
    ///
    /// # Errors
    /// - Model metadata unavailable or invalid
    fn get_model_info(&self) -> Result<ModelInfo>;

    fn is_initialized(&self) -> bool;
}
