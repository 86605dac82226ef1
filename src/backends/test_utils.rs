//! Mock inference backend for tests
//!
//! Produces a soft circular foreground mask centered in the model canvas, so
//! processor tests can check both opaque and transparent regions without a
//! real model.

use crate::{
    config::InferenceConfig,
    error::{BgRemovalError, Result},
    inference::InferenceBackend,
    models::{ModelInfo, PreprocessingConfig},
};
use instant::Duration;
use ndarray::Array4;
use std::sync::{Arc, Mutex};

/// Mock backend with configurable failures and call recording
#[derive(Debug, Clone)]
pub struct MockBackend {
    initialized: bool,
    model_info: ModelInfo,
    preprocessing_config: PreprocessingConfig,
    call_history: Arc<Mutex<Vec<String>>>,
    should_fail_init: bool,
    should_fail_inference: bool,
}

impl MockBackend {
    /// Mock with a square canvas of `size` pixels
    #[must_use]
    pub fn with_size(size: usize) -> Self {
        Self {
            initialized: false,
            model_info: ModelInfo {
                name: "mock-fp32".to_string(),
                precision: "fp32".to_string(),
                size_bytes: 1024,
                input_shape: (1, 3, size, size),
                output_shape: (1, 1, size, size),
            },
            preprocessing_config: PreprocessingConfig {
                target_size: [size as u32, size as u32],
                normalization_mean: [0.5, 0.5, 0.5],
                normalization_std: [1.0, 1.0, 1.0],
            },
            call_history: Arc::new(Mutex::new(Vec::new())),
            should_fail_init: false,
            should_fail_inference: false,
        }
    }

    #[must_use]
    pub fn new() -> Self {
        Self::with_size(32)
    }

    #[must_use]
    pub fn new_failing_init() -> Self {
        Self {
            should_fail_init: true,
            ..Self::new()
        }
    }

    #[must_use]
    pub fn new_failing_inference() -> Self {
        Self {
            should_fail_inference: true,
            ..Self::new()
        }
    }

    /// Shared call history; clones of the backend record into the same list
    pub fn call_history(&self) -> Vec<String> {
        self.call_history.lock().unwrap().clone()
    }

    fn record_call(&self, method: &str) {
        if let Ok(mut history) = self.call_history.lock() {
            history.push(method.to_string());
        }
    }

    fn generate_mock_output(&self) -> Array4<f32> {
        let (_, _, height, width) = self.model_info.output_shape;
        let center_x = width as f32 / 2.0;
        let center_y = height as f32 / 2.0;
        let radius = width.min(height) as f32 / 3.0;

        Array4::from_shape_fn((1, 1, height, width), |(_, _, y, x)| {
            let dx = x as f32 - center_x;
            let dy = y as f32 - center_y;
            let distance = (dx * dx + dy * dy).sqrt();
            if distance < radius {
                ((radius - distance) / radius * 2.0).min(1.0)
            } else {
                0.0
            }
        })
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InferenceBackend for MockBackend {
    fn initialize(&mut self, _config: &InferenceConfig) -> Result<Option<Duration>> {
        self.record_call("initialize");
        if self.should_fail_init {
            return Err(BgRemovalError::model("Mock backend initialization failed"));
        }
        if self.initialized {
            return Ok(None);
        }
        self.initialized = true;
        Ok(Some(Duration::from_millis(1)))
    }

    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>> {
        self.record_call("infer");
        if !self.initialized {
            return Err(BgRemovalError::inference("Mock backend not initialized"));
        }
        if self.should_fail_inference {
            return Err(BgRemovalError::inference("Mock backend inference failed"));
        }

        let (_, channels, height, width) = self.model_info.input_shape;
        if input.shape() != [1, channels, height, width] {
            return Err(BgRemovalError::inference(format!(
                "Unexpected input shape {:?}",
                input.shape()
            )));
        }

        Ok(self.generate_mock_output())
    }

    fn input_shape(&self) -> (usize, usize, usize, usize) {
        self.model_info.input_shape
    }

    fn output_shape(&self) -> (usize, usize, usize, usize) {
        self.model_info.output_shape
    }

    fn get_preprocessing_config(&self) -> Result<PreprocessingConfig> {
        Ok(self.preprocessing_config.clone())
    }

    fn get_model_info(&self) -> Result<ModelInfo> {
        Ok(self.model_info.clone())
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }
}
