//! ONNX Runtime backend
//!
//! Supports CPU, CUDA and `CoreML` execution providers. Requested providers
//! that are not available fall back to CPU with a warning rather than failing
//! startup.

use crate::config::{ExecutionProvider, InferenceConfig};
use crate::error::{BgRemovalError, Result};
use crate::inference::InferenceBackend;
use crate::models::{ModelInfo, ModelManager, PreprocessingConfig};
use ndarray::Array4;
use ort::execution_providers::{
    CUDAExecutionProvider, CoreMLExecutionProvider, ExecutionProvider as OrtExecutionProvider,
    ExecutionProviderDispatch,
};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Value;

// Use instant crate for cross-platform time compatibility
use instant::{Duration, Instant};

/// ONNX Runtime backend for running background removal models
#[derive(Debug)]
pub struct OnnxBackend {
    session: Option<Session>,
    model_manager: ModelManager,
}

impl OnnxBackend {
    /// Create an uninitialized backend for the given model directory
    #[must_use]
    pub fn with_model_manager(model_manager: ModelManager) -> Self {
        Self {
            session: None,
            model_manager,
        }
    }

    fn cuda_available() -> bool {
        OrtExecutionProvider::is_available(&CUDAExecutionProvider::default()).unwrap_or(false)
    }

    fn coreml_available() -> bool {
        OrtExecutionProvider::is_available(&CoreMLExecutionProvider::default()).unwrap_or(false)
    }

    /// Providers to register for the requested setting, in priority order
    fn execution_providers(requested: ExecutionProvider) -> Vec<ExecutionProviderDispatch> {
        let cuda = || CUDAExecutionProvider::default().build();
        let coreml = || CoreMLExecutionProvider::default().with_subgraphs(true).build();

        match requested {
            ExecutionProvider::Cpu => {
                log::info!("Using CPU execution provider");
                Vec::new()
            },
            ExecutionProvider::Auto => {
                let mut providers = Vec::new();
                if Self::cuda_available() {
                    log::info!("🚀 CUDA execution provider is available and will be used");
                    providers.push(cuda());
                }
                if Self::coreml_available() {
                    log::info!("🍎 CoreML execution provider is available and will be used");
                    providers.push(coreml());
                }
                if providers.is_empty() {
                    log::info!("No hardware acceleration available, using CPU");
                }
                providers
            },
            ExecutionProvider::Cuda if Self::cuda_available() => {
                log::info!("Using CUDA execution provider");
                vec![cuda()]
            },
            ExecutionProvider::CoreMl if Self::coreml_available() => {
                log::info!("🍎 Using CoreML execution provider");
                vec![coreml()]
            },
            unavailable => {
                log::warn!("{unavailable} execution provider requested but not available, falling back to CPU");
                Vec::new()
            },
        }
    }

    /// Resolve 0 (auto) thread counts against the available cores
    fn thread_counts(config: &InferenceConfig) -> (usize, usize) {
        let cores = std::thread::available_parallelism()
            .map(std::num::NonZeroUsize::get)
            .unwrap_or(8);
        let intra = if config.intra_threads > 0 { config.intra_threads } else { cores };
        let inter = if config.inter_threads > 0 {
            config.inter_threads
        } else {
            (cores / 4).max(1)
        };
        (intra, inter)
    }

    fn load_model(&mut self, config: &InferenceConfig) -> Result<Duration> {
        let model_load_start = Instant::now();
        let model_data = self.model_manager.load_model()?;
        let model_info = self.model_manager.get_info()?;
        let (intra_threads, inter_threads) = Self::thread_counts(config);

        let mut session_builder = Session::builder()
            .map_err(|e| BgRemovalError::model(format!("Failed to create session builder: {e}")))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| BgRemovalError::model(format!("Failed to set optimization level: {e}")))?;

        let providers = Self::execution_providers(config.execution_provider);
        if !providers.is_empty() {
            session_builder = session_builder
                .with_execution_providers(providers)
                .map_err(|e| {
                    BgRemovalError::model(format!("Failed to set execution providers: {e}"))
                })?;
        }

        let session = session_builder
            .with_parallel_execution(true)
            .map_err(|e| BgRemovalError::model(format!("Failed to enable parallel execution: {e}")))?
            .with_intra_threads(intra_threads)
            .map_err(|e| BgRemovalError::model(format!("Failed to set intra threads: {e}")))?
            .with_inter_threads(inter_threads)
            .map_err(|e| BgRemovalError::model(format!("Failed to set inter threads: {e}")))?
            .commit_from_memory(&model_data)
            .map_err(|e| {
                BgRemovalError::model(format!("Failed to create session from model data: {e}"))
            })?;

        log::debug!("✅ ONNX Runtime session created");
        log::debug!("  - Requested provider: {}", config.execution_provider);
        log::debug!("  - Threading: {intra_threads} intra-op, {inter_threads} inter-op");
        log::debug!("  - Model: {} ({})", model_info.name, model_info.precision);

        self.session = Some(session);

        let model_load_time = model_load_start.elapsed();
        log::info!(
            "📊 Model loading complete: {}ms",
            model_load_time.as_millis()
        );
        Ok(model_load_time)
    }
}

impl InferenceBackend for OnnxBackend {
    fn initialize(&mut self, config: &InferenceConfig) -> Result<Option<Duration>> {
        if self.session.is_some() {
            return Ok(None);
        }
        self.load_model(config).map(Some)
    }

    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>> {
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| BgRemovalError::inference("ONNX session not initialized"))?;

        let inference_start = Instant::now();
        log::debug!("🚀 Starting inference with input shape: {:?}", input.dim());

        let input_value = Value::from_array(input.clone())
            .map_err(|e| BgRemovalError::inference(format!("Failed to convert input tensor: {e}")))?;

        // Positional inputs and outputs avoid depending on tensor names
        let outputs = session
            .run(ort::inputs![input_value])
            .map_err(|e| BgRemovalError::inference(format!("ONNX inference failed: {e}")))?;

        let keys: Vec<_> = outputs.keys().collect();
        let first_key = keys
            .first()
            .ok_or_else(|| BgRemovalError::inference("No output tensors found"))?;
        let output_tensor = outputs
            .get(first_key)
            .ok_or_else(|| BgRemovalError::inference("First output tensor not found"))?
            .try_extract_array::<f32>()
            .map_err(|e| BgRemovalError::inference(format!("Failed to extract output tensor: {e}")))?;

        let &[n, c, h, w] = output_tensor.shape() else {
            return Err(BgRemovalError::inference(format!(
                "Expected 4D output tensor, got {}D",
                output_tensor.ndim()
            )));
        };

        let output_array = Array4::from_shape_vec(
            (n, c, h, w),
            output_tensor.to_owned().into_raw_vec_and_offset().0,
        )
        .map_err(|e| BgRemovalError::inference(format!("Failed to reshape output tensor: {e}")))?;

        log::debug!(
            "📊 Inference complete: {}ms",
            inference_start.elapsed().as_millis()
        );
        Ok(output_array)
    }

    fn input_shape(&self) -> (usize, usize, usize, usize) {
        self.model_manager
            .get_info()
            .map_or((1, 3, 1024, 1024), |info| info.input_shape)
    }

    fn output_shape(&self) -> (usize, usize, usize, usize) {
        self.model_manager
            .get_info()
            .map_or((1, 1, 1024, 1024), |info| info.output_shape)
    }

    fn get_preprocessing_config(&self) -> Result<PreprocessingConfig> {
        self.model_manager.get_preprocessing_config()
    }

    fn get_model_info(&self) -> Result<ModelInfo> {
        self.model_manager.get_info()
    }

    fn is_initialized(&self) -> bool {
        self.session.is_some()
    }
}
