//! Backend factory for the backends compiled into this build

use crate::error::{BgRemovalError, Result};
use crate::inference::InferenceBackend;
use crate::models::ModelManager;
use crate::processor::{BackendFactory, BackendType};

/// Creates ONNX and/or Tract backends depending on enabled features
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeBackendFactory;

impl NativeBackendFactory {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl BackendFactory for NativeBackendFactory {
    fn create_backend(
        &self,
        backend_type: BackendType,
        model_manager: ModelManager,
    ) -> Result<Box<dyn InferenceBackend>> {
        match backend_type {
            #[cfg(feature = "onnx")]
            BackendType::Onnx => Ok(Box::new(super::OnnxBackend::with_model_manager(
                model_manager,
            ))),
            #[cfg(feature = "tract")]
            BackendType::Tract => Ok(Box::new(super::TractBackend::with_model_manager(
                model_manager,
            ))),
            #[allow(unreachable_patterns)]
            other => {
                drop(model_manager);
                Err(BgRemovalError::invalid_config(format!(
                    "Backend '{other}' is not compiled into this build (enable the '{other}' feature)"
                )))
            },
        }
    }

    fn available_backends(&self) -> Vec<BackendType> {
        let mut backends = Vec::new();
        #[cfg(feature = "onnx")]
        backends.push(BackendType::Onnx);
        #[cfg(feature = "tract")]
        backends.push(BackendType::Tract);
        backends
    }
}
