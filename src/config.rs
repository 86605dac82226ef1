//! Configuration types for the background removal server

use crate::{
    error::{BgRemovalError, Result},
    models::{ModelSource, ModelSpec},
    processor::BackendType,
};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;

/// Default listening port
pub const DEFAULT_PORT: u16 = 8000;

/// Default model repository downloaded on first run
pub const DEFAULT_MODEL_URL: &str = "https://huggingface.co/imgly/isnet-general-onnx";

/// Execution provider options for ONNX Runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ExecutionProvider {
    /// Auto-detect best available provider (CUDA > `CoreML` > CPU)
    #[default]
    Auto,
    /// CPU execution (always available)
    Cpu,
    /// NVIDIA CUDA GPU acceleration
    Cuda,
    /// Apple Silicon GPU acceleration
    CoreMl,
}

impl std::fmt::Display for ExecutionProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Cpu => write!(f, "cpu"),
            Self::Cuda => write!(f, "cuda"),
            Self::CoreMl => write!(f, "coreml"),
        }
    }
}

impl FromStr for ExecutionProvider {
    type Err = BgRemovalError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "cpu" => Ok(Self::Cpu),
            "cuda" => Ok(Self::Cuda),
            "coreml" => Ok(Self::CoreMl),
            other => Err(BgRemovalError::invalid_config(format!(
                "Unknown execution provider '{other}' (expected auto, cpu, cuda or coreml)"
            ))),
        }
    }
}

/// Settings handed to an inference backend when it initializes
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InferenceConfig {
    /// Execution provider (ONNX Runtime only; Tract always runs on CPU)
    pub execution_provider: ExecutionProvider,
    /// Number of intra-op threads (0 = auto)
    pub intra_threads: usize,
    /// Number of inter-op threads (0 = auto)
    pub inter_threads: usize,
}

/// Complete server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Interface to bind
    pub host: IpAddr,
    /// Port to bind
    pub port: u16,
    /// Model to load at startup
    pub model_spec: ModelSpec,
    /// Inference backend
    pub backend_type: BackendType,
    /// Backend tuning
    pub inference: InferenceConfig,
    /// Directory for upload/result temp files (None = system temp)
    pub temp_dir: Option<PathBuf>,
    /// Model cache directory override (None = XDG cache)
    pub cache_dir: Option<PathBuf>,
    /// Maximum request body size in bytes (None = unlimited)
    pub max_upload_bytes: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            model_spec: ModelSpec {
                source: ModelSource::Url(DEFAULT_MODEL_URL.to_string()),
                variant: None,
            },
            backend_type: BackendType::default(),
            inference: InferenceConfig::default(),
            temp_dir: None,
            cache_dir: None,
            max_upload_bytes: None,
        }
    }
}

impl ServerConfig {
    /// Create a new configuration builder
    #[must_use]
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder::new()
    }

    /// Address the server binds to
    #[must_use]
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Validate the configuration
    ///
    /// # Errors
    /// - Temp directory set but missing or not a directory
    /// - Zero upload limit
    /// - Variant other than fp16/fp32
    pub fn validate(&self) -> Result<()> {
        if let Some(dir) = &self.temp_dir {
            if !dir.is_dir() {
                return Err(BgRemovalError::invalid_config(format!(
                    "Temp directory does not exist or is not a directory: {}",
                    dir.display()
                )));
            }
        }

        if self.max_upload_bytes == Some(0) {
            return Err(BgRemovalError::invalid_config(
                "Maximum upload size must be greater than 0",
            ));
        }

        if let Some(variant) = &self.model_spec.variant {
            if variant != "fp32" && variant != "fp16" {
                return Err(BgRemovalError::invalid_config(format!(
                    "Invalid model variant '{variant}' (expected fp32 or fp16)"
                )));
            }
        }

        Ok(())
    }
}

/// Builder for `ServerConfig`
#[derive(Debug, Default)]
pub struct ServerConfigBuilder {
    config: ServerConfig,
}

impl ServerConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn host(mut self, host: IpAddr) -> Self {
        self.config.host = host;
        self
    }

    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    #[must_use]
    pub fn model_spec(mut self, model_spec: ModelSpec) -> Self {
        self.config.model_spec = model_spec;
        self
    }

    #[must_use]
    pub fn backend_type(mut self, backend_type: BackendType) -> Self {
        self.config.backend_type = backend_type;
        self
    }

    #[must_use]
    pub fn execution_provider(mut self, provider: ExecutionProvider) -> Self {
        self.config.inference.execution_provider = provider;
        self
    }

    #[must_use]
    pub fn intra_threads(mut self, threads: usize) -> Self {
        self.config.inference.intra_threads = threads;
        self
    }

    #[must_use]
    pub fn inter_threads(mut self, threads: usize) -> Self {
        self.config.inference.inter_threads = threads;
        self
    }

    #[must_use]
    pub fn temp_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.config.temp_dir = dir;
        self
    }

    #[must_use]
    pub fn cache_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.config.cache_dir = dir;
        self
    }

    #[must_use]
    pub fn max_upload_bytes(mut self, limit: Option<usize>) -> Self {
        self.config.max_upload_bytes = limit;
        self
    }

    /// Build and validate the configuration
    ///
    /// # Errors
    /// Returns `BgRemovalError::InvalidConfig` when validation fails
    pub fn build(self) -> Result<ServerConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
