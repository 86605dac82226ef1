#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

//! # Background Removal Server
//!
//! An HTTP service that accepts an image upload, removes its background with
//! an ONNX segmentation model and returns the result as a transparent PNG.
//!
//! ## Endpoints
//!
//! - `POST /remove`: multipart form with a `file` field; responds with
//!   `image/png` as an attachment named after the upload (`cat.jpg` becomes
//!   `cat.png`)
//! - `GET /health`: readiness, model name, backend and start time
//!
//! Uploads and results only ever live in scoped temporary files; both are
//! deleted whether the conversion succeeds or fails.
//!
//! ## Embedding the router
//!
//! ```rust,no_run
//! use bgremove_server::{
//!     backends::NativeBackendFactory, create_app, AppState, BackendType,
//!     BackgroundRemovalProcessor, ModelManager, ServerConfig,
//! };
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = ServerConfig::builder().port(8080).build()?;
//! let model = ModelManager::from_directory("models/isnet-general-onnx", Some("fp32"))?;
//! let processor = BackgroundRemovalProcessor::new(
//!     &NativeBackendFactory,
//!     BackendType::Tract,
//!     model,
//!     &config.inference,
//! )?;
//!
//! let app = create_app(AppState::new(Arc::new(processor), &config), &config);
//! let listener = tokio::net::TcpListener::bind(config.socket_addr()).await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ### Feature Flags
//!
//! - `tract` (default): pure Rust inference backend
//! - `onnx`: ONNX Runtime backend with CUDA/`CoreML` execution providers
//! - `cli` (default): the `bgremove-server` binary
//! - `webp-support` (default): WebP uploads
//! - `tracing-json`: JSON log output

pub mod backends;
pub mod cache;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod download;
pub mod error;
pub mod handlers;
pub mod inference;
pub mod models;
pub mod processor;
pub mod server;
pub mod services;
pub mod tracing_config;
pub mod types;
pub mod upload;
pub mod utils;

pub use cache::ModelCache;
pub use config::{ExecutionProvider, InferenceConfig, ServerConfig, ServerConfigBuilder};
pub use download::{validate_model_url, ModelDownloader};
pub use error::{BgRemovalError, Result};
pub use inference::InferenceBackend;
pub use models::{resolve_model_dir, ModelInfo, ModelManager, ModelSource, ModelSpec};
pub use processor::{BackendFactory, BackendType, BackgroundRemovalProcessor, BackgroundRemover};
pub use server::{create_app, serve, AppState};
pub use services::{ImageIOService, TempFileService, TempFileStream};
pub use tracing_config::{spans, TracingConfig, TracingFormat};
pub use types::{ProcessingTimings, RemovalResult, SegmentationMask};
pub use utils::{ImagePreprocessor, LetterboxTransform};
