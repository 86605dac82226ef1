//! Background removal server CLI
//!
//! Parses arguments, loads the model before binding, then serves until Ctrl-C.

use super::config::CliConfigBuilder;
use crate::{
    backends::NativeBackendFactory,
    config::{ExecutionProvider, ServerConfig, DEFAULT_MODEL_URL, DEFAULT_PORT},
    models::{resolve_model_dir, ModelManager},
    processor::{BackendType, BackgroundRemovalProcessor, BackgroundRemover},
    server,
    tracing_config::{spans, TracingConfig, TracingFormat},
};
use anyhow::{Context, Result};
use clap::Parser;
use instant::Instant;
use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, Instrument};

/// HTTP server that removes image backgrounds
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "bgremove-server")]
pub struct Cli {
    /// Interface to bind
    #[arg(long, default_value = "0.0.0.0")]
    pub host: IpAddr,

    /// Port to bind
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Model URL (`HuggingFace` repository) or path to a model folder
    #[arg(short, long, default_value = DEFAULT_MODEL_URL)]
    pub model: String,

    /// Model variant (fp32, fp16) [default: fp32 when available, else fp16]
    #[arg(long)]
    pub variant: Option<String>,

    /// Inference backend (tract, onnx)
    #[arg(short, long)]
    pub backend: Option<BackendType>,

    /// ONNX Runtime execution provider (auto, cpu, cuda, coreml)
    #[arg(short, long, default_value = "auto")]
    pub execution_provider: ExecutionProvider,

    /// Number of inference threads (0 = auto-detect)
    #[arg(short, long, default_value_t = 0)]
    pub threads: usize,

    /// Directory for upload and result temp files [default: system temp dir]
    #[arg(long, value_name = "PATH")]
    pub temp_dir: Option<PathBuf>,

    /// Use custom model cache directory
    #[arg(long, value_name = "PATH")]
    pub cache_dir: Option<PathBuf>,

    /// Reject request bodies larger than this many bytes [default: unlimited]
    #[arg(long, value_name = "BYTES")]
    pub max_upload_bytes: Option<usize>,

    /// Enable verbose logging (-v: DEBUG for this crate, -vv: TRACE)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Log output format (console, compact, json)
    #[arg(long, default_value = "console")]
    pub log_format: TracingFormat,
}

pub async fn main() -> Result<()> {
    let cli = Cli::parse();

    TracingConfig::new()
        .with_verbosity(cli.verbose)
        .with_format(cli.log_format)
        .with_rust_log()
        .init()
        .context("Failed to initialize tracing subscriber")?;

    let config = CliConfigBuilder::from_cli(&cli).context("Invalid configuration")?;
    info!(
        addr = %config.socket_addr(),
        backend = %config.backend_type,
        provider = %config.inference.execution_provider,
        "Starting background removal server"
    );

    let remover = load_remover(&config).await?;
    server::serve(&config, remover)
        .await
        .context("Server terminated with an error")?;

    Ok(())
}

/// Resolve, download if needed, and initialize the model before serving
async fn load_remover(config: &ServerConfig) -> Result<Arc<dyn BackgroundRemover>> {
    let span = spans::model_loading(
        &config.model_spec.source.display_name(),
        &config.backend_type.to_string(),
    );
    let processor = load_processor(config).instrument(span).await?;
    Ok(Arc::new(processor))
}

async fn load_processor(config: &ServerConfig) -> Result<BackgroundRemovalProcessor> {
    info!("Initializing model...");
    let start = Instant::now();

    let model_dir = resolve_model_dir(&config.model_spec, config.cache_dir.as_deref())
        .await
        .context("Failed to obtain model")?;

    let variant = config.model_spec.variant.clone();
    let backend_type = config.backend_type;
    let inference = config.inference.clone();

    // Session creation is CPU-bound and can take seconds
    let processor = tokio::task::spawn_blocking(move || -> crate::Result<BackgroundRemovalProcessor> {
        let model_manager = ModelManager::from_directory(&model_dir, variant.as_deref())?;
        BackgroundRemovalProcessor::new(&NativeBackendFactory, backend_type, model_manager, &inference)
    })
    .await
    .context("Model loading task failed")?
    .context("Failed to load model")?;

    info!(
        model = %processor.model_info().name,
        precision = %processor.model_info().precision,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Model ready"
    );

    Ok(processor)
}
