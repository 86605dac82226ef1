//! Conversion from CLI arguments to `ServerConfig`

use super::main_impl::Cli;
use crate::{
    config::ServerConfig,
    models::{ModelSource, ModelSpec},
};
use anyhow::{Context, Result};

pub(crate) struct CliConfigBuilder;

impl CliConfigBuilder {
    /// Build a validated `ServerConfig` from CLI arguments
    pub(crate) fn from_cli(cli: &Cli) -> Result<ServerConfig> {
        let model_spec = ModelSpec {
            source: ModelSource::parse(&cli.model),
            variant: cli.variant.clone(),
        };

        let mut builder = ServerConfig::builder()
            .host(cli.host)
            .port(cli.port)
            .model_spec(model_spec)
            .execution_provider(cli.execution_provider)
            // Same count for intra- and inter-op parallelism
            .intra_threads(cli.threads)
            .inter_threads(cli.threads)
            .temp_dir(cli.temp_dir.clone())
            .cache_dir(cli.cache_dir.clone())
            .max_upload_bytes(cli.max_upload_bytes);

        if let Some(backend) = cli.backend {
            builder = builder.backend_type(backend);
        }

        builder.build().context("Configuration validation failed")
    }
}
