//! Model downloading from `HuggingFace` repositories
//!
//! Files are fetched into a scratch directory inside the cache and renamed
//! into place once every required file is present, so an interrupted download
//! never leaves a half-populated model directory behind.

use crate::cache::ModelCache;
use crate::error::{BgRemovalError, Result};
use futures_util::stream::TryStreamExt;
use reqwest::Client;
use std::fs;
use std::path::Path;
use tokio::io::AsyncWriteExt;
use tokio_util::io::StreamReader;

const HUGGINGFACE_PREFIX: &str = "https://huggingface.co/";

/// Files that need to be downloaded for a `HuggingFace` model
const REQUIRED_FILES: &[&str] = &["config.json", "preprocessor_config.json"];

/// ONNX model files to attempt downloading
const ONNX_FILES: &[(&str, &str)] = &[
    ("onnx/model.onnx", "fp32"),
    ("onnx/model_fp16.onnx", "fp16"),
];

/// Model downloader backed by a [`ModelCache`]
#[derive(Debug)]
pub struct ModelDownloader {
    client: Client,
    cache: ModelCache,
}

impl ModelDownloader {
    /// Create a downloader using the default cache location
    ///
    /// # Errors
    /// - Failed to create HTTP client
    /// - Failed to initialize model cache
    pub fn new() -> Result<Self> {
        Self::with_cache(ModelCache::new()?)
    }

    /// Create a downloader for an existing cache
    ///
    /// # Errors
    /// - Failed to create HTTP client
    pub fn with_cache(cache: ModelCache) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(300))
            .build()
            .map_err(|e| BgRemovalError::network_error("Failed to create HTTP client", e))?;

        Ok(Self { client, cache })
    }

    /// Download a model into the cache unless it is already there
    ///
    /// Returns the model id, usable with [`ModelCache::get_model_path`].
    ///
    /// # Errors
    /// - Unsupported URL format
    /// - Network errors during download
    /// - File system errors during caching
    pub async fn download_model(&self, url: &str) -> Result<String> {
        let model_id = ModelCache::url_to_model_id(url);

        if self.cache.is_model_cached(&model_id) {
            tracing::info!(model_id = %model_id, "Model already cached");
            return Ok(model_id);
        }

        validate_model_url(url)?;
        tracing::info!(url = %url, model_id = %model_id, "Downloading model");

        let scratch = tempfile::Builder::new()
            .prefix(".download-")
            .tempdir_in(self.cache.cache_dir())
            .map_err(|e| {
                BgRemovalError::file_io_error("create download directory", self.cache.cache_dir(), &e)
            })?;

        // Scratch directory is removed on drop if anything below fails
        self.download_model_files(url, scratch.path()).await?;

        let final_dir = self.cache.get_model_path(&model_id);
        if final_dir.exists() {
            fs::remove_dir_all(&final_dir).map_err(|e| {
                BgRemovalError::file_io_error("remove existing model directory", &final_dir, &e)
            })?;
        }
        fs::rename(scratch.path(), &final_dir).map_err(|e| {
            BgRemovalError::file_io_error("move downloaded model to cache", &final_dir, &e)
        })?;

        tracing::info!(model_id = %model_id, path = %final_dir.display(), "Model downloaded");
        Ok(model_id)
    }

    async fn download_model_files(&self, base_url: &str, download_dir: &Path) -> Result<()> {
        let raw_base = format!("{}/resolve/main/", base_url.trim_end_matches('/'));

        for file_name in REQUIRED_FILES {
            let file_url = format!("{raw_base}{file_name}");
            self.download_file(&file_url, &download_dir.join(file_name))
                .await?;
        }

        let mut downloaded_models = 0;
        for (file_path, variant) in ONNX_FILES {
            let file_url = format!("{raw_base}{file_path}");
            match self
                .download_file(&file_url, &download_dir.join(file_path))
                .await
            {
                Ok(bytes) => {
                    downloaded_models += 1;
                    tracing::info!(variant, bytes, "Downloaded model variant");
                },
                Err(e) => {
                    tracing::warn!(variant, error = %e, "Model variant unavailable");
                },
            }
        }

        if downloaded_models == 0 {
            return Err(BgRemovalError::network_error(
                format!("Failed to download any ONNX model variants from {base_url}"),
                "no model files found",
            ));
        }

        Ok(())
    }

    /// Stream a single file to disk, returning the number of bytes written
    async fn download_file(&self, url: &str, local_path: &Path) -> Result<u64> {
        tracing::debug!(url = %url, path = %local_path.display(), "Downloading file");

        if let Some(parent) = local_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| BgRemovalError::file_io_error("create directory", parent, &e))?;
        }

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| BgRemovalError::network_error(format!("Failed to download {url}"), e))?;

        if !response.status().is_success() {
            return Err(BgRemovalError::network_error(
                format!("Failed to download {url}"),
                format!("HTTP {}", response.status()),
            ));
        }

        let mut file = tokio::fs::File::create(local_path)
            .await
            .map_err(|e| BgRemovalError::file_io_error("create file", local_path, &e))?;

        let mut stream = StreamReader::new(response.bytes_stream().map_err(std::io::Error::other));

        let downloaded = tokio::io::copy(&mut stream, &mut file)
            .await
            .map_err(|e| BgRemovalError::network_error(format!("Failed to download {url}"), e))?;

        file.flush()
            .await
            .map_err(|e| BgRemovalError::file_io_error("flush file", local_path, &e))?;

        Ok(downloaded)
    }

    /// Get the model cache
    #[must_use]
    pub fn cache(&self) -> &ModelCache {
        &self.cache
    }
}

/// Validate that a URL points at a supported model repository
///
/// # Errors
/// - Empty URL
/// - Non-`HuggingFace` URL
/// - Missing `owner/repo` path
pub fn validate_model_url(url: &str) -> Result<()> {
    if url.is_empty() {
        return Err(BgRemovalError::invalid_config("Model URL cannot be empty"));
    }

    let Some(repo_path) = url.strip_prefix(HUGGINGFACE_PREFIX) else {
        return Err(BgRemovalError::invalid_config(format!(
            "Unsupported URL format: {url}. Only HuggingFace repositories are supported (https://huggingface.co/...)"
        )));
    };

    let repo_path = repo_path.trim_end_matches('/');
    let mut parts = repo_path.split('/');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(owner), Some(repo), None) if !owner.is_empty() && !repo.is_empty() => Ok(()),
        _ => Err(BgRemovalError::invalid_config(format!(
            "Invalid HuggingFace repository URL: {url}. Expected format: https://huggingface.co/owner/repo"
        ))),
    }
}
