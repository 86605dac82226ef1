//! Model cache for downloaded models
//!
//! Downloaded models live in an XDG-compliant directory, one subdirectory per
//! model id. Ids are derived from the repository URL so a restart finds the
//! model again without touching the network.

use crate::error::{BgRemovalError, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable overriding the cache root
pub const CACHE_DIR_ENV: &str = "BGREMOVE_CACHE_DIR";

const HUGGINGFACE_PREFIX: &str = "https://huggingface.co/";

/// Model cache manager
#[derive(Debug, Clone)]
pub struct ModelCache {
    cache_dir: PathBuf,
}

impl ModelCache {
    /// Create a cache in the default location
    ///
    /// Uses `$BGREMOVE_CACHE_DIR/models` when set, otherwise
    /// `<user cache dir>/bgremove-server/models`.
    ///
    /// # Errors
    /// - Failed to determine cache directory
    /// - Failed to create cache directory
    pub fn new() -> Result<Self> {
        let cache_dir = Self::default_cache_dir()?;
        Self::ensure_dir(&cache_dir)?;
        Ok(Self { cache_dir })
    }

    /// Create a cache rooted at a custom directory (`<dir>/models`)
    ///
    /// # Errors
    /// - Failed to create cache directory
    pub fn with_custom_cache_dir(cache_dir: &Path) -> Result<Self> {
        let models_dir = cache_dir.join("models");
        Self::ensure_dir(&models_dir)?;
        Ok(Self {
            cache_dir: models_dir,
        })
    }

    fn ensure_dir(dir: &Path) -> Result<()> {
        if !dir.exists() {
            fs::create_dir_all(dir)
                .map_err(|e| BgRemovalError::file_io_error("create cache directory", dir, &e))?;
        }
        Ok(())
    }

    fn default_cache_dir() -> Result<PathBuf> {
        if let Ok(cache_override) = std::env::var(CACHE_DIR_ENV) {
            return Ok(PathBuf::from(cache_override).join("models"));
        }

        Ok(dirs::cache_dir()
            .ok_or_else(|| {
                BgRemovalError::invalid_config(format!(
                    "Failed to determine cache directory. Set {CACHE_DIR_ENV} or pass --cache-dir."
                ))
            })?
            .join("bgremove-server")
            .join("models"))
    }

    /// Generate a filesystem-safe model id from a URL
    ///
    /// ```
    /// use bgremove_server::cache::ModelCache;
    ///
    /// let id = ModelCache::url_to_model_id("https://huggingface.co/imgly/isnet-general-onnx");
    /// assert_eq!(id, "imgly--isnet-general-onnx");
    /// ```
    #[must_use]
    pub fn url_to_model_id(url: &str) -> String {
        if let Some(repo) = url.strip_prefix(HUGGINGFACE_PREFIX) {
            return repo.trim_end_matches('/').replace('/', "--");
        }

        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(url.as_bytes());
        let hash_string = format!("url-{:x}", hasher.finalize());
        hash_string.get(..16).unwrap_or(&hash_string).to_string()
    }

    /// Whether the model directory exists with the required files
    #[must_use]
    pub fn is_model_cached(&self, model_id: &str) -> bool {
        Self::validate_model_directory(&self.cache_dir.join(model_id))
    }

    /// Path to a cached model directory (may not exist)
    #[must_use]
    pub fn get_model_path(&self, model_id: &str) -> PathBuf {
        self.cache_dir.join(model_id)
    }

    /// Cache root
    #[must_use]
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// A model directory needs both configs and at least one ONNX file
    pub(crate) fn validate_model_directory(model_path: &Path) -> bool {
        let onnx_dir = model_path.join("onnx");
        model_path.join("config.json").is_file()
            && model_path.join("preprocessor_config.json").is_file()
            && (onnx_dir.join("model.onnx").is_file() || onnx_dir.join("model_fp16.onnx").is_file())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_url_to_model_id() {
        assert_eq!(
            ModelCache::url_to_model_id("https://huggingface.co/imgly/isnet-general-onnx"),
            "imgly--isnet-general-onnx"
        );
        assert_eq!(
            ModelCache::url_to_model_id("https://huggingface.co/ZhengPeng7/BiRefNet/"),
            "ZhengPeng7--BiRefNet"
        );

        let id = ModelCache::url_to_model_id("https://example.com/model.onnx");
        assert!(id.starts_with("url-"));
        assert_eq!(id.len(), 16);
        assert_eq!(id, ModelCache::url_to_model_id("https://example.com/model.onnx"));
    }

    #[test]
    fn test_custom_cache_dir() {
        let temp_dir = TempDir::new().unwrap();
        let cache = ModelCache::with_custom_cache_dir(temp_dir.path()).unwrap();

        assert_eq!(cache.cache_dir(), temp_dir.path().join("models"));
        assert!(cache.cache_dir().is_dir());
        assert_eq!(
            cache.get_model_path("imgly--isnet-general-onnx"),
            temp_dir.path().join("models").join("imgly--isnet-general-onnx")
        );
    }

    #[test]
    fn test_is_model_cached() {
        let temp_dir = TempDir::new().unwrap();
        let cache = ModelCache::with_custom_cache_dir(temp_dir.path()).unwrap();
        let model_dir = cache.get_model_path("owner--repo");
        assert!(!cache.is_model_cached("owner--repo"));

        fs::create_dir_all(model_dir.join("onnx")).unwrap();
        fs::write(model_dir.join("config.json"), "{}").unwrap();
        fs::write(model_dir.join("preprocessor_config.json"), "{}").unwrap();
        // No ONNX file yet
        assert!(!cache.is_model_cached("owner--repo"));

        fs::write(model_dir.join("onnx").join("model_fp16.onnx"), b"onnx").unwrap();
        assert!(cache.is_model_cached("owner--repo"));
    }
}
