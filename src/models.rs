//! Model sources and on-disk model directories

use crate::cache::ModelCache;
use crate::download::ModelDownloader;
use crate::error::{BgRemovalError, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// ONNX files looked up inside a model directory, by variant
const ONNX_VARIANTS: &[(&str, &str)] = &[("fp32", "onnx/model.onnx"), ("fp16", "onnx/model_fp16.onnx")];

/// Where the model comes from
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum ModelSource {
    /// Model directory on the local filesystem
    External(PathBuf),
    /// `HuggingFace` repository URL, downloaded into the cache on first use
    Url(String),
}

impl ModelSource {
    /// Parse a model argument: URLs become `Url`, everything else a path
    #[must_use]
    pub fn parse(value: &str) -> Self {
        if value.starts_with("https://") || value.starts_with("http://") {
            Self::Url(value.trim_end_matches('/').to_string())
        } else {
            Self::External(PathBuf::from(value))
        }
    }

    /// Get a display name for tracing and logging
    #[must_use]
    pub fn display_name(&self) -> String {
        match self {
            ModelSource::External(path) => {
                format!(
                    "external:{}",
                    path.file_name().unwrap_or_default().to_string_lossy()
                )
            },
            ModelSource::Url(url) => format!("remote:{}", ModelCache::url_to_model_id(url)),
        }
    }
}

/// Complete model specification including source and optional variant
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ModelSpec {
    pub source: ModelSource,
    pub variant: Option<String>,
}

/// Model information and metadata
#[derive(Debug, Clone)]
pub struct ModelInfo {
    pub name: String,
    pub precision: String,
    pub size_bytes: usize,
    pub input_shape: (usize, usize, usize, usize), // NCHW format
    pub output_shape: (usize, usize, usize, usize),
}

/// Preprocessing parameters published by the model
#[derive(Debug, Clone, PartialEq)]
pub struct PreprocessingConfig {
    /// Target size as `[height, width]`
    pub target_size: [u32; 2],
    /// Per-channel mean in the 0-1 range
    pub normalization_mean: [f32; 3],
    /// Per-channel standard deviation in the 0-1 range
    pub normalization_std: [f32; 3],
}

/// Resolve a model spec to a local model directory, downloading if needed
///
/// # Errors
/// - Unsupported URL or download failure
/// - Cache directory cannot be created
pub async fn resolve_model_dir(spec: &ModelSpec, cache_dir: Option<&Path>) -> Result<PathBuf> {
    match &spec.source {
        ModelSource::External(path) => Ok(path.clone()),
        ModelSource::Url(url) => {
            let cache = match cache_dir {
                Some(dir) => ModelCache::with_custom_cache_dir(dir)?,
                None => ModelCache::new()?,
            };
            let downloader = ModelDownloader::with_cache(cache)?;
            let model_id = downloader.download_model(url).await?;
            Ok(downloader.cache().get_model_path(&model_id))
        },
    }
}

/// Model manager for a `HuggingFace`-layout model directory
///
/// Expects `config.json`, `preprocessor_config.json` and at least one of
/// `onnx/model.onnx` / `onnx/model_fp16.onnx`.
#[derive(Debug, Clone)]
pub struct ModelManager {
    model_path: PathBuf,
    model_config: serde_json::Value,
    preprocessor_config: serde_json::Value,
    variant: String,
}

impl ModelManager {
    /// Open a model directory
    ///
    /// # Errors
    /// - Path missing or not a directory
    /// - Missing or unparsable configuration files
    /// - Requested variant not present
    pub fn from_directory<P: AsRef<Path>>(model_path: P, variant: Option<&str>) -> Result<Self> {
        let model_path = model_path.as_ref().to_path_buf();

        if !model_path.is_dir() {
            return Err(BgRemovalError::invalid_config(format!(
                "Model path does not exist or is not a directory: {}",
                model_path.display()
            )));
        }

        let model_config = Self::read_json(&model_path.join("config.json"))?;
        let preprocessor_config = Self::read_json(&model_path.join("preprocessor_config.json"))?;
        let variant = Self::resolve_variant(&model_path, variant)?;

        Ok(Self {
            model_path,
            model_config,
            preprocessor_config,
            variant,
        })
    }

    fn read_json(path: &Path) -> Result<serde_json::Value> {
        let content = fs::read_to_string(path).map_err(|e| {
            BgRemovalError::invalid_config(format!("Failed to read {}: {e}", path.display()))
        })?;
        serde_json::from_str(&content).map_err(|e| {
            BgRemovalError::invalid_config(format!("Failed to parse {}: {e}", path.display()))
        })
    }

    /// Pick the requested variant, else the first available (fp32 before fp16)
    fn resolve_variant(model_path: &Path, requested: Option<&str>) -> Result<String> {
        let available: Vec<&str> = ONNX_VARIANTS
            .iter()
            .filter(|(_, file)| model_path.join(file).is_file())
            .map(|(variant, _)| *variant)
            .collect();

        match requested {
            Some(variant) if available.contains(&variant) => Ok(variant.to_string()),
            Some(variant) => Err(BgRemovalError::model(format!(
                "variant '{variant}' not found in {}. Available: {available:?}",
                model_path.display()
            ))),
            None => available.first().map(|v| (*v).to_string()).ok_or_else(|| {
                BgRemovalError::model(format!(
                    "No ONNX model files found in {}",
                    model_path.join("onnx").display()
                ))
            }),
        }
    }

    /// Path of the ONNX file for the resolved variant
    #[must_use]
    pub fn model_file_path(&self) -> PathBuf {
        let file = ONNX_VARIANTS
            .iter()
            .find(|(variant, _)| *variant == self.variant)
            .map_or("onnx/model.onnx", |(_, file)| *file);
        self.model_path.join(file)
    }

    /// Resolved variant (`fp32` or `fp16`)
    #[must_use]
    pub fn variant(&self) -> &str {
        &self.variant
    }

    /// Load model data as bytes
    ///
    /// # Errors
    /// - Model file missing or unreadable
    pub fn load_model(&self) -> Result<Vec<u8>> {
        let path = self.model_file_path();
        fs::read(&path).map_err(|e| {
            BgRemovalError::model(format!("Failed to read model file {}: {e}", path.display()))
        })
    }

    /// Get model information
    ///
    /// # Errors
    /// - Model file missing
    /// - Invalid size in preprocessor config
    pub fn get_info(&self) -> Result<ModelInfo> {
        let size_bytes = fs::metadata(self.model_file_path())
            .map_err(|e| BgRemovalError::model(format!("Failed to stat model file: {e}")))?
            .len() as usize;
        let [height, width] = self.parse_target_size()?;
        let model_type = self
            .model_config
            .get("model_type")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown");

        Ok(ModelInfo {
            name: format!("{}-{}", model_type, self.variant),
            precision: self.variant.clone(),
            size_bytes,
            input_shape: (1, 3, height as usize, width as usize),
            output_shape: (1, 1, height as usize, width as usize),
        })
    }

    /// Get preprocessing configuration
    ///
    /// # Errors
    /// - Missing size, `image_mean` or `image_std`
    pub fn get_preprocessing_config(&self) -> Result<PreprocessingConfig> {
        Ok(PreprocessingConfig {
            target_size: self.parse_target_size()?,
            normalization_mean: self.parse_channel_triplet("image_mean")?,
            normalization_std: self.parse_channel_triplet("image_std")?,
        })
    }

    fn parse_target_size(&self) -> Result<[u32; 2]> {
        let size = self.preprocessor_config.get("size").ok_or_else(|| {
            BgRemovalError::invalid_config("Missing size in preprocessor config")
        })?;

        let dimension = |key: &str| -> Result<u32> {
            size.get(key)
                .and_then(serde_json::Value::as_u64)
                .ok_or_else(|| {
                    BgRemovalError::invalid_config(format!("Missing {key} in size config"))
                })?
                .try_into()
                .map_err(|_| BgRemovalError::invalid_config(format!("{key} too large for u32")))
        };

        Ok([dimension("height")?, dimension("width")?])
    }

    /// Parse a 3-channel mean/std array, converting 0-255 values to 0-1
    fn parse_channel_triplet(&self, key: &str) -> Result<[f32; 3]> {
        let values: Vec<f64> = self
            .preprocessor_config
            .get(key)
            .and_then(serde_json::Value::as_array)
            .ok_or_else(|| {
                BgRemovalError::invalid_config(format!("Missing {key} in preprocessor config"))
            })?
            .iter()
            .filter_map(serde_json::Value::as_f64)
            .collect();

        let [a, b, c] = values.as_slice() else {
            return Err(BgRemovalError::invalid_config(format!(
                "{key} must have exactly 3 numeric values"
            )));
        };

        let scale = if values.iter().any(|v| *v > 1.0) { 255.0 } else { 1.0 };
        Ok([(a / scale) as f32, (b / scale) as f32, (c / scale) as f32])
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Write a minimal model directory; returns the directory guard
    pub(crate) fn write_model_dir(variants: &[&str]) -> tempfile::TempDir {
        let dir = tempfile::TempDir::new().unwrap();
        fs::write(dir.path().join("config.json"), r#"{"model_type": "isnet"}"#).unwrap();
        fs::write(
            dir.path().join("preprocessor_config.json"),
            r#"{"size": {"height": 1024, "width": 1024},
                "image_mean": [128, 128, 128],
                "image_std": [256, 256, 256]}"#,
        )
        .unwrap();
        fs::create_dir_all(dir.path().join("onnx")).unwrap();
        for variant in variants {
            let file = if *variant == "fp16" { "model_fp16.onnx" } else { "model.onnx" };
            fs::write(dir.path().join("onnx").join(file), b"not-a-real-model").unwrap();
        }
        dir
    }

    #[test]
    fn test_model_source_parse() {
        assert_eq!(
            ModelSource::parse("https://huggingface.co/imgly/isnet-general-onnx/"),
            ModelSource::Url("https://huggingface.co/imgly/isnet-general-onnx".to_string())
        );
        assert_eq!(
            ModelSource::parse("./models/isnet"),
            ModelSource::External(PathBuf::from("./models/isnet"))
        );
    }

    #[test]
    fn test_display_name() {
        let source = ModelSource::Url("https://huggingface.co/imgly/isnet-general-onnx".into());
        assert_eq!(source.display_name(), "remote:imgly--isnet-general-onnx");

        let source = ModelSource::External(PathBuf::from("/models/isnet"));
        assert_eq!(source.display_name(), "external:isnet");
    }

    #[test]
    fn test_model_directory_parsing() {
        let dir = write_model_dir(&["fp32", "fp16"]);
        let manager = ModelManager::from_directory(dir.path(), None).unwrap();
        assert_eq!(manager.variant(), "fp32");

        let info = manager.get_info().unwrap();
        assert_eq!(info.name, "isnet-fp32");
        assert_eq!(info.input_shape, (1, 3, 1024, 1024));
        assert_eq!(info.output_shape, (1, 1, 1024, 1024));
        assert_eq!(info.size_bytes, b"not-a-real-model".len());

        let preprocessing = manager.get_preprocessing_config().unwrap();
        assert_eq!(preprocessing.target_size, [1024, 1024]);
        assert!((preprocessing.normalization_mean[0] - 128.0 / 255.0).abs() < 1e-6);
        assert!((preprocessing.normalization_std[2] - 256.0 / 255.0).abs() < 1e-6);
    }

    #[test]
    fn test_variant_resolution() {
        let dir = write_model_dir(&["fp16"]);
        let manager = ModelManager::from_directory(dir.path(), None).unwrap();
        assert_eq!(manager.variant(), "fp16");
        assert!(manager.model_file_path().ends_with("onnx/model_fp16.onnx"));

        let err = ModelManager::from_directory(dir.path(), Some("fp32")).unwrap_err();
        assert!(err.to_string().contains("variant 'fp32' not found"));

        let empty = write_model_dir(&[]);
        assert!(ModelManager::from_directory(empty.path(), None).is_err());
    }

    #[test]
    fn test_missing_directory() {
        let err = ModelManager::from_directory("/nonexistent/model", None).unwrap_err();
        assert!(matches!(err, BgRemovalError::InvalidConfig(_)));
    }

    #[tokio::test]
    async fn test_resolve_external_model_dir() {
        let spec = ModelSpec {
            source: ModelSource::External(PathBuf::from("/models/isnet")),
            variant: None,
        };
        let dir = resolve_model_dir(&spec, None).await.unwrap();
        assert_eq!(dir, PathBuf::from("/models/isnet"));
    }
}
