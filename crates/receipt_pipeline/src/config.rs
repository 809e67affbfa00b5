//! Pipeline configuration
//!
//! Every section falls back to its defaults, so a config file only needs the
//! keys it wants to change.

use crate::document::DETECTION_HEIGHT;
use crate::error::{PipelineError, Result};
use crate::types::PreprocessMethod;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Rekognition refuses inline images above 5 MiB
pub const REKOGNITION_INLINE_LIMIT: usize = 5 * 1024 * 1024;

/// Main configuration for the receipt pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub ocr: OcrConfig,
    pub preprocess: PreprocessConfig,
    pub cloud: CloudConfig,
}

/// Tesseract settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// Tesseract language code.
    pub language: String,
    /// Directory holding `*.traineddata`; Tesseract's default when unset.
    pub tessdata_dir: Option<PathBuf>,
    /// Resolution reported to Tesseract for every image.
    pub dpi: i32,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            language: "eng".to_string(),
            tessdata_dir: None,
            dpi: 300,
        }
    }
}

/// Preprocessing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    /// Images wider than this are downscaled before OCR.
    pub max_width: u32,
    /// Method used when a request does not name one.
    pub default_method: PreprocessMethod,
    /// Working height for receipt outline detection.
    pub detection_height: u32,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            max_width: 1024,
            default_method: PreprocessMethod::default(),
            detection_height: DETECTION_HEIGHT,
        }
    }
}

/// Cloud recognition settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudConfig {
    /// Largest image sent inline; bigger ones must already be in S3.
    pub max_inline_bytes: usize,
    pub max_labels: i32,
    pub min_label_confidence: f32,
    /// Bucket holding archived receipt images.
    pub bucket: Option<String>,
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            max_inline_bytes: REKOGNITION_INLINE_LIMIT,
            max_labels: 10,
            min_label_confidence: 90.0,
            bucket: None,
        }
    }
}

impl PipelineConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&content)
            .map_err(|e| PipelineError::Config(format!("invalid {}: {}", path.display(), e)))
    }

    /// Save configuration as pretty-printed JSON.
    pub fn to_file(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| PipelineError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
