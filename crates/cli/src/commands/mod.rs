//! Subcommands

pub mod batch;
pub mod fields;
pub mod labels;
pub mod preprocess;
pub mod process;
pub mod serve;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use cloud_bridge::{RekognitionClient, RekognitionConfig};
use receipt_pipeline::{Engine, PipelineConfig, PreprocessMethod, TesseractEngine};
use receiptscan_server::engines::{Recognizer, RekognitionRecognizer, TesseractRecognizer};

/// Load the pipeline config from `path`, or defaults
pub fn load_config(path: Option<&str>) -> Result<PipelineConfig> {
    match path {
        Some(path) => PipelineConfig::from_file(Path::new(path))
            .with_context(|| format!("loading config {}", path)),
        None => Ok(PipelineConfig::default()),
    }
}

/// Resolve `--method`, where `none` means no preprocessing
pub fn resolve_method(
    name: Option<&str>,
    config: &PipelineConfig,
) -> Result<Option<PreprocessMethod>> {
    match name {
        Some(name) => Ok(receipt_pipeline::types::parse_method_option(name)?),
        None => Ok(Some(config.preprocess.default_method)),
    }
}

pub async fn rekognition_client(config: &PipelineConfig) -> RekognitionClient {
    RekognitionClient::new(RekognitionConfig::from_env().with_pipeline(&config.cloud)).await
}

/// Build the recognizer for `engine`
pub async fn recognizer(engine: Engine, config: &PipelineConfig) -> Arc<dyn Recognizer> {
    match engine {
        Engine::Local => Arc::new(TesseractRecognizer::new(TesseractEngine::new(
            config.ocr.clone(),
        ))),
        Engine::Cloud => Arc::new(RekognitionRecognizer::new(rekognition_client(config).await)),
    }
}
