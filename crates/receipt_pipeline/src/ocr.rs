//! OCR module
//!
//! Local text recognition using Tesseract (via leptess).

use crate::config::{OcrConfig, PreprocessConfig};
use crate::error::{PipelineError, Result};
use crate::preprocess::prepare_for_ocr;
use crate::types::{Engine, PreprocessMethod, RecognizedText};
use image::{DynamicImage, GrayImage, ImageFormat};
use leptess::LepTess;
use std::io::Cursor;
use tracing::{debug, instrument};

/// Tesseract-backed recognizer
///
/// A fresh Tesseract handle is created for every image; handles are not
/// shareable across threads.
#[derive(Debug, Clone, Default)]
pub struct TesseractEngine {
    config: OcrConfig,
}

impl TesseractEngine {
    pub fn new(config: OcrConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &OcrConfig {
        &self.config
    }

    /// Extract text from a (preprocessed) grayscale image
    ///
    /// # Errors
    /// * Returns an error if Tesseract is not installed or recognition fails
    #[instrument(skip_all, fields(width = input.width(), height = input.height()))]
    pub fn recognize(&self, input: &GrayImage) -> Result<RecognizedText> {
        if input.width() == 0 || input.height() == 0 {
            return Err(PipelineError::InvalidImage("image has no pixels".to_string()));
        }

        let data_path = self
            .config
            .tessdata_dir
            .as_ref()
            .map(|p| p.to_string_lossy().into_owned());
        let mut tesseract = LepTess::new(data_path.as_deref(), &self.config.language)
            .map_err(|e| {
                PipelineError::Ocr(format!(
                    "failed to initialize Tesseract ({}): {}. Is Tesseract installed?",
                    self.config.language, e
                ))
            })?;

        // leptess wants an encoded image, not raw pixels
        let png_bytes = encode_png(input)?;
        tesseract
            .set_image_from_mem(&png_bytes)
            .map_err(|e| PipelineError::Ocr(format!("failed to load image into Tesseract: {}", e)))?;
        tesseract.set_source_resolution(self.config.dpi);

        let text = tesseract
            .get_utf8_text()
            .map_err(|e| PipelineError::Ocr(format!("failed to extract text: {}", e)))?;

        let confidence = if text.trim().is_empty() {
            None
        } else {
            Some(tesseract.mean_text_conf() as f32)
        };
        debug!(chars = text.len(), ?confidence, "tesseract finished");

        Ok(RecognizedText::from_text(Engine::Local, text, confidence))
    }
}

/// Preprocess with `method`, normalise the resolution and recognise
pub fn extract_text(
    input: &DynamicImage,
    method: Option<PreprocessMethod>,
    engine: &TesseractEngine,
    preprocess: &PreprocessConfig,
) -> Result<RecognizedText> {
    let prepared = prepare_for_ocr(input, method, preprocess)?;
    engine.recognize(&prepared)
}

/// Encode a grayscale image as PNG
pub fn encode_png(input: &GrayImage) -> Result<Vec<u8>> {
    let mut png_bytes = Vec::new();
    input.write_to(&mut Cursor::new(&mut png_bytes), ImageFormat::Png)?;
    Ok(png_bytes)
}
