//! End-to-end scan of one receipt image
//!
//! Decode -> hash -> preprocess -> normalise resolution. The prepared image
//! is then handed to whichever recognizer the caller picked, and
//! [`PreparedScan::complete`] assembles the [`ScanResult`].

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::fields::extract_fields;
use crate::hashing::compute_content_hash;
use crate::ocr::{encode_png, TesseractEngine};
use crate::preprocess::prepare_for_ocr;
use crate::types::{PreprocessMethod, RecognizedText, ScanId, ScanResult};
use chrono::Utc;
use image::GrayImage;
use std::time::Instant;
use tracing::info;

/// A decoded, preprocessed image ready for recognition
#[derive(Debug, Clone)]
pub struct PreparedScan {
    pub id: ScanId,
    pub filename: Option<String>,
    pub content_hash: String,
    pub size_bytes: u64,
    pub method: Option<PreprocessMethod>,
    /// Image to recognise
    pub image: GrayImage,
    started: Instant,
}

impl PreparedScan {
    /// Decode `bytes` and preprocess them with `method`
    ///
    /// `None` skips preprocessing; the image is only converted to grayscale.
    pub fn prepare(
        bytes: &[u8],
        filename: Option<String>,
        method: Option<PreprocessMethod>,
        config: &PipelineConfig,
    ) -> Result<Self> {
        let started = Instant::now();
        let decoded = image::load_from_memory(bytes)?;
        let image = prepare_for_ocr(&decoded, method, &config.preprocess)?;

        Ok(Self {
            id: ScanId::new(),
            filename,
            content_hash: compute_content_hash(bytes),
            size_bytes: bytes.len() as u64,
            method,
            image,
            started,
        })
    }

    /// The prepared image as PNG, for engines that take encoded bytes
    pub fn png_bytes(&self) -> Result<Vec<u8>> {
        encode_png(&self.image)
    }

    /// Attach recognised text and extracted fields
    pub fn complete(self, recognized: RecognizedText) -> ScanResult {
        let fields = extract_fields(&recognized.text);
        let elapsed_ms = self.started.elapsed().as_millis() as u64;
        info!(
            id = %self.id,
            engine = %recognized.engine,
            lines = recognized.lines.len(),
            elapsed_ms,
            "scan complete"
        );

        ScanResult {
            id: self.id,
            filename: self.filename,
            content_hash: self.content_hash,
            size_bytes: self.size_bytes,
            method: self.method,
            recognized,
            fields,
            processed_at: Utc::now(),
            elapsed_ms,
        }
    }
}

/// Prepare and recognise with Tesseract in one call
pub fn scan_with_tesseract(
    bytes: &[u8],
    filename: Option<String>,
    method: Option<PreprocessMethod>,
    config: &PipelineConfig,
) -> Result<ScanResult> {
    let prepared = PreparedScan::prepare(bytes, filename, method, config)?;
    let recognized = TesseractEngine::new(config.ocr.clone()).recognize(&prepared.image)?;
    Ok(prepared.complete(recognized))
}
