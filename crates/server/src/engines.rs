//! Recognition engines behind one async interface

use anyhow::Result;
use async_trait::async_trait;
use cloud_bridge::{ImageSource, RekognitionClient};
use receipt_pipeline::{Engine, PreparedScan, RecognizedText, TesseractEngine};

/// Something that turns a prepared receipt image into text
#[async_trait]
pub trait Recognizer: Send + Sync {
    fn engine(&self) -> Engine;

    async fn recognize(&self, prepared: &PreparedScan) -> Result<RecognizedText>;
}

/// Tesseract, run on the blocking pool
pub struct TesseractRecognizer {
    engine: TesseractEngine,
}

impl TesseractRecognizer {
    pub fn new(engine: TesseractEngine) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl Recognizer for TesseractRecognizer {
    fn engine(&self) -> Engine {
        Engine::Local
    }

    async fn recognize(&self, prepared: &PreparedScan) -> Result<RecognizedText> {
        let engine = self.engine.clone();
        let image = prepared.image.clone();
        let recognized = tokio::task::spawn_blocking(move || engine.recognize(&image)).await??;
        Ok(recognized)
    }
}

/// AWS Rekognition DetectText
pub struct RekognitionRecognizer {
    client: RekognitionClient,
}

impl RekognitionRecognizer {
    pub fn new(client: RekognitionClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Recognizer for RekognitionRecognizer {
    fn engine(&self) -> Engine {
        Engine::Cloud
    }

    async fn recognize(&self, prepared: &PreparedScan) -> Result<RecognizedText> {
        let png = prepared.png_bytes()?;
        self.client.detect_text(ImageSource::Bytes(png)).await
    }
}
