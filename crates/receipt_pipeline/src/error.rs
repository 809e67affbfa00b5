//! Error types for the receipt pipeline.

use thiserror::Error;

/// Errors produced while preprocessing or recognising a receipt image.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Image decoding or encoding error.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The image cannot be processed (empty, degenerate, ...).
    #[error("invalid image: {0}")]
    InvalidImage(String),

    /// Edge detection found no four-cornered outline to flatten.
    #[error("no appropriate contours found for image")]
    NoDocumentContour,

    /// Preprocessing method name not recognised.
    #[error("preprocess method ({0}) not recognized")]
    UnknownMethod(String),

    /// Recognition engine name not recognised.
    #[error("recognition engine ({0}) not recognized")]
    UnknownEngine(String),

    /// Tesseract failed to initialise or to recognise text.
    #[error("OCR error: {0}")]
    Ocr(String),

    /// Configuration could not be read or parsed.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type for the receipt pipeline.
pub type Result<T> = std::result::Result<T, PipelineError>;
