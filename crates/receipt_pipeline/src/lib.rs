//! Core pipeline for receiptscan
//!
//! This crate provides the data types and processing logic for turning a
//! photo of a paper receipt into text: classical preprocessing (denoising,
//! thresholding, perspective correction), local OCR with Tesseract, and
//! extraction of contact fields from the recognised text.

pub mod config;
pub mod document;
pub mod error;
pub mod fields;
pub mod hashing;
pub mod ocr;
pub mod pipeline;
pub mod preprocess;
pub mod types;
pub mod util;

pub use config::PipelineConfig;
pub use error::{PipelineError, Result};
pub use ocr::TesseractEngine;
pub use pipeline::PreparedScan;
pub use types::*;
