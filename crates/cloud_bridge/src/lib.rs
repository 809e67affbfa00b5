//! Cloud bridge for AWS Rekognition
//!
//! Provides text detection (the cloud alternative to local Tesseract OCR)
//! and label detection for receipt images.

pub mod rekognition;

pub use rekognition::{ImageSource, RekognitionClient, RekognitionConfig};
