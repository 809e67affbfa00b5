//! Core types for the receipt pipeline
//!
//! These are the values that flow between preprocessing, recognition and
//! field extraction, and what the CLI and HTTP API serialize.

use crate::error::PipelineError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Unique identifier for one processing run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScanId(pub Uuid);

impl ScanId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ScanId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ScanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Classical preprocessing applied before text recognition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreprocessMethod {
    /// 3x3 median filter
    MedianBlur,
    /// Edge-preserving bilateral filter
    BilateralFilter,
    /// Global threshold at Otsu's level
    #[default]
    Threshold,
    /// Adaptive threshold against the local mean
    MeanThreshold,
    /// Adaptive threshold against the local Gaussian-weighted mean
    #[serde(alias = "gauss_threhold")]
    GaussThreshold,
    /// Find the receipt outline, flatten it, then mean-threshold
    EdgeDetection,
}

impl PreprocessMethod {
    pub const ALL: [PreprocessMethod; 6] = [
        PreprocessMethod::MedianBlur,
        PreprocessMethod::BilateralFilter,
        PreprocessMethod::Threshold,
        PreprocessMethod::MeanThreshold,
        PreprocessMethod::GaussThreshold,
        PreprocessMethod::EdgeDetection,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            PreprocessMethod::MedianBlur => "median_blur",
            PreprocessMethod::BilateralFilter => "bilateral_filter",
            PreprocessMethod::Threshold => "threshold",
            PreprocessMethod::MeanThreshold => "mean_threshold",
            PreprocessMethod::GaussThreshold => "gauss_threshold",
            PreprocessMethod::EdgeDetection => "edge_detection",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PreprocessMethod::MedianBlur => "Median Blur",
            PreprocessMethod::BilateralFilter => "Bilateral Filter",
            PreprocessMethod::Threshold => "Threshold",
            PreprocessMethod::MeanThreshold => "Adaptive Mean Thresholding",
            PreprocessMethod::GaussThreshold => "Adaptive Gaussian Thresholding",
            PreprocessMethod::EdgeDetection => "Edge Detection",
        }
    }
}

impl fmt::Display for PreprocessMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PreprocessMethod {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "median_blur" => Ok(PreprocessMethod::MedianBlur),
            "bilateral_filter" => Ok(PreprocessMethod::BilateralFilter),
            "threshold" => Ok(PreprocessMethod::Threshold),
            "mean_threshold" => Ok(PreprocessMethod::MeanThreshold),
            // The old upload form posted this spelling
            "gauss_threshold" | "gauss_threhold" => Ok(PreprocessMethod::GaussThreshold),
            "edge_detection" => Ok(PreprocessMethod::EdgeDetection),
            _ => Err(PipelineError::UnknownMethod(s.to_string())),
        }
    }
}

/// Parse an optional method where `none` means "recognise the raw image"
pub fn parse_method_option(s: &str) -> Result<Option<PreprocessMethod>, PipelineError> {
    if s.trim().eq_ignore_ascii_case("none") {
        Ok(None)
    } else {
        s.parse().map(Some)
    }
}

/// Text recognition backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Engine {
    /// Tesseract, in process
    #[default]
    Local,
    /// AWS Rekognition DetectText
    Cloud,
}

impl Engine {
    pub fn name(&self) -> &'static str {
        match self {
            Engine::Local => "local",
            Engine::Cloud => "cloud",
        }
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Engine {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" | "tesseract" => Ok(Engine::Local),
            "cloud" | "rekognition" | "aws" => Ok(Engine::Cloud),
            _ => Err(PipelineError::UnknownEngine(s.to_string())),
        }
    }
}

/// Granularity of a cloud text detection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionKind {
    Line,
    Word,
}

/// One piece of text reported by a recognition engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextDetection {
    pub text: String,
    pub kind: DetectionKind,
    /// Confidence in percent (0-100)
    pub confidence: Option<f32>,
    pub id: Option<i32>,
    /// Line that a word belongs to
    pub parent_id: Option<i32>,
}

/// Text recognised in one image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognizedText {
    pub engine: Engine,
    pub text: String,
    pub lines: Vec<String>,
    /// Mean confidence in percent (0-100), when the engine reports one
    pub confidence: Option<f32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub detections: Vec<TextDetection>,
}

impl RecognizedText {
    /// Build a result from plain text, splitting it into non-blank lines
    pub fn from_text(engine: Engine, text: String, confidence: Option<f32>) -> Self {
        let lines = text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect();
        Self {
            engine,
            text,
            lines,
            confidence,
            detections: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Contact details pulled out of receipt text
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptFields {
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
}

/// A label reported by cloud image classification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedLabel {
    pub name: String,
    pub confidence: f32,
}

/// Outcome of processing one receipt image
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanResult {
    pub id: ScanId,
    /// Name the image was submitted under, if any
    pub filename: Option<String>,
    /// SHA-256 of the submitted bytes
    pub content_hash: String,
    pub size_bytes: u64,
    /// Preprocessing applied; `None` when the raw image was recognised
    pub method: Option<PreprocessMethod>,
    pub recognized: RecognizedText,
    pub fields: ReceiptFields,
    pub processed_at: DateTime<Utc>,
    pub elapsed_ms: u64,
}
