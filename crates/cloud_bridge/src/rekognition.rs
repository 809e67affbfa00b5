//! AWS Rekognition integration for text and label detection
//!
//! Images go to Rekognition either inline (up to the 5 MiB API limit) or as a
//! reference to an object that is already stored in S3.

use anyhow::{Context, Result};
use aws_config::BehaviorVersion;
use aws_sdk_rekognition::config::Region;
use aws_sdk_rekognition::primitives::Blob;
use aws_sdk_rekognition::types::{self as aws, S3Object, TextTypes};
use receipt_pipeline::config::{CloudConfig, REKOGNITION_INLINE_LIMIT};
use receipt_pipeline::{DetectedLabel, DetectionKind, Engine, RecognizedText, TextDetection};
use tracing::{debug, info};

/// Configuration for the Rekognition client
#[derive(Debug, Clone)]
pub struct RekognitionConfig {
    /// AWS region; the SDK default chain decides when unset
    pub region: Option<String>,
    /// Endpoint override, e.g. a LocalStack URL
    pub endpoint_url: Option<String>,
    /// Bucket holding archived receipt images
    pub bucket: Option<String>,
    /// Largest image sent inline
    pub max_inline_bytes: usize,
}

impl Default for RekognitionConfig {
    fn default() -> Self {
        Self {
            region: None,
            endpoint_url: None,
            bucket: None,
            max_inline_bytes: REKOGNITION_INLINE_LIMIT,
        }
    }
}

impl RekognitionConfig {
    /// Create config from environment variables
    ///
    /// Reads `AWS_REGION`, `REKOGNITION_ENDPOINT_URL` and `UPLOAD_BUCKET`.
    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());
        Self {
            region: var("AWS_REGION"),
            endpoint_url: var("REKOGNITION_ENDPOINT_URL"),
            bucket: var("UPLOAD_BUCKET"),
            ..Self::default()
        }
    }

    /// Apply the pipeline's cloud section on top of this config
    pub fn with_pipeline(mut self, cloud: &CloudConfig) -> Self {
        self.max_inline_bytes = cloud.max_inline_bytes;
        if self.bucket.is_none() {
            self.bucket = cloud.bucket.clone();
        }
        self
    }
}

/// Where Rekognition should read the image from
#[derive(Debug, Clone)]
pub enum ImageSource {
    /// Encoded image bytes sent with the request
    Bytes(Vec<u8>),
    /// Object already stored in S3
    S3 { bucket: String, key: String },
}

impl ImageSource {
    fn into_aws(self, max_inline_bytes: usize) -> Result<aws::Image> {
        match self {
            ImageSource::Bytes(bytes) => {
                if bytes.len() > max_inline_bytes {
                    anyhow::bail!(
                        "image is {} bytes; images over {} bytes must be read from S3",
                        bytes.len(),
                        max_inline_bytes
                    );
                }
                Ok(aws::Image::builder().bytes(Blob::new(bytes)).build())
            }
            ImageSource::S3 { bucket, key } => Ok(aws::Image::builder()
                .s3_object(S3Object::builder().bucket(bucket).name(key).build())
                .build()),
        }
    }
}

/// Rekognition API client
#[derive(Debug, Clone)]
pub struct RekognitionClient {
    config: RekognitionConfig,
    client: aws_sdk_rekognition::Client,
}

impl RekognitionClient {
    /// Create a new client using the default AWS credential chain
    pub async fn new(config: RekognitionConfig) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = &config.region {
            loader = loader.region(Region::new(region.clone()));
        }
        if let Some(endpoint) = &config.endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }
        let sdk_config = loader.load().await;

        Self {
            config,
            client: aws_sdk_rekognition::Client::new(&sdk_config),
        }
    }

    /// Create client from environment variables
    pub async fn from_env() -> Self {
        Self::new(RekognitionConfig::from_env()).await
    }

    pub fn config(&self) -> &RekognitionConfig {
        &self.config
    }

    /// Reference an object in the configured bucket
    pub fn s3_source(&self, key: &str) -> Result<ImageSource> {
        let bucket = self
            .config
            .bucket
            .clone()
            .context("UPLOAD_BUCKET is not configured")?;
        Ok(ImageSource::S3 {
            bucket,
            key: key.to_string(),
        })
    }

    /// Detect text in an image
    pub async fn detect_text(&self, source: ImageSource) -> Result<RecognizedText> {
        let image = source.into_aws(self.config.max_inline_bytes)?;

        let output = self
            .client
            .detect_text()
            .image(image)
            .send()
            .await
            .context("Failed to send request to Rekognition DetectText")?;

        let detections: Vec<TextDetection> = output
            .text_detections()
            .iter()
            .filter_map(convert_detection)
            .collect();
        info!(detections = detections.len(), "rekognition detected text");

        Ok(recognized_from_detections(detections))
    }

    /// Detect labels (objects, scenes) in an image
    pub async fn detect_labels(
        &self,
        source: ImageSource,
        max_labels: i32,
        min_confidence: f32,
    ) -> Result<Vec<DetectedLabel>> {
        let image = source.into_aws(self.config.max_inline_bytes)?;

        let output = self
            .client
            .detect_labels()
            .image(image)
            .max_labels(max_labels)
            .min_confidence(min_confidence)
            .send()
            .await
            .context("Failed to send request to Rekognition DetectLabels")?;

        let labels = output
            .labels()
            .iter()
            .filter_map(|label| {
                Some(DetectedLabel {
                    name: label.name()?.to_string(),
                    confidence: label.confidence().unwrap_or_default(),
                })
            })
            .collect::<Vec<_>>();
        debug!(labels = labels.len(), "rekognition detected labels");

        Ok(labels)
    }
}

fn convert_detection(detection: &aws::TextDetection) -> Option<TextDetection> {
    let kind = match detection.r#type()? {
        TextTypes::Line => DetectionKind::Line,
        TextTypes::Word => DetectionKind::Word,
        _ => return None,
    };
    Some(TextDetection {
        text: detection.detected_text()?.to_string(),
        kind,
        confidence: detection.confidence(),
        id: detection.id(),
        parent_id: detection.parent_id(),
    })
}

/// Build the recognised text from Rekognition detections
///
/// Text is the LINE detections in order; confidence is their mean.
pub fn recognized_from_detections(detections: Vec<TextDetection>) -> RecognizedText {
    let lines: Vec<&TextDetection> = detections
        .iter()
        .filter(|d| d.kind == DetectionKind::Line)
        .collect();

    let text = lines
        .iter()
        .map(|d| d.text.as_str())
        .collect::<Vec<_>>()
        .join("\n");

    let scores: Vec<f32> = lines.iter().filter_map(|d| d.confidence).collect();
    let confidence = if scores.is_empty() {
        None
    } else {
        Some(scores.iter().sum::<f32>() / scores.len() as f32)
    };

    let mut recognized = RecognizedText::from_text(Engine::Cloud, text, confidence);
    recognized.detections = detections;
    recognized
}
