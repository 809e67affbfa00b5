//! Label detection with Rekognition.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use cloud_bridge::ImageSource;

#[derive(Args)]
pub struct LabelsArgs {
    /// Local image to send inline
    #[arg(required_unless_present = "s3_key", conflicts_with = "s3_key")]
    input: Option<PathBuf>,

    /// Key of an image already in the configured bucket
    #[arg(long)]
    s3_key: Option<String>,

    /// Maximum number of labels
    #[arg(long)]
    max_labels: Option<i32>,

    /// Minimum confidence, 0-100
    #[arg(long)]
    min_confidence: Option<f32>,
}

pub async fn run(args: LabelsArgs, config_path: Option<&str>) -> Result<()> {
    let config = super::load_config(config_path)?;
    let client = super::rekognition_client(&config).await;

    let source = match (&args.input, &args.s3_key) {
        (_, Some(key)) => client.s3_source(key)?,
        (Some(path), None) => ImageSource::Bytes(
            std::fs::read(path).with_context(|| format!("reading {}", path.display()))?,
        ),
        (None, None) => anyhow::bail!("either an image path or --s3-key is required"),
    };

    let labels = client
        .detect_labels(
            source,
            args.max_labels.unwrap_or(config.cloud.max_labels),
            args.min_confidence
                .unwrap_or(config.cloud.min_label_confidence),
        )
        .await?;

    println!("{}", serde_json::to_string_pretty(&labels)?);
    Ok(())
}
