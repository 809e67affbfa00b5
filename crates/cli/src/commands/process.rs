//! Scan a single receipt image.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use receipt_pipeline::{Engine, PreparedScan};
use tracing::info;

#[derive(Args)]
pub struct ProcessArgs {
    /// Receipt image
    input: PathBuf,

    /// Preprocessing method, or `none`
    #[arg(short, long)]
    method: Option<String>,

    /// Recognition engine: local or cloud
    #[arg(short, long, default_value = "local")]
    engine: Engine,

    /// Write the JSON result here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Also save the image that was recognised
    #[arg(long)]
    save_preprocessed: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Full scan result
    Json,
    /// Recognised text only
    Text,
}

pub async fn run(args: ProcessArgs, config_path: Option<&str>) -> Result<()> {
    let config = super::load_config(config_path)?;
    let method = super::resolve_method(args.method.as_deref(), &config)?;

    let bytes =
        fs::read(&args.input).with_context(|| format!("reading {}", args.input.display()))?;
    let filename = args
        .input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned());

    let prepare_config = config.clone();
    let prepared = tokio::task::spawn_blocking(move || {
        PreparedScan::prepare(&bytes, filename, method, &prepare_config)
    })
    .await??;

    if let Some(path) = &args.save_preprocessed {
        prepared
            .image
            .save(path)
            .with_context(|| format!("writing {}", path.display()))?;
        info!("Saved preprocessed image to {}", path.display());
    }

    let recognizer = super::recognizer(args.engine, &config).await;
    let recognized = recognizer.recognize(&prepared).await?;
    let result = prepared.complete(recognized);

    let rendered = match args.format {
        OutputFormat::Json => serde_json::to_string_pretty(&result)?,
        OutputFormat::Text => result.recognized.text,
    };
    match args.output {
        Some(path) => {
            fs::write(&path, rendered).with_context(|| format!("writing {}", path.display()))?;
            info!("Wrote {}", path.display());
        }
        None => println!("{}", rendered),
    }
    Ok(())
}
