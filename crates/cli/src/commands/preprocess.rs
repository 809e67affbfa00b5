//! Write the preprocessed image without recognising it.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use receipt_pipeline::preprocess::preprocess_image_with;
use receipt_pipeline::PreprocessMethod;

#[derive(Args)]
pub struct PreprocessArgs {
    /// Receipt image
    input: PathBuf,

    /// Output image; the format follows the extension
    #[arg(short, long)]
    output: PathBuf,

    /// Preprocessing method
    #[arg(short, long)]
    method: Option<PreprocessMethod>,
}

pub fn run(args: PreprocessArgs, config_path: Option<&str>) -> Result<()> {
    let config = super::load_config(config_path)?;
    let method = args.method.unwrap_or(config.preprocess.default_method);

    let input = image::open(&args.input)
        .with_context(|| format!("opening {}", args.input.display()))?;
    let processed = preprocess_image_with(&input, method, &config.preprocess)?;
    processed
        .save(&args.output)
        .with_context(|| format!("writing {}", args.output.display()))?;

    println!("{} -> {} ({})", args.input.display(), args.output.display(), method);
    Ok(())
}
