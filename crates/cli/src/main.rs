//! receiptscan CLI
//!
//! Turn photos of paper receipts into text from the command line, or run
//! the HTTP API.

mod commands;

use clap::{Parser, Subcommand};
use receipt_pipeline::PreprocessMethod;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use commands::{batch, fields, labels, preprocess, process, serve};

#[allow(dead_code)]
mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    "\ntarget: ",
    env!("RECEIPTSCAN_BUILD_TARGET"),
    "\nprofile: ",
    env!("RECEIPTSCAN_BUILD_PROFILE"),
    "\nbuilt: ",
    env!("RECEIPTSCAN_BUILD_TIME"),
);

/// Receipt OCR - preprocess, recognise and extract contact details
#[derive(Parser)]
#[command(name = "receiptscan")]
#[command(version, long_version = LONG_VERSION, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to pipeline config file (JSON)
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Recognise a single receipt image
    Process(process::ProcessArgs),

    /// Recognise every receipt image under a directory
    Batch(batch::BatchArgs),

    /// Apply a preprocessing method and save the result
    Preprocess(preprocess::PreprocessArgs),

    /// Extract phone, email and street address from text
    Fields(fields::FieldsArgs),

    /// Detect labels with AWS Rekognition
    Labels(labels::LabelsArgs),

    /// List preprocessing methods
    Methods,

    /// Run the HTTP API
    Serve(serve::ServeArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    // `serve` logs requests at info
    let level = match cli.command {
        Commands::Serve(_) => level.max(Level::INFO),
        _ => level,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    tracing::debug!(
        rustc = built_info::RUSTC_VERSION,
        "{} {}",
        built_info::PKG_NAME,
        built_info::PKG_VERSION
    );

    let config = cli.config.as_deref();
    match cli.command {
        Commands::Process(args) => process::run(args, config).await,
        Commands::Batch(args) => batch::run(args, config).await,
        Commands::Preprocess(args) => preprocess::run(args, config),
        Commands::Fields(args) => fields::run(args),
        Commands::Labels(args) => labels::run(args, config).await,
        Commands::Methods => {
            for method in PreprocessMethod::ALL {
                println!("{:<18} {}", method.name(), method.label());
            }
            Ok(())
        }
        Commands::Serve(args) => serve::run(args, config).await,
    }
}
