//! Extract contact fields from already-recognised text.

use std::io::Read;

use anyhow::{Context, Result};
use clap::Args;
use receipt_pipeline::fields::extract_fields;

#[derive(Args)]
pub struct FieldsArgs {
    /// Text file, or `-` for stdin
    #[arg(default_value = "-")]
    input: String,
}

pub fn run(args: FieldsArgs) -> Result<()> {
    let text = read_text(&args.input)?;
    println!("{}", serde_json::to_string_pretty(&extract_fields(&text))?);
    Ok(())
}

fn read_text(input: &str) -> Result<String> {
    if input == "-" {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("reading stdin")?;
        Ok(text)
    } else {
        std::fs::read_to_string(input).with_context(|| format!("reading {}", input))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_text_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("receipt.txt");
        std::fs::write(&path, "Call 555-867-5309").unwrap();

        let text = read_text(path.to_str().unwrap()).unwrap();
        assert_eq!(
            extract_fields(&text).phone.as_deref(),
            Some("555-867-5309")
        );
    }

    #[test]
    fn test_read_text_missing_file() {
        assert!(read_text("/nonexistent/receipt.txt").is_err());
    }
}
