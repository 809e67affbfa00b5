//! Scan every receipt image under a directory.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Args;
use receipt_pipeline::hashing::{detect_duplicates, DuplicateGroup};
use receipt_pipeline::util::{is_allowed_image, readable_filesize};
use receipt_pipeline::{Engine, PreparedScan};
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

#[derive(Args)]
pub struct BatchArgs {
    /// Directory of receipt images
    input: PathBuf,

    /// Mirror the input tree here as `<file>.json`; JSON lines on stdout otherwise
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Preprocessing method, or `none`
    #[arg(short, long)]
    method: Option<String>,

    /// Recognition engine: local or cloud
    #[arg(short, long, default_value = "local")]
    engine: Engine,

    /// Keep going when an image fails
    #[arg(long)]
    continue_on_error: bool,
}

pub async fn run(args: BatchArgs, config_path: Option<&str>) -> Result<()> {
    let start = Instant::now();
    let config = super::load_config(config_path)?;
    let method = super::resolve_method(args.method.as_deref(), &config)?;

    let paths = collect_images(&args.input)?;
    if paths.is_empty() {
        anyhow::bail!("No receipt images found under {}", args.input.display());
    }

    let mut files = Vec::with_capacity(paths.len());
    let mut total_bytes = 0u64;
    for path in paths {
        let bytes = fs::read(&path).with_context(|| format!("reading {}", path.display()))?;
        total_bytes += bytes.len() as u64;
        files.push((path, bytes));
    }
    let groups = detect_duplicates(&files);
    for group in groups.iter().filter(|g| g.is_duplicate()) {
        warn!(
            "Skipping {} duplicate(s) of {}",
            group.filenames.len() - 1,
            group.filenames[0].display()
        );
    }
    let files = first_of_each(files, &groups);
    info!(
        "Found {} unique images ({})",
        files.len(),
        readable_filesize(total_bytes)
    );

    if let Some(dir) = &args.output_dir {
        fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }

    let recognizer = super::recognizer(args.engine, &config).await;
    let mut succeeded = 0usize;
    let mut failed = 0usize;

    for (path, bytes) in files {
        let filename = path.file_name().map(|n| n.to_string_lossy().into_owned());
        let prepare_config = config.clone();
        let prepared = tokio::task::spawn_blocking(move || {
            PreparedScan::prepare(&bytes, filename, method, &prepare_config)
        })
        .await?;

        let outcome = match prepared {
            Ok(prepared) => recognizer
                .recognize(&prepared)
                .await
                .map(|recognized| prepared.complete(recognized)),
            Err(e) => Err(e.into()),
        };

        match outcome {
            Ok(result) => {
                let json = serde_json::to_string(&result)?;
                match &args.output_dir {
                    Some(dir) => {
                        let target = output_path(dir, &args.input, &path);
                        if let Some(parent) = target.parent() {
                            fs::create_dir_all(parent)
                                .with_context(|| format!("creating {}", parent.display()))?;
                        }
                        fs::write(&target, json)
                            .with_context(|| format!("writing {}", target.display()))?;
                        debug!("Wrote {}", target.display());
                    }
                    None => println!("{}", json),
                }
                succeeded += 1;
            }
            Err(e) if args.continue_on_error => {
                warn!("Failed to process {}: {:#}", path.display(), e);
                failed += 1;
            }
            Err(e) => {
                error!("Failed to process {}: {:#}", path.display(), e);
                return Err(e.context(format!("processing {}", path.display())));
            }
        }
    }

    eprintln!(
        "Processed {} images in {:?} ({} failed)",
        succeeded + failed,
        start.elapsed(),
        failed
    );
    Ok(())
}

/// Accepted image files under `root`, sorted by path
pub fn collect_images(root: &Path) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = entry.with_context(|| format!("walking {}", root.display()))?;
        if entry.file_type().is_file() && is_allowed_image(entry.path()) {
            paths.push(entry.into_path());
        }
    }
    paths.sort();
    Ok(paths)
}

/// Keep only the first file of each content group
fn first_of_each(
    files: Vec<(PathBuf, Vec<u8>)>,
    groups: &[DuplicateGroup],
) -> Vec<(PathBuf, Vec<u8>)> {
    files
        .into_iter()
        .filter(|(path, _)| groups.iter().any(|g| g.filenames.first() == Some(path)))
        .collect()
}

/// `<output_dir>/<path relative to root>.json`, mirroring the input tree
///
/// The full file name is kept so `lunch.jpg` and `lunch.png` stay apart.
fn output_path(output_dir: &Path, root: &Path, path: &Path) -> PathBuf {
    let relative = path
        .strip_prefix(root)
        .ok()
        .filter(|r| !r.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .or_else(|| path.file_name().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("receipt"));

    let mut name = relative.into_os_string();
    name.push(".json");
    output_dir.join(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_images_filters_and_recurses() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("march")).unwrap();
        fs::write(dir.path().join("b.png"), b"b").unwrap();
        fs::write(dir.path().join("a.JPG"), b"a").unwrap();
        fs::write(dir.path().join("notes.txt"), b"n").unwrap();
        fs::write(dir.path().join("march").join("c.gif"), b"c").unwrap();

        let found = collect_images(dir.path()).unwrap();
        let names: Vec<_> = found
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_path_buf())
            .collect();
        assert_eq!(
            names,
            vec![
                PathBuf::from("a.JPG"),
                PathBuf::from("b.png"),
                PathBuf::from("march").join("c.gif"),
            ]
        );
    }

    #[test]
    fn test_first_of_each_drops_duplicates() {
        let files = vec![
            (PathBuf::from("one.png"), b"same".to_vec()),
            (PathBuf::from("two.png"), b"other".to_vec()),
            (PathBuf::from("copy-of-one.png"), b"same".to_vec()),
        ];
        let groups = detect_duplicates(&files);
        let kept: Vec<_> = first_of_each(files, &groups)
            .into_iter()
            .map(|(p, _)| p)
            .collect();
        assert_eq!(kept, vec![PathBuf::from("one.png"), PathBuf::from("two.png")]);
    }

    #[test]
    fn test_output_paths_do_not_collide() {
        let out = Path::new("/out");
        let root = Path::new("/receipts");
        let inputs = [
            "/receipts/a/receipt.jpg",
            "/receipts/b/receipt.jpg",
            "/receipts/lunch.jpg",
            "/receipts/lunch.png",
        ];
        let outputs: Vec<PathBuf> = inputs
            .iter()
            .map(|p| output_path(out, root, Path::new(p)))
            .collect();

        assert_eq!(outputs[0], PathBuf::from("/out/a/receipt.jpg.json"));
        assert_eq!(outputs[3], PathBuf::from("/out/lunch.png.json"));
        let unique: std::collections::HashSet<_> = outputs.iter().collect();
        assert_eq!(unique.len(), inputs.len());
    }

    #[test]
    fn test_output_path_for_single_file_input() {
        let file = Path::new("/tmp/lunch.jpeg");
        assert_eq!(
            output_path(Path::new("/out"), file, file),
            PathBuf::from("/out/lunch.jpeg.json")
        );
    }
}
