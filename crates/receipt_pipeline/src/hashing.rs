//! Duplicate detection via SHA-256 content hashing

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::PathBuf;

/// Compute the SHA-256 hash of raw image file bytes
///
/// Returns a 64-character hexadecimal string.
pub fn compute_content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Group of files with identical content
#[derive(Debug, Clone)]
pub struct DuplicateGroup {
    /// SHA-256 hash of the file content
    pub hash: String,
    /// All filenames that carry this content, in input order
    pub filenames: Vec<PathBuf>,
}

impl DuplicateGroup {
    pub fn is_duplicate(&self) -> bool {
        self.filenames.len() > 1
    }
}

/// Detect duplicate files based on SHA-256 hash
///
/// Groups are returned in the order their first file appears in `files`.
pub fn detect_duplicates<B: AsRef<[u8]>>(files: &[(PathBuf, B)]) -> Vec<DuplicateGroup> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<DuplicateGroup> = Vec::new();

    for (filename, bytes) in files {
        let hash = compute_content_hash(bytes.as_ref());
        match index.get(&hash) {
            Some(&i) => groups[i].filenames.push(filename.clone()),
            None => {
                index.insert(hash.clone(), groups.len());
                groups.push(DuplicateGroup {
                    hash,
                    filenames: vec![filename.clone()],
                });
            }
        }
    }

    groups
}
