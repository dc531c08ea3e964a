//! Asset path allocation
//!
//! Strategies never choose file names themselves; they ask an allocator for a
//! path per node and variant suffix.

use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// Where a capture should be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetPath {
    pub absolute: PathBuf,
    /// Path relative to the output root, as referenced from layout metadata
    pub relative: String,
}

pub trait AssetAllocator: Send + Sync {
    fn allocate(&self, node_id: &str, suffix: &str) -> AssetPath;
}

/// Allocates `<root>/assets/<node>-<suffix>.png`.
#[derive(Debug, Clone)]
pub struct DirectoryAllocator {
    root: PathBuf,
}

impl DirectoryAllocator {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl AssetAllocator for DirectoryAllocator {
    fn allocate(&self, node_id: &str, suffix: &str) -> AssetPath {
        let name = format!("{}-{}.png", file_stem(node_id), sanitize(suffix));
        let relative = format!("assets/{}", name);
        AssetPath {
            absolute: self.root.join("assets").join(&name),
            relative,
        }
    }
}

/// Sanitized node id; ids that needed rewriting get a digest of the raw id so
/// distinct nodes never share a file.
fn file_stem(node_id: &str) -> String {
    let cleaned = sanitize(node_id);
    if cleaned == node_id {
        return cleaned;
    }
    let digest = hex::encode(Sha256::digest(node_id.as_bytes()));
    format!("{}-{}", cleaned, &digest[..8])
}

fn sanitize(part: &str) -> String {
    let cleaned: String = part
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if cleaned.is_empty() {
        "node".to_string()
    } else {
        cleaned
    }
}
