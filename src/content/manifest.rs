//! Posts manifest (`posts-list.json`) consumed by the static frontend

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use super::loader::is_markdown_file;

/// One manifest entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub slug: String,
    pub filename: String,
}

/// Build the manifest from the markdown files directly inside `posts_dir`.
/// Entries are sorted by filename so output is reproducible.
pub fn build(posts_dir: &Path) -> Result<Vec<ManifestEntry>> {
    if !posts_dir.is_dir() {
        bail!("Posts directory does not exist: {:?}", posts_dir);
    }

    let mut entries = Vec::new();
    for entry in fs::read_dir(posts_dir)? {
        let path = entry?.path();
        if !path.is_file() || !is_markdown_file(&path) {
            continue;
        }
        let (Some(filename), Some(slug)) = (
            path.file_name().and_then(|s| s.to_str()),
            path.file_stem().and_then(|s| s.to_str()),
        ) else {
            tracing::warn!("Skipping non UTF-8 file name {:?}", path);
            continue;
        };
        entries.push(ManifestEntry {
            slug: slug.to_string(),
            filename: filename.to_string(),
        });
    }

    if entries.is_empty() {
        tracing::warn!("No markdown files in {:?}", posts_dir);
    }

    entries.sort_by(|a, b| a.filename.cmp(&b.filename));
    Ok(entries)
}

/// Write the manifest as pretty JSON, creating parent directories
pub fn write(entries: &[ManifestEntry], output: &Path) -> Result<()> {
    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(output, serde_json::to_string_pretty(entries)?)?;
    tracing::info!("Wrote {} entries to {:?}", entries.len(), output);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_build_and_write() {
        let dir = TempDir::new().unwrap();
        let posts = dir.path().join("_posts");
        fs::create_dir_all(&posts).unwrap();
        fs::write(posts.join("b-post.md"), "# B").unwrap();
        fs::write(posts.join("a-post.markdown"), "# A").unwrap();
        fs::write(posts.join("image.png"), [0u8; 4]).unwrap();

        let entries = build(&posts).unwrap();
        assert_eq!(
            entries,
            vec![
                ManifestEntry {
                    slug: "a-post".to_string(),
                    filename: "a-post.markdown".to_string()
                },
                ManifestEntry {
                    slug: "b-post".to_string(),
                    filename: "b-post.md".to_string()
                },
            ]
        );

        let out = dir.path().join("public/data/posts-list.json");
        write(&entries, &out).unwrap();
        let parsed: Vec<ManifestEntry> =
            serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
        assert_eq!(parsed, entries);
    }

    #[test]
    fn test_missing_directory_is_error() {
        let dir = TempDir::new().unwrap();
        assert!(build(&dir.path().join("missing")).is_err());
    }
}
