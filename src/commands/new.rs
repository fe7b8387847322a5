//! Create a new markdown post

use anyhow::Result;
use std::fs;
use std::path::PathBuf;

use crate::Devfolio;

/// Create a post under `source/_posts`. The file name is the slugified
/// title unless `path` is given.
pub fn create_post(site: &Devfolio, title: &str, path: Option<&str>) -> Result<PathBuf> {
    let title = title.trim();
    if title.is_empty() {
        anyhow::bail!("Post title must not be empty");
    }

    let posts_dir = site.posts_dir();
    fs::create_dir_all(&posts_dir)?;

    let name = match path {
        Some(p) => p.trim_end_matches(".md").to_string(),
        None => slug::slugify(title),
    };
    if name.is_empty() {
        anyhow::bail!("Cannot derive a file name from {:?}, pass --path", title);
    }
    let file_path = posts_dir.join(format!("{}.md", name));

    // Check if file already exists
    if file_path.exists() {
        anyhow::bail!("File already exists: {:?}", file_path);
    }

    let now = chrono::Local::now();
    let content = format!(
        "---\ntitle: {}\ndate: {}\ntags: []\ncategory:\nexcerpt: []\nfeatured: false\npublished: true\n---\n",
        yaml_string(title),
        now.format("%Y-%m-%d %H:%M:%S")
    );
    fs::write(&file_path, content)?;

    println!("Created: {:?}", file_path);
    Ok(file_path)
}

/// Quote a scalar when YAML would otherwise misread it
fn yaml_string(value: &str) -> String {
    let needs_quotes = value.contains(": ")
        || value.contains(" #")
        || value.starts_with(|c: char| "!&*[]{}|>'\"%@`#,?-".contains(c));
    if needs_quotes {
        format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
    } else {
        value.to_string()
    }
}
