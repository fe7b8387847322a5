//! Write the markdown post manifest for the frontend

use anyhow::Result;
use std::path::PathBuf;

use crate::content::manifest;
use crate::Devfolio;

/// Manifest location under the public directory
pub const MANIFEST_PATH: &str = "data/posts-list.json";

pub fn run(site: &Devfolio) -> Result<PathBuf> {
    let entries = manifest::build(&site.posts_dir())?;
    let output = site.public_dir.join(MANIFEST_PATH);
    manifest::write(&entries, &output)?;
    println!("Wrote {} posts to {:?}", entries.len(), output);
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SiteConfig;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_writes_manifest_into_public() {
        let dir = TempDir::new().unwrap();
        let site = Devfolio::with_config(dir.path().to_path_buf(), SiteConfig::default());
        fs::create_dir_all(site.posts_dir()).unwrap();
        fs::write(site.posts_dir().join("hello.md"), "# hi").unwrap();

        let output = run(&site).unwrap();
        assert_eq!(output, dir.path().join("public/data/posts-list.json"));
        let written: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(output).unwrap()).unwrap();
        assert_eq!(written[0]["slug"], "hello");
        assert_eq!(written[0]["filename"], "hello.md");
    }
}
