//! Local directory implementation of [`ImageStore`]

use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use super::{validate_path, ImageStore, MediaError, MediaResult, ObjectInfo};
use crate::config::StorageConfig;
use crate::helpers::join_url;

/// Objects stored as files below a root directory
#[derive(Debug, Clone)]
pub struct LocalBucket {
    root: PathBuf,
    config: StorageConfig,
}

impl LocalBucket {
    pub fn new<P: AsRef<Path>>(root: P, config: StorageConfig) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            config,
        }
    }

    fn resolve(&self, path: &str) -> MediaResult<PathBuf> {
        validate_path(path)?;
        Ok(path.split('/').fold(self.root.clone(), |acc, seg| acc.join(seg)))
    }
}

/// Open `target` for writing, refusing to clobber an existing object
fn create_new(target: &Path, path: &str) -> MediaResult<fs::File> {
    fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(target)
        .map_err(|e| match e.kind() {
            ErrorKind::AlreadyExists => MediaError::AlreadyExists(path.to_string()),
            _ => MediaError::Io(e),
        })
}

impl ImageStore for LocalBucket {
    fn put(&self, path: &str, bytes: &[u8]) -> MediaResult<()> {
        let target = self.resolve(path)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = create_new(&target, path)?;
        io::Write::write_all(&mut file, bytes)?;
        Ok(())
    }

    fn exists(&self, path: &str) -> MediaResult<bool> {
        Ok(self.resolve(path)?.is_file())
    }

    fn copy(&self, from: &str, to: &str) -> MediaResult<()> {
        let source = self.resolve(from)?;
        let target = self.resolve(to)?;
        if !source.is_file() {
            return Err(MediaError::NotFound(from.to_string()));
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut reader = fs::File::open(&source)?;
        let mut writer = create_new(&target, to)?;
        io::copy(&mut reader, &mut writer)?;
        Ok(())
    }

    fn remove(&self, paths: &[String]) -> MediaResult<()> {
        for path in paths {
            match fs::remove_file(self.resolve(path)?) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    tracing::debug!("Object already gone: {}", path);
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    fn list(&self, prefix: &str) -> MediaResult<Vec<ObjectInfo>> {
        let dir = self.resolve(prefix)?;
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut objects = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let metadata = entry.metadata()?;
            if !metadata.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                objects.push(ObjectInfo {
                    name: name.to_string(),
                    size: metadata.len(),
                });
            }
        }
        objects.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(objects)
    }

    fn public_url(&self, path: &str) -> String {
        join_url(&self.config.public_url, path)
    }

    fn layout(&self) -> &StorageConfig {
        &self.config
    }
}
