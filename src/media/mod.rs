//! Image storage and staged uploads
//!
//! Images are stored as objects addressed by relative, `/`-separated paths.
//! While a post is being edited its images live under `temp/`. Once the post
//! is saved they move to `posts/{id}/` and references in the post body are
//! rewritten to the permanent URLs.

mod bucket;
mod staging;

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::config::StorageConfig;

pub use bucket::LocalBucket;
pub use staging::{rewrite_references, MovedImage, UploadSession};

#[derive(Error, Debug)]
pub enum MediaError {
    #[error("Invalid object path: {0}")]
    InvalidPath(String),

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Object already exists: {0}")]
    AlreadyExists(String),

    #[error("Unsupported file type: {0}")]
    UnsupportedType(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type MediaResult<T> = Result<T, MediaError>;

/// Listing entry for a stored object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    /// File name, without the folder prefix
    pub name: String,
    pub size: u64,
}

/// A stored image and where it can be fetched
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredImage {
    pub url: String,
    pub path: String,
    pub file_name: String,
}

/// Object storage
pub trait ImageStore: Send + Sync {
    /// Write an object. Fails if the path already exists.
    fn put(&self, path: &str, bytes: &[u8]) -> MediaResult<()>;

    fn exists(&self, path: &str) -> MediaResult<bool>;

    /// Copy an object. Fails if `to` already exists.
    fn copy(&self, from: &str, to: &str) -> MediaResult<()>;

    /// Remove objects; missing ones are ignored
    fn remove(&self, paths: &[String]) -> MediaResult<()>;

    /// Objects directly inside `prefix`
    fn list(&self, prefix: &str) -> MediaResult<Vec<ObjectInfo>>;

    fn public_url(&self, path: &str) -> String;

    /// Folder layout and upload limits
    fn layout(&self) -> &StorageConfig;
}

/// Validate an object path: relative, no `..`, no empty segments
pub fn validate_path(path: &str) -> MediaResult<()> {
    let invalid = path.is_empty()
        || path.starts_with('/')
        || path.contains('\\')
        || path
            .split('/')
            .any(|seg| seg.is_empty() || seg == "." || seg == "..");
    if invalid {
        return Err(MediaError::InvalidPath(path.to_string()));
    }
    Ok(())
}

/// Lowercased extension of `name` if it is on the allow list
fn allowed_extension(config: &StorageConfig, name: &str) -> MediaResult<String> {
    let ext = name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .filter(|ext| !ext.is_empty())
        .ok_or_else(|| MediaError::UnsupportedType(name.to_string()))?;
    if config
        .allowed_extensions
        .iter()
        .any(|allowed| allowed.eq_ignore_ascii_case(&ext))
    {
        Ok(ext)
    } else {
        Err(MediaError::UnsupportedType(ext))
    }
}

fn post_folder(config: &StorageConfig, post_id: u64) -> String {
    format!("{}/{}", config.posts_prefix, post_id)
}

fn file_name_of(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Upload an image, named after the upload time in epoch milliseconds.
///
/// With a post id the image goes straight to the post folder, otherwise it is
/// staged under the temp folder. A name already taken is bumped by 1 ms.
pub fn upload_image(
    store: &dyn ImageStore,
    bytes: &[u8],
    original_name: &str,
    post_id: Option<u64>,
    now: DateTime<Utc>,
) -> MediaResult<StoredImage> {
    let config = store.layout();
    let ext = allowed_extension(config, original_name)?;
    let folder = match post_id {
        Some(id) => post_folder(config, id),
        None => config.temp_prefix.clone(),
    };

    let mut millis = now.timestamp_millis();
    let (path, file_name) = loop {
        let file_name = format!("{}.{}", millis, ext);
        let path = format!("{}/{}", folder, file_name);
        if !store.exists(&path)? {
            break (path, file_name);
        }
        millis += 1;
    };

    store.put(&path, bytes)?;
    tracing::debug!("Uploaded {} ({} bytes)", path, bytes.len());

    Ok(StoredImage {
        url: store.public_url(&path),
        path,
        file_name,
    })
}

/// Delete one image
pub fn delete_image(store: &dyn ImageStore, path: &str) -> MediaResult<()> {
    validate_path(path)?;
    store.remove(&[path.to_string()])
}

/// Move a staged image into the post folder
pub fn move_temp_to_post(
    store: &dyn ImageStore,
    temp_path: &str,
    post_id: u64,
) -> MediaResult<StoredImage> {
    let config = store.layout();
    validate_path(temp_path)?;
    if !temp_path.starts_with(&format!("{}/", config.temp_prefix)) {
        return Err(MediaError::InvalidPath(temp_path.to_string()));
    }

    let file_name = file_name_of(temp_path).to_string();
    let new_path = format!("{}/{}", post_folder(config, post_id), file_name);

    store.copy(temp_path, &new_path)?;
    store.remove(&[temp_path.to_string()])?;

    Ok(StoredImage {
        url: store.public_url(&new_path),
        path: new_path,
        file_name,
    })
}

/// Delete every image in the post folder. Returns the removed count.
pub fn delete_post_images(store: &dyn ImageStore, post_id: u64) -> MediaResult<usize> {
    let folder = post_folder(store.layout(), post_id);
    let paths: Vec<String> = store
        .list(&folder)?
        .into_iter()
        .map(|obj| format!("{}/{}", folder, obj.name))
        .collect();
    if !paths.is_empty() {
        store.remove(&paths)?;
    }
    Ok(paths.len())
}

/// Delete staged images older than the retention window.
/// Names that are not epoch-millisecond stamps are left alone.
pub fn cleanup_temp_images(
    store: &dyn ImageStore,
    now: DateTime<Utc>,
    retention: Duration,
) -> MediaResult<usize> {
    let prefix = store.layout().temp_prefix.clone();
    let cutoff = now - retention;

    let stale: Vec<String> = store
        .list(&prefix)?
        .into_iter()
        .filter(|obj| {
            upload_time(&obj.name).is_some_and(|uploaded| uploaded < cutoff)
        })
        .map(|obj| format!("{}/{}", prefix, obj.name))
        .collect();

    if !stale.is_empty() {
        store.remove(&stale)?;
        tracing::info!("Removed {} stale temp images", stale.len());
    }
    Ok(stale.len())
}

/// Upload time encoded in a `{millis}.{ext}` file name
fn upload_time(name: &str) -> Option<DateTime<Utc>> {
    let stem = name.split('.').next()?;
    let millis: i64 = stem.parse().ok()?;
    Utc.timestamp_millis_opt(millis).single()
}
