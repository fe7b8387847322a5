//! Stage-then-commit uploads for the post editor

use chrono::{DateTime, Utc};
use indexmap::IndexSet;
use serde::Serialize;

use super::{
    delete_image, move_temp_to_post, upload_image, validate_path, ImageStore, MediaError,
    MediaResult, StoredImage,
};

/// A staged image that was moved into its post folder
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MovedImage {
    pub from_path: String,
    pub from_url: String,
    pub to: StoredImage,
}

/// Images uploaded while one post is being edited.
///
/// New uploads land in `temp`. On save, [`commit`](Self::commit) moves them
/// under the post id; whatever fails to move stays staged.
pub struct UploadSession<'a> {
    store: &'a dyn ImageStore,
    temp: IndexSet<String>,
    permanent: IndexSet<String>,
}

impl<'a> UploadSession<'a> {
    pub fn new(store: &'a dyn ImageStore) -> Self {
        Self {
            store,
            temp: IndexSet::new(),
            permanent: IndexSet::new(),
        }
    }

    /// Upload into the temp folder and return the image URL
    pub fn upload_temp(
        &mut self,
        bytes: &[u8],
        original_name: &str,
        now: DateTime<Utc>,
    ) -> MediaResult<String> {
        let image = upload_image(self.store, bytes, original_name, None, now)?;
        self.temp.insert(image.path);
        Ok(image.url)
    }

    /// Track a temp image uploaded by an earlier request
    pub fn adopt_temp(&mut self, path: &str) -> MediaResult<()> {
        validate_path(path)?;
        let prefix = format!("{}/", self.store.layout().temp_prefix);
        if !path.starts_with(&prefix) {
            return Err(MediaError::InvalidPath(path.to_string()));
        }
        self.temp.insert(path.to_string());
        Ok(())
    }

    /// Delete an image from storage and stop tracking it
    pub fn remove(&mut self, path: &str) -> MediaResult<()> {
        delete_image(self.store, path)?;
        self.temp.shift_remove(path);
        self.permanent.shift_remove(path);
        Ok(())
    }

    /// Move every staged image under `post_id`
    pub fn commit(&mut self, post_id: u64) -> Vec<MovedImage> {
        let mut moved = Vec::new();
        let mut failed = IndexSet::new();

        for from_path in self.temp.drain(..) {
            match move_temp_to_post(self.store, &from_path, post_id) {
                Ok(to) => {
                    self.permanent.insert(to.path.clone());
                    moved.push(MovedImage {
                        from_url: self.store.public_url(&from_path),
                        from_path,
                        to,
                    });
                }
                Err(e) => {
                    tracing::warn!("Failed to move {} to post {}: {}", from_path, post_id, e);
                    failed.insert(from_path);
                }
            }
        }

        self.temp = failed;
        moved
    }

    pub fn clear(&mut self) {
        self.temp.clear();
        self.permanent.clear();
    }

    pub fn temp_paths(&self) -> impl Iterator<Item = &str> {
        self.temp.iter().map(String::as_str)
    }

    pub fn permanent_paths(&self) -> impl Iterator<Item = &str> {
        self.permanent.iter().map(String::as_str)
    }
}

/// Point every reference to a moved temp image at its permanent URL.
///
/// Each replacement comes from the `MovedImage` itself, so an image that
/// failed to move simply keeps its temp URL.
pub fn rewrite_references(content: &str, moved: &[MovedImage]) -> String {
    moved.iter().fold(content.to_string(), |acc, image| {
        if image.from_url == image.to.url {
            acc
        } else {
            acc.replace(&image.from_url, &image.to.url)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageConfig;
    use crate::media::LocalBucket;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn at(millis: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(millis).unwrap()
    }

    #[test]
    fn test_commit_moves_and_rewrites() {
        let dir = TempDir::new().unwrap();
        let store = LocalBucket::new(dir.path(), StorageConfig::default());
        let mut session = UploadSession::new(&store);

        let a = session.upload_temp(b"a", "a.png", at(100)).unwrap();
        let b = session.upload_temp(b"b", "b.jpg", at(200)).unwrap();
        let content = format!("![a]({})\ntext\n![b]({})\n![a again]({})", a, b, a);

        let moved = session.commit(9);
        assert_eq!(moved.len(), 2);
        assert_eq!(session.temp_paths().count(), 0);
        assert_eq!(
            session.permanent_paths().collect::<Vec<_>>(),
            vec!["posts/9/100.png", "posts/9/200.jpg"]
        );

        let rewritten = rewrite_references(&content, &moved);
        assert_eq!(
            rewritten,
            "![a](/media/posts/9/100.png)\ntext\n![b](/media/posts/9/200.jpg)\n![a again](/media/posts/9/100.png)"
        );
    }

    #[test]
    fn test_failed_move_keeps_temp_reference() {
        let dir = TempDir::new().unwrap();
        let store = LocalBucket::new(dir.path(), StorageConfig::default());
        let mut session = UploadSession::new(&store);

        // Registered but never uploaded, so its move fails
        session.adopt_temp("temp/1.png").unwrap();
        let ok = session.upload_temp(b"ok", "ok.png", at(2)).unwrap();
        let content = format!("![missing](/media/temp/1.png) ![ok]({})", ok);

        let moved = session.commit(4);
        assert_eq!(moved.len(), 1);
        assert_eq!(moved[0].from_path, "temp/2.png");
        assert_eq!(session.temp_paths().collect::<Vec<_>>(), vec!["temp/1.png"]);

        let rewritten = rewrite_references(&content, &moved);
        assert_eq!(
            rewritten,
            "![missing](/media/temp/1.png) ![ok](/media/posts/4/2.png)"
        );
    }

    #[test]
    fn test_adopt_only_temp_paths() {
        let dir = TempDir::new().unwrap();
        let store = LocalBucket::new(dir.path(), StorageConfig::default());
        let mut session = UploadSession::new(&store);

        assert!(session.adopt_temp("posts/1/1.png").is_err());
        assert!(session.adopt_temp("temp/../secret").is_err());
        session.adopt_temp("temp/5.png").unwrap();
        session.adopt_temp("temp/5.png").unwrap();
        assert_eq!(session.temp_paths().count(), 1);
    }

    #[test]
    fn test_remove_and_clear() {
        let dir = TempDir::new().unwrap();
        let store = LocalBucket::new(dir.path(), StorageConfig::default());
        let mut session = UploadSession::new(&store);

        session.upload_temp(b"x", "x.png", at(10)).unwrap();
        session.upload_temp(b"y", "y.png", at(20)).unwrap();
        session.remove("temp/10.png").unwrap();
        assert!(!store.exists("temp/10.png").unwrap());
        assert_eq!(session.temp_paths().collect::<Vec<_>>(), vec!["temp/20.png"]);

        session.clear();
        assert_eq!(session.temp_paths().count(), 0);
        // Clearing forgets paths without deleting files
        assert!(store.exists("temp/20.png").unwrap());
    }
}
