//! Writable store backed by one JSON document (`data/db.json`)

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use super::{
    sort_newest_first, unique_slug, NewPost, PostPatch, Repository, StoreError, StoreResult,
};
use crate::content::{clean_excerpt, Category, Post};

/// Store document file name
pub const DB_FILE: &str = "db.json";

/// On-disk layout of the store
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct Document {
    version: u32,
    posts: Vec<Post>,
    categories: Vec<Category>,
}

impl Document {
    const VERSION: u32 = 1;

    fn next_id(&self) -> u64 {
        self.posts.iter().map(|p| p.id).max().unwrap_or(0) + 1
    }

    fn find_mut(&mut self, id: u64) -> StoreResult<&mut Post> {
        self.posts
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("post {}", id)))
    }
}

/// JSON document store. Every mutation rewrites the document.
#[derive(Debug)]
pub struct JsonStore {
    path: PathBuf,
    doc: Document,
}

impl JsonStore {
    /// Open the store under `data_dir`, creating an empty one if missing
    pub fn open<P: AsRef<Path>>(data_dir: P) -> StoreResult<Self> {
        let path = data_dir.as_ref().join(DB_FILE);
        let doc = if path.exists() {
            let content = fs::read_to_string(&path)?;
            let doc: Document = serde_json::from_str(&content)?;
            if doc.version != Document::VERSION {
                tracing::warn!(
                    "Store version {} differs from {}, reading anyway",
                    doc.version,
                    Document::VERSION
                );
            }
            doc
        } else {
            tracing::info!("Creating new store at {:?}", path);
            Document {
                version: Document::VERSION,
                ..Default::default()
            }
        };
        Ok(Self { path, doc })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Insert or replace categories by key
    pub fn upsert_categories(&mut self, categories: Vec<Category>) -> StoreResult<()> {
        self.commit(|doc| {
            for category in categories {
                match doc.categories.iter_mut().find(|c| c.key == category.key) {
                    Some(existing) => *existing = category,
                    None => doc.categories.push(category),
                }
            }
            Ok(())
        })
    }

    /// Insert a post keeping its slug, dates and counters. It gets the next
    /// free id. Used when importing markdown posts.
    pub fn import_post(&mut self, mut post: Post) -> StoreResult<Post> {
        self.commit(|doc| {
            if doc.posts.iter().any(|p| p.slug == post.slug) {
                return Err(StoreError::Validation(format!(
                    "slug already exists: {}",
                    post.slug
                )));
            }
            post.id = doc.next_id();
            doc.posts.push(post.clone());
            Ok(post)
        })
    }

    /// Next id: one past the highest id in use
    pub fn next_id(&self) -> u64 {
        self.doc.next_id()
    }

    /// Apply `change` to a copy of the document. The copy replaces the
    /// in-memory document only once it is on disk.
    fn commit<T>(
        &mut self,
        change: impl FnOnce(&mut Document) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let mut doc = self.doc.clone();
        let out = change(&mut doc)?;
        write_document(&self.path, &doc)?;
        self.doc = doc;
        Ok(out)
    }
}

/// Write `doc` to a temp file next to `path`, then rename it into place
fn write_document(path: &Path, doc: &Document) -> StoreResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, serde_json::to_string_pretty(doc)?)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

impl Repository for JsonStore {
    fn list_posts(&self, include_drafts: bool) -> StoreResult<Vec<Post>> {
        let mut posts: Vec<Post> = self
            .doc
            .posts
            .iter()
            .filter(|p| include_drafts || p.is_published)
            .cloned()
            .collect();
        sort_newest_first(&mut posts);
        Ok(posts)
    }

    fn get_post(&self, id: u64) -> StoreResult<Post> {
        self.doc
            .posts
            .iter()
            .find(|p| p.id == id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("post {}", id)))
    }

    fn get_post_by_slug(&self, slug: &str) -> StoreResult<Post> {
        self.doc
            .posts
            .iter()
            .find(|p| p.slug == slug)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("post {:?}", slug)))
    }

    fn create_post(&mut self, new: NewPost) -> StoreResult<Post> {
        let title = new.title.trim();
        if title.is_empty() {
            return Err(StoreError::Validation("title is required".to_string()));
        }

        let title = title.to_string();

        let post = self.commit(|doc| {
            let id = doc.next_id();
            let slug = unique_slug(&title, id, |s| doc.posts.iter().any(|p| p.slug == s));

            let mut post = Post::new(id, title, Utc::now());
            post.slug = slug;
            post.content = new.content;
            post.excerpt = clean_excerpt(new.excerpt);
            post.tags = new.tags;
            post.category_key = new.category_key;
            post.is_published = new.is_published;
            post.is_featured = new.is_featured;
            post.images = new.images;

            doc.posts.push(post.clone());
            Ok(post)
        })?;
        tracing::debug!("Created post {} ({})", post.id, post.slug);
        Ok(post)
    }

    fn update_post(&mut self, id: u64, patch: PostPatch) -> StoreResult<Post> {
        if matches!(&patch.title, Some(t) if t.trim().is_empty()) {
            return Err(StoreError::Validation("title is required".to_string()));
        }
        self.commit(|doc| {
            let post = doc.find_mut(id)?;
            patch.apply(post);
            post.updated_at = Some(Utc::now());
            Ok(post.clone())
        })
    }

    fn delete_post(&mut self, id: u64) -> StoreResult<()> {
        self.commit(|doc| {
            let before = doc.posts.len();
            doc.posts.retain(|p| p.id != id);
            if doc.posts.len() == before {
                return Err(StoreError::NotFound(format!("post {}", id)));
            }
            Ok(())
        })
    }

    fn increment_view_count(&mut self, id: u64) -> StoreResult<Post> {
        self.commit(|doc| {
            let post = doc.find_mut(id)?;
            post.view_count += 1;
            Ok(post.clone())
        })
    }

    fn list_categories(&self) -> StoreResult<Vec<Category>> {
        let mut categories: Vec<Category> = self
            .doc
            .categories
            .iter()
            .filter(|c| c.is_active)
            .cloned()
            .collect();
        categories.sort_by(|a, b| {
            a.sort_order
                .cmp(&b.sort_order)
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(categories)
    }

    fn is_read_only(&self) -> bool {
        false
    }
}
