//! Post storage
//!
//! `Repository` is the boundary between the application and whatever holds
//! the posts. Two implementations ship with the crate: [`StaticStore`] reads
//! markdown files and refuses writes, [`JsonStore`] keeps everything in a
//! single JSON document under the data directory.

mod json;
mod markdown;

use serde::Deserialize;
use thiserror::Error;

use crate::content::{Category, Post};

pub use json::JsonStore;
pub use markdown::StaticStore;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Store is read-only")]
    ReadOnly,

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt store document: {0}")]
    Serde(#[from] serde_json::Error),

    #[error(transparent)]
    Load(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Fields of a post about to be inserted
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NewPost {
    pub title: String,
    pub content: String,
    pub excerpt: Vec<String>,
    pub tags: Vec<String>,
    pub category_key: Option<String>,
    pub is_published: bool,
    pub is_featured: bool,
    pub images: Vec<String>,
}

/// Partial update; `None` leaves a field untouched
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PostPatch {
    pub title: Option<String>,
    pub content: Option<String>,
    pub excerpt: Option<Vec<String>>,
    pub tags: Option<Vec<String>>,
    pub category_key: Option<Option<String>>,
    pub is_published: Option<bool>,
    pub is_featured: Option<bool>,
    pub images: Option<Vec<String>>,
}

impl PostPatch {
    fn apply(self, post: &mut Post) {
        if let Some(title) = self.title {
            post.title = title;
        }
        if let Some(content) = self.content {
            post.content = content;
        }
        if let Some(excerpt) = self.excerpt {
            post.excerpt = excerpt;
        }
        if let Some(tags) = self.tags {
            post.tags = tags;
        }
        if let Some(category_key) = self.category_key {
            post.category_key = category_key;
        }
        if let Some(is_published) = self.is_published {
            post.is_published = is_published;
        }
        if let Some(is_featured) = self.is_featured {
            post.is_featured = is_featured;
        }
        if let Some(images) = self.images {
            post.images = images;
        }
    }
}

/// Storage for posts and categories
pub trait Repository: Send + Sync {
    /// All posts, newest first. Drafts only when `include_drafts` is set.
    fn list_posts(&self, include_drafts: bool) -> StoreResult<Vec<Post>>;

    fn get_post(&self, id: u64) -> StoreResult<Post>;

    fn get_post_by_slug(&self, slug: &str) -> StoreResult<Post>;

    fn create_post(&mut self, new: NewPost) -> StoreResult<Post>;

    fn update_post(&mut self, id: u64, patch: PostPatch) -> StoreResult<Post>;

    fn delete_post(&mut self, id: u64) -> StoreResult<()>;

    fn set_published(&mut self, id: u64, published: bool) -> StoreResult<Post> {
        self.update_post(
            id,
            PostPatch {
                is_published: Some(published),
                ..Default::default()
            },
        )
    }

    fn increment_view_count(&mut self, id: u64) -> StoreResult<Post>;

    /// Active categories ordered by `(sort_order, name)`
    fn list_categories(&self) -> StoreResult<Vec<Category>>;

    fn is_read_only(&self) -> bool;

    /// Re-read the underlying source, if it can change behind our back
    fn reload(&mut self) -> StoreResult<()> {
        Ok(())
    }
}

/// Order posts newest first, breaking ties by descending id
pub(crate) fn sort_newest_first(posts: &mut [Post]) {
    posts.sort_by(|a, b| {
        b.published_at
            .cmp(&a.published_at)
            .then_with(|| b.id.cmp(&a.id))
    });
}

/// Slug derived from `title` that no post in `taken` uses yet
pub(crate) fn unique_slug(title: &str, id: u64, taken: impl Fn(&str) -> bool) -> String {
    let base = match slug::slugify(title) {
        s if s.is_empty() => format!("post-{}", id),
        s => s,
    };
    if !taken(&base) {
        return base;
    }
    let mut n = 2;
    loop {
        let candidate = format!("{}-{}", base, n);
        if !taken(&candidate) {
            return candidate;
        }
        n += 1;
    }
}
