//! Read-only store over a directory of markdown posts

use std::collections::HashMap;

use super::{sort_newest_first, NewPost, PostPatch, Repository, StoreError, StoreResult};
use crate::content::{Category, ContentLoader, Post};

/// Markdown-backed store.
///
/// Writes are refused. View counts live in memory, keyed by slug so they
/// survive a reload that renumbers posts.
#[derive(Debug)]
pub struct StaticStore {
    loader: ContentLoader,
    posts: Vec<Post>,
    views: HashMap<String, u64>,
}

impl StaticStore {
    /// Load every post under the loader's directory
    pub fn open(loader: ContentLoader) -> StoreResult<Self> {
        let mut store = Self {
            loader,
            posts: Vec::new(),
            views: HashMap::new(),
        };
        store.reload()?;
        Ok(store)
    }

    fn with_views(&self, mut post: Post) -> Post {
        post.view_count = self.views.get(&post.slug).copied().unwrap_or(0);
        post
    }

    fn find(&self, id: u64) -> StoreResult<&Post> {
        self.posts
            .iter()
            .find(|p| p.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("post {}", id)))
    }
}

impl Repository for StaticStore {
    fn list_posts(&self, include_drafts: bool) -> StoreResult<Vec<Post>> {
        let mut posts: Vec<Post> = self
            .posts
            .iter()
            .filter(|p| include_drafts || p.is_published)
            .map(|p| self.with_views(p.clone()))
            .collect();
        sort_newest_first(&mut posts);
        Ok(posts)
    }

    fn get_post(&self, id: u64) -> StoreResult<Post> {
        self.find(id).map(|p| self.with_views(p.clone()))
    }

    fn get_post_by_slug(&self, slug: &str) -> StoreResult<Post> {
        self.posts
            .iter()
            .find(|p| p.slug == slug)
            .map(|p| self.with_views(p.clone()))
            .ok_or_else(|| StoreError::NotFound(format!("post {:?}", slug)))
    }

    fn create_post(&mut self, _new: NewPost) -> StoreResult<Post> {
        Err(StoreError::ReadOnly)
    }

    fn update_post(&mut self, _id: u64, _patch: PostPatch) -> StoreResult<Post> {
        Err(StoreError::ReadOnly)
    }

    fn delete_post(&mut self, _id: u64) -> StoreResult<()> {
        Err(StoreError::ReadOnly)
    }

    fn increment_view_count(&mut self, id: u64) -> StoreResult<Post> {
        let slug = self.find(id)?.slug.clone();
        *self.views.entry(slug).or_insert(0) += 1;
        self.get_post(id)
    }

    /// Categories named by the posts' `category` front-matter
    fn list_categories(&self) -> StoreResult<Vec<Category>> {
        let mut keys: Vec<&str> = self
            .posts
            .iter()
            .filter_map(|p| p.category_key.as_deref())
            .collect();
        keys.sort_unstable();
        keys.dedup();
        Ok(keys
            .into_iter()
            .map(|key| Category::new(key, key, 0))
            .collect())
    }

    fn is_read_only(&self) -> bool {
        true
    }

    fn reload(&mut self) -> StoreResult<()> {
        self.posts = self.loader.load_posts()?;
        tracing::info!(
            "Loaded {} posts from {:?}",
            self.posts.len(),
            self.loader.posts_dir()
        );
        Ok(())
    }
}
