//! Post editor service used by the admin API

use serde::Deserialize;
use thiserror::Error;

use crate::content::{clean_excerpt, string_or_vec, MarkdownRenderer, Post};
use crate::media::{self, rewrite_references, ImageStore, MediaError, UploadSession};
use crate::store::{NewPost, PostPatch, Repository, StoreError};

#[derive(Error, Debug)]
pub enum EditorError {
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Media(#[from] MediaError),
}

pub type EditorResult<T> = Result<T, EditorError>;

/// Post as submitted by the editor form
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PostDraft {
    pub title: String,
    pub content: String,
    #[serde(deserialize_with = "string_or_vec")]
    pub excerpt: Vec<String>,
    /// A list, or one comma-separated string
    #[serde(deserialize_with = "string_or_vec")]
    pub tags: Vec<String>,
    pub category_key: Option<String>,
    pub is_featured: bool,
    pub is_published: bool,
    /// Temp image paths uploaded while editing
    pub staged_images: Vec<String>,
}

/// Draft fields after trimming and normalization
#[derive(Debug, Clone, PartialEq)]
struct ValidDraft {
    title: String,
    content: String,
    excerpt: Vec<String>,
    tags: Vec<String>,
    category_key: Option<String>,
    is_featured: bool,
    is_published: bool,
}

impl PostDraft {
    fn validate(&self) -> EditorResult<ValidDraft> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(EditorError::Validation("title is required".to_string()));
        }

        let category_key = self
            .category_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_lowercase);

        Ok(ValidDraft {
            title: title.to_string(),
            content: self.content.clone(),
            excerpt: clean_excerpt(&self.excerpt),
            tags: normalize_tags(&self.tags),
            category_key,
            is_featured: self.is_featured,
            is_published: self.is_published,
        })
    }
}

/// Split on commas, trim, drop empties and repeats, keeping first-seen order
fn normalize_tags(raw: &[String]) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for tag in raw.iter().flat_map(|t| t.split(',')).map(str::trim) {
        if !tag.is_empty() && !tags.iter().any(|t| t == tag) {
            tags.push(tag.to_string());
        }
    }
    tags
}

/// Creates, edits and deletes posts along with their images
pub struct PostEditor<'a> {
    repo: &'a mut dyn Repository,
    images: &'a dyn ImageStore,
}

impl<'a> PostEditor<'a> {
    pub fn new(repo: &'a mut dyn Repository, images: &'a dyn ImageStore) -> Self {
        Self { repo, images }
    }

    /// Id the next new post will most likely get
    pub fn next_id_hint(&self) -> EditorResult<u64> {
        let max = self
            .repo
            .list_posts(true)?
            .iter()
            .map(|p| p.id)
            .max()
            .unwrap_or(0);
        Ok(max + 1)
    }

    pub fn create_post(&mut self, draft: PostDraft) -> EditorResult<Post> {
        self.ensure_writable()?;
        let valid = draft.validate()?;
        let mut session = self.stage(&draft.staged_images)?;

        let post = self.repo.create_post(NewPost {
            title: valid.title,
            content: valid.content,
            excerpt: valid.excerpt,
            tags: valid.tags,
            category_key: valid.category_key,
            is_published: valid.is_published,
            is_featured: valid.is_featured,
            images: Vec::new(),
        })?;
        tracing::info!("Created post {} ({})", post.id, post.slug);

        let post = self.attach_images(post, &mut session)?;
        self.warn_dangling(&post);
        Ok(post)
    }

    /// Replace every editable field of post `id`. Newly committed images are
    /// appended to the ones the post already has.
    pub fn update_post(&mut self, id: u64, draft: PostDraft) -> EditorResult<Post> {
        self.ensure_writable()?;
        let valid = draft.validate()?;
        let mut session = self.stage(&draft.staged_images)?;

        // Images only move once the post itself is saved
        let post = self.repo.update_post(
            id,
            PostPatch {
                title: Some(valid.title),
                content: Some(valid.content),
                excerpt: Some(valid.excerpt),
                tags: Some(valid.tags),
                category_key: Some(valid.category_key),
                is_published: Some(valid.is_published),
                is_featured: Some(valid.is_featured),
                images: None,
            },
        )?;
        tracing::info!("Updated post {} ({})", post.id, post.slug);

        let post = self.attach_images(post, &mut session)?;
        self.warn_dangling(&post);
        Ok(post)
    }

    /// Delete the post, then its image folder
    pub fn delete_post(&mut self, id: u64) -> EditorResult<()> {
        self.repo.delete_post(id)?;
        match media::delete_post_images(self.images, id) {
            Ok(n) => tracing::info!("Deleted post {} and {} images", id, n),
            Err(e) => tracing::warn!("Deleted post {} but not its images: {}", id, e),
        }
        Ok(())
    }

    pub fn toggle_publish(&mut self, id: u64, published: bool) -> EditorResult<Post> {
        let post = self.repo.set_published(id, published)?;
        tracing::info!(
            "Post {} is now {}",
            id,
            if published { "published" } else { "a draft" }
        );
        Ok(post)
    }

    fn ensure_writable(&self) -> EditorResult<()> {
        if self.repo.is_read_only() {
            return Err(StoreError::ReadOnly.into());
        }
        Ok(())
    }

    /// Move the session's staged images into the saved post's folder, then
    /// point its content and image list at them
    fn attach_images(
        &mut self,
        post: Post,
        session: &mut UploadSession<'_>,
    ) -> EditorResult<Post> {
        let moved = session.commit(post.id);
        if moved.is_empty() {
            return Ok(post);
        }

        let content = rewrite_references(&post.content, &moved);
        let mut images = post.images.clone();
        images.extend(moved.into_iter().map(|m| m.to.path));
        let patch = PostPatch {
            content: (content != post.content).then_some(content),
            images: Some(images),
            ..Default::default()
        };
        Ok(self.repo.update_post(post.id, patch)?)
    }

    /// Log references to staged images that were not committed with the post
    fn warn_dangling(&self, post: &Post) {
        let temp_url = self
            .images
            .public_url(&format!("{}/", self.images.layout().temp_prefix));
        for url in MarkdownRenderer::image_urls(&post.content) {
            if url.starts_with(&temp_url) {
                tracing::warn!("Post {} still references staged image {}", post.id, url);
            }
        }
    }

    fn stage(&self, staged: &[String]) -> EditorResult<UploadSession<'a>> {
        let mut session = UploadSession::new(self.images);
        for path in staged {
            session.adopt_temp(path)?;
        }
        Ok(session)
    }
}
