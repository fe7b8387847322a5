//! Post and Category models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::MarkdownRenderer;
use crate::helpers::{count_words, reading_minutes};

/// Maximum number of excerpt lines kept on a post
pub const MAX_EXCERPT_LINES: usize = 3;

/// A blog post
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    /// Numeric identifier, unique within a store
    pub id: u64,

    /// URL-friendly name
    pub slug: String,

    pub title: String,

    /// Raw markdown content
    pub content: String,

    /// Up to three summary lines
    #[serde(default)]
    pub excerpt: Vec<String>,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub category_key: Option<String>,

    #[serde(default = "default_true")]
    pub is_published: bool,

    #[serde(default)]
    pub is_featured: bool,

    pub published_at: DateTime<Utc>,

    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub view_count: u64,

    /// Storage paths of images owned by this post
    #[serde(default)]
    pub images: Vec<String>,
}

fn default_true() -> bool {
    true
}

impl Post {
    /// Create a new post with minimal required fields
    pub fn new(id: u64, title: String, published_at: DateTime<Utc>) -> Self {
        let slug = slug::slugify(&title);
        Self {
            id,
            slug,
            title,
            content: String::new(),
            excerpt: Vec::new(),
            tags: Vec::new(),
            category_key: None,
            is_published: true,
            is_featured: false,
            published_at,
            updated_at: None,
            view_count: 0,
            images: Vec::new(),
        }
    }

    /// Whether the post carries `tag`, compared case-insensitively
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }

    /// Card representation used by listings
    pub fn summary(&self) -> PostSummary {
        PostSummary {
            id: self.id,
            slug: self.slug.clone(),
            title: self.title.clone(),
            excerpt: self.excerpt.clone(),
            tags: self.tags.clone(),
            category_key: self.category_key.clone(),
            is_published: self.is_published,
            is_featured: self.is_featured,
            published_at: self.published_at,
            view_count: self.view_count,
            reading_minutes: reading_minutes(count_words(&self.content)),
        }
    }

    /// Full rendered representation
    pub fn render(&self, renderer: &MarkdownRenderer) -> anyhow::Result<PostView> {
        let html = renderer.render(&self.content)?;
        let word_count = count_words(&self.content);
        Ok(PostView {
            post: self.clone(),
            html,
            word_count,
            reading_minutes: reading_minutes(word_count),
            prev: None,
            next: None,
        })
    }
}

/// Clean excerpt lines: trim, drop empties, keep at most three
pub fn clean_excerpt<I, S>(lines: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    lines
        .into_iter()
        .map(|l| l.as_ref().trim().to_string())
        .filter(|l| !l.is_empty())
        .take(MAX_EXCERPT_LINES)
        .collect()
}

/// Post card shown in listings
#[derive(Debug, Clone, Serialize)]
pub struct PostSummary {
    pub id: u64,
    pub slug: String,
    pub title: String,
    pub excerpt: Vec<String>,
    pub tags: Vec<String>,
    pub category_key: Option<String>,
    pub is_published: bool,
    pub is_featured: bool,
    pub published_at: DateTime<Utc>,
    pub view_count: u64,
    pub reading_minutes: usize,
}

/// Link to an adjacent post
#[derive(Debug, Clone, Serialize)]
pub struct NavPost {
    pub id: u64,
    pub slug: String,
    pub title: String,
}

impl From<&Post> for NavPost {
    fn from(post: &Post) -> Self {
        Self {
            id: post.id,
            slug: post.slug.clone(),
            title: post.title.clone(),
        }
    }
}

/// A post with rendered HTML and reading metadata
#[derive(Debug, Clone, Serialize)]
pub struct PostView {
    #[serde(flatten)]
    pub post: Post,
    pub html: String,
    pub word_count: usize,
    pub reading_minutes: usize,
    /// Newer neighbour
    pub prev: Option<NavPost>,
    /// Older neighbour
    pub next: Option<NavPost>,
}

/// A post category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub sort_order: i32,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl Category {
    pub fn new(key: &str, name: &str, sort_order: i32) -> Self {
        Self {
            key: key.to_string(),
            name: name.to_string(),
            sort_order,
            is_active: true,
        }
    }
}
