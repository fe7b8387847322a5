//! Content loader - loads markdown posts from the posts directory

use anyhow::Result;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use super::{clean_excerpt, FrontMatter, MarkdownRenderer, Post};

/// Loads posts from a directory of markdown files
#[derive(Debug, Clone)]
pub struct ContentLoader {
    posts_dir: PathBuf,
    tz: Tz,
}

impl ContentLoader {
    /// Create a new content loader
    pub fn new<P: AsRef<Path>>(posts_dir: P, tz: Tz) -> Self {
        Self {
            posts_dir: posts_dir.as_ref().to_path_buf(),
            tz,
        }
    }

    pub fn posts_dir(&self) -> &Path {
        &self.posts_dir
    }

    /// Load all posts, newest first.
    ///
    /// Ids are assigned by ascending date (ties broken by slug), so the oldest
    /// post is 1 and ids stay stable while the set of files does.
    pub fn load_posts(&self) -> Result<Vec<Post>> {
        if !self.posts_dir.exists() {
            return Ok(Vec::new());
        }

        let mut posts = Vec::new();

        for entry in WalkDir::new(&self.posts_dir)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if path.is_file() && is_markdown_file(path) {
                match self.load_post(path) {
                    Ok(post) => posts.push(post),
                    Err(e) => {
                        tracing::warn!("Failed to load post {:?}: {}", path, e);
                    }
                }
            }
        }

        posts.sort_by(|a, b| {
            a.published_at
                .cmp(&b.published_at)
                .then_with(|| a.slug.cmp(&b.slug))
        });
        for (i, post) in posts.iter_mut().enumerate() {
            post.id = i as u64 + 1;
        }
        posts.reverse();

        Ok(posts)
    }

    /// Load a single post from a file. The id is left at 0.
    pub fn load_post(&self, path: &Path) -> Result<Post> {
        let raw = fs::read_to_string(path)?;
        let (fm, body) = FrontMatter::parse(&raw)?;

        let file_modified = fs::metadata(path)?
            .modified()
            .ok()
            .map(DateTime::<Utc>::from);

        let published_at = fm
            .parse_date(self.tz)
            .unwrap_or_else(|| file_modified.unwrap_or_else(Utc::now));
        let updated_at = fm.parse_updated(self.tz).or(file_modified);

        // Slug comes from the file name, not the title
        let slug = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("untitled")
            .to_string();

        let title = fm.title.clone().unwrap_or_else(|| slug.clone());

        let mut excerpt = clean_excerpt(&fm.excerpt);
        if excerpt.is_empty() {
            excerpt = MarkdownRenderer::lead(body)
                .map(|lead| clean_excerpt(lead.lines()))
                .unwrap_or_default();
        }

        let mut post = Post::new(0, title, published_at);
        post.slug = slug;
        post.content = body.replace(super::MORE_MARKER, "");
        post.excerpt = excerpt;
        post.tags = fm.tags;
        post.category_key = fm.category.map(|c| c.trim().to_lowercase());
        post.is_published = fm.published;
        post.is_featured = fm.featured;
        post.updated_at = updated_at;

        Ok(post)
    }
}

/// Check if a file is a markdown file
pub fn is_markdown_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e == "md" || e == "markdown")
        .unwrap_or(false)
}
