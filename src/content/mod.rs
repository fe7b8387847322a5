//! Content module - posts, categories, front-matter and markdown

mod frontmatter;
pub mod loader;
pub mod manifest;
mod markdown;
mod post;

pub use frontmatter::FrontMatter;
pub(crate) use frontmatter::string_or_vec;
pub use loader::ContentLoader;
pub use markdown::{MarkdownRenderer, MORE_MARKER};
pub use post::{
    clean_excerpt, Category, NavPost, Post, PostSummary, PostView, MAX_EXCERPT_LINES,
};
