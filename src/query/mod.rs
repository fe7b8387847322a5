//! Post listing: filtering, search, pagination and aggregate counts
//!
//! All functions here work on an already loaded, newest-first slice of posts
//! so they behave the same in static and backend mode.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::config::PaginationConfig;
use crate::content::{Category, NavPost, Post, PostSummary};

/// Category key meaning "no category filter"
pub const ALL_CATEGORIES: &str = "all";

/// Listing request, deserialized from query parameters
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PostQuery {
    /// 1-based page number
    pub page: Option<usize>,
    pub per_page: Option<usize>,
    /// Whitespace-separated search terms, all must match
    pub q: Option<String>,
    pub tag: Option<String>,
    pub category: Option<String>,
    #[serde(skip)]
    pub include_drafts: bool,
}

/// One page of results
#[derive(Debug, Clone, Serialize)]
pub struct PostPage {
    pub items: Vec<PostSummary>,
    pub page: usize,
    pub per_page: usize,
    pub total: usize,
    pub total_pages: usize,
    pub has_more: bool,
    /// Page to request next when scrolling; absent on the last page
    pub next_page: Option<usize>,
}

impl PostQuery {
    fn terms(&self) -> Vec<String> {
        self.q
            .as_deref()
            .unwrap_or("")
            .split_whitespace()
            .map(str::to_lowercase)
            .collect()
    }

    fn category_filter(&self) -> Option<&str> {
        self.category
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty() && !c.eq_ignore_ascii_case(ALL_CATEGORIES))
    }

    fn tag_filter(&self) -> Option<&str> {
        self.tag.as_deref().map(str::trim).filter(|t| !t.is_empty())
    }

    /// Whether `post` passes every filter of this query
    pub fn matches(&self, post: &Post) -> bool {
        if !self.include_drafts && !post.is_published {
            return false;
        }
        if let Some(tag) = self.tag_filter() {
            if !post.has_tag(tag) {
                return false;
            }
        }
        if let Some(category) = self.category_filter() {
            let matches_category = post
                .category_key
                .as_deref()
                .is_some_and(|k| k.eq_ignore_ascii_case(category));
            if !matches_category {
                return false;
            }
        }
        let terms = self.terms();
        terms.is_empty() || matches_terms(post, &terms)
    }

    /// Filter `posts` and cut out the requested page
    pub fn run(&self, posts: &[Post], config: &PaginationConfig) -> PostPage {
        let max_per_page = config.max_per_page.max(1);
        let per_page = self
            .per_page
            .unwrap_or(config.per_page)
            .clamp(1, max_per_page);
        let page = self.page.unwrap_or(1).max(1);

        let matching: Vec<&Post> = posts.iter().filter(|p| self.matches(p)).collect();
        let total = matching.len();
        let total_pages = total.div_ceil(per_page);

        let items: Vec<PostSummary> = matching
            .into_iter()
            .skip((page - 1).saturating_mul(per_page))
            .take(per_page)
            .map(Post::summary)
            .collect();

        let has_more = page < total_pages;
        PostPage {
            items,
            page,
            per_page,
            total,
            total_pages,
            has_more,
            next_page: has_more.then_some(page + 1),
        }
    }
}

fn matches_terms(post: &Post, terms: &[String]) -> bool {
    let haystack = [
        post.title.to_lowercase(),
        post.excerpt.join("\n").to_lowercase(),
        post.tags.join("\n").to_lowercase(),
        post.content.to_lowercase(),
    ];
    terms
        .iter()
        .all(|term| haystack.iter().any(|field| field.contains(term.as_str())))
}

/// Published, featured posts, newest first
pub fn featured(posts: &[Post], limit: usize) -> Vec<PostSummary> {
    posts
        .iter()
        .filter(|p| p.is_published && p.is_featured)
        .take(limit)
        .map(Post::summary)
        .collect()
}

/// Newer and older published neighbours of post `id`
pub fn neighbors(posts: &[Post], id: u64) -> (Option<NavPost>, Option<NavPost>) {
    let published: Vec<&Post> = posts.iter().filter(|p| p.is_published).collect();
    let Some(pos) = published.iter().position(|p| p.id == id) else {
        return (None, None);
    };
    let prev = pos
        .checked_sub(1)
        .and_then(|i| published.get(i))
        .map(|p| NavPost::from(*p));
    let next = published.get(pos + 1).map(|p| NavPost::from(*p));
    (prev, next)
}

/// Tag usage over published posts
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagCount {
    pub name: String,
    pub count: usize,
}

/// Tag counts, most used first, then by name
pub fn tag_counts(posts: &[Post]) -> Vec<TagCount> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for post in posts.iter().filter(|p| p.is_published) {
        for tag in &post.tags {
            *counts.entry(tag.as_str()).or_insert(0) += 1;
        }
    }
    let mut tags: Vec<TagCount> = counts
        .into_iter()
        .map(|(name, count)| TagCount {
            name: name.to_string(),
            count,
        })
        .collect();
    tags.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
    tags
}

/// Category with its published post count
#[derive(Debug, Clone, Serialize)]
pub struct CategoryCount {
    #[serde(flatten)]
    pub category: Category,
    pub count: usize,
}

/// Category listing plus a key-to-count map that includes `"all"`
#[derive(Debug, Clone, Serialize)]
pub struct CategoryCounts {
    pub categories: Vec<CategoryCount>,
    pub counts: IndexMap<String, usize>,
}

/// Published post count per category, keeping the order of `categories`
pub fn category_counts(categories: &[Category], posts: &[Post]) -> CategoryCounts {
    let published: Vec<&Post> = posts.iter().filter(|p| p.is_published).collect();

    let categories: Vec<CategoryCount> = categories
        .iter()
        .map(|category| CategoryCount {
            count: published
                .iter()
                .filter(|p| {
                    p.category_key
                        .as_deref()
                        .is_some_and(|k| k.eq_ignore_ascii_case(&category.key))
                })
                .count(),
            category: category.clone(),
        })
        .collect();

    let mut counts: IndexMap<String, usize> = IndexMap::new();
    counts.insert(ALL_CATEGORIES.to_string(), published.len());
    for entry in &categories {
        counts.insert(entry.category.key.clone(), entry.count);
    }

    CategoryCounts { categories, counts }
}
