//! List site content

use anyhow::Result;

use crate::query::{category_counts, tag_counts, ALL_CATEGORIES};
use crate::Devfolio;

/// List site content by type
pub fn run(site: &Devfolio, content_type: &str) -> Result<()> {
    for line in lines(site, content_type)? {
        println!("{}", line);
    }
    Ok(())
}

fn lines(site: &Devfolio, content_type: &str) -> Result<Vec<String>> {
    let repo = site.open_repository()?;
    let tz = site.config.tz();
    let mut out = Vec::new();

    match content_type {
        "post" | "posts" => {
            let posts = repo.list_posts(true)?;
            out.push(format!("Posts ({}):", posts.len()));
            for post in posts {
                out.push(format!(
                    "  {:>4}  {}  {} [{}]{}",
                    post.id,
                    crate::helpers::format_date(&post.published_at, tz, "%Y-%m-%d"),
                    post.title,
                    post.slug,
                    if post.is_published { "" } else { " (draft)" }
                ));
            }
        }
        "tag" | "tags" => {
            let tags = tag_counts(&repo.list_posts(false)?);
            out.push(format!("Tags ({}):", tags.len()));
            for tag in tags {
                out.push(format!("  {} ({})", tag.name, tag.count));
            }
        }
        "category" | "categories" => {
            let counts = category_counts(&repo.list_categories()?, &repo.list_posts(false)?);
            out.push(format!("Categories ({}):", counts.categories.len()));
            for (key, count) in counts.counts.iter().filter(|(k, _)| *k != ALL_CATEGORIES) {
                out.push(format!("  {} ({})", key, count));
            }
        }
        _ => {
            anyhow::bail!(
                "Unknown type: {}. Available: post, tag, category",
                content_type
            );
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SiteConfig;
    use std::fs;
    use tempfile::TempDir;

    fn site() -> (TempDir, Devfolio) {
        let dir = TempDir::new().unwrap();
        let site = Devfolio::with_config(dir.path().to_path_buf(), SiteConfig::default());
        fs::create_dir_all(site.posts_dir()).unwrap();
        fs::write(
            site.posts_dir().join("a.md"),
            "---\ntitle: Alpha\ndate: 2024-01-02\ntags: [rust]\ncategory: dev\n---\nA\n",
        )
        .unwrap();
        fs::write(
            site.posts_dir().join("b.md"),
            "---\ntitle: Beta\ndate: 2024-01-01\npublished: false\n---\nB\n",
        )
        .unwrap();
        (dir, site)
    }

    #[test]
    fn test_list_posts_marks_drafts() {
        let (_dir, site) = site();
        let out = lines(&site, "post").unwrap();
        assert_eq!(out[0], "Posts (2):");
        assert!(out[1].contains("Alpha [a]"));
        assert!(out[2].ends_with("(draft)"));
    }

    #[test]
    fn test_list_tags_and_categories() {
        let (_dir, site) = site();
        assert_eq!(lines(&site, "tags").unwrap(), vec!["Tags (1):", "  rust (1)"]);
        assert_eq!(
            lines(&site, "category").unwrap(),
            vec!["Categories (1):", "  dev (1)"]
        );
        assert!(lines(&site, "page").is_err());
    }
}
