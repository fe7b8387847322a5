//! Copy markdown posts into the local store

use anyhow::Result;

use crate::content::Category;
use crate::store::{JsonStore, Repository, StoreError};
use crate::Devfolio;

#[derive(Debug, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub imported: usize,
    /// Posts whose slug already exists in the store
    pub skipped: usize,
}

/// Import every markdown post, oldest first so ids follow publication order.
/// Running it twice imports nothing new.
pub fn run(site: &Devfolio) -> Result<ImportReport> {
    let posts = site.loader().load_posts()?;
    let mut store = JsonStore::open(&site.data_dir)?;
    let mut report = ImportReport::default();

    let known: Vec<String> = store
        .list_categories()?
        .into_iter()
        .map(|c| c.key)
        .collect();
    let mut new_categories: Vec<Category> = Vec::new();

    for post in posts.into_iter().rev() {
        if let Some(key) = &post.category_key {
            if !known.contains(key) && !new_categories.iter().any(|c| &c.key == key) {
                new_categories.push(Category::new(key, key, new_categories.len() as i32));
            }
        }

        let slug = post.slug.clone();
        match store.import_post(post) {
            Ok(saved) => {
                tracing::debug!("Imported {} as post {}", slug, saved.id);
                report.imported += 1;
            }
            Err(StoreError::Validation(reason)) => {
                tracing::info!("Skipping {}: {}", slug, reason);
                report.skipped += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }

    if !new_categories.is_empty() {
        store.upsert_categories(new_categories)?;
    }

    println!(
        "Imported {} posts into {:?} ({} skipped)",
        report.imported,
        store.path(),
        report.skipped
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SiteConfig;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_import_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let site = Devfolio::with_config(dir.path().to_path_buf(), SiteConfig::default());
        fs::create_dir_all(site.posts_dir()).unwrap();
        fs::write(
            site.posts_dir().join("newer.md"),
            "---\ntitle: Newer\ndate: 2024-05-01\ncategory: dev\n---\nN\n",
        )
        .unwrap();
        fs::write(
            site.posts_dir().join("older.md"),
            "---\ntitle: Older\ndate: 2023-05-01\ncategory: life\n---\nO\n",
        )
        .unwrap();

        let first = run(&site).unwrap();
        assert_eq!(first, ImportReport { imported: 2, skipped: 0 });

        let second = run(&site).unwrap();
        assert_eq!(second, ImportReport { imported: 0, skipped: 2 });

        let store = JsonStore::open(&site.data_dir).unwrap();
        assert_eq!(store.get_post_by_slug("older").unwrap().id, 1);
        assert_eq!(store.get_post_by_slug("newer").unwrap().id, 2);

        let keys: Vec<_> = store
            .list_categories()
            .unwrap()
            .into_iter()
            .map(|c| c.key)
            .collect();
        assert_eq!(keys, vec!["life", "dev"]);
    }
}
