//! devfolio: a developer portfolio and markdown blog server
//!
//! Posts come either from markdown files under `source/_posts` (static
//! mode) or from a local JSON store that the admin API can write to
//! (backend mode). The server exposes both through one JSON API and serves
//! the built frontend alongside uploaded images.

pub mod admin;
pub mod commands;
pub mod config;
pub mod content;
pub mod helpers;
pub mod media;
pub mod query;
pub mod server;
pub mod store;
pub mod visitors;

use anyhow::Result;
use std::path::{Path, PathBuf};

use config::{BackendKind, SiteConfig};
use content::ContentLoader;
use media::LocalBucket;
use store::{JsonStore, Repository, StaticStore};
use visitors::VisitorCounter;

/// A site rooted at one directory
#[derive(Debug, Clone)]
pub struct Devfolio {
    /// Site configuration
    pub config: SiteConfig,
    /// Base directory
    pub base_dir: PathBuf,
    /// Markdown source directory
    pub source_dir: PathBuf,
    /// Built frontend
    pub public_dir: PathBuf,
    /// Backend-mode data
    pub data_dir: PathBuf,
}

impl Devfolio {
    /// Open the site at `base_dir`. A missing `_config.yml` means defaults.
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Result<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        let config_path = base_dir.join("_config.yml");

        let config = if config_path.exists() {
            SiteConfig::load(&config_path)?
        } else {
            SiteConfig::default()
        };

        Ok(Self::with_config(base_dir, config))
    }

    pub fn with_config(base_dir: PathBuf, config: SiteConfig) -> Self {
        let source_dir = base_dir.join(&config.source_dir);
        let public_dir = base_dir.join(&config.public_dir);
        let data_dir = base_dir.join(&config.data_dir);

        Self {
            config,
            base_dir,
            source_dir,
            public_dir,
            data_dir,
        }
    }

    pub fn posts_dir(&self) -> PathBuf {
        self.source_dir.join("_posts")
    }

    pub fn profile_path(&self) -> PathBuf {
        self.source_dir.join("_data").join("profile.yml")
    }

    pub fn media_dir(&self) -> PathBuf {
        self.base_dir.join(&self.config.storage.media_dir)
    }

    pub fn loader(&self) -> ContentLoader {
        ContentLoader::new(self.posts_dir(), self.config.tz())
    }

    /// Open the repository selected by `backend`
    pub fn open_repository(&self) -> Result<Box<dyn Repository>> {
        self.open_repository_as(self.config.backend)
    }

    pub fn open_repository_as(&self, backend: BackendKind) -> Result<Box<dyn Repository>> {
        Ok(match backend {
            BackendKind::Static => Box::new(StaticStore::open(self.loader())?),
            BackendKind::Local => Box::new(JsonStore::open(&self.data_dir)?),
        })
    }

    pub fn image_store(&self) -> LocalBucket {
        LocalBucket::new(self.media_dir(), self.config.storage.clone())
    }

    pub fn visitor_counter(&self) -> VisitorCounter {
        if self.config.visitors.enabled {
            VisitorCounter::open(self.data_dir.join(&self.config.visitors.file), self.config.tz())
        } else {
            VisitorCounter::disabled()
        }
    }
}
