//! Site configuration (_config.yml)

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Main site configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    // Site
    pub title: String,
    pub subtitle: String,
    pub description: String,
    pub author: String,
    pub language: String,
    pub timezone: String,

    // URL
    pub url: String,
    pub root: String,

    // Directory
    pub source_dir: String,
    pub public_dir: String,
    pub data_dir: String,

    /// Where posts are persisted
    pub backend: BackendKind,

    #[serde(default)]
    pub pagination: PaginationConfig,

    /// Number of posts shown in the featured strip
    pub featured_limit: usize,

    #[serde(default)]
    pub highlight: HighlightConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub admin: AdminConfig,
    #[serde(default)]
    pub visitors: VisitorConfig,
    #[serde(default)]
    pub server: ServerConfig,

    // Store any additional fields
    #[serde(flatten)]
    pub extra: HashMap<String, serde_yaml::Value>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            title: "devfolio".to_string(),
            subtitle: String::new(),
            description: String::new(),
            author: "John Doe".to_string(),
            language: "en".to_string(),
            timezone: String::new(),

            url: "http://localhost:4000".to_string(),
            root: "/".to_string(),

            source_dir: "source".to_string(),
            public_dir: "public".to_string(),
            data_dir: "data".to_string(),

            backend: BackendKind::Static,
            pagination: PaginationConfig::default(),
            featured_limit: 3,

            highlight: HighlightConfig::default(),
            storage: StorageConfig::default(),
            admin: AdminConfig::default(),
            visitors: VisitorConfig::default(),
            server: ServerConfig::default(),
            extra: HashMap::new(),
        }
    }
}

impl SiteConfig {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let config: SiteConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Resolve the configured timezone, falling back to UTC
    pub fn tz(&self) -> chrono_tz::Tz {
        let name = self.timezone.trim();
        if name.is_empty() {
            return chrono_tz::UTC;
        }
        name.parse().unwrap_or_else(|_| {
            tracing::warn!("Unknown timezone {:?}, using UTC", name);
            chrono_tz::UTC
        })
    }
}

/// Content backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Read-only markdown files under `source/_posts`
    Static,
    /// Writable JSON document under `data_dir`
    Local,
}

/// Listing page sizes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PaginationConfig {
    pub per_page: usize,
    pub max_per_page: usize,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            per_page: 10,
            max_per_page: 50,
        }
    }
}

/// Code highlighting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HighlightConfig {
    pub theme: String,
    pub line_number: bool,
}

impl Default for HighlightConfig {
    fn default() -> Self {
        Self {
            theme: "base16-ocean.dark".to_string(),
            line_number: true,
        }
    }
}

/// Image storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory (relative to the site root) holding uploaded objects
    pub media_dir: String,
    /// URL prefix under which objects are served
    pub public_url: String,
    pub temp_prefix: String,
    pub posts_prefix: String,
    pub temp_retention_hours: i64,
    pub max_upload_bytes: usize,
    pub allowed_extensions: Vec<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            media_dir: "media".to_string(),
            public_url: "/media".to_string(),
            temp_prefix: "temp".to_string(),
            posts_prefix: "posts".to_string(),
            temp_retention_hours: 24,
            max_upload_bytes: 10 * 1024 * 1024,
            allowed_extensions: ["png", "jpg", "jpeg", "gif", "webp", "svg", "avif"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// Admin API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Environment variable holding the admin bearer token
    pub token_env: String,
    /// Inline token, used only when the environment variable is unset
    pub token: Option<String>,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            token_env: "DEVFOLIO_ADMIN_TOKEN".to_string(),
            token: None,
        }
    }
}

impl AdminConfig {
    /// Resolve the effective token. Empty tokens count as unset.
    pub fn resolve_token(&self) -> Option<String> {
        std::env::var(&self.token_env)
            .ok()
            .or_else(|| self.token.clone())
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
    }
}

/// Visitor counter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VisitorConfig {
    pub enabled: bool,
    pub file: String,
}

impl Default for VisitorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            file: "visitors.json".to_string(),
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub cors_origins: Vec<String>,
}
