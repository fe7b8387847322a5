//! Configuration module

mod profile;
mod site;

pub use profile::{Education, Experience, Profile, ProfileLink, Project, SkillGroup};
pub use site::SiteConfig;
pub use site::{
    AdminConfig, BackendKind, HighlightConfig, PaginationConfig, ServerConfig, StorageConfig,
    VisitorConfig,
};
