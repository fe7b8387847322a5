//! Profile data for the About page (source/_data/profile.yml)

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Owner profile: bio, timeline, projects and skills
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Profile {
    pub name: String,
    pub headline: String,
    pub bio: String,
    pub email: Option<String>,
    pub links: Vec<ProfileLink>,
    pub current_focus: Vec<String>,
    pub experience: Vec<Experience>,
    pub projects: Vec<Project>,
    pub skills: Vec<SkillGroup>,
    pub education: Vec<Education>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileLink {
    pub label: String,
    pub url: String,
}

/// One entry of the work-experience timeline
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Experience {
    pub company: String,
    pub role: String,
    pub period: String,
    pub highlights: Vec<String>,
    pub technologies: Vec<String>,
}

/// A showcased project
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Project {
    pub title: String,
    /// Bullet points, markdown emphasis allowed
    pub description: Vec<String>,
    pub technologies: Vec<String>,
    /// Free-form period such as `2024.12 - 2025.04`
    pub period: String,
    pub link: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SkillGroup {
    pub category: String,
    pub items: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Education {
    pub school: String,
    pub degree: String,
    pub period: String,
}

impl Profile {
    /// Load the profile, or an empty one when the file is missing
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!("No profile at {:?}, using empty profile", path);
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        let mut profile: Profile = serde_yaml::from_str(&content)?;
        profile.sort_projects();
        Ok(profile)
    }

    /// Order projects by period start, newest first. Unparsable periods go last.
    pub fn sort_projects(&mut self) {
        self.projects
            .sort_by_key(|p| std::cmp::Reverse(period_start(&p.period)));
    }
}

/// Parse the start of a `YYYY.MM - YYYY.MM` period into a sortable key
fn period_start(period: &str) -> Option<(i32, u32)> {
    let start = period.split('-').next()?.trim();
    let mut parts = start.split(['.', '/']);
    let year: i32 = parts.next()?.trim().parse().ok()?;
    let month: u32 = match parts.next() {
        Some(m) => m.trim().parse().ok()?,
        None => 1,
    };
    if !(1..=12).contains(&month) {
        return None;
    }
    Some((year, month))
}
