//! Purge stale staged images

use anyhow::Result;
use chrono::{Duration, Utc};

use crate::media;
use crate::Devfolio;

pub fn run(site: &Devfolio) -> Result<usize> {
    let retention = Duration::hours(site.config.storage.temp_retention_hours);
    let removed = media::cleanup_temp_images(&site.image_store(), Utc::now(), retention)?;
    println!(
        "Removed {} staged images older than {}h",
        removed, site.config.storage.temp_retention_hours
    );
    Ok(removed)
}
