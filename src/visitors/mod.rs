//! Visitor counter
//!
//! Counts each visitor at most once per calendar day. Visitor ids are hashed
//! before they touch the disk.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::fs;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

/// Days a `last_seen` entry is kept
const LAST_SEEN_DAYS: i64 = 2;

/// Persisted counter state
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct VisitorDb {
    total: u64,
    /// Visits per `YYYY-MM-DD`
    daily: BTreeMap<String, u64>,
    /// Hashed visitor id -> last day counted
    last_seen: BTreeMap<String, String>,
}

impl VisitorDb {
    fn prune(&mut self, today: NaiveDate) {
        self.last_seen.retain(|_, day| {
            NaiveDate::parse_from_str(day, "%Y-%m-%d")
                .map(|d| (today - d).num_days() <= LAST_SEEN_DAYS)
                .unwrap_or(false)
        });
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VisitorStats {
    pub today: u64,
    pub total: u64,
    /// Whether this request was counted
    pub counted: bool,
}

#[derive(Debug)]
pub struct VisitorCounter {
    /// `None` when counting is disabled
    path: Option<PathBuf>,
    tz: Tz,
    db: VisitorDb,
}

impl VisitorCounter {
    /// Open the counter stored at `path`, starting empty if the file is
    /// missing or unreadable
    pub fn open<P: AsRef<Path>>(path: P, tz: Tz) -> Self {
        let path = path.as_ref().to_path_buf();
        let db = match fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!("Ignoring unreadable visitor file {:?}: {}", path, e);
                VisitorDb::default()
            }),
            Err(_) => VisitorDb::default(),
        };
        Self {
            path: Some(path),
            tz,
            db,
        }
    }

    /// Counter that records nothing and reports zeros
    pub fn disabled() -> Self {
        Self {
            path: None,
            tz: chrono_tz::UTC,
            db: VisitorDb::default(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.path.is_some()
    }

    /// Calendar day of `now` in the site timezone
    pub fn today(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.tz).date_naive()
    }

    pub fn stats(&self, today: NaiveDate) -> VisitorStats {
        let key = day_key(today);
        VisitorStats {
            today: self.db.daily.get(&key).copied().unwrap_or(0),
            total: self.db.total,
            counted: false,
        }
    }

    /// Count `visitor_id` unless it was already counted `today`
    pub fn record_visit(&mut self, visitor_id: &str, today: NaiveDate) -> Result<VisitorStats> {
        if !self.is_enabled() {
            return Ok(self.stats(today));
        }

        let key = day_key(today);
        let visitor = hash_visitor(visitor_id);
        let counted = self.db.last_seen.get(&visitor) != Some(&key);

        let mut db = self.db.clone();
        if counted {
            db.total += 1;
            *db.daily.entry(key.clone()).or_insert(0) += 1;
            db.last_seen.insert(visitor, key);
        }
        db.prune(today);

        // Counts change only once they are on disk
        if counted {
            self.save(&db)?;
        }
        self.db = db;

        Ok(VisitorStats {
            counted,
            ..self.stats(today)
        })
    }

    fn save(&self, db: &VisitorDb) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(db)?)
            .with_context(|| format!("Failed to write {:?}", tmp))?;
        fs::rename(&tmp, path).with_context(|| format!("Failed to replace {:?}", path))?;
        Ok(())
    }
}

fn day_key(day: NaiveDate) -> String {
    day.format("%Y-%m-%d").to_string()
}

fn hash_visitor(visitor_id: &str) -> String {
    let mut hasher = DefaultHasher::new();
    visitor_id.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    #[test]
    fn test_once_per_visitor_per_day() {
        let dir = TempDir::new().unwrap();
        let mut counter = VisitorCounter::open(dir.path().join("visitors.json"), chrono_tz::UTC);

        let first = counter.record_visit("alice", day(1)).unwrap();
        assert_eq!(first, VisitorStats { today: 1, total: 1, counted: true });

        let again = counter.record_visit("alice", day(1)).unwrap();
        assert!(!again.counted);
        assert_eq!(again.total, 1);

        counter.record_visit("bob", day(1)).unwrap();
        let next_day = counter.record_visit("alice", day(2)).unwrap();
        assert_eq!(next_day, VisitorStats { today: 1, total: 3, counted: true });
        assert_eq!(counter.stats(day(1)).today, 2);
    }

    #[test]
    fn test_persists_hashed_ids() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("visitors.json");
        {
            let mut counter = VisitorCounter::open(&path, chrono_tz::UTC);
            counter.record_visit("203.0.113.7", day(5)).unwrap();
        }
        let raw = fs::read_to_string(&path).unwrap();
        assert!(!raw.contains("203.0.113.7"));

        let mut counter = VisitorCounter::open(&path, chrono_tz::UTC);
        assert_eq!(counter.stats(day(5)).total, 1);
        assert!(!counter.record_visit("203.0.113.7", day(5)).unwrap().counted);
    }

    #[test]
    fn test_prunes_old_last_seen() {
        let dir = TempDir::new().unwrap();
        let mut counter = VisitorCounter::open(dir.path().join("v.json"), chrono_tz::UTC);
        counter.record_visit("old", day(1)).unwrap();
        counter.record_visit("new", day(3)).unwrap();
        assert_eq!(counter.db.last_seen.len(), 2);

        counter.record_visit("newer", day(4)).unwrap();
        assert_eq!(counter.db.last_seen.len(), 2);
        assert!(!counter.db.last_seen.contains_key(&hash_visitor("old")));
    }

    #[test]
    fn test_failed_save_does_not_count() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("visitors.json");
        let mut counter = VisitorCounter::open(&path, chrono_tz::UTC);
        counter.record_visit("alice", day(1)).unwrap();
        assert!(!dir.path().join("visitors.json.tmp").exists());

        fs::create_dir(dir.path().join("visitors.json.tmp")).unwrap();
        assert!(counter.record_visit("bob", day(1)).is_err());
        assert_eq!(counter.stats(day(1)), VisitorStats { today: 1, total: 1, counted: false });

        // Retried once the disk recovers, bob is still new today
        fs::remove_dir(dir.path().join("visitors.json.tmp")).unwrap();
        assert!(counter.record_visit("bob", day(1)).unwrap().counted);
        let reopened = VisitorCounter::open(&path, chrono_tz::UTC);
        assert_eq!(reopened.stats(day(1)).total, 2);
    }

    #[test]
    fn test_disabled_counts_nothing() {
        let mut counter = VisitorCounter::disabled();
        let stats = counter.record_visit("anyone", day(1)).unwrap();
        assert_eq!(stats, VisitorStats { today: 0, total: 0, counted: false });
    }

    #[test]
    fn test_today_uses_timezone() {
        let counter = VisitorCounter::open("/nonexistent/v.json", chrono_tz::Asia::Seoul);
        // 20:00 UTC is already the next morning in Seoul
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 20, 0, 0).unwrap();
        assert_eq!(counter.today(now), day(2));
    }
}
