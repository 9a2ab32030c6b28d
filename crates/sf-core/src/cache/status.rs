//! Cache group status reporting.

use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// State of one cache group's file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupStatus {
    /// Group name.
    pub group: String,

    /// Path of the group file.
    pub path: PathBuf,

    /// Whether the file exists.
    pub exists: bool,

    /// Configured TTL; `None` means the group is never cached.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl_secs: Option<u64>,

    /// Last write time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified: Option<DateTime<Utc>>,

    /// When the file stops being served.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,

    /// Seconds since the last write.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age_secs: Option<u64>,

    /// Number of facts stored in the file.
    pub fact_count: usize,

    /// Whether the next read or write will delete the file.
    pub expired: bool,
}

impl GroupStatus {
    pub(crate) fn new(
        group: &str,
        path: PathBuf,
        ttl: Option<Duration>,
        modified: Option<SystemTime>,
        fact_count: usize,
    ) -> Self {
        let age = modified.map(|m| SystemTime::now().duration_since(m).unwrap_or_default());
        let expired = matches!((age, ttl), (Some(age), Some(ttl)) if age > ttl);
        let modified_utc = modified.map(DateTime::<Utc>::from);
        let expires_at = match (modified_utc, ttl) {
            (Some(m), Some(ttl)) => chrono::Duration::from_std(ttl)
                .ok()
                .and_then(|d| m.checked_add_signed(d)),
            _ => None,
        };

        Self {
            group: group.to_string(),
            path,
            exists: modified.is_some(),
            ttl_secs: ttl.map(|t| t.as_secs()),
            modified: modified_utc,
            expires_at,
            age_secs: age.map(|a| a.as_secs()),
            fact_count,
            expired,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expired_when_older_than_ttl() {
        let modified = SystemTime::now() - Duration::from_secs(7200);
        let status = GroupStatus::new(
            "dmi",
            PathBuf::from("/tmp/dmi"),
            Some(Duration::from_secs(3600)),
            Some(modified),
            3,
        );
        assert!(status.exists);
        assert!(status.expired);
        assert!(status.age_secs.unwrap() >= 7200);
        assert!(status.expires_at.unwrap() < Utc::now());
    }

    #[test]
    fn test_huge_ttl_has_no_expiry() {
        // Accepted by the config parser, but past chrono's representable range.
        let ttl = humantime::parse_duration("1000000years").unwrap();
        let status = GroupStatus::new(
            "partitions",
            PathBuf::from("/tmp/partitions"),
            Some(ttl),
            Some(SystemTime::now()),
            1,
        );
        assert!(status.exists);
        assert!(!status.expired);
        assert!(status.expires_at.is_none());
        assert_eq!(status.ttl_secs, Some(ttl.as_secs()));
    }

    #[test]
    fn test_missing_file() {
        let status = GroupStatus::new("dmi", PathBuf::from("/tmp/dmi"), None, None, 0);
        assert!(!status.exists);
        assert!(!status.expired);
        let json = serde_json::to_value(&status).unwrap();
        assert!(json.get("modified").is_none());
        assert!(json.get("ttl_secs").is_none());
    }
}
