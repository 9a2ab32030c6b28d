//! Persistent, TTL-governed fact cache.
//!
//! Facts are stored per cache group: one pretty-printed JSON object per group
//! at `<cache_dir>/<group>`, mapping fact name to value. A group file older
//! than the group's TTL is deleted before any read or write touches it, so a
//! group expires as a whole.
//!
//! Only facts that map to a group with a configured TTL are ever persisted,
//! and only core facts are ever served from disk. A malformed group file is a
//! miss: reads ignore it with a warning and the next write replaces it.
//!
//! All operations on one [`FactCache`] are serialized by an in-process mutex.
//! There is no cross-process locking; concurrent writers race and the last
//! write wins.

mod status;

pub use status::GroupStatus;

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime};

use serde_json::{Map, Value};
use sf_common::{FactKind, FactRequest, GroupIndex, ResolvedFact};
use thiserror::Error;
use tracing::{debug, instrument, trace, warn};

/// Contents of one group file.
pub type GroupData = Map<String, Value>;

/// Errors from writing or maintaining the cache directory.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("failed to create cache directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write cache group {group}: {source}")]
    Write {
        group: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to serialize cache group {group}: {source}")]
    Serialize {
        group: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to remove {path}: {source}")]
    Remove {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl From<CacheError> for sf_common::Error {
    fn from(err: CacheError) -> Self {
        sf_common::Error::Cache(err.to_string())
    }
}

/// Disk-backed fact cache.
pub struct FactCache {
    cache_dir: PathBuf,
    groups: Arc<dyn GroupIndex>,
    lock: Mutex<()>,
}

impl std::fmt::Debug for FactCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FactCache")
            .field("cache_dir", &self.cache_dir)
            .field("groups", &self.groups.group_names())
            .finish()
    }
}

impl FactCache {
    /// A cache rooted at `cache_dir`, grouping facts through `groups`.
    pub fn new(cache_dir: impl Into<PathBuf>, groups: Arc<dyn GroupIndex>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            groups,
            lock: Mutex::new(()),
        }
    }

    /// The cache directory.
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Path of a group's file.
    pub fn group_path(&self, group: &str) -> PathBuf {
        self.cache_dir.join(group)
    }

    fn guard(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Split `requests` into those still needing resolution and those served
    /// from disk.
    ///
    /// Hits carry the originating request's query metadata. Request order is
    /// preserved in the returned `still_needed`.
    #[instrument(skip_all, fields(requests = requests.len()))]
    pub fn resolve_from_cache(
        &self,
        requests: Vec<FactRequest>,
    ) -> (Vec<FactRequest>, Vec<ResolvedFact>) {
        if !self.cache_dir.is_dir() {
            debug!(dir = %self.cache_dir.display(), "cache directory missing");
            return (requests, Vec::new());
        }

        let _guard = self.guard();
        let mut loaded: HashMap<String, Option<GroupData>> = HashMap::new();
        let mut still_needed = Vec::with_capacity(requests.len());
        let mut hits = Vec::new();

        for request in requests {
            match self.lookup(&request, &mut loaded) {
                Some(value) => {
                    trace!(fact = %request.name, "cache hit");
                    hits.push(request.resolve_to(Some(value)));
                }
                None => still_needed.push(request),
            }
        }

        debug!(hits = hits.len(), misses = still_needed.len(), "cache lookup complete");
        (still_needed, hits)
    }

    fn lookup(
        &self,
        request: &FactRequest,
        loaded: &mut HashMap<String, Option<GroupData>>,
    ) -> Option<Value> {
        if request.kind != FactKind::Core {
            return None;
        }
        let group = self.groups.fact_group(&request.name)?;
        let ttl = self.groups.group_ttl(group)?;

        let data = loaded.entry(group.to_string()).or_insert_with(|| {
            self.expire_stale(group, ttl);
            self.read_group(group)
        });

        data.as_ref()?
            .get(&request.name)
            .filter(|value| !value.is_null())
            .cloned()
    }

    /// Write every groupable fact with a value to its group file.
    ///
    /// Returns the number of facts written.
    #[instrument(skip_all, fields(facts = facts.len()))]
    pub fn persist(&self, facts: &[ResolvedFact]) -> Result<usize, CacheError> {
        fs::create_dir_all(&self.cache_dir).map_err(|source| CacheError::CreateDir {
            path: self.cache_dir.clone(),
            source,
        })?;

        let _guard = self.guard();

        // Group in first-seen order so each file is rewritten once.
        let mut order: Vec<(&str, Duration)> = Vec::new();
        let mut by_group: HashMap<&str, Vec<(&str, &Value)>> = HashMap::new();

        for fact in facts {
            let Some(group) = self.groups.fact_group(&fact.name) else {
                continue;
            };
            let Some(ttl) = self.groups.group_ttl(group) else {
                continue;
            };
            let Some(value) = fact.value.as_ref().filter(|v| !v.is_null()) else {
                continue;
            };

            by_group
                .entry(group)
                .or_insert_with(|| {
                    order.push((group, ttl));
                    Vec::new()
                })
                .push((&fact.name, value));
        }

        let mut written = 0;
        for (group, ttl) in order {
            self.expire_stale(group, ttl);
            let mut data = self.read_group(group).unwrap_or_default();
            for (name, value) in by_group.remove(group).unwrap_or_default() {
                data.insert(name.to_string(), value.clone());
                written += 1;
            }
            self.write_group(group, &data)?;
        }

        debug!(written, "persisted facts");
        Ok(written)
    }

    /// Delete a group file whose age exceeds `ttl`. Returns whether it was
    /// deleted.
    ///
    /// Expiry is strict: a file whose age equals `ttl` is still fresh, so it
    /// is deleted only once `now > mtime + ttl`.
    fn expire_stale(&self, group: &str, ttl: Duration) -> bool {
        let path = self.group_path(group);
        let Some(age) = file_age(&path) else {
            return false;
        };
        if age <= ttl {
            return false;
        }

        match fs::remove_file(&path) {
            Ok(()) => {
                debug!(group, age_secs = age.as_secs(), ttl_secs = ttl.as_secs(), "expired cache group");
                true
            }
            Err(e) => {
                warn!(group, error = %e, "failed to delete expired cache group");
                false
            }
        }
    }

    /// Read a group file. Missing or malformed files read as `None`.
    fn read_group(&self, group: &str) -> Option<GroupData> {
        let path = self.group_path(group);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(group, error = %e, "failed to read cache group");
                return None;
            }
        };

        match serde_json::from_str::<Value>(&content) {
            Ok(Value::Object(map)) => Some(map),
            Ok(_) => {
                warn!(group, path = %path.display(), "cache group is not a JSON object, ignoring");
                None
            }
            Err(e) => {
                warn!(group, path = %path.display(), error = %e, "malformed cache group, ignoring");
                None
            }
        }
    }

    fn write_group(&self, group: &str, data: &GroupData) -> Result<(), CacheError> {
        let json = serde_json::to_string_pretty(data).map_err(|source| CacheError::Serialize {
            group: group.to_string(),
            source,
        })?;
        fs::write(self.group_path(group), json).map_err(|source| CacheError::Write {
            group: group.to_string(),
            source,
        })
    }

    /// Report every known group's file state.
    pub fn status(&self) -> Vec<GroupStatus> {
        let _guard = self.guard();
        self.groups
            .group_names()
            .into_iter()
            .map(|group| {
                let path = self.group_path(group);
                let ttl = self.groups.group_ttl(group);
                let modified = fs::metadata(&path).and_then(|m| m.modified()).ok();
                let fact_count = self.read_group(group).map(|d| d.len()).unwrap_or(0);
                GroupStatus::new(group, path, ttl, modified, fact_count)
            })
            .collect()
    }

    /// Delete every known group file. Returns the number removed.
    pub fn clear(&self) -> Result<usize, CacheError> {
        let _guard = self.guard();
        let mut removed = 0;
        for group in self.groups.group_names() {
            let path = self.group_path(group);
            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(source) => return Err(CacheError::Remove { path, source }),
            }
        }
        debug!(removed, "cleared fact cache");
        Ok(removed)
    }
}

/// Time since a file was last modified. A modification time in the future
/// counts as age zero.
fn file_age(path: &Path) -> Option<Duration> {
    let modified = fs::metadata(path).and_then(|m| m.modified()).ok()?;
    Some(
        SystemTime::now()
            .duration_since(modified)
            .unwrap_or_default(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use sf_common::CacheGroups;
    use tempfile::tempdir;

    fn groups_with_ttl() -> Arc<dyn GroupIndex> {
        Arc::new(
            CacheGroups::builtin()
                .with_ttl("partitions", Duration::from_secs(3600))
                .unwrap()
                .with_ttl("memory", Duration::from_secs(3600))
                .unwrap(),
        )
    }

    #[test]
    fn test_persist_then_hit() {
        let dir = tempdir().unwrap();
        let cache = FactCache::new(dir.path(), groups_with_ttl());

        let fact = FactRequest::core("partitions").resolve_to(Some(json!({"/dev/sda1": {}})));
        assert_eq!(cache.persist(&[fact]).unwrap(), 1);

        let request = FactRequest::core("partitions").with_user_query("partitions");
        let (needed, hits) = cache.resolve_from_cache(vec![request]);
        assert!(needed.is_empty());
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].value, Some(json!({"/dev/sda1": {}})));
        assert_eq!(hits[0].user_query.as_deref(), Some("partitions"));
    }

    #[test]
    fn test_group_file_is_pretty_json() {
        let dir = tempdir().unwrap();
        let cache = FactCache::new(dir.path(), groups_with_ttl());

        let facts = [
            FactRequest::core("memory.system.total").resolve_to(Some(json!("1.0 GiB"))),
            FactRequest::core("memorysize").resolve_to(Some(json!("1.0 GiB"))),
        ];
        cache.persist(&facts).unwrap();

        let content = fs::read_to_string(dir.path().join("memory")).unwrap();
        assert!(content.contains("\n  \"memory.system.total\": \"1.0 GiB\""));
        let parsed: Value = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed.as_object().unwrap().len(), 2);
    }

    #[test]
    fn test_legacy_requests_never_hit() {
        let dir = tempdir().unwrap();
        let cache = FactCache::new(dir.path(), groups_with_ttl());
        cache
            .persist(&[FactRequest::core("memorysize").resolve_to(Some(json!("1.0 GiB")))])
            .unwrap();

        let request = FactRequest::new("memorysize", FactKind::Legacy);
        let (needed, hits) = cache.resolve_from_cache(vec![request.clone()]);
        assert_eq!(needed, vec![request]);
        assert!(hits.is_empty());
    }

    #[test]
    fn test_no_ttl_means_no_cache() {
        let dir = tempdir().unwrap();
        let cache = FactCache::new(dir.path(), Arc::new(CacheGroups::builtin()));

        let fact = FactRequest::core("partitions").resolve_to(Some(json!({})));
        assert_eq!(cache.persist(&[fact]).unwrap(), 0);
        assert!(!dir.path().join("partitions").exists());
    }

    #[test]
    fn test_absent_values_not_persisted() {
        let dir = tempdir().unwrap();
        let cache = FactCache::new(dir.path(), groups_with_ttl());

        let facts = [
            FactRequest::core("memory.swap.total").resolve_to(None),
            FactRequest::core("memory.swap.available").resolve_to(Some(Value::Null)),
        ];
        assert_eq!(cache.persist(&facts).unwrap(), 0);
        assert!(!dir.path().join("memory").exists());
    }

    #[test]
    fn test_malformed_group_is_miss_and_overwritten() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("partitions"), "{ not json").unwrap();
        let cache = FactCache::new(dir.path(), groups_with_ttl());

        let (needed, hits) = cache.resolve_from_cache(vec![FactRequest::core("partitions")]);
        assert_eq!(needed.len(), 1);
        assert!(hits.is_empty());

        cache
            .persist(&[FactRequest::core("partitions").resolve_to(Some(json!({"a": 1})))])
            .unwrap();
        let parsed: Value =
            serde_json::from_str(&fs::read_to_string(dir.path().join("partitions")).unwrap())
                .unwrap();
        assert_eq!(parsed, json!({"partitions": {"a": 1}}));
    }

    #[test]
    fn test_clear_removes_known_groups_only() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("unrelated"), "keep").unwrap();
        let cache = FactCache::new(dir.path(), groups_with_ttl());
        cache
            .persist(&[FactRequest::core("partitions").resolve_to(Some(json!({})))])
            .unwrap();

        assert_eq!(cache.clear().unwrap(), 1);
        assert!(!dir.path().join("partitions").exists());
        assert!(dir.path().join("unrelated").exists());
        assert_eq!(cache.clear().unwrap(), 0);
    }

    #[test]
    fn test_status_reports_groups() {
        let dir = tempdir().unwrap();
        let cache = FactCache::new(dir.path(), groups_with_ttl());
        cache
            .persist(&[FactRequest::core("partitions").resolve_to(Some(json!({})))])
            .unwrap();

        let status = cache.status();
        let partitions = status.iter().find(|s| s.group == "partitions").unwrap();
        assert!(partitions.exists);
        assert_eq!(partitions.fact_count, 1);
        assert_eq!(partitions.ttl_secs, Some(3600));
        assert!(!partitions.expired);

        let dmi = status.iter().find(|s| s.group == "dmi").unwrap();
        assert!(!dmi.exists);
        assert_eq!(dmi.ttl_secs, None);
    }
}
