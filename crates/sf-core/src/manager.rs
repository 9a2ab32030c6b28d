//! Fact resolution orchestration.
//!
//! [`FactManager`] serves what it can from the persistent cache, resolves the
//! rest on one scoped thread per resolver, and feeds fresh results back into
//! the cache. Cache write failures are logged and never fail a resolution.

use std::collections::BTreeMap;
use std::thread;

use sf_common::{FactRequest, ResolvedFact};
use tracing::{debug, instrument, warn};

use crate::cache::FactCache;
use crate::facts::{lookup, FactDefinition};
use crate::resolvers::{ResolverKind, ResolverSet};

/// Resolves fact requests through the cache and the resolvers.
#[derive(Debug)]
pub struct FactManager {
    resolvers: ResolverSet,
    cache: Option<FactCache>,
}

impl FactManager {
    /// A manager over `resolvers`; `cache` of `None` disables persistence.
    pub fn new(resolvers: ResolverSet, cache: Option<FactCache>) -> Self {
        Self { resolvers, cache }
    }

    /// The persistent cache, if enabled.
    pub fn cache(&self) -> Option<&FactCache> {
        self.cache.as_ref()
    }

    /// Resolve every request. Results come back in request order; facts that
    /// cannot be resolved carry no value.
    #[instrument(skip_all, fields(requests = requests.len()))]
    pub fn resolve(&self, requests: Vec<FactRequest>) -> Vec<ResolvedFact> {
        let (needed, hits) = match &self.cache {
            Some(cache) => cache.resolve_from_cache(requests.clone()),
            None => (requests.clone(), Vec::new()),
        };

        let fresh = self.resolve_fresh(needed);

        if let Some(cache) = &self.cache {
            if let Err(e) = cache.persist(&fresh) {
                warn!(error = %e, dir = %cache.cache_dir().display(), "failed to persist facts");
            }
        }

        debug!(cached = hits.len(), resolved = fresh.len(), "resolution complete");

        let mut results: Vec<ResolvedFact> = hits.into_iter().chain(fresh).collect();
        results.sort_by_key(|fact| request_position(&requests, fact));
        results
    }

    /// Resolve without the cache, one thread per resolver with work.
    fn resolve_fresh(&self, requests: Vec<FactRequest>) -> Vec<ResolvedFact> {
        let mut unknown = Vec::new();
        let mut by_resolver: BTreeMap<ResolverKind, Vec<(FactRequest, &'static FactDefinition)>> =
            BTreeMap::new();

        for request in requests {
            match lookup(&request.name) {
                Some(def) => by_resolver.entry(def.resolver).or_default().push((request, def)),
                None => {
                    debug!(fact = %request.name, kind = %request.kind, "no resolver for fact");
                    unknown.push(request.resolve_to(None));
                }
            }
        }

        let mut resolved = unknown;
        thread::scope(|s| {
            let handles: Vec<_> = by_resolver
                .iter()
                .map(|(kind, work)| {
                    let handle = s.spawn(move || self.run_resolver(*kind, work));
                    (kind, work, handle)
                })
                .collect();

            for (kind, work, handle) in handles {
                match handle.join() {
                    Ok(facts) => resolved.extend(facts),
                    Err(_) => {
                        warn!(resolver = %kind, "resolver thread panicked");
                        resolved.extend(work.iter().map(|(request, _)| request.resolve_to(None)));
                    }
                }
            }
        });

        resolved
    }

    fn run_resolver(
        &self,
        kind: ResolverKind,
        work: &[(FactRequest, &'static FactDefinition)],
    ) -> Vec<ResolvedFact> {
        let Some(resolver) = self.resolvers.get(kind) else {
            warn!(resolver = %kind, "resolver not registered");
            return work.iter().map(|(request, _)| request.resolve_to(None)).collect();
        };

        work.iter()
            .map(|(request, def)| {
                let value = def.derivation.evaluate(&**resolver);
                request.resolve_to(value)
            })
            .collect()
    }
}

/// Position of the request a fact answers.
fn request_position(requests: &[FactRequest], fact: &ResolvedFact) -> usize {
    requests
        .iter()
        .position(|r| {
            r.name == fact.name
                && r.user_query == fact.user_query
                && r.filter_tokens == fact.filter_tokens
        })
        .unwrap_or(usize::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facts::requests_for_query;
    use crate::test_utils::{CannedTools, SysfsFixture};
    use serde_json::json;
    use sf_common::{CacheGroups, FactKind, GroupIndex};
    use std::sync::Arc;
    use std::time::Duration;

    fn fixture() -> SysfsFixture {
        SysfsFixture::new()
            .disk("sda", 4096)
            .partition("sda", "sda1", 2048)
            .dmi("bios_vendor", "LENOVO")
            .file("etc/debian_version", "12.4\n")
            .meminfo(4096, 1024, 0, 0)
    }

    fn resolvers(fixture: &SysfsFixture) -> ResolverSet {
        let tools = CannedTools::new().with_tool("blkid", "/dev/sda1: UUID=\"abc\" TYPE=\"ext4\"\n");
        ResolverSet::new(&fixture.paths(), Arc::new(tools))
    }

    #[test]
    fn test_resolves_in_request_order() {
        let fixture = fixture();
        let manager = FactManager::new(resolvers(&fixture), None);

        let mut requests = requests_for_query("os.release.major");
        requests.extend(requests_for_query("partitions./dev/sda1.uuid"));
        requests.extend(requests_for_query("memorysize"));
        requests.extend(requests_for_query("no.such.fact"));

        let facts = manager.resolve(requests);
        let names: Vec<_> = facts.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["os.release.major", "partitions", "memorysize", "no.such.fact"]);

        assert_eq!(facts[0].value, Some(json!("12")));
        assert_eq!(facts[1].filtered_value(), Some(&json!("abc")));
        assert_eq!(facts[2].value, Some(json!("4.0 MiB")));
        assert_eq!(facts[3].kind, FactKind::Custom);
        assert!(!facts[3].is_present());
    }

    #[test]
    fn test_persists_and_serves_from_cache() {
        let fixture = fixture();
        let cache_dir = tempfile::tempdir().unwrap();
        let groups: Arc<dyn GroupIndex> = Arc::new(
            CacheGroups::builtin()
                .with_ttl("operating system", Duration::from_secs(3600))
                .unwrap(),
        );

        let manager = FactManager::new(
            resolvers(&fixture),
            Some(FactCache::new(cache_dir.path(), groups.clone())),
        );
        manager.resolve(requests_for_query("os.release.full"));
        assert!(cache_dir.path().join("operating system").exists());

        // A manager over an empty host still answers from the cache.
        let empty = SysfsFixture::new();
        let manager = FactManager::new(
            ResolverSet::new(&empty.paths(), Arc::new(CannedTools::new())),
            Some(FactCache::new(cache_dir.path(), groups)),
        );
        let facts = manager.resolve(requests_for_query("os.release.full"));
        assert_eq!(facts[0].value, Some(json!("12.4")));
    }

    #[test]
    fn test_unwritable_cache_still_resolves() {
        let fixture = fixture();
        let file = tempfile::NamedTempFile::new().unwrap();
        let groups: Arc<dyn GroupIndex> = Arc::new(
            CacheGroups::builtin()
                .with_ttl("dmi", Duration::from_secs(60))
                .unwrap(),
        );
        // The cache "directory" is a regular file, so creating it fails.
        let cache = FactCache::new(file.path().join("cache"), groups);
        let manager = FactManager::new(resolvers(&fixture), Some(cache));

        let facts = manager.resolve(requests_for_query("dmi.bios.vendor"));
        assert_eq!(facts[0].value, Some(json!("LENOVO")));
    }
}
