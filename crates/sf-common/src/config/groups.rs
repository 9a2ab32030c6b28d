//! Cache group index.
//!
//! A cache group is a named set of facts that share one TTL and one file in
//! the cache directory. Group membership is a static table (extendable from
//! the config file); TTLs come only from configuration, so a group without a
//! configured TTL is never cached.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use crate::error::{Error, Result};

/// Lookup service mapping facts to cache groups and groups to TTLs.
pub trait GroupIndex: Send + Sync {
    /// The cache group a fact belongs to.
    fn fact_group(&self, fact: &str) -> Option<&str>;

    /// The TTL configured for a group.
    fn group_ttl(&self, group: &str) -> Option<Duration>;

    /// All known group names, sorted.
    fn group_names(&self) -> Vec<&str>;
}

/// Built-in group table.
pub const BUILTIN_GROUPS: &[(&str, &[&str])] = &[
    (
        "operating system",
        &[
            "os.name",
            "os.release.full",
            "os.release.major",
            "os.release.minor",
            "os.distro.id",
            "os.distro.codename",
            "os.distro.description",
            "os.distro.release.full",
            "operatingsystemrelease",
            "operatingsystemmajrelease",
            "lsbdistid",
            "lsbdistcodename",
            "lsbdistdescription",
            "lsbdistrelease",
        ],
    ),
    (
        "dmi",
        &[
            "dmi.bios.release_date",
            "dmi.bios.vendor",
            "dmi.bios.version",
            "dmi.board.manufacturer",
            "dmi.board.product",
            "dmi.board.serial_number",
            "dmi.chassis.asset_tag",
            "dmi.chassis.type",
            "dmi.manufacturer",
            "dmi.product.name",
            "dmi.product.serial_number",
            "dmi.product.uuid",
            "bios_release_date",
            "bios_vendor",
            "bios_version",
            "boardmanufacturer",
            "boardproductname",
            "boardserialnumber",
            "chassisassettag",
            "chassistype",
            "manufacturer",
            "productname",
            "serialnumber",
            "uuid",
        ],
    ),
    (
        "memory",
        &[
            "memory.system.total",
            "memory.system.total_bytes",
            "memory.system.available",
            "memory.system.available_bytes",
            "memory.system.used",
            "memory.system.used_bytes",
            "memory.system.capacity",
            "memory.swap.total",
            "memory.swap.total_bytes",
            "memory.swap.available",
            "memory.swap.available_bytes",
            "memorysize",
            "memoryfree",
            "swapsize",
            "swapfree",
        ],
    ),
    ("partitions", &["partitions"]),
];

/// Config-backed [`GroupIndex`].
#[derive(Debug, Clone, Default)]
pub struct CacheGroups {
    /// Group name → member facts.
    groups: BTreeMap<String, Vec<String>>,
    /// Fact name → group name.
    fact_index: HashMap<String, String>,
    /// Group name → TTL.
    ttls: HashMap<String, Duration>,
}

impl CacheGroups {
    /// An index with no groups.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The built-in group table with no TTLs.
    pub fn builtin() -> Self {
        let mut groups = Self::empty();
        for (name, facts) in BUILTIN_GROUPS {
            groups.insert_group(name, facts.iter().map(|f| f.to_string()));
        }
        groups
    }

    /// Add a user-defined group.
    ///
    /// Fails if the name is not usable as a file name or if a fact already
    /// belongs to another group.
    pub fn add_group<I, S>(&mut self, name: &str, facts: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        validate_group_name(name)?;
        if self.groups.contains_key(name) {
            return Err(Error::InvalidConfig(format!(
                "cache group defined twice: {}",
                name
            )));
        }

        let facts: Vec<String> = facts.into_iter().map(Into::into).collect();
        for fact in &facts {
            if let Some(existing) = self.fact_index.get(fact) {
                return Err(Error::InvalidConfig(format!(
                    "fact {} is in both cache groups {} and {}",
                    fact, existing, name
                )));
            }
        }

        self.insert_group(name, facts);
        Ok(())
    }

    /// Set the TTL of a known group.
    pub fn set_ttl(&mut self, group: &str, ttl: Duration) -> Result<()> {
        if !self.groups.contains_key(group) {
            return Err(Error::InvalidConfig(format!(
                "unknown cache group in ttls: {}",
                group
            )));
        }
        self.ttls.insert(group.to_string(), ttl);
        Ok(())
    }

    /// Builder form of [`CacheGroups::set_ttl`].
    pub fn with_ttl(mut self, group: &str, ttl: Duration) -> Result<Self> {
        self.set_ttl(group, ttl)?;
        Ok(self)
    }

    /// Facts belonging to a group.
    pub fn facts_in(&self, group: &str) -> &[String] {
        self.groups.get(group).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether any group has a TTL, i.e. whether caching can ever happen.
    pub fn has_ttls(&self) -> bool {
        !self.ttls.is_empty()
    }

    fn insert_group<I, S>(&mut self, name: &str, facts: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let facts: Vec<String> = facts.into_iter().map(Into::into).collect();
        for fact in &facts {
            self.fact_index.insert(fact.clone(), name.to_string());
        }
        self.groups.insert(name.to_string(), facts);
    }
}

impl GroupIndex for CacheGroups {
    fn fact_group(&self, fact: &str) -> Option<&str> {
        self.fact_index.get(fact).map(String::as_str)
    }

    fn group_ttl(&self, group: &str) -> Option<Duration> {
        self.ttls.get(group).copied()
    }

    fn group_names(&self) -> Vec<&str> {
        self.groups.keys().map(String::as_str).collect()
    }
}

/// Group names become file names in the cache directory.
fn validate_group_name(name: &str) -> Result<()> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\0']) {
        return Err(Error::InvalidConfig(format!(
            "invalid cache group name: {:?}",
            name
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_lookup() {
        let groups = CacheGroups::builtin();
        assert_eq!(groups.fact_group("partitions"), Some("partitions"));
        assert_eq!(groups.fact_group("memorysize"), Some("memory"));
        assert_eq!(groups.fact_group("dmi.bios.vendor"), Some("dmi"));
        assert_eq!(groups.fact_group("no.such.fact"), None);
    }

    #[test]
    fn test_builtin_has_no_ttls() {
        let groups = CacheGroups::builtin();
        assert!(!groups.has_ttls());
        assert_eq!(groups.group_ttl("partitions"), None);
    }

    #[test]
    fn test_set_ttl() {
        let groups = CacheGroups::builtin()
            .with_ttl("partitions", Duration::from_secs(3600))
            .unwrap();
        assert_eq!(
            groups.group_ttl("partitions"),
            Some(Duration::from_secs(3600))
        );
        assert!(groups.has_ttls());
    }

    #[test]
    fn test_set_ttl_unknown_group() {
        let mut groups = CacheGroups::builtin();
        let err = groups.set_ttl("disks", Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn test_add_group() {
        let mut groups = CacheGroups::builtin();
        groups.add_group("site", ["custom.rack", "custom.row"]).unwrap();
        assert_eq!(groups.fact_group("custom.row"), Some("site"));
        assert_eq!(groups.facts_in("site").len(), 2);
        assert!(groups.group_names().contains(&"site"));
    }

    #[test]
    fn test_add_group_rejects_duplicate_fact() {
        let mut groups = CacheGroups::builtin();
        let err = groups.add_group("mine", ["partitions"]).unwrap_err();
        assert!(err.to_string().contains("partitions"));
    }

    #[test]
    fn test_add_group_rejects_path_names() {
        let mut groups = CacheGroups::empty();
        assert!(groups.add_group("../etc", ["a"]).is_err());
        assert!(groups.add_group("..", ["a"]).is_err());
        assert!(groups.add_group("", ["a"]).is_err());
        assert!(groups.add_group("operating system", ["a"]).is_ok());
    }

    #[test]
    fn test_group_names_sorted() {
        let groups = CacheGroups::builtin();
        let names = groups.group_names();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
    }
}
