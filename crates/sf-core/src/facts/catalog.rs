//! The built-in fact catalog.
//!
//! Each [`FactDefinition`] names a fact, the resolver that produces it, and
//! how the resolver's raw value becomes the fact value. Legacy aliases are
//! ordinary entries of kind [`FactKind::Legacy`] sharing resolver keys with
//! their structured counterparts, so the underlying read happens once.

use serde_json::Value;
use sf_common::FactKind;

use crate::bytes::bytes_to_human;
use crate::resolvers::{Resolver, ResolverKind};

/// How a fact value is derived from resolver keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Derivation {
    /// The resolver value unchanged.
    Value(&'static str),
    /// A byte count rendered with binary units.
    HumanBytes(&'static str),
    /// First dotted component of a version string.
    VersionMajor(&'static str),
    /// Second dotted component of a version string.
    VersionMinor(&'static str),
    /// `total - available`, in bytes.
    UsedBytes {
        total: &'static str,
        available: &'static str,
    },
    /// `total - available`, rendered with binary units.
    UsedHuman {
        total: &'static str,
        available: &'static str,
    },
    /// Used share of total, as `"12.34%"`.
    Capacity {
        total: &'static str,
        available: &'static str,
    },
}

impl Derivation {
    /// Compute the fact value from `resolver`.
    pub fn evaluate(&self, resolver: &dyn Resolver) -> Option<Value> {
        match *self {
            Derivation::Value(key) => resolver.resolve(key),
            Derivation::HumanBytes(key) => {
                let bytes = resolver.resolve(key)?.as_u64()?;
                Some(Value::String(bytes_to_human(bytes)))
            }
            Derivation::VersionMajor(key) => version_component(resolver.resolve(key)?, 0),
            Derivation::VersionMinor(key) => version_component(resolver.resolve(key)?, 1),
            Derivation::UsedBytes { total, available } => {
                used_bytes(resolver, total, available).map(Value::from)
            }
            Derivation::UsedHuman { total, available } => {
                used_bytes(resolver, total, available).map(|b| Value::String(bytes_to_human(b)))
            }
            Derivation::Capacity { total, available } => {
                let total_bytes = resolver.resolve(total)?.as_u64()?;
                if total_bytes == 0 {
                    return None;
                }
                let used = used_bytes(resolver, total, available)?;
                let percent = used as f64 * 100.0 / total_bytes as f64;
                Some(Value::String(format!("{:.2}%", percent)))
            }
        }
    }
}

fn used_bytes(resolver: &dyn Resolver, total: &str, available: &str) -> Option<u64> {
    let total = resolver.resolve(total)?.as_u64()?;
    let available = resolver.resolve(available)?.as_u64()?;
    Some(total.saturating_sub(available))
}

fn version_component(version: Value, index: usize) -> Option<Value> {
    version
        .as_str()?
        .split('.')
        .nth(index)
        .filter(|part| !part.is_empty())
        .map(|part| Value::String(part.to_string()))
}

/// One catalog entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FactDefinition {
    pub name: &'static str,
    pub kind: FactKind,
    pub resolver: ResolverKind,
    pub derivation: Derivation,
}

const fn core_fact(name: &'static str, resolver: ResolverKind, derivation: Derivation) -> FactDefinition {
    FactDefinition {
        name,
        kind: FactKind::Core,
        resolver,
        derivation,
    }
}

const fn legacy_fact(name: &'static str, resolver: ResolverKind, derivation: Derivation) -> FactDefinition {
    FactDefinition {
        name,
        kind: FactKind::Legacy,
        resolver,
        derivation,
    }
}

use Derivation::{Capacity, HumanBytes, UsedBytes, UsedHuman, Value as Raw, VersionMajor, VersionMinor};
use ResolverKind::{DebianVersion, Dmi, Memory, OsRelease, Partitions};

const SYSTEM_USED: (&str, &str) = ("total", "available");

/// Every built-in fact.
pub static CATALOG: &[FactDefinition] = &[
    // operating system
    core_fact("os.name", OsRelease, Raw("name")),
    core_fact("os.release.full", DebianVersion, Raw("version")),
    core_fact("os.release.major", DebianVersion, VersionMajor("version")),
    core_fact("os.release.minor", DebianVersion, VersionMinor("version")),
    core_fact("os.distro.id", OsRelease, Raw("id")),
    core_fact("os.distro.codename", OsRelease, Raw("version_codename")),
    core_fact("os.distro.description", OsRelease, Raw("pretty_name")),
    core_fact("os.distro.release.full", OsRelease, Raw("version_id")),
    legacy_fact("operatingsystemrelease", DebianVersion, Raw("version")),
    legacy_fact("operatingsystemmajrelease", DebianVersion, VersionMajor("version")),
    legacy_fact("lsbdistid", OsRelease, Raw("id")),
    legacy_fact("lsbdistcodename", OsRelease, Raw("version_codename")),
    legacy_fact("lsbdistdescription", OsRelease, Raw("pretty_name")),
    legacy_fact("lsbdistrelease", OsRelease, Raw("version_id")),
    // dmi
    core_fact("dmi.bios.release_date", Dmi, Raw("bios_date")),
    core_fact("dmi.bios.vendor", Dmi, Raw("bios_vendor")),
    core_fact("dmi.bios.version", Dmi, Raw("bios_version")),
    core_fact("dmi.board.manufacturer", Dmi, Raw("board_vendor")),
    core_fact("dmi.board.product", Dmi, Raw("board_name")),
    core_fact("dmi.board.serial_number", Dmi, Raw("board_serial")),
    core_fact("dmi.chassis.asset_tag", Dmi, Raw("chassis_asset_tag")),
    core_fact("dmi.chassis.type", Dmi, Raw("chassis_type")),
    core_fact("dmi.manufacturer", Dmi, Raw("sys_vendor")),
    core_fact("dmi.product.name", Dmi, Raw("product_name")),
    core_fact("dmi.product.serial_number", Dmi, Raw("product_serial")),
    core_fact("dmi.product.uuid", Dmi, Raw("product_uuid")),
    legacy_fact("bios_release_date", Dmi, Raw("bios_date")),
    legacy_fact("bios_vendor", Dmi, Raw("bios_vendor")),
    legacy_fact("bios_version", Dmi, Raw("bios_version")),
    legacy_fact("boardmanufacturer", Dmi, Raw("board_vendor")),
    legacy_fact("boardproductname", Dmi, Raw("board_name")),
    legacy_fact("boardserialnumber", Dmi, Raw("board_serial")),
    legacy_fact("chassisassettag", Dmi, Raw("chassis_asset_tag")),
    legacy_fact("chassistype", Dmi, Raw("chassis_type")),
    legacy_fact("manufacturer", Dmi, Raw("sys_vendor")),
    legacy_fact("productname", Dmi, Raw("product_name")),
    legacy_fact("serialnumber", Dmi, Raw("product_serial")),
    legacy_fact("uuid", Dmi, Raw("product_uuid")),
    // memory
    core_fact("memory.system.total", Memory, HumanBytes("total")),
    core_fact("memory.system.total_bytes", Memory, Raw("total")),
    core_fact("memory.system.available", Memory, HumanBytes("available")),
    core_fact("memory.system.available_bytes", Memory, Raw("available")),
    core_fact(
        "memory.system.used",
        Memory,
        UsedHuman {
            total: SYSTEM_USED.0,
            available: SYSTEM_USED.1,
        },
    ),
    core_fact(
        "memory.system.used_bytes",
        Memory,
        UsedBytes {
            total: SYSTEM_USED.0,
            available: SYSTEM_USED.1,
        },
    ),
    core_fact(
        "memory.system.capacity",
        Memory,
        Capacity {
            total: SYSTEM_USED.0,
            available: SYSTEM_USED.1,
        },
    ),
    core_fact("memory.swap.total", Memory, HumanBytes("swap_total")),
    core_fact("memory.swap.total_bytes", Memory, Raw("swap_total")),
    core_fact("memory.swap.available", Memory, HumanBytes("swap_free")),
    core_fact("memory.swap.available_bytes", Memory, Raw("swap_free")),
    legacy_fact("memorysize", Memory, HumanBytes("total")),
    legacy_fact("memoryfree", Memory, HumanBytes("available")),
    legacy_fact("swapsize", Memory, HumanBytes("swap_total")),
    legacy_fact("swapfree", Memory, HumanBytes("swap_free")),
    // partitions
    core_fact("partitions", Partitions, Raw("partitions")),
];

/// Find a fact by exact name.
pub fn lookup(name: &str) -> Option<&'static FactDefinition> {
    CATALOG.iter().find(|def| def.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memo::FactMemo;
    use serde_json::json;
    use sf_common::config::BUILTIN_GROUPS;
    use std::collections::HashSet;

    /// Resolver answering from a fixed table.
    struct Table(Vec<(&'static str, Value)>, FactMemo);

    impl Resolver for Table {
        fn kind(&self) -> ResolverKind {
            ResolverKind::Memory
        }

        fn resolve(&self, fact: &str) -> Option<Value> {
            self.1.fetch_or_resolve(fact, |entries| {
                for (key, value) in &self.0 {
                    entries.insert(*key, Some(value.clone()));
                }
            })
        }
    }

    fn memory(total: u64, available: u64) -> Table {
        Table(
            vec![("total", json!(total)), ("available", json!(available))],
            FactMemo::new(),
        )
    }

    #[test]
    fn test_names_unique() {
        let mut seen = HashSet::new();
        for def in CATALOG {
            assert!(seen.insert(def.name), "duplicate fact {}", def.name);
        }
    }

    #[test]
    fn test_every_grouped_fact_is_cataloged() {
        for (group, facts) in BUILTIN_GROUPS {
            for fact in *facts {
                assert!(lookup(fact).is_some(), "{} in group {} has no definition", fact, group);
            }
        }
    }

    #[test]
    fn test_legacy_names_are_flat() {
        for def in CATALOG.iter().filter(|d| d.kind == FactKind::Legacy) {
            assert!(!def.name.contains('.'), "{}", def.name);
        }
    }

    #[test]
    fn test_human_bytes() {
        let resolver = memory(1024, 0);
        assert_eq!(HumanBytes("total").evaluate(&resolver), Some(json!("1.0 KiB")));
        assert_eq!(HumanBytes("missing").evaluate(&resolver), None);
    }

    #[test]
    fn test_used_and_capacity() {
        let resolver = memory(4 * 1024 * 1024, 1024 * 1024);
        let used = UsedBytes {
            total: "total",
            available: "available",
        };
        assert_eq!(used.evaluate(&resolver), Some(json!(3 * 1024 * 1024)));

        let capacity = Capacity {
            total: "total",
            available: "available",
        };
        assert_eq!(capacity.evaluate(&resolver), Some(json!("75.00%")));
    }

    #[test]
    fn test_capacity_of_zero_total() {
        let resolver = memory(0, 0);
        let capacity = Capacity {
            total: "total",
            available: "available",
        };
        assert_eq!(capacity.evaluate(&resolver), None);
    }

    #[test]
    fn test_version_components() {
        assert_eq!(version_component(json!("12.4"), 0), Some(json!("12")));
        assert_eq!(version_component(json!("12.4"), 1), Some(json!("4")));
        assert_eq!(version_component(json!("bookworm/sid"), 1), None);
        assert_eq!(version_component(json!(12), 0), None);
    }
}
