//! DMI/SMBIOS identifiers from `/sys/class/dmi/id`.

use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use serde_json::Value;

use super::{Resolver, ResolverKind};
use crate::collect::read_trimmed;
use crate::memo::FactMemo;

/// Default DMI class directory.
pub const DMI_ROOT: &str = "/sys/class/dmi";

/// Attribute files this resolver answers for.
pub const DMI_ATTRIBUTES: &[&str] = &[
    "bios_date",
    "bios_vendor",
    "bios_version",
    "board_vendor",
    "board_name",
    "board_serial",
    "chassis_asset_tag",
    "chassis_type",
    "sys_vendor",
    "product_name",
    "product_serial",
    "product_uuid",
];

/// SMBIOS chassis type names, indexed by code - 1.
const CHASSIS_TYPES: &[Option<&str>] = &[
    Some("Other"),
    None,
    Some("Desktop"),
    Some("Low Profile Desktop"),
    Some("Pizza Box"),
    Some("Mini Tower"),
    Some("Tower"),
    Some("Portable"),
    Some("Laptop"),
    Some("Notebook"),
    Some("Hand Held"),
    Some("Docking Station"),
    Some("All in One"),
    Some("Sub Notebook"),
    Some("Space-Saving"),
    Some("Lunch Box"),
    Some("Main System Chassis"),
    Some("Expansion Chassis"),
    Some("SubChassis"),
    Some("Bus Expansion Chassis"),
    Some("Peripheral Chassis"),
    Some("Storage Chassis"),
    Some("Rack Mount Chassis"),
    Some("Sealed-Case PC"),
    Some("Multi-system"),
    Some("CompactPCI"),
    Some("AdvancedTCA"),
    Some("Blade"),
    Some("Blade Enclosure"),
    Some("Tablet"),
    Some("Convertible"),
    Some("Detachable"),
];

/// Map a numeric chassis type code to its name.
///
/// Code 2 ("Unknown") and out-of-range codes map to `None`.
pub fn chassis_name(code: &str) -> Option<&'static str> {
    let code: usize = code.trim().parse().ok()?;
    CHASSIS_TYPES.get(code.checked_sub(1)?).copied().flatten()
}

/// Resolver for DMI attributes. Each attribute is its own file and its own
/// read.
#[derive(Debug)]
pub struct DmiResolver {
    root: PathBuf,
    memo: FactMemo,
}

static GLOBAL: OnceLock<Arc<DmiResolver>> = OnceLock::new();

impl DmiResolver {
    /// A resolver over a DMI class directory (containing `id/`).
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            memo: FactMemo::new(),
        }
    }

    /// The process-wide instance over `/sys/class/dmi`.
    pub fn global() -> Arc<Self> {
        GLOBAL.get_or_init(|| Arc::new(Self::new(DMI_ROOT))).clone()
    }

    fn read_attribute(&self, attr: &str) -> Option<String> {
        if !self.root.is_dir() || !DMI_ATTRIBUTES.contains(&attr) {
            return None;
        }

        let raw = read_trimmed(&self.root.join("id").join(attr))?;
        if attr == "chassis_type" {
            chassis_name(&raw).map(str::to_string)
        } else {
            Some(raw)
        }
    }
}

impl Resolver for DmiResolver {
    fn kind(&self) -> ResolverKind {
        ResolverKind::Dmi
    }

    fn resolve(&self, fact: &str) -> Option<Value> {
        self.memo.fetch_or_resolve(fact, |entries| {
            entries.insert(fact, self.read_attribute(fact).map(Value::String));
        })
    }
}
