//! Hardware inventory module
//!
//! Queries a pluggable hardware-information provider (WMI via `wmic` on Windows,
//! sysinfo and sysfs elsewhere), normalizes the raw property bags into
//! display-ready records and exports the raw data as a flat text report.

pub mod export;
pub mod inventory;
pub mod normalize;
pub mod provider;
pub mod sysinfo_provider;
pub mod wmi;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub use inventory::{Inventory, InventoryCollector};
pub use provider::HardwareQueryProvider;

/// Category of physical/logical component queried as a unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum HardwareClass {
    Processor,
    MemoryModule,
    Mainboard,
    StorageDrive,
    GraphicsAdapter,
    OperatingSystem,
}

impl HardwareClass {
    /// All classes in scan order
    pub const ALL: [HardwareClass; 6] = [
        HardwareClass::Processor,
        HardwareClass::MemoryModule,
        HardwareClass::Mainboard,
        HardwareClass::StorageDrive,
        HardwareClass::GraphicsAdapter,
        HardwareClass::OperatingSystem,
    ];

    /// Class selector in the provider's query dialect (WMI class names)
    pub fn selector(&self) -> &'static str {
        match self {
            HardwareClass::Processor => "Win32_Processor",
            HardwareClass::MemoryModule => "Win32_PhysicalMemory",
            HardwareClass::Mainboard => "Win32_BaseBoard",
            HardwareClass::StorageDrive => "Win32_DiskDrive",
            HardwareClass::GraphicsAdapter => "Win32_VideoController",
            HardwareClass::OperatingSystem => "Win32_OperatingSystem",
        }
    }

    /// Component name used in log messages and report headers
    pub fn component_name(&self) -> &'static str {
        match self {
            HardwareClass::Processor => "CPU",
            HardwareClass::MemoryModule => "RAM",
            HardwareClass::Mainboard => "Motherboard",
            HardwareClass::StorageDrive => "Hard Drive",
            HardwareClass::GraphicsAdapter => "GPU",
            HardwareClass::OperatingSystem => "System",
        }
    }

    /// Whether the class can have several physical units worth listing by name
    pub fn tracks_devices(&self) -> bool {
        matches!(
            self,
            HardwareClass::MemoryModule | HardwareClass::StorageDrive | HardwareClass::GraphicsAdapter
        )
    }

    pub fn from_selector(selector: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|class| class.selector().eq_ignore_ascii_case(selector.trim()))
    }
}

impl fmt::Display for HardwareClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.component_name())
    }
}

/// Scalar value reported by a provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Bool(bool),
    Unsigned(u64),
    Signed(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Bool(v) => write!(f, "{}", v),
            PropertyValue::Unsigned(v) => write!(f, "{}", v),
            PropertyValue::Signed(v) => write!(f, "{}", v),
            PropertyValue::Float(v) => write!(f, "{}", v),
            PropertyValue::Text(v) => f.write_str(v),
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::Text(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::Text(value)
    }
}

impl From<u64> for PropertyValue {
    fn from(value: u64) -> Self {
        PropertyValue::Unsigned(value)
    }
}

/// One query result instance: property name to optional (nullable) value
pub type RawPropertyBag = BTreeMap<String, Option<PropertyValue>>;

/// Normalized, display-ready (name, value) pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorRecord {
    pub name: String,
    pub value: String,
}

impl SensorRecord {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}
