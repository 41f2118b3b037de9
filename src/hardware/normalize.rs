//! Property-bag normalization
//!
//! Turns a raw property bag into an ordered list of display-ready records.
//! The order and the set of recognized properties are fixed per class; the
//! bag's own iteration order never leaks into the output.

use std::fmt;

use super::{HardwareClass, PropertyValue, RawPropertyBag, SensorRecord};

const BYTES_PER_GB: u64 = 1024 * 1024 * 1024;
const KB_PER_GB: u64 = 1024 * 1024;

/// How a recognized property is turned into display text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conversion {
    /// String representation, unchanged
    Verbatim,
    /// Raw string with a unit label appended, no scaling
    Suffix(&'static str),
    /// Unsigned byte count to whole gigabytes shown as "N.00 GB"; unparsable values are omitted
    BytesToGb,
    /// Unsigned kilobyte count to whole gigabytes shown as "N.00 GB"; unparsable values are omitted
    KilobytesToGb,
}

type Rule = (&'static str, Conversion);

const PROCESSOR_RULES: &[Rule] = &[
    ("Role", Conversion::Verbatim),
    ("Name", Conversion::Verbatim),
    ("Caption", Conversion::Verbatim),
    ("Manufacturer", Conversion::Verbatim),
    ("SocketDesignation", Conversion::Verbatim),
    // Raw MHz value, only the label is appended.
    ("MaxClockSpeed", Conversion::Suffix(" GHz")),
    ("NumberOfCores", Conversion::Verbatim),
    ("NumberOfLogicalProcessors", Conversion::Verbatim),
    ("L2CacheSize", Conversion::Suffix(" KB")),
    ("L3CacheSize", Conversion::Suffix(" KB")),
    ("Status", Conversion::Verbatim),
];

const MEMORY_RULES: &[Rule] = &[
    ("Name", Conversion::Verbatim),
    ("Manufacturer", Conversion::Verbatim),
    ("BankLabel", Conversion::Verbatim),
    ("DeviceLocator", Conversion::Verbatim),
    ("PartNumber", Conversion::Verbatim),
    ("Capacity", Conversion::BytesToGb),
    ("Attributes", Conversion::Verbatim),
    ("ConfiguredClockSpeed", Conversion::Verbatim),
    ("ConfiguredVoltage", Conversion::Verbatim),
    ("SerialNumber", Conversion::Verbatim),
];

const MAINBOARD_RULES: &[Rule] = &[
    ("Name", Conversion::Verbatim),
    ("Product", Conversion::Verbatim),
    ("Manufacturer", Conversion::Verbatim),
    ("SerialNumber", Conversion::Verbatim),
    ("Version", Conversion::Verbatim),
    ("Status", Conversion::Verbatim),
];

const STORAGE_RULES: &[Rule] = &[
    ("Model", Conversion::Verbatim),
    ("Description", Conversion::Verbatim),
    ("InterfaceType", Conversion::Verbatim),
    ("Size", Conversion::BytesToGb),
    ("FirmwareRevision", Conversion::Verbatim),
    ("Signature", Conversion::Verbatim),
    ("TotalCylinders", Conversion::Verbatim),
    ("Status", Conversion::Verbatim),
];

const GRAPHICS_RULES: &[Rule] = &[
    ("VideoProcessor", Conversion::Verbatim),
    ("AdapterCompatibility", Conversion::Verbatim),
    ("AdapterDACType", Conversion::Verbatim),
    ("AdapterRAM", Conversion::BytesToGb),
    ("DriverVersion", Conversion::Verbatim),
    ("DriverDate", Conversion::Verbatim),
    ("InfSection", Conversion::Verbatim),
    ("Status", Conversion::Verbatim),
];

const OPERATING_SYSTEM_RULES: &[Rule] = &[
    ("Caption", Conversion::Verbatim),
    ("Manufacturer", Conversion::Verbatim),
    ("CSName", Conversion::Verbatim),
    ("OSArchitecture", Conversion::Verbatim),
    ("FreePhysicalMemory", Conversion::KilobytesToGb),
    ("FreeVirtualMemory", Conversion::KilobytesToGb),
    ("NumberOfUsers", Conversion::Verbatim),
    ("RegisteredUser", Conversion::Verbatim),
    ("SerialNumber", Conversion::Verbatim),
    ("InstallDate", Conversion::Verbatim),
    ("SystemDirectory", Conversion::Verbatim),
    ("Version", Conversion::Verbatim),
    ("Status", Conversion::Verbatim),
];

/// A recognized property that was absent or null in the bag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingProperty {
    pub class: HardwareClass,
    pub property: &'static str,
}

impl fmt::Display for MissingProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Property {} not found in {} data.",
            self.property,
            self.class.component_name()
        )
    }
}

/// Output of one normalization pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Normalized {
    pub records: Vec<SensorRecord>,
    pub missing: Vec<MissingProperty>,
}

/// Applies the per-class property lists and unit conversions
#[derive(Debug, Clone, Copy, Default)]
pub struct ComponentNormalizer;

impl ComponentNormalizer {
    pub fn new() -> Self {
        Self
    }

    /// Ordered property rules for a class
    pub fn rules(class: HardwareClass) -> &'static [(&'static str, Conversion)] {
        match class {
            HardwareClass::Processor => PROCESSOR_RULES,
            HardwareClass::MemoryModule => MEMORY_RULES,
            HardwareClass::Mainboard => MAINBOARD_RULES,
            HardwareClass::StorageDrive => STORAGE_RULES,
            HardwareClass::GraphicsAdapter => GRAPHICS_RULES,
            HardwareClass::OperatingSystem => OPERATING_SYSTEM_RULES,
        }
    }

    pub fn normalize(&self, class: HardwareClass, bag: &RawPropertyBag) -> Normalized {
        let mut out = Normalized::default();

        for &(property, conversion) in Self::rules(class) {
            let Some(value) = bag.get(property).and_then(Option::as_ref) else {
                out.missing.push(MissingProperty { class, property });
                continue;
            };

            // Parse failures drop the property silently.
            if let Some(formatted) = convert(value, conversion) {
                out.records.push(SensorRecord::new(property, formatted));
            }
        }

        out
    }
}

fn convert(value: &PropertyValue, conversion: Conversion) -> Option<String> {
    match conversion {
        Conversion::Verbatim => Some(value.to_string()),
        Conversion::Suffix(unit) => Some(format!("{}{}", value, unit)),
        Conversion::BytesToGb => parse_unsigned(value).map(format_bytes_as_gb),
        Conversion::KilobytesToGb => parse_unsigned(value).map(format_kilobytes_as_gb),
    }
}

fn parse_unsigned(value: &PropertyValue) -> Option<u64> {
    match value {
        PropertyValue::Unsigned(v) => Some(*v),
        PropertyValue::Signed(v) => u64::try_from(*v).ok(),
        PropertyValue::Text(s) => s.trim().parse::<u64>().ok(),
        PropertyValue::Bool(_) | PropertyValue::Float(_) => None,
    }
}

/// Format a byte count as gigabytes; the division truncates to whole gigabytes
pub fn format_bytes_as_gb(bytes: u64) -> String {
    format!("{:.2} GB", (bytes / BYTES_PER_GB) as f64)
}

/// Format a kilobyte count as gigabytes; the division truncates to whole gigabytes
pub fn format_kilobytes_as_gb(kilobytes: u64) -> String {
    format!("{:.2} GB", (kilobytes / KB_PER_GB) as f64)
}
