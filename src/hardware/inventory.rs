//! Inventory collection
//!
//! The collector queries every hardware class, normalizes each returned bag
//! and emits [`InventoryUpdate`]s. Updates are computed on a background task
//! and committed by whoever owns the [`Inventory`] (the foreground), in the
//! order they were produced.

use colored::*;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::mpsc;

use super::normalize::ComponentNormalizer;
use super::provider::{HardwareQueryProvider, ProviderError};
use super::{HardwareClass, RawPropertyBag, SensorRecord};
use crate::diagnostic_log::DiagnosticLog;

/// One change to commit to an [`Inventory`]
#[derive(Debug, Clone, PartialEq)]
pub enum InventoryUpdate {
    /// Replace the class's current records (last write wins)
    Records {
        class: HardwareClass,
        records: Vec<SensorRecord>,
    },
    /// Append a device name to the class's device list
    Device { class: HardwareClass, name: String },
    /// The class could not be queried
    ClassFailed {
        class: HardwareClass,
        error: ProviderError,
    },
    /// Scan over; no further updates follow
    Finished,
}

/// Per-class record snapshots plus accumulated device names
#[derive(Debug, Clone, Default)]
pub struct Inventory {
    records: BTreeMap<HardwareClass, Vec<SensorRecord>>,
    devices: BTreeMap<HardwareClass, Vec<String>>,
    failures: BTreeMap<HardwareClass, ProviderError>,
    finished: bool,
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commit one update
    pub fn apply(&mut self, update: InventoryUpdate) {
        match update {
            InventoryUpdate::Records { class, records } => {
                self.records.insert(class, records);
            }
            InventoryUpdate::Device { class, name } => {
                self.devices.entry(class).or_default().push(name);
            }
            InventoryUpdate::ClassFailed { class, error } => {
                self.failures.insert(class, error);
            }
            InventoryUpdate::Finished => self.finished = true,
        }
    }

    pub fn records(&self, class: HardwareClass) -> &[SensorRecord] {
        self.records.get(&class).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Device names, for classes that track them
    pub fn devices(&self, class: HardwareClass) -> Option<&[String]> {
        if !class.tracks_devices() {
            return None;
        }
        Some(self.devices.get(&class).map(Vec::as_slice).unwrap_or(&[]))
    }

    pub fn failure(&self, class: HardwareClass) -> Option<&ProviderError> {
        self.failures.get(&class)
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Render all classes for the terminal
    pub fn display(&self) -> String {
        let mut output = String::new();

        for class in HardwareClass::ALL {
            output.push_str(&format!(
                "{}\n",
                format!("== {} ==", class.component_name()).bright_cyan().bold()
            ));

            if let Some(error) = self.failure(class) {
                output.push_str(&format!("  {}\n", error.to_string().bright_red()));
            }

            let records = self.records(class);
            let width = records.iter().map(|r| r.name.len()).max().unwrap_or(0);
            for record in records {
                output.push_str(&format!(
                    "  {:<width$}  {}\n",
                    record.name,
                    record.value.bright_white(),
                    width = width
                ));
            }

            if let Some(devices) = self.devices(class) {
                if !devices.is_empty() {
                    output.push_str(&format!(
                        "  {} {}\n",
                        "Devices:".dimmed(),
                        devices.join(", ")
                    ));
                }
            }
            output.push('\n');
        }

        output
    }
}

/// Runs the provider and normalizer across all hardware classes
#[derive(Clone)]
pub struct InventoryCollector {
    provider: Arc<dyn HardwareQueryProvider>,
    normalizer: ComponentNormalizer,
    error_log: Arc<DiagnosticLog>,
}

impl InventoryCollector {
    pub fn new(provider: Arc<dyn HardwareQueryProvider>, error_log: Arc<DiagnosticLog>) -> Self {
        Self {
            provider,
            normalizer: ComponentNormalizer::new(),
            error_log,
        }
    }

    /// Scan every class, handing each update to `emit` as soon as it exists
    ///
    /// Provider failures are logged per class and never stop the scan.
    pub fn scan(&self, mut emit: impl FnMut(InventoryUpdate)) {
        for class in HardwareClass::ALL {
            match self.provider.query(class.selector()) {
                Ok(bags) => {
                    tracing::debug!(%class, bags = bags.len(), "hardware class queried");
                    for bag in &bags {
                        self.collect_bag(class, bag, &mut emit);
                    }
                }
                Err(error) => {
                    let message = failure_message(class, &error);
                    tracing::warn!(%class, "{message}");
                    self.error_log.record(&message);
                    emit(InventoryUpdate::ClassFailed { class, error });
                }
            }
        }
        emit(InventoryUpdate::Finished);
    }

    fn collect_bag(
        &self,
        class: HardwareClass,
        bag: &RawPropertyBag,
        emit: &mut impl FnMut(InventoryUpdate),
    ) {
        let normalized = self.normalizer.normalize(class, bag);
        for missing in &normalized.missing {
            tracing::debug!(%class, property = missing.property, "property missing");
            self.error_log.record(&missing.to_string());
        }

        emit(InventoryUpdate::Records {
            class,
            records: normalized.records,
        });

        if class.tracks_devices() {
            emit(InventoryUpdate::Device {
                class,
                name: device_name(bag),
            });
        }
    }

    /// Synchronous scan straight into a fresh [`Inventory`]
    #[cfg(test)]
    pub fn collect_all(&self) -> Inventory {
        let mut inventory = Inventory::new();
        self.scan(|update| inventory.apply(update));
        inventory
    }

    /// Start a scan on the blocking pool; updates arrive on the returned channel
    pub fn spawn(&self) -> mpsc::UnboundedReceiver<InventoryUpdate> {
        let (tx, rx) = mpsc::unbounded_channel();
        let collector = self.clone();
        tokio::task::spawn_blocking(move || {
            collector.scan(|update| {
                // Receiver gone means nobody is displaying the inventory anymore.
                let _ = tx.send(update);
            });
        });
        rx
    }
}

/// Drain a scan's updates into an inventory until it finishes
pub async fn commit_updates(
    mut updates: mpsc::UnboundedReceiver<InventoryUpdate>,
    inventory: &mut Inventory,
) {
    while let Some(update) = updates.recv().await {
        let finished = update == InventoryUpdate::Finished;
        inventory.apply(update);
        if finished {
            break;
        }
    }
}

fn device_name(bag: &RawPropertyBag) -> String {
    bag.get("Name")
        .and_then(Option::as_ref)
        .map(|v| v.to_string())
        .unwrap_or_else(|| "Unknown".to_string())
}

fn failure_message(class: HardwareClass, error: &ProviderError) -> String {
    let component = class.component_name();
    match error {
        ProviderError::Unavailable(msg) => format!("Error loading {component} info: {msg}"),
        ProviderError::AccessDenied(msg) => {
            format!("Access error loading {component} info: {msg}")
        }
        ProviderError::Unexpected(msg) => {
            format!("Unexpected error loading {component} info: {msg}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::provider::StaticProvider;
    use crate::hardware::PropertyValue;
    use tempfile::TempDir;

    fn bag(pairs: &[(&str, &str)]) -> RawPropertyBag {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), Some(PropertyValue::from(*v))))
            .collect()
    }

    fn full_provider() -> StaticProvider {
        StaticProvider::new()
            .with_bags(
                "Win32_Processor",
                vec![bag(&[("Name", "Intel(R) Core(TM) i7-9700K"), ("MaxClockSpeed", "3600")])],
            )
            .with_bags(
                "Win32_PhysicalMemory",
                vec![
                    bag(&[("Name", "DIMM A1"), ("Capacity", "8589934592")]),
                    bag(&[("Name", "DIMM B1"), ("Capacity", "17179869184")]),
                ],
            )
            .with_bags(
                "Win32_BaseBoard",
                vec![bag(&[("Product", "Z390 AORUS PRO")])],
            )
            .with_bags(
                "Win32_DiskDrive",
                vec![bag(&[("Name", "\\\\.\\PHYSICALDRIVE0"), ("Size", "500105249280")])],
            )
            .with_bags(
                "Win32_VideoController",
                vec![bag(&[("Name", "NVIDIA GeForce RTX 2070"), ("AdapterRAM", "4293918720")])],
            )
            .with_bags(
                "Win32_OperatingSystem",
                vec![bag(&[("Caption", "Microsoft Windows 10 Pro"), ("FreePhysicalMemory", "8388608")])],
            )
    }

    fn build_collector(provider: StaticProvider, dir: &TempDir) -> (InventoryCollector, Arc<DiagnosticLog>) {
        let error_log = Arc::new(DiagnosticLog::new(dir.path().join("error_log.txt")));
        (
            InventoryCollector::new(Arc::new(provider), Arc::clone(&error_log)),
            error_log,
        )
    }

    #[test]
    fn last_bag_wins_while_device_names_accumulate() {
        let dir = TempDir::new().unwrap();
        let (collector, _) = build_collector(full_provider(), &dir);

        let inventory = collector.collect_all();

        let ram = inventory.records(HardwareClass::MemoryModule);
        assert!(ram.contains(&SensorRecord::new("Name", "DIMM B1")));
        assert!(ram.contains(&SensorRecord::new("Capacity", "16.00 GB")));
        assert!(!ram.iter().any(|r| r.value == "DIMM A1"));
        assert_eq!(
            inventory.devices(HardwareClass::MemoryModule).unwrap(),
            &["DIMM A1".to_string(), "DIMM B1".to_string()]
        );
        assert!(inventory.is_finished());
    }

    #[test]
    fn single_unit_classes_have_no_device_list() {
        let dir = TempDir::new().unwrap();
        let (collector, _) = build_collector(full_provider(), &dir);
        let inventory = collector.collect_all();

        assert!(inventory.devices(HardwareClass::Processor).is_none());
        assert!(inventory.devices(HardwareClass::OperatingSystem).is_none());
        assert_eq!(
            inventory.records(HardwareClass::Processor)[1],
            SensorRecord::new("MaxClockSpeed", "3600 GHz")
        );
    }

    #[test]
    fn one_failing_class_does_not_stop_the_others() {
        let dir = TempDir::new().unwrap();
        let provider = full_provider().with_error(
            "Win32_DiskDrive",
            ProviderError::AccessDenied("requires elevation".into()),
        );
        let (collector, error_log) = build_collector(provider, &dir);

        let inventory = collector.collect_all();

        assert!(inventory.records(HardwareClass::StorageDrive).is_empty());
        assert!(matches!(
            inventory.failure(HardwareClass::StorageDrive),
            Some(ProviderError::AccessDenied(_))
        ));
        for class in HardwareClass::ALL
            .into_iter()
            .filter(|c| *c != HardwareClass::StorageDrive)
        {
            assert!(!inventory.records(class).is_empty(), "{class} is empty");
        }

        let errors = error_log.read_all().unwrap();
        assert!(errors.contains("Access error loading Hard Drive info: requires elevation"));
    }

    #[test]
    fn total_provider_failure_yields_empty_inventory_and_full_error_log() {
        let dir = TempDir::new().unwrap();
        let provider = HardwareClass::ALL.into_iter().fold(StaticProvider::new(), |p, class| {
            p.with_error(class.selector(), ProviderError::Unavailable("RPC server unavailable".into()))
        });
        let (collector, error_log) = build_collector(provider, &dir);

        let inventory = collector.collect_all();

        for class in HardwareClass::ALL {
            assert!(inventory.records(class).is_empty());
        }
        assert_eq!(error_log.read_all().unwrap().lines().count(), 6);
        assert!(inventory.is_finished());
    }

    #[test]
    fn missing_properties_go_to_error_log() {
        let dir = TempDir::new().unwrap();
        let provider = StaticProvider::new().with_bags("Win32_BaseBoard", vec![bag(&[("Product", "B550")])]);
        let (collector, error_log) = build_collector(provider, &dir);

        collector.collect_all();

        let errors = error_log.read_all().unwrap();
        assert!(errors.contains("Property Manufacturer not found in Motherboard data."));
        assert!(!errors.contains("Property Product not found"));
        // Name, Manufacturer, SerialNumber, Version, Status
        assert_eq!(errors.lines().count(), 5);
    }

    #[test]
    fn bag_without_name_gets_placeholder_device() {
        let dir = TempDir::new().unwrap();
        let provider = StaticProvider::new()
            .with_bags("Win32_VideoController", vec![bag(&[("VideoProcessor", "GA104")])]);
        let (collector, _) = build_collector(provider, &dir);

        let inventory = collector.collect_all();
        assert_eq!(
            inventory.devices(HardwareClass::GraphicsAdapter).unwrap(),
            &["Unknown".to_string()]
        );
    }

    #[tokio::test]
    async fn background_scan_commits_in_emission_order() {
        let dir = TempDir::new().unwrap();
        let (collector, _) = build_collector(full_provider(), &dir);

        let mut updates = collector.spawn();
        let mut received = Vec::new();
        while let Some(update) = updates.recv().await {
            received.push(update);
        }

        let mut direct = Vec::new();
        collector.scan(|update| direct.push(update));
        assert_eq!(received, direct);
        assert_eq!(received.last(), Some(&InventoryUpdate::Finished));
    }

    #[tokio::test]
    async fn commit_updates_builds_the_same_inventory() {
        let dir = TempDir::new().unwrap();
        let (collector, _) = build_collector(full_provider(), &dir);

        let mut inventory = Inventory::new();
        commit_updates(collector.spawn(), &mut inventory).await;

        let expected = collector.collect_all();
        for class in HardwareClass::ALL {
            assert_eq!(inventory.records(class), expected.records(class));
            assert_eq!(inventory.devices(class), expected.devices(class));
        }
        assert!(inventory.display().contains("Z390 AORUS PRO"));
    }

    #[tokio::test]
    async fn scan_cut_short_is_not_finished() {
        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(InventoryUpdate::Device {
            class: HardwareClass::StorageDrive,
            name: "/dev/sda".into(),
        })
        .unwrap();
        drop(tx);

        let mut inventory = Inventory::new();
        commit_updates(rx, &mut inventory).await;

        assert!(!inventory.is_finished());
        assert_eq!(
            inventory.devices(HardwareClass::StorageDrive).unwrap(),
            &["/dev/sda".to_string()]
        );
    }
}
