//! Cross-platform provider
//!
//! Answers WMI class selectors with WMI-named properties gathered from:
//! - Cross-platform: sysinfo crate (CPU, memory, disks, OS)
//! - Linux: /proc/cpuinfo, cpufreq and cache sysfs, DMI sysfs, /sys/block
//! - Tools when present: dmidecode (memory modules), nvidia-smi / lspci (GPUs),
//!   journalctl (error events)
//!
//! Selectors outside the six hardware classes (other than error events)
//! return no bags.

use chrono::{DateTime, Local};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use sysinfo::{DiskKind, Disks, System, Users};

use super::provider::{split_selector, HardwareQueryProvider, ProviderError};
use super::{HardwareClass, PropertyValue, RawPropertyBag};

const EVENT_LOG_SELECTOR: &str = "Win32_NTLogEvent";
const MAX_ERROR_EVENTS: usize = 50;

#[derive(Debug, Clone)]
pub struct SysinfoProvider {
    sys_root: PathBuf,
    proc_root: PathBuf,
}

impl Default for SysinfoProvider {
    fn default() -> Self {
        Self {
            sys_root: PathBuf::from("/sys"),
            proc_root: PathBuf::from("/proc"),
        }
    }
}

impl SysinfoProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn processor(&self) -> Vec<RawPropertyBag> {
        let mut sys = System::new();
        sys.refresh_cpu_all();

        let cpus = sys.cpus();
        let Some(first) = cpus.first() else {
            return Vec::new();
        };

        let cpuinfo = fs::read_to_string(self.proc_root.join("cpuinfo")).unwrap_or_default();
        let cpu_dir = self.sys_root.join("devices/system/cpu/cpu0");
        let max_clock = read_trimmed(&cpu_dir.join("cpufreq/cpuinfo_max_freq"))
            .and_then(|khz| khz.parse::<u64>().ok())
            .map(|khz| khz / 1000) // kHz to MHz
            .unwrap_or_else(|| first.frequency());
        let (l2, l3) = read_cache_sizes(&cpu_dir.join("cache"));

        let mut bag = RawPropertyBag::new();
        put(&mut bag, "Role", Some("CPU"));
        put(&mut bag, "Name", Some(first.brand().trim()));
        put(&mut bag, "Caption", processor_caption(&cpuinfo));
        put(&mut bag, "Manufacturer", Some(first.vendor_id()));
        put::<&str>(&mut bag, "SocketDesignation", None);
        put(&mut bag, "MaxClockSpeed", Some(max_clock));
        put(
            &mut bag,
            "NumberOfCores",
            Some(physical_core_count(&cpuinfo).unwrap_or(cpus.len() as u64)),
        );
        put(&mut bag, "NumberOfLogicalProcessors", Some(cpus.len() as u64));
        put(&mut bag, "L2CacheSize", l2);
        put(&mut bag, "L3CacheSize", l3);
        put(&mut bag, "Status", Some("OK"));
        vec![bag]
    }

    fn memory_modules(&self) -> Vec<RawPropertyBag> {
        if let Some(output) = run_tool("dmidecode", &["-t", "17"]) {
            let modules = parse_dmidecode_memory(&output);
            if !modules.is_empty() {
                return modules;
            }
        }

        // Without dmidecode access only the aggregate is known.
        let mut sys = System::new();
        sys.refresh_memory();
        let mut bag = RawPropertyBag::new();
        put(&mut bag, "Name", Some("Physical Memory"));
        put(&mut bag, "Capacity", Some(sys.total_memory()));
        vec![bag]
    }

    fn mainboard(&self) -> Vec<RawPropertyBag> {
        read_baseboard(&self.sys_root.join("class/dmi/id"))
            .into_iter()
            .collect()
    }

    fn storage_drives(&self) -> Vec<RawPropertyBag> {
        let drives = read_block_devices(&self.sys_root.join("block"));
        if !drives.is_empty() {
            return drives;
        }

        let disks = Disks::new_with_refreshed_list();
        let mut seen = Vec::new();
        let mut bags = Vec::new();
        for disk in disks.list() {
            let name = disk.name().to_string_lossy().to_string();
            if seen.contains(&name) {
                continue;
            }
            seen.push(name.clone());

            let description = match disk.kind() {
                DiskKind::SSD => "SSD disk drive",
                DiskKind::HDD => "HDD disk drive",
                _ => "Disk drive",
            };
            let mut bag = RawPropertyBag::new();
            put(&mut bag, "Name", Some(name.as_str()));
            put(&mut bag, "Model", Some(name.as_str()));
            put(&mut bag, "Description", Some(description));
            put(
                &mut bag,
                "InterfaceType",
                disk.is_removable().then_some("USB"),
            );
            put(&mut bag, "Size", Some(disk.total_space()));
            put(&mut bag, "Status", Some("OK"));
            bags.push(bag);
        }
        bags
    }

    fn graphics_adapters(&self) -> Vec<RawPropertyBag> {
        if let Some(output) = run_tool(
            "nvidia-smi",
            &[
                "--query-gpu=name,memory.total,driver_version",
                "--format=csv,noheader,nounits",
            ],
        ) {
            let adapters = parse_nvidia_smi(&output);
            if !adapters.is_empty() {
                return adapters;
            }
        }

        run_tool("lspci", &[])
            .map(|output| parse_lspci(&output))
            .unwrap_or_default()
    }

    fn operating_system(&self) -> Vec<RawPropertyBag> {
        let mut sys = System::new();
        sys.refresh_memory();
        let users = Users::new_with_refreshed_list();

        let caption = System::long_os_version().or_else(System::name);
        let boot_time = DateTime::from_timestamp(System::boot_time() as i64, 0)
            .map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string());

        let mut bag = RawPropertyBag::new();
        put(&mut bag, "Caption", caption);
        put(&mut bag, "Manufacturer", Some(System::distribution_id()));
        put(&mut bag, "CSName", System::host_name());
        put(&mut bag, "OSArchitecture", Some(std::env::consts::ARCH));
        // WMI reports free memory in kilobytes.
        put(&mut bag, "FreePhysicalMemory", Some(sys.available_memory() / 1024));
        put(
            &mut bag,
            "FreeVirtualMemory",
            Some((sys.available_memory() + sys.free_swap()) / 1024),
        );
        put(&mut bag, "NumberOfUsers", Some(users.list().len() as u64));
        put::<&str>(&mut bag, "RegisteredUser", None);
        put::<&str>(&mut bag, "SerialNumber", None);
        put::<&str>(&mut bag, "InstallDate", None);
        put::<&str>(&mut bag, "SystemDirectory", None);
        put(&mut bag, "Version", System::kernel_version());
        put(&mut bag, "Status", Some("OK"));
        put(&mut bag, "LastBootUpTime", boot_time);
        vec![bag]
    }

    fn error_events(&self) -> Vec<RawPropertyBag> {
        let limit = MAX_ERROR_EVENTS.to_string();
        run_tool(
            "journalctl",
            &["-p", "err", "-b", "--no-pager", "-o", "short-iso", "-n", &limit],
        )
        .map(|output| parse_journal_errors(&output))
        .unwrap_or_default()
    }
}

impl HardwareQueryProvider for SysinfoProvider {
    fn query(&self, selector: &str) -> Result<Vec<RawPropertyBag>, ProviderError> {
        let (class, _) = split_selector(selector);
        if class.eq_ignore_ascii_case(EVENT_LOG_SELECTOR) {
            return Ok(self.error_events());
        }

        let bags = match HardwareClass::from_selector(class) {
            Some(HardwareClass::Processor) => self.processor(),
            Some(HardwareClass::MemoryModule) => self.memory_modules(),
            Some(HardwareClass::Mainboard) => self.mainboard(),
            Some(HardwareClass::StorageDrive) => self.storage_drives(),
            Some(HardwareClass::GraphicsAdapter) => self.graphics_adapters(),
            Some(HardwareClass::OperatingSystem) => self.operating_system(),
            None => Vec::new(),
        };
        Ok(bags)
    }
}

fn put<V: Into<PropertyValue>>(bag: &mut RawPropertyBag, key: &str, value: Option<V>) {
    bag.insert(key.to_string(), value.map(Into::into));
}

fn read_trimmed(path: &Path) -> Option<String> {
    let content = fs::read_to_string(path).ok()?;
    let trimmed = content.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Run a helper tool, returning stdout on success
fn run_tool(program: &str, args: &[&str]) -> Option<String> {
    let output = Command::new(program).args(args).output().ok()?;
    if !output.status.success() {
        tracing::debug!(program, status = %output.status, "hardware tool failed");
        return None;
    }
    Some(String::from_utf8_lossy(&output.stdout).to_string())
}

/// "x86_64 Family 6 Model 158 Stepping 10" from /proc/cpuinfo
fn processor_caption(cpuinfo: &str) -> Option<String> {
    let field = |name: &str| {
        cpuinfo
            .lines()
            .filter_map(|line| line.split_once(':'))
            .find(|(key, _)| key.trim() == name)
            .map(|(_, value)| value.trim().to_string())
    };

    let family = field("cpu family")?;
    let model = field("model")?;
    let stepping = field("stepping")?;
    Some(format!(
        "{} Family {} Model {} Stepping {}",
        std::env::consts::ARCH,
        family,
        model,
        stepping
    ))
}

/// Distinct (physical id, core id) pairs in /proc/cpuinfo
fn physical_core_count(cpuinfo: &str) -> Option<u64> {
    let mut cores = std::collections::BTreeSet::new();
    let mut package = None;
    for line in cpuinfo.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        match key.trim() {
            "physical id" => package = Some(value.trim().to_string()),
            "core id" => {
                cores.insert((package.clone(), value.trim().to_string()));
            }
            _ => {}
        }
    }
    (!cores.is_empty()).then_some(cores.len() as u64)
}

/// L2 and L3 sizes in KB from `.../cpu0/cache/index*/{level,size}`
fn read_cache_sizes(cache_dir: &Path) -> (Option<u64>, Option<u64>) {
    let mut l2 = None;
    let mut l3 = None;

    let Ok(entries) = fs::read_dir(cache_dir) else {
        return (l2, l3);
    };
    for entry in entries.flatten() {
        if !entry.file_name().to_string_lossy().starts_with("index") {
            continue;
        }
        let path = entry.path();
        let level = read_trimmed(&path.join("level"));
        let size = read_trimmed(&path.join("size")).and_then(|s| parse_cache_size_kb(&s));
        match level.as_deref() {
            Some("2") => l2 = size,
            Some("3") => l3 = size,
            _ => {}
        }
    }

    (l2, l3)
}

fn parse_cache_size_kb(size: &str) -> Option<u64> {
    let size = size.trim();
    if let Some(kb) = size.strip_suffix('K') {
        kb.parse().ok()
    } else if let Some(mb) = size.strip_suffix('M') {
        mb.parse::<u64>().ok().map(|mb| mb * 1024)
    } else {
        size.parse().ok()
    }
}

/// Base board bag from DMI sysfs; `None` when no board attribute is readable
fn read_baseboard(dmi_dir: &Path) -> Option<RawPropertyBag> {
    let product = read_trimmed(&dmi_dir.join("board_name"));
    let manufacturer = read_trimmed(&dmi_dir.join("board_vendor"));
    let serial = read_trimmed(&dmi_dir.join("board_serial"));
    let version = read_trimmed(&dmi_dir.join("board_version"));

    if product.is_none() && manufacturer.is_none() && serial.is_none() && version.is_none() {
        return None;
    }

    let mut bag = RawPropertyBag::new();
    put(&mut bag, "Name", Some("Base Board"));
    put(&mut bag, "Product", product);
    put(&mut bag, "Manufacturer", manufacturer);
    put(&mut bag, "SerialNumber", serial);
    put(&mut bag, "Version", version);
    put(&mut bag, "Status", Some("OK"));
    Some(bag)
}

/// Physical drives from /sys/block, skipping virtual devices
fn read_block_devices(block_dir: &Path) -> Vec<RawPropertyBag> {
    const VIRTUAL_PREFIXES: [&str; 6] = ["loop", "ram", "zram", "dm-", "md", "sr"];

    let Ok(entries) = fs::read_dir(block_dir) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .flatten()
        .map(|e| e.file_name().to_string_lossy().to_string())
        .filter(|name| !VIRTUAL_PREFIXES.iter().any(|p| name.starts_with(p)))
        .collect();
    names.sort();

    let mut bags = Vec::new();
    for name in names {
        let dev = block_dir.join(&name);
        // Size is always reported in 512-byte sectors.
        let Some(sectors) = read_trimmed(&dev.join("size")).and_then(|s| s.parse::<u64>().ok())
        else {
            continue;
        };
        let Some(size_bytes) = sectors.checked_mul(512).filter(|&bytes| bytes > 0) else {
            continue;
        };

        let removable = read_trimmed(&dev.join("removable")).as_deref() == Some("1");
        let rotational = read_trimmed(&dev.join("queue/rotational"));
        let description = match rotational.as_deref() {
            Some("0") => "SSD disk drive",
            Some("1") => "HDD disk drive",
            _ => "Disk drive",
        };
        let interface = if name.starts_with("nvme") {
            Some("NVMe")
        } else if removable {
            Some("USB")
        } else if name.starts_with("sd") {
            Some("SCSI")
        } else {
            None
        };
        let firmware = read_trimmed(&dev.join("device/firmware_rev"))
            .or_else(|| read_trimmed(&dev.join("device/rev")));

        let mut bag = RawPropertyBag::new();
        put(&mut bag, "Name", Some(format!("/dev/{}", name)));
        put(&mut bag, "Model", read_trimmed(&dev.join("device/model")));
        put(&mut bag, "Description", Some(description));
        put(&mut bag, "InterfaceType", interface);
        put(&mut bag, "Size", Some(size_bytes));
        put(&mut bag, "FirmwareRevision", firmware);
        put(&mut bag, "Status", Some("OK"));
        bags.push(bag);
    }
    bags
}

/// Memory devices from `dmidecode -t 17`; empty slots are skipped
fn parse_dmidecode_memory(output: &str) -> Vec<RawPropertyBag> {
    let mut bags = Vec::new();

    for block in output.split("Memory Device").skip(1) {
        let field = |name: &str| {
            block
                .lines()
                .filter_map(|line| line.split_once(':'))
                .find(|(key, _)| key.trim() == name)
                .map(|(_, value)| value.trim().to_string())
                .filter(|v| !v.is_empty() && v != "Not Specified" && v != "Unknown")
        };

        let Some(capacity) = field("Size").and_then(|s| parse_dmi_size_bytes(&s)) else {
            continue;
        };

        let clock = field("Configured Memory Speed")
            .or_else(|| field("Configured Clock Speed"))
            .and_then(|s| s.split_whitespace().next()?.parse::<u64>().ok());
        let millivolts = field("Configured Voltage").and_then(|s| {
            let volts = s.split_whitespace().next()?.parse::<f64>().ok()?;
            Some((volts * 1000.0).round() as u64)
        });
        let rank = field("Rank").and_then(|s| s.parse::<u64>().ok());

        let mut bag = RawPropertyBag::new();
        put(&mut bag, "Name", Some("Physical Memory"));
        put(&mut bag, "Manufacturer", field("Manufacturer"));
        put(&mut bag, "BankLabel", field("Bank Locator"));
        put(&mut bag, "DeviceLocator", field("Locator"));
        put(&mut bag, "PartNumber", field("Part Number"));
        put(&mut bag, "Capacity", Some(capacity));
        put(&mut bag, "Attributes", rank);
        put(&mut bag, "ConfiguredClockSpeed", clock);
        put(&mut bag, "ConfiguredVoltage", millivolts);
        put(&mut bag, "SerialNumber", field("Serial Number"));
        bags.push(bag);
    }

    bags
}

/// "16 GB" / "8192 MB" to bytes; "No Module Installed" yields `None`
fn parse_dmi_size_bytes(size: &str) -> Option<u64> {
    let mut parts = size.split_whitespace();
    let amount = parts.next()?.parse::<u64>().ok()?;
    let multiplier = match parts.next()? {
        "kB" | "KB" => 1024,
        "MB" => 1024 * 1024,
        "GB" => 1024 * 1024 * 1024,
        "TB" => 1024 * 1024 * 1024 * 1024,
        _ => return None,
    };
    amount.checked_mul(multiplier)
}

/// `name, memory.total [MiB], driver_version` rows
fn parse_nvidia_smi(output: &str) -> Vec<RawPropertyBag> {
    output
        .lines()
        .filter_map(|line| {
            let parts: Vec<&str> = line.split(", ").map(str::trim).collect();
            if parts.len() < 3 || parts[0].is_empty() {
                return None;
            }
            let name = if parts[0].starts_with("NVIDIA") {
                parts[0].to_string()
            } else {
                format!("NVIDIA {}", parts[0])
            };
            let vram_bytes = parts[1]
                .parse::<u64>()
                .ok()
                .and_then(|mib| mib.checked_mul(1024 * 1024));

            let mut bag = RawPropertyBag::new();
            put(&mut bag, "Name", Some(name.as_str()));
            put(&mut bag, "VideoProcessor", Some(name.as_str()));
            put(&mut bag, "AdapterCompatibility", Some("NVIDIA"));
            put::<&str>(&mut bag, "AdapterDACType", None);
            put(&mut bag, "AdapterRAM", vram_bytes);
            put(&mut bag, "DriverVersion", Some(parts[2]));
            put(&mut bag, "Status", Some("OK"));
            Some(bag)
        })
        .collect()
}

/// Display controllers from plain `lspci` output
///
/// Format: "01:00.0 VGA compatible controller: NVIDIA Corporation GA104 [GeForce RTX 3070] (rev a1)"
fn parse_lspci(output: &str) -> Vec<RawPropertyBag> {
    const DISPLAY_CLASSES: [&str; 3] = [
        "VGA compatible controller",
        "3D controller",
        "Display controller",
    ];

    output
        .lines()
        .filter(|line| DISPLAY_CLASSES.iter().any(|c| line.contains(c)))
        .filter_map(|line| {
            let (_, description) = line.split_once(": ")?;
            let name = match description.rfind(" (rev") {
                Some(idx) => &description[..idx],
                None => description,
            }
            .trim();

            let vendor = if name.contains("NVIDIA") {
                "NVIDIA"
            } else if name.contains("AMD") || name.contains("ATI") || name.contains("Radeon") {
                "Advanced Micro Devices, Inc."
            } else if name.contains("Intel") {
                "Intel Corporation"
            } else {
                name.split_whitespace().next().unwrap_or("Unknown")
            };

            let mut bag = RawPropertyBag::new();
            put(&mut bag, "Name", Some(name));
            put(&mut bag, "VideoProcessor", Some(name));
            put(&mut bag, "AdapterCompatibility", Some(vendor));
            put(&mut bag, "Status", Some("OK"));
            Some(bag)
        })
        .collect()
}

/// `journalctl -o short-iso` lines as error events
fn parse_journal_errors(output: &str) -> Vec<RawPropertyBag> {
    output
        .lines()
        .filter(|line| !line.starts_with("-- "))
        .filter_map(|line| {
            let (timestamp, rest) = line.split_once(' ')?;
            let message = rest.split_once(": ").map(|(_, m)| m).unwrap_or(rest).trim();
            if message.is_empty() {
                return None;
            }

            let mut bag = RawPropertyBag::new();
            put(&mut bag, "Type", Some("Error"));
            put(&mut bag, "TimeGenerated", Some(timestamp));
            put(&mut bag, "Message", Some(message));
            Some(bag)
        })
        .collect()
}
