//! Check the system for errors
//!
//! Reports the last boot time and the error entries from the system event
//! log. User-triggered only; nothing here runs as part of a scan.

use crate::diagnostic_log::DiagnosticLog;
use crate::hardware::provider::{HardwareQueryProvider, ProviderError};
use crate::hardware::{HardwareClass, PropertyValue, RawPropertyBag};

pub const ERROR_EVENTS_SELECTOR: &str = "Win32_NTLogEvent where Type='Error'";

/// Property text; a missing or null value aborts the check
fn required(bag: &RawPropertyBag, name: &str) -> Result<String, ProviderError> {
    bag.get(name)
        .and_then(Option::as_ref)
        .map(PropertyValue::to_string)
        .ok_or_else(|| ProviderError::Unexpected(format!("{name} is null")))
}

fn note(log: &DiagnosticLog, message: &str) {
    tracing::info!(target: "heartpc::syscheck", "{message}");
    log.record(message);
}

/// Lines are logged as soon as they are read, so a later failure keeps them
fn log_findings(provider: &dyn HardwareQueryProvider, log: &DiagnosticLog) -> Result<(), ProviderError> {
    for os in provider.query(HardwareClass::OperatingSystem.selector())? {
        note(log, &format!("Last Boot Up Time: {}", required(&os, "LastBootUpTime")?));
    }

    let events = provider.query(ERROR_EVENTS_SELECTOR)?;
    tracing::debug!(count = events.len(), "system error events found");
    for event in events {
        let message = required(&event, "Message")?;
        let time_generated = required(&event, "TimeGenerated")?;
        note(log, &format!("Error: {message} at {time_generated}"));
    }

    Ok(())
}

/// Log boot time and system error events; returns whether the check completed
pub fn check_system_errors(provider: &dyn HardwareQueryProvider, log: &DiagnosticLog) -> bool {
    note(log, "Checking system for errors...");

    match log_findings(provider, log) {
        Ok(()) => {
            note(log, "System error check completed.");
            true
        }
        Err(err) => {
            tracing::warn!("system error check failed: {err}");
            log.record(&format!("System error check failed: {err}"));
            false
        }
    }
}
