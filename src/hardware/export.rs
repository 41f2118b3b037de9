//! Raw inventory export
//!
//! Dumps every property of every bag exactly as the provider returned it,
//! bypassing normalization. Report layout:
//!
//! ```text
//! CPU:
//! Name: Intel(R) Core(TM) i7-9700K
//! MaxClockSpeed: 3600
//!
//! RAM:
//! ...
//! ```

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use super::provider::HardwareQueryProvider;
use super::HardwareClass;
use crate::diagnostic_log::DiagnosticLog;

pub struct ExportFormatter<'a> {
    provider: &'a dyn HardwareQueryProvider,
    error_log: &'a DiagnosticLog,
}

impl<'a> ExportFormatter<'a> {
    pub fn new(provider: &'a dyn HardwareQueryProvider, error_log: &'a DiagnosticLog) -> Self {
        Self {
            provider,
            error_log,
        }
    }

    /// Re-query all classes and serialize every property verbatim
    pub fn export_raw_inventory(&self) -> String {
        let mut report = String::new();
        for class in HardwareClass::ALL {
            report.push_str(&self.component_block(class));
        }
        report
    }

    fn component_block(&self, class: HardwareClass) -> String {
        let bags = match self.provider.query(class.selector()) {
            Ok(bags) => bags,
            Err(err) => {
                let message = format!("Error exporting {} info: {}", class.component_name(), err);
                tracing::warn!("{message}");
                self.error_log.record(&message);
                return String::new();
            }
        };

        let mut block = String::new();
        for bag in bags {
            block.push_str(&format!("{}:\n", class.component_name()));
            for (name, value) in &bag {
                let value = value.as_ref().map(|v| v.to_string()).unwrap_or_default();
                block.push_str(&format!("{}: {}\n", name, value));
            }
            block.push('\n');
        }
        block
    }

    /// Write the report to `path`, replacing any previous export
    pub fn write_report(&self, path: &Path) -> Result<()> {
        let report = self.export_raw_inventory();
        fs::write(path, report)
            .with_context(|| format!("Failed to write components report to {}", path.display()))?;
        tracing::info!(path = %path.display(), "components report exported");
        Ok(())
    }
}
