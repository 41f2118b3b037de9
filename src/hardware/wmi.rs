//! WMI provider backed by the `wmic` command-line tool
//!
//! Runs `wmic path <Class> [where "<cond>"] get /format:list` and parses the
//! blank-line separated `Key=Value` instances it prints.

use std::io::ErrorKind;
use std::process::Command;

use super::provider::{split_selector, HardwareQueryProvider, ProviderError};
use super::{PropertyValue, RawPropertyBag};

/// Printed by wmic when the query matched nothing
const NO_INSTANCES: &str = "No Instance(s) Available.";

#[derive(Debug, Clone)]
pub struct WmicProvider {
    program: String,
}

impl Default for WmicProvider {
    fn default() -> Self {
        Self {
            program: "wmic".to_string(),
        }
    }
}

impl WmicProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn args(selector: &str) -> Vec<String> {
        let (class, condition) = split_selector(selector);
        let mut args = vec!["path".to_string(), class.to_string()];
        if let Some(condition) = condition {
            args.push("where".to_string());
            args.push(format!("\"{}\"", condition));
        }
        args.push("get".to_string());
        args.push("/format:list".to_string());
        args
    }
}

impl HardwareQueryProvider for WmicProvider {
    fn query(&self, selector: &str) -> Result<Vec<RawPropertyBag>, ProviderError> {
        let output = Command::new(&self.program)
            .args(Self::args(selector))
            .output()
            .map_err(|err| match err.kind() {
                ErrorKind::NotFound => {
                    ProviderError::Unavailable(format!("{} not found", self.program))
                }
                ErrorKind::PermissionDenied => ProviderError::AccessDenied(err.to_string()),
                _ => ProviderError::Unexpected(err.to_string()),
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        if !output.status.success() || (stdout.trim().is_empty() && !stderr.trim().is_empty()) {
            if stderr.contains(NO_INSTANCES) || stdout.contains(NO_INSTANCES) {
                return Ok(Vec::new());
            }
            return Err(classify_failure(&stderr));
        }

        Ok(parse_list_output(&stdout))
    }
}

/// Map wmic's error text onto the provider error taxonomy
pub fn classify_failure(stderr: &str) -> ProviderError {
    let message = stderr
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    let lower = message.to_ascii_lowercase();

    if lower.contains("access denied") || lower.contains("0x80041003") {
        ProviderError::AccessDenied(message)
    } else if lower.contains("rpc server is unavailable")
        || lower.contains("0x800706ba")
        || lower.contains("0x80041014")
    {
        ProviderError::Unavailable(message)
    } else {
        ProviderError::Unexpected(message)
    }
}

/// Parse `/format:list` output into one bag per instance
///
/// Empty values become nulls. wmic terminates lines with `\r\r\n`, which the
/// trimming below absorbs.
pub fn parse_list_output(output: &str) -> Vec<RawPropertyBag> {
    let mut bags = Vec::new();
    let mut current = RawPropertyBag::new();

    for line in output.lines() {
        let line = line.trim();
        if line.is_empty() {
            if !current.is_empty() {
                bags.push(std::mem::take(&mut current));
            }
            continue;
        }

        if let Some((key, value)) = line.split_once('=') {
            let value = value.trim();
            current.insert(
                key.trim().to_string(),
                (!value.is_empty()).then(|| PropertyValue::from(value)),
            );
        }
    }

    if !current.is_empty() {
        bags.push(current);
    }
    bags
}
