//! Hardware query boundary
//!
//! A provider answers `query(selector)` with zero or more raw property bags.
//! Selectors are WMI class names, optionally followed by a `where` clause.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

use super::RawPropertyBag;

/// Hardware-query layer errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("hardware query service unavailable: {0}")]
    Unavailable(String),

    #[error("access denied: {0}")]
    AccessDenied(String),

    #[error("{0}")]
    Unexpected(String),
}

/// Pluggable source of hardware information
pub trait HardwareQueryProvider: Send + Sync {
    fn query(&self, selector: &str) -> Result<Vec<RawPropertyBag>, ProviderError>;
}

impl<P: HardwareQueryProvider + ?Sized> HardwareQueryProvider for Box<P> {
    fn query(&self, selector: &str) -> Result<Vec<RawPropertyBag>, ProviderError> {
        (**self).query(selector)
    }
}

impl<P: HardwareQueryProvider + ?Sized> HardwareQueryProvider for std::sync::Arc<P> {
    fn query(&self, selector: &str) -> Result<Vec<RawPropertyBag>, ProviderError> {
        (**self).query(selector)
    }
}

/// Split `"Win32_NTLogEvent where Type='Error'"` into class and condition
pub fn split_selector(selector: &str) -> (&str, Option<&str>) {
    let trimmed = selector.trim();
    let lower = trimmed.to_ascii_lowercase();
    match lower.find(" where ") {
        Some(idx) => {
            let condition = trimmed[idx + " where ".len()..].trim();
            (
                trimmed[..idx].trim(),
                (!condition.is_empty()).then_some(condition),
            )
        }
        None => (trimmed, None),
    }
}

/// In-memory provider answering from a fixed table
///
/// Backs `--snapshot` replays and the test suite. Selectors are matched
/// case-insensitively on the class part; a `where` clause is ignored.
#[derive(Debug, Clone, Default)]
pub struct StaticProvider {
    entries: HashMap<String, Result<Vec<RawPropertyBag>, ProviderError>>,
}

#[derive(Deserialize)]
#[serde(transparent)]
struct Snapshot(HashMap<String, Vec<RawPropertyBag>>);

impl StaticProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bags(mut self, selector: &str, bags: Vec<RawPropertyBag>) -> Self {
        self.entries.insert(selector.to_ascii_lowercase(), Ok(bags));
        self
    }

    #[cfg(test)]
    pub fn with_error(mut self, selector: &str, error: ProviderError) -> Self {
        self.entries.insert(selector.to_ascii_lowercase(), Err(error));
        self
    }

    /// Parse a JSON snapshot: `{"Win32_Processor": [{"Name": "..."}], ...}`
    pub fn from_json(json: &str) -> Result<Self> {
        let Snapshot(classes) =
            serde_json::from_str(json).context("Failed to parse hardware snapshot JSON")?;
        Ok(classes
            .into_iter()
            .fold(Self::new(), |provider, (selector, bags)| {
                provider.with_bags(&selector, bags)
            }))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read snapshot from {}", path.display()))?;
        Self::from_json(&content)
    }
}

impl HardwareQueryProvider for StaticProvider {
    fn query(&self, selector: &str) -> Result<Vec<RawPropertyBag>, ProviderError> {
        let (class, _) = split_selector(selector);
        match self.entries.get(&class.to_ascii_lowercase()) {
            Some(entry) => entry.clone(),
            None => Ok(Vec::new()),
        }
    }
}
