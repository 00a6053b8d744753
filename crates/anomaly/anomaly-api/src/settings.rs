//! Persisted application settings.
//!
//! Detector parameters live at the top level of the settings file and are
//! shared by every source; each source carries its own query and an
//! optional polling frequency. Keys this crate does not know about (driver
//! connection details and the like) are preserved on save.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use crate::lenient;
use crate::{AnomalyError, DetectorConfig, Result};

/// Polling period used when neither the source nor the settings specify one.
pub const DEFAULT_POLLING_FREQUENCY_SECS: u64 = 5;

fn default_polling_frequency() -> u64 {
    DEFAULT_POLLING_FREQUENCY_SECS
}

/// One monitored source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceSettings {
    pub name: String,
    /// Query returning exactly one scalar.
    #[serde(default)]
    pub query: String,
    /// Polling period in seconds, overriding the global one.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::optional_whole_u64"
    )]
    pub polling_frequency: Option<u64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SourceSettings {
    pub fn new(name: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            query: query.into(),
            polling_frequency: None,
            extra: Map::new(),
        }
    }
}

/// Contents of the settings file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(flatten)]
    pub detector: DetectorConfig,
    /// Global polling period in seconds.
    #[serde(
        default = "default_polling_frequency",
        deserialize_with = "lenient::whole_u64"
    )]
    pub polling_frequency: u64,
    #[serde(default)]
    pub sources: Vec<SourceSettings>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            detector: DetectorConfig::default(),
            polling_frequency: DEFAULT_POLLING_FREQUENCY_SECS,
            sources: Vec::new(),
            extra: Map::new(),
        }
    }
}

impl Settings {
    /// Load settings from `path`. A missing file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path)
            .map_err(|e| AnomalyError::Settings(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&text)
    }

    /// Like [`Settings::load`] but falls back to the defaults on any error.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        Self::load(path).unwrap_or_else(|e| {
            warn!(path = %path.display(), error = %e, "using default settings");
            Self::default()
        })
    }

    /// Parse settings JSON, migrating legacy keys.
    pub fn from_json(text: &str) -> Result<Self> {
        let mut value: Value =
            serde_json::from_str(text).map_err(|e| AnomalyError::Settings(e.to_string()))?;
        let root = value
            .as_object_mut()
            .ok_or_else(|| AnomalyError::Settings("top level must be an object".to_string()))?;
        migrate_legacy_keys(root);
        serde_json::from_value(value).map_err(|e| AnomalyError::Settings(e.to_string()))
    }

    /// Write settings as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let text = serde_json::to_string_pretty(self)
            .map_err(|e| AnomalyError::Settings(e.to_string()))?;
        fs::write(path, text)
            .map_err(|e| AnomalyError::Settings(format!("{}: {}", path.display(), e)))
    }

    /// Validated detector configuration shared by all sources.
    pub fn detector_config(&self) -> Result<DetectorConfig> {
        self.detector.validate()?;
        Ok(self.detector.clone())
    }

    /// Polling period for `source` in seconds, never below one.
    pub fn polling_frequency_for(&self, source: &SourceSettings) -> u64 {
        source
            .polling_frequency
            .unwrap_or(self.polling_frequency)
            .max(1)
    }

    pub fn source(&self, name: &str) -> Option<&SourceSettings> {
        self.sources.iter().find(|s| s.name == name)
    }
}

fn migrate_legacy_keys(root: &mut Map<String, Value>) {
    if let Some(k) = root.remove("anomaly_k") {
        if !root.contains_key("k_upper") && k.is_number() {
            root.insert("k_upper".to_string(), k);
        }
    }

    if let Some(Value::Array(sources)) = root.get_mut("sources") {
        for source in sources.iter_mut().filter_map(Value::as_object_mut) {
            let table = source.remove("table_name");
            let column = source.remove("column_name");
            let has_query = source
                .get("query")
                .and_then(Value::as_str)
                .is_some_and(|q| !q.is_empty());
            if has_query {
                continue;
            }
            let table = table.as_ref().and_then(Value::as_str).unwrap_or("");
            if table.is_empty() {
                continue;
            }
            let column = column.as_ref().and_then(Value::as_str).unwrap_or("");
            let query = if column.is_empty() {
                format!("SELECT COUNT(*) FROM {}", table)
            } else {
                format!("SELECT COUNT({}) FROM {}", column, table)
            };
            source.insert("query".to_string(), Value::String(query));
        }
    }
}
