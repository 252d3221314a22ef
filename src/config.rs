//! Driver-level configuration (§6, §11.3).

use crate::errconfig;
use crate::error::Result;

/// Loads the driver-level `{data_sources: {...}}` configuration mapping (§6, §11.3).
#[derive(Debug, Default, serde::Deserialize)]
pub struct DriverConfig {
    #[serde(default)]
    pub data_sources: std::collections::HashMap<String, serde_json::Value>,
}

impl DriverConfig {
    /// Loads and merges configuration from `path` (TOML/YAML/JSON, selected by the `config` crate
    /// from the file's extension).
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()?;
        settings
            .try_deserialize()
            .map_err(|e| errconfig!("failed to parse driver configuration: {e}"))
    }

    /// The config block registered for `source_type`, if any.
    pub fn source_config(&self, source_type: &str) -> Option<&serde_json::Value> {
        self.data_sources.get(source_type)
    }
}
