//! JSON configuration for the attacks and their logging
use crate::attacks::{SinglePixelConfig, ZooConfig};
use crate::error::Result;
use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Every section and field is optional and falls back to its default.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AttackConfig {
    pub single_pixel: SinglePixelConfig,
    pub zoo: ZooConfig,
    pub logging: LoggingConfig,
}

impl AttackConfig {
    /// # Errors
    /// On malformed JSON, or a ZOO section that fails validation
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.zoo.validate()?;
        Ok(config)
    }

    /// # Errors
    /// If the file can't be read, see also [`AttackConfig::from_json_str`]
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_json_str(&fs::read_to_string(path)?)
    }

    /// # Errors
    /// Never in practice, serialization of these types can't fail
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
