//! Runtime configuration
//!
//! ```toml
//! buffer_capacity = 500
//! load_default_rules = true
//!
//! [thresholds]
//! red_max = 2.0
//! green_max = 10.0
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::types::ColorThresholds;
use crate::MAX_COLORS_BUFFER;

/// Engine settings. Every field is optional in the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Outcomes retained for matching
    pub buffer_capacity: usize,
    /// Value → color classification
    pub thresholds: ColorThresholds,
    /// Seed the rule book with the built-in rules
    pub load_default_rules: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: MAX_COLORS_BUFFER,
            thresholds: ColorThresholds::default(),
            load_default_rules: false,
        }
    }
}

impl EngineConfig {
    /// Parse and validate a TOML document
    pub fn from_toml(toml_str: &str) -> EngineResult<Self> {
        let config: EngineConfig =
            toml::from_str(toml_str).map_err(|e| EngineError::configuration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    pub fn from_toml_file(path: impl AsRef<Path>) -> EngineResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| EngineError::storage(path.display().to_string(), e))?;
        Self::from_toml(&text)
    }

    /// Render as TOML
    pub fn to_toml(&self) -> EngineResult<String> {
        toml::to_string_pretty(self).map_err(|e| EngineError::configuration(e.to_string()))
    }

    pub fn validate(&self) -> EngineResult<()> {
        if self.buffer_capacity == 0 {
            return Err(EngineError::configuration("buffer_capacity must be at least 1"));
        }
        let t = &self.thresholds;
        if !t.red_max.is_finite() || !t.green_max.is_finite() {
            return Err(EngineError::configuration("thresholds must be finite"));
        }
        if t.red_max >= t.green_max {
            return Err(EngineError::configuration(format!(
                "red_max ({}) must be below green_max ({})",
                t.red_max, t.green_max
            )));
        }
        Ok(())
    }
}
