// SPDX-License-Identifier: MIT OR Apache-2.0
//! Runtime settings.
//!
//! Settings are stored as RON next to the project, for example:
//!
//! ```ron
//! RuntimeSettings(
//!     max_call_stack: 1024,
//!     flow_stack_size: 256,
//!     max_loop_iterations: 1000000,
//! )
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Runtime settings file name
pub const SETTINGS_FILE_NAME: &str = "runtime.ron";

/// Limits applied to every call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeSettings {
    /// Largest value stack, in slots, a function may need
    pub max_call_stack: usize,
    /// Flow stack entries reserved per call
    pub flow_stack_size: usize,
    /// Iterations a loop node may run before it fails
    pub max_loop_iterations: u64,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            max_call_stack: 1024,
            flow_stack_size: 256,
            max_loop_iterations: 1_000_000,
        }
    }
}

impl RuntimeSettings {
    /// Parse settings from RON text
    pub fn from_ron_str(content: &str) -> std::io::Result<Self> {
        let settings: RuntimeSettings = ron::from_str(content).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })?;

        // The entry node always occupies the first flow entry
        if settings.flow_stack_size < 2 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!(
                    "flow_stack_size must be at least 2, got {}",
                    settings.flow_stack_size
                ),
            ));
        }

        Ok(settings)
    }

    /// Load settings from a file
    pub fn load(path: &Path) -> std::io::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_ron_str(&content)
    }

    /// Serialize settings to RON text
    pub fn to_ron_string(&self) -> std::io::Result<String> {
        let config = ron::ser::PrettyConfig::default().struct_names(true);
        ron::ser::to_string_pretty(self, config).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })
    }

    /// Save settings to a file
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let content = self.to_ron_string()?;
        std::fs::write(path, content)?;
        tracing::info!("Saved runtime settings to {:?}", path);
        Ok(())
    }
}
