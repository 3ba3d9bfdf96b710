//! Store configuration
//!
//! ```toml
//! base = 22656        # start of the sample area
//! capacity = 1048576  # device size in bytes
//! image = "sram.bin"  # optional image file for the host tool
//! ```

use crate::error::Result;
use crate::layout::{Layout, DEFAULT_BASE, DEFAULT_CAPACITY};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    pub base: u32,
    pub capacity: u32,
    pub image: Option<PathBuf>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            base: DEFAULT_BASE,
            capacity: DEFAULT_CAPACITY,
            image: None,
        }
    }
}

impl StoreConfig {
    pub fn from_toml_str(source: &str) -> Result<Self> {
        Ok(toml::from_str(source)?)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    /// Validated address map for this configuration
    pub fn layout(&self) -> Result<Layout> {
        Layout::new(self.base, self.capacity)
    }
}
