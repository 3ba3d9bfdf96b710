//! # Sample Store - Chained Block Storage for Synthesizer Samples
//!
//! `sample-store` turns a flat, fixed-capacity byte device (the synthesizer's
//! external SRAM) into up to 100 independently growable sample streams:
//!
//! - **Index table** of 100 slots holding type, size and first block
//! - **Block chains** linking fixed 1 KiB blocks through a block table
//! - **Bitmap tree allocator**: a complete 4-ary tree of depth 5 over the block
//!   table, so allocating or freeing a block costs at most five node updates
//! - **Streaming handles** for ingesting samples of unknown length and for
//!   byte-by-byte playback
//!
//! ## Quick Start
//!
//! ```rust
//! use sample_store::{SampleHandle, SampleStoreBuilder, SampleType, Result};
//!
//! # fn main() -> Result<()> {
//! let mut store = SampleStoreBuilder::new().build_in_memory()?;
//!
//! let mut handle = SampleHandle::new();
//! store.new_sample(&mut handle, 0, SampleType::Raw, 3)?;
//! for byte in [1, 2, 3] {
//!     store.write_serial(&mut handle, byte)?;
//! }
//!
//! store.reset(&mut handle);
//! assert_eq!(store.read_byte(&mut handle)?, 1);
//!
//! store.delete(0)?;
//! assert!(!store.occupied(0)?);
//! # Ok(())
//! # }
//! ```
//!
//! ## Layout
//!
//! ```text
//! ┌──────────────────────────────┐ base
//! │ Index table   100 × 8 bytes  │
//! ├──────────────────────────────┤
//! │ Block table  1024 × 2 bytes  │
//! ├──────────────────────────────┤
//! │ Data blocks  n × 1024 bytes  │
//! └──────────────────────────────┘ capacity
//! ```

pub mod core;

// Re-export core modules so crate:: paths in core resolve
#[allow(unused_imports)]
pub(crate) use self::core::{
    allocator, block_table, chain, config, device, error, image, index, layout, playback, sample,
    store, transfer,
};

pub use crate::core::{
    allocator::{blocks_for_size, AllocationTree},
    block_table::{BlockEntry, ChainLink, TreeNode},
    config::StoreConfig,
    device::{MemoryCursor, MemoryDevice, RamDevice},
    error::{Result, StoreError},
    image::ImageDevice,
    index::IndexEntry,
    layout::{Layout, BLOCK_SIZE, NUM_SAMPLES, ROOT_BLOCK},
    playback::Playback,
    sample::{SampleHandle, SampleType},
    store::{SampleStore, StoreStats},
    transfer::SampleTransfer,
};

use std::path::Path;
use tracing::{debug, info};

/// Builder for a [`SampleStore`]
///
/// # Examples
///
/// ```rust,no_run
/// use sample_store::SampleStoreBuilder;
///
/// # fn main() -> sample_store::Result<()> {
/// let store = SampleStoreBuilder::new()
///     .base(0)
///     .capacity(512 * 1024)
///     .create_image("sram.bin")?;
/// # Ok(())
/// # }
/// ```
pub struct SampleStoreBuilder {
    config: StoreConfig,
}

impl SampleStoreBuilder {
    /// Start from the firmware defaults (1 MiB device, sample area at 22656)
    pub fn new() -> Self {
        SampleStoreBuilder {
            config: StoreConfig::default(),
        }
    }

    /// Start from a loaded configuration
    pub fn config(mut self, config: StoreConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the start address of the sample area
    pub fn base(mut self, base: u32) -> Self {
        self.config.base = base;
        self
    }

    /// Set the device size in bytes
    pub fn capacity(mut self, capacity: u32) -> Self {
        self.config.capacity = capacity;
        self
    }

    /// Build a formatted store over a fresh in-memory device
    pub fn build_in_memory(self) -> Result<SampleStore<RamDevice>> {
        let layout = self.config.layout()?;
        let mut store = SampleStore::new(RamDevice::new(layout.capacity()), layout)?;
        store.clear_all()?;
        debug!("Built in-memory store with {} data blocks", layout.data_blocks());
        Ok(store)
    }

    /// Create (or overwrite) an image file and format it
    pub fn create_image<P: AsRef<Path>>(self, path: P) -> Result<SampleStore<ImageDevice>> {
        let layout = self.config.layout()?;
        info!("Creating image {:?} ({} bytes)", path.as_ref(), layout.capacity());

        let device = ImageDevice::create(path, layout.capacity())?;
        let mut store = SampleStore::new(device, layout)?;
        store.clear_all()?;
        store.device().flush()?;
        Ok(store)
    }

    /// Open an existing image file without touching its contents
    ///
    /// The configured capacity is ignored; the image length is authoritative.
    pub fn open_image<P: AsRef<Path>>(self, path: P) -> Result<SampleStore<ImageDevice>> {
        info!("Opening image {:?}", path.as_ref());

        let device = ImageDevice::open(path)?;
        let layout = Layout::new(self.config.base, device.capacity())?;
        SampleStore::new(device, layout)
    }
}

impl Default for SampleStoreBuilder {
    fn default() -> Self {
        Self::new()
    }
}
