//! Sample store: the public face of the storage engine
//!
//! Ties the index table, chain manager and allocation tree together over one
//! [`MemoryDevice`]. Streaming goes through caller-owned [`SampleHandle`]s.

use crate::allocator::AllocationTree;
use crate::chain::ChainManager;
use crate::device::MemoryDevice;
use crate::error::{Result, StoreError};
use crate::index::{check_id, IndexEntry, IndexTable};
use crate::layout::{Layout, BLOCK_SIZE, DEFAULT_BASE, NUM_SAMPLES};
use crate::sample::{SampleHandle, SampleType};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

const BLOCK_END: u16 = BLOCK_SIZE as u16;

/// Occupancy summary of a store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    pub capacity: u32,
    pub data_blocks: u16,
    pub free_blocks: u16,
    pub used_blocks: u16,
    pub samples: u8,
}

pub struct SampleStore<D: MemoryDevice> {
    device: D,
    layout: Layout,
    index: IndexTable,
    chains: ChainManager,
}

impl<D: MemoryDevice> SampleStore<D> {
    /// Wrap a device whose sample area follows `layout`
    ///
    /// The device is used as-is; call [`clear_all`](Self::clear_all) on a
    /// fresh device before storing anything.
    pub fn new(device: D, layout: Layout) -> Result<Self> {
        if layout.capacity() > device.capacity() {
            return Err(StoreError::InvalidLayout(format!(
                "layout needs {:#x} bytes, device has {:#x}",
                layout.capacity(),
                device.capacity()
            )));
        }

        Ok(SampleStore {
            device,
            layout,
            index: IndexTable::new(layout),
            chains: ChainManager::new(layout),
        })
    }

    /// Wrap a device using the firmware's default base address
    pub fn with_default_layout(device: D) -> Result<Self> {
        let layout = Layout::new(DEFAULT_BASE, device.capacity())?;
        Self::new(device, layout)
    }

    fn tree(&self) -> &AllocationTree {
        self.chains.tree()
    }

    /// Format the sample area: empty index, every data block free
    pub fn clear_all(&mut self) -> Result<()> {
        self.index.clear(&mut self.device)?;
        self.chains.tree().format(&mut self.device)?;
        info!(
            "Cleared sample store: {} data blocks at {:#x}",
            self.layout.data_blocks(),
            self.layout.data_start()
        );
        Ok(())
    }

    /// Create (or replace) slot `id` and point `handle` at its first block
    ///
    /// `size` is the declared length; [`finish`](Self::finish) can correct it
    /// once the real length is known.
    pub fn new_sample(
        &mut self,
        handle: &mut SampleHandle,
        id: u8,
        sample_type: SampleType,
        size: u32,
    ) -> Result<()> {
        check_id(id)?;

        if self.index.occupied(&self.device, id)? {
            debug!("Slot {} occupied, replacing", id);
            self.delete(id)?;
        }

        let first_block = self.chains.tree().allocate_block(&mut self.device)?;

        let entry = IndexEntry {
            occupied: true,
            sample_type,
            size,
            first_block,
        };
        self.index.write(&mut self.device, id, &entry)?;

        handle.sample_type = sample_type;
        handle.size = size;
        handle.first_block = first_block;
        handle.opened = true;
        handle.reset();

        info!(
            "Created sample {} ({:?}, {} bytes) at block {}",
            id, sample_type, size, first_block
        );
        Ok(())
    }

    /// Record the number of bytes actually written as the slot's size
    pub fn finish(&mut self, handle: &mut SampleHandle, id: u8) -> Result<()> {
        if !handle.opened {
            return Err(StoreError::HandleNotOpen);
        }
        let mut entry = self.index.read(&self.device, id)?;
        if !entry.occupied {
            return Err(StoreError::EmptySlot(id));
        }

        entry.size = handle.bytes_done;
        self.index.write(&mut self.device, id, &entry)?;
        handle.size = handle.bytes_done;

        debug!("Sample {} finished at {} bytes", id, entry.size);
        Ok(())
    }

    /// Point `handle` at the start of slot `id`
    pub fn load(&self, handle: &mut SampleHandle, id: u8) -> Result<()> {
        let entry = self.index.read(&self.device, id)?;
        if !entry.occupied {
            return Err(StoreError::EmptySlot(id));
        }
        self.layout.check_block(entry.first_block)?;

        handle.sample_type = entry.sample_type;
        handle.size = entry.size;
        handle.first_block = entry.first_block;
        handle.opened = true;
        handle.reset();
        Ok(())
    }

    /// Rewind `handle` without re-reading the index
    pub fn reset(&self, handle: &mut SampleHandle) {
        handle.reset();
    }

    /// Read the next byte of the chain
    ///
    /// Moves to the next block only when a byte past a full block is asked
    /// for, so reading a chain's exact length never touches the tail's link.
    pub fn read_byte(&self, handle: &mut SampleHandle) -> Result<u8> {
        if !handle.opened {
            return Err(StoreError::HandleNotOpen);
        }
        if handle.current_position == BLOCK_END {
            handle.current_block = self.chains.next_block(&self.device, handle.current_block)?;
            handle.current_position = 0;
        }
        if handle.current_position == 0 {
            handle
                .cursor
                .set_address(self.layout.block_address(handle.current_block));
        }

        let value = handle.cursor.read_sequential(&self.device)?;
        handle.current_position += 1;
        handle.bytes_done += 1;
        Ok(value)
    }

    /// Write the next byte of the chain
    ///
    /// Past a full block the write moves on to the existing successor, and
    /// grows the chain only at its tail, so rewriting a loaded sample reuses
    /// its blocks.
    pub fn write_serial(&mut self, handle: &mut SampleHandle, value: u8) -> Result<()> {
        if !handle.opened {
            return Err(StoreError::HandleNotOpen);
        }
        if handle.current_position == BLOCK_END {
            handle.current_block = self
                .chains
                .next_or_grow(&mut self.device, handle.current_block)?;
            handle.current_position = 0;
        }
        if handle.current_position == 0 {
            handle
                .cursor
                .set_address(self.layout.block_address(handle.current_block));
        }

        handle.cursor.write_sequential(&mut self.device, value)?;
        handle.current_position += 1;
        handle.bytes_done += 1;
        Ok(())
    }

    /// Free slot `id`'s chain and mark the slot empty
    pub fn delete(&mut self, id: u8) -> Result<()> {
        let entry = self.index.read(&self.device, id)?;
        if !entry.occupied {
            return Err(StoreError::EmptySlot(id));
        }

        let freed = self.chains.delete_chain(&mut self.device, entry.first_block)?;
        self.index.remove(&mut self.device, id)?;

        info!("Deleted sample {} ({} blocks freed)", id, freed);
        Ok(())
    }

    /// Delete every occupied slot, returning how many were removed
    pub fn delete_all(&mut self) -> Result<u8> {
        let mut deleted = 0;
        for id in 0..NUM_SAMPLES {
            if self.index.occupied(&self.device, id)? {
                self.delete(id)?;
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    pub fn occupied(&self, id: u8) -> Result<bool> {
        self.index.occupied(&self.device, id)
    }

    /// Index entry of slot `id`, if occupied
    pub fn entry(&self, id: u8) -> Result<Option<IndexEntry>> {
        let entry = self.index.read(&self.device, id)?;
        Ok(entry.occupied.then_some(entry))
    }

    /// All occupied slots in id order
    pub fn list(&self) -> Result<Vec<(u8, IndexEntry)>> {
        let mut entries = Vec::new();
        for id in 0..NUM_SAMPLES {
            if let Some(entry) = self.entry(id)? {
                entries.push((id, entry));
            }
        }
        Ok(entries)
    }

    /// Blocks of slot `id`'s chain, head first
    pub fn chain(&self, id: u8) -> Result<Vec<u16>> {
        let entry = self.entry(id)?.ok_or(StoreError::EmptySlot(id))?;
        self.chains.walk(&self.device, entry.first_block)
    }

    /// Take one block straight from the allocator (marked as a chain tail)
    pub fn allocate_block(&mut self) -> Result<u16> {
        self.chains.tree().allocate_block(&mut self.device)
    }

    /// Return one block straight to the allocator
    pub fn free_block(&mut self, block: u16) -> Result<()> {
        self.chains.tree().free_block(&mut self.device, block)
    }

    pub fn is_allocated(&self, block: u16) -> Result<bool> {
        self.layout.check_block(block)?;
        self.tree().is_allocated(&self.device, block)
    }

    pub fn free_blocks(&self) -> Result<u16> {
        self.tree().free_blocks(&self.device)
    }

    pub fn data_blocks(&self) -> u16 {
        self.layout.data_blocks()
    }

    pub fn stats(&self) -> Result<StoreStats> {
        let free_blocks = self.free_blocks()?;
        Ok(StoreStats {
            capacity: self.layout.capacity(),
            data_blocks: self.layout.data_blocks(),
            free_blocks,
            used_blocks: self.layout.data_blocks() - free_blocks,
            samples: self.list()?.len() as u8,
        })
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    pub fn into_inner(self) -> D {
        self.device
    }
}
