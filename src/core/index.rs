//! Index table: one 8-byte record per sample slot
//!
//! | Offset | Size | Field         |
//! |--------|------|---------------|
//! | 0      | 1    | occupied flag |
//! | 1      | 1    | sample type   |
//! | 2      | 4    | size in bytes |
//! | 6      | 2    | first block   |

use crate::device::MemoryDevice;
use crate::error::{Result, StoreError};
use crate::layout::{Layout, INDEX_ENTRY_SIZE, NUM_SAMPLES};
use crate::sample::SampleType;
use serde::{Deserialize, Serialize};

/// Metadata of one sample slot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub occupied: bool,
    pub sample_type: SampleType,
    pub size: u32,
    pub first_block: u16,
}

/// Reject slot ids outside the table
pub fn check_id(id: u8) -> Result<()> {
    if id >= NUM_SAMPLES {
        return Err(StoreError::InvalidSampleId(id));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy)]
pub struct IndexTable {
    layout: Layout,
}

impl IndexTable {
    pub fn new(layout: Layout) -> Self {
        IndexTable { layout }
    }

    pub fn read<D: MemoryDevice + ?Sized>(&self, device: &D, id: u8) -> Result<IndexEntry> {
        check_id(id)?;
        let address = self.layout.index_address(id);

        Ok(IndexEntry {
            occupied: device.read(address)? != 0,
            sample_type: SampleType::from_u8(device.read(address + 1)?)?,
            size: device.read_dword(address + 2)?,
            first_block: device.read_word(address + 6)?,
        })
    }

    pub fn write<D: MemoryDevice + ?Sized>(
        &self,
        device: &mut D,
        id: u8,
        entry: &IndexEntry,
    ) -> Result<()> {
        check_id(id)?;
        let address = self.layout.index_address(id);

        device.write(address, entry.occupied as u8)?;
        device.write(address + 1, entry.sample_type as u8)?;
        device.write_dword(address + 2, entry.size)?;
        device.write_word(address + 6, entry.first_block)
    }

    /// Read only the occupied flag
    pub fn occupied<D: MemoryDevice + ?Sized>(&self, device: &D, id: u8) -> Result<bool> {
        check_id(id)?;
        Ok(device.read(self.layout.index_address(id))? != 0)
    }

    /// Clear the occupied flag, leaving the rest of the record in place
    pub fn remove<D: MemoryDevice + ?Sized>(&self, device: &mut D, id: u8) -> Result<()> {
        check_id(id)?;
        device.write(self.layout.index_address(id), 0)
    }

    /// Zero every record
    pub fn clear<D: MemoryDevice + ?Sized>(&self, device: &mut D) -> Result<()> {
        device.fill(
            self.layout.index_start(),
            INDEX_ENTRY_SIZE * NUM_SAMPLES as u32,
            0,
        )
    }
}
