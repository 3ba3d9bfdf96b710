//! Persisted layout of the sample area
//!
//! ```text
//! base ──► ┌──────────────────────────────┐
//!          │ Index table   100 × 8 bytes  │
//!          ├──────────────────────────────┤
//!          │ Block table  1024 × 2 bytes  │
//!          ├──────────────────────────────┤
//!          │ Data blocks  n × 1024 bytes  │
//!          └──────────────────────────────┘ ◄── capacity
//! ```
//!
//! Everything below `base` belongs to other firmware data (patches, patterns)
//! and is never touched by the store.

use crate::error::{Result, StoreError};

/// Bytes per data block
pub const BLOCK_SIZE: usize = 1024;

/// Number of sample slots in the index table
pub const NUM_SAMPLES: u8 = 100;

/// Size of one index table record
pub const INDEX_ENTRY_SIZE: u32 = 8;

/// Size of one block table record
pub const BLOCK_ENTRY_SIZE: u32 = 2;

/// Block indices addressable by the block table (4^5)
pub const TABLE_BLOCKS: u16 = 1024;

/// Levels between the allocation tree root and its leaves
pub const TREE_DEPTH: usize = 5;

/// Children per allocation tree node
pub const TREE_FANOUT: u16 = 4;

/// Block table entry holding the tree root; never carries sample data
pub const ROOT_BLOCK: u16 = TABLE_BLOCKS - 1;

/// Upper bound on blocks that can ever hold sample data
pub const MAX_DATA_BLOCKS: u16 = ROOT_BLOCK;

/// Default device size (two 512 KiB SRAMs)
pub const DEFAULT_CAPACITY: u32 = 0x10_0000;

/// Default start of the sample area: 256 bytes empty, 6400 bytes patches,
/// 16000 bytes patterns
pub const DEFAULT_BASE: u32 = 256 + 6400 + 16000;

const INDEX_SIZE: u32 = INDEX_ENTRY_SIZE * NUM_SAMPLES as u32;
const BLOCK_TABLE_SIZE: u32 = BLOCK_ENTRY_SIZE * TABLE_BLOCKS as u32;

/// Address map of the sample area on a device of a given capacity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    base: u32,
    capacity: u32,
    data_blocks: u16,
}

impl Layout {
    /// Build a layout, checking that the tables and at least one data block fit
    pub fn new(base: u32, capacity: u32) -> Result<Self> {
        let data_start = base
            .checked_add(INDEX_SIZE + BLOCK_TABLE_SIZE)
            .ok_or_else(|| StoreError::InvalidLayout(format!("base {:#x} overflows", base)))?;

        if data_start > capacity {
            return Err(StoreError::InvalidLayout(format!(
                "tables end at {:#x}, beyond capacity {:#x}",
                data_start, capacity
            )));
        }

        let fitting = (capacity - data_start) / BLOCK_SIZE as u32;
        let data_blocks = fitting.min(MAX_DATA_BLOCKS as u32) as u16;

        if data_blocks == 0 {
            return Err(StoreError::InvalidLayout(format!(
                "no room for a data block between {:#x} and {:#x}",
                data_start, capacity
            )));
        }

        Ok(Layout {
            base,
            capacity,
            data_blocks,
        })
    }

    pub fn base(&self) -> u32 {
        self.base
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Number of blocks that can hold sample data
    pub fn data_blocks(&self) -> u16 {
        self.data_blocks
    }

    pub fn index_start(&self) -> u32 {
        self.base
    }

    pub fn block_table_start(&self) -> u32 {
        self.base + INDEX_SIZE
    }

    pub fn data_start(&self) -> u32 {
        self.block_table_start() + BLOCK_TABLE_SIZE
    }

    /// Address of the index record for `id` (id must already be checked)
    pub fn index_address(&self, id: u8) -> u32 {
        self.index_start() + id as u32 * INDEX_ENTRY_SIZE
    }

    /// Address of the block table record for `block`
    pub fn block_entry_address(&self, block: u16) -> u32 {
        self.block_table_start() + block as u32 * BLOCK_ENTRY_SIZE
    }

    /// Address of the first byte of a data block
    pub fn block_address(&self, block: u16) -> u32 {
        self.data_start() + block as u32 * BLOCK_SIZE as u32
    }

    /// Reject block indices that cannot hold data on this device
    pub fn check_block(&self, block: u16) -> Result<()> {
        if block >= self.data_blocks {
            return Err(StoreError::InvalidBlock(block));
        }
        Ok(())
    }
}

impl Default for Layout {
    fn default() -> Self {
        Layout {
            base: DEFAULT_BASE,
            capacity: DEFAULT_CAPACITY,
            data_blocks: ((DEFAULT_CAPACITY - DEFAULT_BASE - INDEX_SIZE - BLOCK_TABLE_SIZE)
                / BLOCK_SIZE as u32) as u16,
        }
    }
}
