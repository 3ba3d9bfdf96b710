//! Block table: one 2-byte record per block index
//!
//! Each record carries two unrelated pieces of state:
//!
//! - a [`ChainLink`], meaningful while the block belongs to a sample chain
//! - a [`TreeNode`] occupancy mask, meaningful when the record doubles as an
//!   interior node of the allocation tree
//!
//! They are separate fields in memory and only share bits on the device:
//!
//! ```text
//! 15   12 11 10 9              0
//! ┌──────┬──┬──┬────────────────┐
//! │ full │  │E │      next      │
//! └──────┴──┴──┴────────────────┘
//! ```

use crate::device::MemoryDevice;
use crate::error::{Result, StoreError};
use crate::layout::{Layout, BLOCK_ENTRY_SIZE, TABLE_BLOCKS};

const NEXT_MASK: u16 = 0x03FF;
const END_OF_CHAIN: u16 = 1 << 10;
const FULL_SHIFT: u16 = 12;

/// Successor pointer of a block inside a sample chain
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChainLink {
    /// Next block in the chain; ignored on the tail
    pub next: u16,
    /// Set on the last block of a chain
    pub end_of_chain: bool,
}

impl ChainLink {
    pub fn tail() -> Self {
        ChainLink {
            next: 0,
            end_of_chain: true,
        }
    }

    pub fn to(next: u16) -> Self {
        ChainLink {
            next,
            end_of_chain: false,
        }
    }
}

/// Allocation tree bookkeeping: bit `i` set means child `i` has no free leaf
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TreeNode {
    full: u8,
}

impl TreeNode {
    pub const ALL_FULL: u8 = 0x0F;

    pub fn from_mask(mask: u8) -> Self {
        TreeNode {
            full: mask & Self::ALL_FULL,
        }
    }

    pub fn mask(&self) -> u8 {
        self.full
    }

    pub fn is_child_full(&self, child: u8) -> bool {
        self.full & (1 << child) != 0
    }

    pub fn set_child_full(&mut self, child: u8) {
        self.full |= 1 << child;
    }

    pub fn clear_child_full(&mut self, child: u8) {
        self.full &= !(1 << child);
    }

    pub fn is_full(&self) -> bool {
        self.full == Self::ALL_FULL
    }

    /// Lowest-numbered child that still has space
    pub fn first_open_child(&self) -> Option<u8> {
        (0..4).find(|&child| !self.is_child_full(child))
    }

    /// Number of children that still have space
    pub fn open_children(&self) -> u32 {
        4 - self.full.count_ones()
    }
}

/// Decoded block table record
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlockEntry {
    pub link: ChainLink,
    pub tree: TreeNode,
}

impl BlockEntry {
    pub fn decode(raw: u16) -> Self {
        BlockEntry {
            link: ChainLink {
                next: raw & NEXT_MASK,
                end_of_chain: raw & END_OF_CHAIN != 0,
            },
            tree: TreeNode::from_mask((raw >> FULL_SHIFT) as u8),
        }
    }

    pub fn encode(&self) -> u16 {
        let mut raw = self.link.next & NEXT_MASK;
        if self.link.end_of_chain {
            raw |= END_OF_CHAIN;
        }
        raw | (self.tree.mask() as u16) << FULL_SHIFT
    }
}

/// Accessor for block table records on a device
#[derive(Debug, Clone, Copy)]
pub struct BlockTable {
    layout: Layout,
}

impl BlockTable {
    pub fn new(layout: Layout) -> Self {
        BlockTable { layout }
    }

    fn address(&self, block: u16) -> Result<u32> {
        if block >= TABLE_BLOCKS {
            return Err(StoreError::InvalidBlock(block));
        }
        Ok(self.layout.block_entry_address(block))
    }

    pub fn read<D: MemoryDevice + ?Sized>(&self, device: &D, block: u16) -> Result<BlockEntry> {
        let raw = device.read_word(self.address(block)?)?;
        Ok(BlockEntry::decode(raw))
    }

    pub fn write<D: MemoryDevice + ?Sized>(
        &self,
        device: &mut D,
        block: u16,
        entry: BlockEntry,
    ) -> Result<()> {
        device.write_word(self.address(block)?, entry.encode())
    }

    pub fn read_link<D: MemoryDevice + ?Sized>(&self, device: &D, block: u16) -> Result<ChainLink> {
        Ok(self.read(device, block)?.link)
    }

    /// Replace the chain link, keeping the tree bits of the record
    pub fn write_link<D: MemoryDevice + ?Sized>(
        &self,
        device: &mut D,
        block: u16,
        link: ChainLink,
    ) -> Result<()> {
        let mut entry = self.read(device, block)?;
        entry.link = link;
        self.write(device, block, entry)
    }

    pub fn read_tree<D: MemoryDevice + ?Sized>(&self, device: &D, block: u16) -> Result<TreeNode> {
        Ok(self.read(device, block)?.tree)
    }

    /// Replace the tree bits, keeping the chain link of the record
    pub fn write_tree<D: MemoryDevice + ?Sized>(
        &self,
        device: &mut D,
        block: u16,
        tree: TreeNode,
    ) -> Result<()> {
        let mut entry = self.read(device, block)?;
        entry.tree = tree;
        self.write(device, block, entry)
    }

    /// Zero every record (all blocks free, no links)
    pub fn clear<D: MemoryDevice + ?Sized>(&self, device: &mut D) -> Result<()> {
        device.fill(
            self.layout.block_table_start(),
            TABLE_BLOCKS as u32 * BLOCK_ENTRY_SIZE,
            0,
        )
    }
}
