//! Singly linked block chains
//!
//! A sample's bytes live in a chain of blocks linked through the block table.
//! The tail carries `end_of_chain`; every other block points at its successor.
//! Walks are bounded by the number of data blocks, so a damaged table ends in
//! an error instead of a loop.

use crate::allocator::AllocationTree;
use crate::block_table::{BlockTable, ChainLink};
use crate::device::MemoryDevice;
use crate::error::{Result, StoreError};
use crate::layout::Layout;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy)]
pub struct ChainManager {
    layout: Layout,
    table: BlockTable,
    tree: AllocationTree,
}

impl ChainManager {
    pub fn new(layout: Layout) -> Self {
        ChainManager {
            layout,
            table: BlockTable::new(layout),
            tree: AllocationTree::new(layout),
        }
    }

    pub fn tree(&self) -> &AllocationTree {
        &self.tree
    }

    /// Point `block` at `next`, leaving its tree bits alone
    pub fn link_blocks<D: MemoryDevice + ?Sized>(
        &self,
        device: &mut D,
        block: u16,
        next: u16,
    ) -> Result<()> {
        self.layout.check_block(block)?;
        self.layout.check_block(next)?;
        self.table.write_link(device, block, ChainLink::to(next))
    }

    pub fn link<D: MemoryDevice + ?Sized>(&self, device: &D, block: u16) -> Result<ChainLink> {
        self.layout.check_block(block)?;
        self.table.read_link(device, block)
    }

    /// Successor of `block`; fails on the tail
    pub fn next_block<D: MemoryDevice + ?Sized>(&self, device: &D, block: u16) -> Result<u16> {
        let link = self.link(device, block)?;
        if link.end_of_chain {
            return Err(StoreError::EndOfChain(block));
        }
        self.layout.check_block(link.next)?;
        Ok(link.next)
    }

    /// Append a fresh block after `tail` and return it
    pub fn grow<D: MemoryDevice + ?Sized>(&self, device: &mut D, tail: u16) -> Result<u16> {
        let block = self.tree.allocate_block(device)?;
        if let Err(e) = self.link_blocks(device, tail, block) {
            self.tree.free_block(device, block)?;
            return Err(e);
        }
        debug!("Chain grew from block {} to block {}", tail, block);
        Ok(block)
    }

    /// Block to write after a full `block`: its existing successor, or a
    /// fresh one appended when `block` is the tail
    pub fn next_or_grow<D: MemoryDevice + ?Sized>(&self, device: &mut D, block: u16) -> Result<u16> {
        let link = self.link(device, block)?;
        if link.end_of_chain {
            return self.grow(device, block);
        }
        self.layout.check_block(link.next)?;
        Ok(link.next)
    }

    /// Free every block of the chain starting at `first`, returning the count
    ///
    /// The whole chain is walked and checked first; a chain that is cyclic,
    /// dangling or shares a free block is reported without freeing anything.
    pub fn delete_chain<D: MemoryDevice + ?Sized>(&self, device: &mut D, first: u16) -> Result<u16> {
        let blocks = self.walk(device, first)?;
        for &block in &blocks {
            if !self.tree.is_allocated(device, block)? {
                warn!("Chain at block {} runs through free block {}", first, block);
                return Err(StoreError::DoubleFree(block));
            }
        }

        for &block in &blocks {
            self.tree.free_block(device, block)?;
        }

        debug!("Deleted chain at block {} ({} blocks)", first, blocks.len());
        Ok(blocks.len() as u16)
    }

    /// Block indices of the chain starting at `first`, in order
    pub fn walk<D: MemoryDevice + ?Sized>(&self, device: &D, first: u16) -> Result<Vec<u16>> {
        let mut blocks = Vec::new();
        let mut block = first;

        for _ in 0..self.layout.data_blocks() {
            let link = self.link(device, block)?;
            blocks.push(block);
            if link.end_of_chain {
                return Ok(blocks);
            }
            block = link.next;
        }

        warn!("Chain at block {} never reached its end", first);
        Err(StoreError::ChainCorruption {
            start: first,
            walked: blocks.len(),
        })
    }
}
