//! 4-ary bitmap tree allocator
//!
//! The tree has depth 5 and 4^5 = 1024 leaves, one per block table index.
//! Every interior node keeps a 4-bit mask in some block table record; bit `i`
//! is set when child `i` has no free leaf left. For the last interior level the
//! children are leaves, so a set bit there means "this block is allocated".
//!
//! Interior nodes are numbered breadth-first from the root and stored from the
//! top of the block table downwards: the root lives in record 1023, its four
//! children in 1022..=1019, and so on. Those records still describe data
//! blocks; only the tree bits of the record are used here.
//!
//! Leaves that cannot hold data (the root record itself, and every index past
//! the end of the device) are reserved at format time so the search never
//! reaches them.

use crate::block_table::{BlockTable, ChainLink, TreeNode};
use crate::device::MemoryDevice;
use crate::error::{Result, StoreError};
use crate::layout::{Layout, ROOT_BLOCK, TABLE_BLOCKS, TREE_DEPTH, TREE_FANOUT};
use tracing::{debug, warn};

/// Leaf-parent level (its children are blocks)
const LAST_LEVEL: usize = TREE_DEPTH - 1;

/// One step of a root-to-leaf walk: the node's record and the child taken
#[derive(Debug, Clone, Copy, Default)]
struct Step {
    node: u16,
    child: u8,
}

/// Bitmap tree allocator over the block table of a [`Layout`]
#[derive(Debug, Clone, Copy)]
pub struct AllocationTree {
    layout: Layout,
    table: BlockTable,
}

impl AllocationTree {
    pub fn new(layout: Layout) -> Self {
        AllocationTree {
            layout,
            table: BlockTable::new(layout),
        }
    }

    /// Block table record holding the node at `level` reached via `prefix`
    ///
    /// `prefix` is the 2-bits-per-level path from the root (0 for the root).
    pub fn node_record(level: usize, prefix: u16) -> u16 {
        let first_at_level = ((1u16 << (2 * level)) - 1) / 3;
        ROOT_BLOCK - (first_at_level + prefix)
    }

    /// Path from the root to the leaf for `block`
    fn path_to(block: u16) -> [Step; TREE_DEPTH] {
        let mut path = [Step::default(); TREE_DEPTH];
        for (level, step) in path.iter_mut().enumerate() {
            let prefix = block >> (2 * (TREE_DEPTH - level));
            let child = (block >> (2 * (LAST_LEVEL - level))) & 0b11;
            *step = Step {
                node: Self::node_record(level, prefix),
                child: child as u8,
            };
        }
        path
    }

    /// Reset the table to "everything free", then reserve unusable leaves
    pub fn format<D: MemoryDevice + ?Sized>(&self, device: &mut D) -> Result<()> {
        self.table.clear(device)?;

        for block in self.layout.data_blocks()..TABLE_BLOCKS {
            self.mark_full(device, &Self::path_to(block))?;
        }

        debug!(
            "Formatted allocation tree: {} data blocks, {} reserved",
            self.layout.data_blocks(),
            TABLE_BLOCKS - self.layout.data_blocks()
        );
        Ok(())
    }

    /// Take the lowest-numbered free block and mark it as a chain tail
    pub fn allocate_block<D: MemoryDevice + ?Sized>(&self, device: &mut D) -> Result<u16> {
        let root = self.table.read_tree(device, ROOT_BLOCK)?;
        if root.is_full() {
            return Err(StoreError::OutOfSpace);
        }

        let mut path = [Step::default(); TREE_DEPTH];
        let mut prefix = 0u16;

        for (level, step) in path.iter_mut().enumerate() {
            let node = Self::node_record(level, prefix);
            let child = self
                .table
                .read_tree(device, node)?
                .first_open_child()
                .ok_or(StoreError::TreeCorruption { node })?;

            *step = Step { node, child };
            prefix = (prefix << 2) | child as u16;
        }

        let block = prefix;
        if let Err(e) = self.layout.check_block(block) {
            warn!("Allocation tree handed out unusable block {}", block);
            return Err(e);
        }

        self.table.write_link(device, block, ChainLink::tail())?;
        self.mark_full(device, &path)?;

        debug!("Allocated block {}", block);
        Ok(block)
    }

    /// Return a block to the free pool and clear its chain link
    pub fn free_block<D: MemoryDevice + ?Sized>(&self, device: &mut D, block: u16) -> Result<()> {
        self.layout.check_block(block)?;

        let path = Self::path_to(block);
        let leaf = path[LAST_LEVEL];
        if !self.table.read_tree(device, leaf.node)?.is_child_full(leaf.child) {
            warn!("Double free of block {}", block);
            return Err(StoreError::DoubleFree(block));
        }

        for step in path.iter().rev() {
            let mut node = self.table.read_tree(device, step.node)?;
            if !node.is_child_full(step.child) {
                break;
            }
            node.clear_child_full(step.child);
            self.table.write_tree(device, step.node, node)?;
        }

        self.table.write_link(device, block, ChainLink::default())?;

        debug!("Freed block {}", block);
        Ok(())
    }

    /// Set the taken branch on each node from the leaf up, stopping at the
    /// first node that still has room
    fn mark_full<D: MemoryDevice + ?Sized>(
        &self,
        device: &mut D,
        path: &[Step; TREE_DEPTH],
    ) -> Result<()> {
        for step in path.iter().rev() {
            let mut node = self.table.read_tree(device, step.node)?;
            node.set_child_full(step.child);
            self.table.write_tree(device, step.node, node)?;
            if !node.is_full() {
                break;
            }
        }
        Ok(())
    }

    pub fn is_allocated<D: MemoryDevice + ?Sized>(&self, device: &D, block: u16) -> Result<bool> {
        if block >= TABLE_BLOCKS {
            return Err(StoreError::InvalidBlock(block));
        }
        let leaf = Self::path_to(block)[LAST_LEVEL];
        Ok(self.table.read_tree(device, leaf.node)?.is_child_full(leaf.child))
    }

    /// Count free data blocks by scanning the leaf-parent level
    ///
    /// Leaves past the data area are never counted, so an unformatted table
    /// cannot report more free blocks than the device holds.
    pub fn free_blocks<D: MemoryDevice + ?Sized>(&self, device: &D) -> Result<u16> {
        let data_blocks = self.layout.data_blocks();
        let mut free = 0u16;
        for prefix in 0..TABLE_BLOCKS / TREE_FANOUT {
            let first_leaf = prefix * TREE_FANOUT;
            if first_leaf >= data_blocks {
                break;
            }
            let node: TreeNode = self
                .table
                .read_tree(device, Self::node_record(LAST_LEVEL, prefix))?;
            for child in 0..TREE_FANOUT as u8 {
                if first_leaf + (child as u16) < data_blocks && !node.is_child_full(child) {
                    free += 1;
                }
            }
        }
        Ok(free)
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::MAX_DATA_BLOCKS;
    use crate::device::RamDevice;
    use std::collections::HashSet;

    /// Device large enough for all 1023 data blocks
    fn full_size() -> (AllocationTree, RamDevice) {
        let layout = Layout::new(0, 2848 + 1023 * 1024).unwrap();
        let tree = AllocationTree::new(layout);
        let mut dev = RamDevice::new(layout.capacity());
        tree.format(&mut dev).unwrap();
        (tree, dev)
    }

    fn small(blocks: u32) -> (AllocationTree, RamDevice) {
        let layout = Layout::new(0, 2848 + blocks * 1024).unwrap();
        let tree = AllocationTree::new(layout);
        let mut dev = RamDevice::new(layout.capacity());
        tree.format(&mut dev).unwrap();
        (tree, dev)
    }

    #[test]
    fn test_node_records_are_distinct() {
        let mut seen = HashSet::new();
        for level in 0..TREE_DEPTH {
            for prefix in 0..(1u16 << (2 * level)) {
                assert!(seen.insert(AllocationTree::node_record(level, prefix)));
            }
        }
        assert_eq!(seen.len(), 341);
        assert_eq!(AllocationTree::node_record(0, 0), ROOT_BLOCK);
        assert_eq!(AllocationTree::node_record(1, 0), 1022);
        assert_eq!(AllocationTree::node_record(4, 255), ROOT_BLOCK - 340);
    }

    #[test]
    fn test_format_reserves_root_leaf() {
        let (tree, dev) = full_size();
        assert_eq!(tree.free_blocks(&dev).unwrap(), MAX_DATA_BLOCKS);
        assert!(tree.is_allocated(&dev, ROOT_BLOCK).unwrap());
        assert!(!tree.is_allocated(&dev, 0).unwrap());
    }

    #[test]
    fn test_unformatted_table_counts_only_data_blocks() {
        let layout = Layout::new(0, 2848 + 10 * 1024).unwrap();
        let tree = AllocationTree::new(layout);
        let dev = RamDevice::new(layout.capacity());

        assert_eq!(tree.free_blocks(&dev).unwrap(), 10);

        let layout = Layout::new(0, 2848 + 1023 * 1024).unwrap();
        let tree = AllocationTree::new(layout);
        let dev = RamDevice::new(layout.capacity());
        assert_eq!(tree.free_blocks(&dev).unwrap(), MAX_DATA_BLOCKS);
    }

    #[test]
    fn test_allocates_leftmost_first() {
        let (tree, mut dev) = full_size();
        assert_eq!(tree.allocate_block(&mut dev).unwrap(), 0);
        assert_eq!(tree.allocate_block(&mut dev).unwrap(), 1);
        assert_eq!(tree.allocate_block(&mut dev).unwrap(), 2);

        tree.free_block(&mut dev, 1).unwrap();
        assert_eq!(tree.allocate_block(&mut dev).unwrap(), 1);
        assert_eq!(tree.allocate_block(&mut dev).unwrap(), 3);
        assert_eq!(tree.allocate_block(&mut dev).unwrap(), 4);
    }

    #[test]
    fn test_allocated_block_is_chain_tail() {
        let (tree, mut dev) = full_size();
        let block = tree.allocate_block(&mut dev).unwrap();
        let table = BlockTable::new(*tree.layout());
        assert_eq!(table.read_link(&dev, block).unwrap(), ChainLink::tail());

        tree.free_block(&mut dev, block).unwrap();
        assert_eq!(table.read_link(&dev, block).unwrap(), ChainLink::default());
    }

    #[test]
    fn test_exhaustion() {
        let (tree, mut dev) = full_size();
        let mut seen = HashSet::new();
        for _ in 0..MAX_DATA_BLOCKS {
            let block = tree.allocate_block(&mut dev).unwrap();
            assert!(block < ROOT_BLOCK);
            assert!(seen.insert(block), "block {} allocated twice", block);
        }
        assert_eq!(tree.free_blocks(&dev).unwrap(), 0);
        assert!(matches!(
            tree.allocate_block(&mut dev),
            Err(StoreError::OutOfSpace)
        ));

        tree.free_block(&mut dev, 700).unwrap();
        assert_eq!(tree.allocate_block(&mut dev).unwrap(), 700);
    }

    #[test]
    fn test_small_device_never_hands_out_missing_blocks() {
        let (tree, mut dev) = small(5);
        assert_eq!(tree.free_blocks(&dev).unwrap(), 5);

        let blocks: Vec<u16> = (0..5).map(|_| tree.allocate_block(&mut dev).unwrap()).collect();
        assert_eq!(blocks, vec![0, 1, 2, 3, 4]);
        assert!(matches!(
            tree.allocate_block(&mut dev),
            Err(StoreError::OutOfSpace)
        ));
    }

    #[test]
    fn test_double_free_rejected() {
        let (tree, mut dev) = full_size();
        let block = tree.allocate_block(&mut dev).unwrap();
        tree.free_block(&mut dev, block).unwrap();
        assert!(matches!(
            tree.free_block(&mut dev, block),
            Err(StoreError::DoubleFree(0))
        ));
        assert!(matches!(
            tree.free_block(&mut dev, 10),
            Err(StoreError::DoubleFree(10))
        ));
    }

    #[test]
    fn test_free_out_of_range() {
        let (tree, mut dev) = small(8);
        assert!(matches!(
            tree.free_block(&mut dev, 8),
            Err(StoreError::InvalidBlock(8))
        ));
        assert!(matches!(
            tree.free_block(&mut dev, ROOT_BLOCK),
            Err(StoreError::InvalidBlock(ROOT_BLOCK))
        ));
    }

    #[test]
    fn test_full_subtree_reopens_on_free() {
        let (tree, mut dev) = full_size();
        // Fill the first level-1 subtree (256 leaves) completely
        for expected in 0..256u16 {
            assert_eq!(tree.allocate_block(&mut dev).unwrap(), expected);
        }
        let root = BlockTable::new(*tree.layout()).read_tree(&dev, ROOT_BLOCK).unwrap();
        assert!(root.is_child_full(0));

        tree.free_block(&mut dev, 128).unwrap();
        let root = BlockTable::new(*tree.layout()).read_tree(&dev, ROOT_BLOCK).unwrap();
        assert!(!root.is_child_full(0));
        assert_eq!(tree.allocate_block(&mut dev).unwrap(), 128);
        assert_eq!(tree.allocate_block(&mut dev).unwrap(), 256);
    }

    #[test]
    fn test_tree_bits_and_links_share_records_safely() {
        let (tree, mut dev) = full_size();
        let table = BlockTable::new(*tree.layout());

        // Allocate up to a block whose record also stores an interior node
        let node_record = AllocationTree::node_record(1, 0);
        let mut last = 0;
        while last != node_record {
            last = tree.allocate_block(&mut dev).unwrap();
        }
        table.write_link(&mut dev, last, ChainLink::to(5)).unwrap();

        tree.free_block(&mut dev, 3).unwrap();
        assert_eq!(table.read_link(&dev, last).unwrap(), ChainLink::to(5));
        assert_eq!(tree.free_blocks(&dev).unwrap(), MAX_DATA_BLOCKS - node_record);
    }
}
