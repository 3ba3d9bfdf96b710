//! Block allocation for the sample area
//!
//! Free space is tracked by a complete 4-ary bitmap tree laid over the block
//! table (see [`tree`]). Allocation and release both touch at most one node
//! per tree level, so their cost is fixed regardless of how full the device is.

pub mod tree;

pub use tree::AllocationTree;

use crate::layout::BLOCK_SIZE;

/// Number of blocks a chain holding `size` bytes occupies
///
/// A chain always owns its first block, so an empty sample still costs one.
pub fn blocks_for_size(size: u32) -> u16 {
    let blocks = (size as usize + BLOCK_SIZE - 1) / BLOCK_SIZE;
    blocks.clamp(1, u16::MAX as usize) as u16
}
