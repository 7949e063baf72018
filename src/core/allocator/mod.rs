//! Block allocation for the data zone
//!
//! Blocks are handed out individually; a file's blocks need not be
//! contiguous since chains link them explicitly.

pub mod free_list;

pub use free_list::FreeListAllocator;

use crate::error::Result;

/// Block allocator trait
///
/// Defines the interface for allocating and releasing data zone blocks.
pub trait BlockAllocator {
    /// Allocate exactly `count` blocks, in the order they should be linked
    ///
    /// Fails without side effects if fewer than `count` blocks are free.
    fn allocate(&mut self, count: usize) -> Result<Vec<u32>>;

    /// Return a single block to the free pool
    fn release(&mut self, index: u32) -> Result<()>;

    /// Return every block of a chain; all-or-nothing
    fn release_all(&mut self, blocks: &[u32]) -> Result<()>;

    /// Mark every block free again, restoring the initial allocation order
    fn reset(&mut self);

    /// Calculate fragmentation score (0.0 = no fragmentation, higher = more fragmented)
    fn fragmentation_score(&self) -> f64;

    /// Get total number of blocks managed
    fn total_blocks(&self) -> usize;

    /// Get number of free blocks available
    fn free_blocks(&self) -> usize;
}
