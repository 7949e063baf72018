//! Stack-ordered free list
//!
//! Free blocks live on a stack: allocation pops, release pushes, so the most
//! recently released blocks are reused first. A fresh (or reset) list is
//! stacked so blocks come out in ascending index order, which is what makes
//! defragmentation pack files from block 0 upward.
//!
//! A bitmap mirrors the stack for O(1) membership checks:
//! - 0 = free block
//! - 1 = allocated block

use crate::allocator::BlockAllocator;
use crate::error::{ChainFsError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "FreeListSnapshot", try_from = "FreeListSnapshot")]
pub struct FreeListAllocator {
    /// Free block indices; the next allocation comes from the end
    stack: Vec<u32>,

    /// Allocation bitmap (each word = 64 blocks)
    bitmap: Vec<u64>,

    total_blocks: u32,
}

/// Persisted form: the stack order is all that's needed to rebuild
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FreeListSnapshot {
    pub total_blocks: u32,
    pub stack: Vec<u32>,
}

impl FreeListAllocator {
    /// Create a free list with every block free
    pub fn new(total_blocks: u32) -> Self {
        let mut alloc = FreeListAllocator {
            stack: Vec::new(),
            bitmap: Vec::new(),
            total_blocks,
        };
        alloc.reset();
        alloc
    }

    /// Check if a specific block is free
    pub fn is_free(&self, index: u32) -> bool {
        if index >= self.total_blocks {
            return false;
        }
        let (word, bit) = Self::position(index);
        self.bitmap[word] & (1u64 << bit) == 0
    }

    /// Free block indices, next-to-allocate last
    pub fn free_indices(&self) -> &[u32] {
        &self.stack
    }

    fn position(index: u32) -> (usize, usize) {
        ((index / 64) as usize, (index % 64) as usize)
    }

    fn mark_allocated(&mut self, index: u32) {
        let (word, bit) = Self::position(index);
        self.bitmap[word] |= 1u64 << bit;
    }

    fn mark_free(&mut self, index: u32) {
        let (word, bit) = Self::position(index);
        self.bitmap[word] &= !(1u64 << bit);
    }

    fn check_releasable(&self, index: u32) -> Result<()> {
        if index >= self.total_blocks {
            return Err(ChainFsError::InvalidBlockIndex(index));
        }
        if self.is_free(index) {
            return Err(ChainFsError::BlockAlreadyFree(index));
        }
        Ok(())
    }
}

impl BlockAllocator for FreeListAllocator {
    fn allocate(&mut self, count: usize) -> Result<Vec<u32>> {
        if count > self.stack.len() {
            return Err(ChainFsError::InsufficientSpace {
                needed: count,
                available: self.stack.len(),
            });
        }

        let split = self.stack.len() - count;
        let mut allocated = self.stack.split_off(split);
        // Pop order: top of the stack first
        allocated.reverse();

        for &index in &allocated {
            self.mark_allocated(index);
        }

        Ok(allocated)
    }

    fn release(&mut self, index: u32) -> Result<()> {
        self.check_releasable(index)?;
        self.mark_free(index);
        self.stack.push(index);
        Ok(())
    }

    fn release_all(&mut self, blocks: &[u32]) -> Result<()> {
        for (i, &index) in blocks.iter().enumerate() {
            self.check_releasable(index)?;
            if blocks[..i].contains(&index) {
                return Err(ChainFsError::BlockAlreadyFree(index));
            }
        }

        for &index in blocks {
            self.mark_free(index);
            self.stack.push(index);
        }

        Ok(())
    }

    fn reset(&mut self) {
        let num_words = (self.total_blocks as usize + 63) / 64;
        self.bitmap = vec![0u64; num_words];
        self.stack = (0..self.total_blocks).rev().collect();
    }

    fn fragmentation_score(&self) -> f64 {
        if self.total_blocks == 0 {
            return 0.0;
        }

        // Count transitions between free and allocated runs
        let mut transitions = 0usize;
        let mut prev_allocated = false;

        for index in 0..self.total_blocks {
            let is_allocated = !self.is_free(index);
            if is_allocated != prev_allocated {
                transitions += 1;
            }
            prev_allocated = is_allocated;
        }

        (transitions as f64) / (self.total_blocks as f64)
    }

    fn total_blocks(&self) -> usize {
        self.total_blocks as usize
    }

    fn free_blocks(&self) -> usize {
        self.stack.len()
    }
}

impl From<FreeListAllocator> for FreeListSnapshot {
    fn from(alloc: FreeListAllocator) -> Self {
        FreeListSnapshot {
            total_blocks: alloc.total_blocks,
            stack: alloc.stack,
        }
    }
}

impl TryFrom<FreeListSnapshot> for FreeListAllocator {
    type Error = String;

    fn try_from(snapshot: FreeListSnapshot) -> std::result::Result<Self, Self::Error> {
        let num_words = (snapshot.total_blocks as usize + 63) / 64;
        let mut alloc = FreeListAllocator {
            stack: Vec::with_capacity(snapshot.stack.len()),
            bitmap: vec![0u64; num_words],
            total_blocks: snapshot.total_blocks,
        };

        // Start fully allocated, then free what the stack lists
        for index in 0..alloc.total_blocks {
            alloc.mark_allocated(index);
        }

        for index in snapshot.stack {
            if index >= alloc.total_blocks {
                return Err(format!("free block {} out of range", index));
            }
            if alloc.is_free(index) {
                return Err(format!("free block {} listed twice", index));
            }
            alloc.mark_free(index);
            alloc.stack.push(index);
        }

        Ok(alloc)
    }
}
