//! Linked block chains
//!
//! A file's content is split into payload-sized chunks, one per block.
//! Block `i` of the allocation links to block `i + 1`; the last block holds
//! the end-of-chain sentinel. Empty content owns no blocks at all.

use crate::block::{BlockStore, Link};
use crate::config::ContainerLayout;
use crate::error::{ChainFsError, Result};

/// Splits content into chained blocks and reassembles it
#[derive(Debug, Clone, Copy)]
pub struct ChainCodec {
    capacity: usize,
    block_count: u32,
}

impl ChainCodec {
    pub fn new(layout: &ContainerLayout) -> Self {
        ChainCodec {
            capacity: layout.payload_capacity(),
            block_count: layout.block_count,
        }
    }

    /// Payload bytes carried by one block
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of blocks needed for `len` bytes of content
    pub fn chunk_count(&self, len: usize) -> usize {
        (len + self.capacity - 1) / self.capacity
    }

    /// Write `content` across `blocks`, linking them in the given order
    pub fn write(&self, store: &mut BlockStore, blocks: &[u32], content: &[u8]) -> Result<()> {
        debug_assert_eq!(blocks.len(), self.chunk_count(content.len()));

        for (i, chunk) in content.chunks(self.capacity).enumerate() {
            let next = match blocks.get(i + 1) {
                Some(&index) => Link::Next(index),
                None => Link::End,
            };
            store.write_block(blocks[i], chunk, next)?;
        }

        Ok(())
    }

    /// Reassemble a chain's content
    ///
    /// Content is cut at the first zero byte: a block whose payload stops short
    /// of capacity ends the logical content even if the chain continues.
    pub fn read(&self, store: &mut BlockStore, start: Option<u32>) -> Result<Vec<u8>> {
        let mut content = Vec::new();
        let mut truncated = false;

        self.walk(store, start, |payload| {
            if !truncated {
                content.extend_from_slice(&payload);
                truncated = payload.len() < self.capacity;
            }
        })?;

        Ok(content)
    }

    /// Block indices of a chain in link order
    pub fn blocks(&self, store: &mut BlockStore, start: Option<u32>) -> Result<Vec<u32>> {
        self.walk(store, start, |_| {})
    }

    /// Follow a chain from `start`, handing each payload to `visit`
    ///
    /// Fails with `CorruptChain` on a cycle or a pointer outside the data zone.
    fn walk<F>(&self, store: &mut BlockStore, start: Option<u32>, mut visit: F) -> Result<Vec<u32>>
    where
        F: FnMut(Vec<u8>),
    {
        let mut visited = vec![false; self.block_count as usize];
        let mut chain = Vec::new();

        let Some(mut current) = start else {
            return Ok(chain);
        };

        if current >= self.block_count {
            return Err(ChainFsError::corrupt(current, "start block out of range"));
        }

        loop {
            if visited[current as usize] {
                return Err(ChainFsError::corrupt(current, "cycle detected"));
            }
            visited[current as usize] = true;
            chain.push(current);

            let frame = store.read_block(current)?;
            visit(frame.payload);

            match frame.next {
                Link::End => return Ok(chain),
                Link::Next(next) if next >= self.block_count => {
                    return Err(ChainFsError::corrupt(
                        current,
                        format!("next pointer {} out of range", next),
                    ));
                }
                Link::Next(next) => current = next,
            }
        }
    }
}
