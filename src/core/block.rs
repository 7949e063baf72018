//! Fixed-size block slots in the data zone
//!
//! Each block is `block_size` bytes: a zero-padded payload followed by a
//! little-endian `i32` next pointer (`-1` terminates a chain).

use crate::config::{ContainerLayout, POINTER_SIZE};
use crate::error::{ChainFsError, Result};
use crate::io::ContainerFile;

/// On-disk next pointer value marking the last block of a chain
pub const END_OF_CHAIN: i32 = -1;

/// Decoded next pointer of a block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Link {
    Next(u32),
    End,
}

impl Link {
    pub fn to_raw(self) -> i32 {
        match self {
            Link::Next(index) => index as i32,
            Link::End => END_OF_CHAIN,
        }
    }

    /// Decode a raw pointer; negative values other than the sentinel are corrupt
    pub fn from_raw(raw: i32, block: u32) -> Result<Self> {
        match raw {
            END_OF_CHAIN => Ok(Link::End),
            n if n >= 0 => Ok(Link::Next(n as u32)),
            n => Err(ChainFsError::corrupt(
                block,
                format!("invalid next pointer {}", n),
            )),
        }
    }
}

/// A block as read back from the data zone
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockFrame {
    /// Payload up to (not including) the first zero byte
    pub payload: Vec<u8>,
    pub next: Link,
}

/// Byte-level access to block slots
pub struct BlockStore {
    file: ContainerFile,
    layout: ContainerLayout,
}

impl BlockStore {
    pub fn new(file: ContainerFile, layout: ContainerLayout) -> Self {
        BlockStore { file, layout }
    }

    pub fn layout(&self) -> &ContainerLayout {
        &self.layout
    }

    pub(crate) fn file_mut(&mut self) -> &mut ContainerFile {
        &mut self.file
    }

    pub fn file(&self) -> &ContainerFile {
        &self.file
    }

    fn check_index(&self, index: u32) -> Result<()> {
        if index >= self.layout.block_count {
            return Err(ChainFsError::InvalidBlockIndex(index));
        }
        Ok(())
    }

    /// Write one block slot
    ///
    /// `payload` is truncated or zero-padded to the payload capacity.
    pub fn write_block(&mut self, index: u32, payload: &[u8], next: Link) -> Result<()> {
        self.check_index(index)?;

        let capacity = self.layout.payload_capacity();
        let mut buffer = vec![0u8; self.layout.block_size as usize];
        let len = payload.len().min(capacity);
        buffer[..len].copy_from_slice(&payload[..len]);
        buffer[capacity..].copy_from_slice(&next.to_raw().to_le_bytes());

        let offset = self.layout.block_offset(index);
        self.file.write_at(offset, &buffer)
    }

    /// Read one block slot
    pub fn read_block(&mut self, index: u32) -> Result<BlockFrame> {
        self.check_index(index)?;

        let mut buffer = vec![0u8; self.layout.block_size as usize];
        let offset = self.layout.block_offset(index);
        self.file.read_at(offset, &mut buffer)?;

        let capacity = self.layout.payload_capacity();
        let mut raw = [0u8; POINTER_SIZE];
        raw.copy_from_slice(&buffer[capacity..]);
        let next = Link::from_raw(i32::from_le_bytes(raw), index)?;

        let end = buffer[..capacity]
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(capacity);
        buffer.truncate(end);

        Ok(BlockFrame {
            payload: buffer,
            next,
        })
    }

    pub fn sync(&mut self) -> Result<()> {
        self.file.sync()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ContainerConfig;
    use tempfile::NamedTempFile;

    fn store(temp: &NamedTempFile, block_size: u32, blocks: u32) -> BlockStore {
        let layout = ContainerConfig::with_geometry(block_size, blocks)
            .layout()
            .unwrap();
        let file = ContainerFile::create(temp.path(), layout.total_size()).unwrap();
        BlockStore::new(file, layout)
    }

    #[test]
    fn test_link_conversion() {
        assert_eq!(Link::from_raw(-1, 0).unwrap(), Link::End);
        assert_eq!(Link::from_raw(7, 0).unwrap(), Link::Next(7));
        assert_eq!(Link::Next(7).to_raw(), 7);
        assert_eq!(Link::End.to_raw(), -1);
        assert!(matches!(
            Link::from_raw(-5, 3),
            Err(ChainFsError::CorruptChain { block: 3, .. })
        ));
    }

    #[test]
    fn test_write_and_read_block() {
        let temp = NamedTempFile::new().unwrap();
        let mut store = store(&temp, 16, 4);

        store.write_block(2, b"hello", Link::Next(3)).unwrap();
        store.write_block(3, b"world", Link::End).unwrap();

        let frame = store.read_block(2).unwrap();
        assert_eq!(frame.payload, b"hello");
        assert_eq!(frame.next, Link::Next(3));

        let frame = store.read_block(3).unwrap();
        assert_eq!(frame.payload, b"world");
        assert_eq!(frame.next, Link::End);
    }

    #[test]
    fn test_payload_truncated_to_capacity() {
        let temp = NamedTempFile::new().unwrap();
        let mut store = store(&temp, 16, 2);

        store
            .write_block(0, b"0123456789abcdefXYZ", Link::End)
            .unwrap();

        let frame = store.read_block(0).unwrap();
        assert_eq!(frame.payload, b"0123456789ab");
        assert_eq!(frame.next, Link::End);
    }

    #[test]
    fn test_payload_stops_at_zero_byte() {
        let temp = NamedTempFile::new().unwrap();
        let mut store = store(&temp, 16, 2);

        store.write_block(1, b"abc\0def", Link::End).unwrap();
        assert_eq!(store.read_block(1).unwrap().payload, b"abc");
    }

    #[test]
    fn test_rewrite_clears_old_payload() {
        let temp = NamedTempFile::new().unwrap();
        let mut store = store(&temp, 16, 2);

        store.write_block(0, b"long payload", Link::End).unwrap();
        store.write_block(0, b"hi", Link::End).unwrap();
        assert_eq!(store.read_block(0).unwrap().payload, b"hi");
    }

    #[test]
    fn test_index_out_of_range() {
        let temp = NamedTempFile::new().unwrap();
        let mut store = store(&temp, 16, 4);

        assert!(matches!(
            store.write_block(4, b"x", Link::End),
            Err(ChainFsError::InvalidBlockIndex(4))
        ));
        assert!(matches!(
            store.read_block(100),
            Err(ChainFsError::InvalidBlockIndex(100))
        ));
    }

    #[test]
    fn test_zeroed_block_reads_as_empty_successor_zero() {
        let temp = NamedTempFile::new().unwrap();
        let mut store = store(&temp, 16, 2);

        // A never-written slot decodes as empty payload pointing at block 0
        let frame = store.read_block(1).unwrap();
        assert!(frame.payload.is_empty());
        assert_eq!(frame.next, Link::Next(0));
    }
}
