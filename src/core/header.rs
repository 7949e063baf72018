use crate::error::{ChainFsError, Result};

pub const FORMAT_VERSION: u16 = 1;

/// Which metadata zone a header belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoneKind {
    Directory,
    FreeList,
}

impl ZoneKind {
    pub fn magic(self) -> [u8; 8] {
        match self {
            ZoneKind::Directory => *b"CHFSDIR\x01",
            ZoneKind::FreeList => *b"CHFSFRE\x01",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ZoneKind::Directory => "directory",
            ZoneKind::FreeList => "free-list",
        }
    }
}

/// Metadata zone header
///
/// Sits at the start of the directory and free-list zones, ahead of the
/// serialized payload. Records the geometry the payload was written for so a
/// container is never reinterpreted with a different block layout.
///
/// # Layout (little-endian)
///
/// ```text
/// 0..8    magic
/// 8..10   format version
/// 10..12  reserved
/// 12..16  block size
/// 16..20  block count
/// 20..28  payload length
/// 28..32  CRC-32 of payload
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZoneHeader {
    pub magic: [u8; 8],
    pub version: u16,
    pub block_size: u32,
    pub block_count: u32,
    pub payload_len: u64,
    pub checksum: u32,
}

impl ZoneHeader {
    pub const SIZE: usize = 32;

    /// Build a header describing `payload`
    pub fn new(kind: ZoneKind, block_size: u32, block_count: u32, payload: &[u8]) -> Self {
        ZoneHeader {
            magic: kind.magic(),
            version: FORMAT_VERSION,
            block_size,
            block_count,
            payload_len: payload.len() as u64,
            checksum: crc32fast::hash(payload),
        }
    }

    /// True for a never-written zone
    pub fn is_blank(bytes: &[u8]) -> bool {
        bytes.iter().take(Self::SIZE).all(|&b| b == 0)
    }

    /// Validate magic, version and geometry
    pub fn validate(&self, kind: ZoneKind, block_size: u32, block_count: u32) -> Result<()> {
        if self.magic != kind.magic() {
            return Err(ChainFsError::InvalidMagic(kind.name()));
        }

        if self.version != FORMAT_VERSION {
            return Err(ChainFsError::UnsupportedVersion(self.version));
        }

        if self.block_size != block_size || self.block_count != block_count {
            return Err(ChainFsError::LayoutMismatch {
                stored_block_size: self.block_size,
                stored_block_count: self.block_count,
                block_size,
                block_count,
            });
        }

        Ok(())
    }

    /// Check the payload against the stored checksum
    pub fn verify_payload(&self, kind: ZoneKind, payload: &[u8]) -> Result<()> {
        if payload.len() as u64 != self.payload_len || crc32fast::hash(payload) != self.checksum {
            return Err(ChainFsError::ChecksumMismatch { zone: kind.name() });
        }
        Ok(())
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[0..8].copy_from_slice(&self.magic);
        bytes[8..10].copy_from_slice(&self.version.to_le_bytes());
        bytes[12..16].copy_from_slice(&self.block_size.to_le_bytes());
        bytes[16..20].copy_from_slice(&self.block_count.to_le_bytes());
        bytes[20..28].copy_from_slice(&self.payload_len.to_le_bytes());
        bytes[28..32].copy_from_slice(&self.checksum.to_le_bytes());
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < Self::SIZE {
            return Err(ChainFsError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "Insufficient bytes for zone header",
            )));
        }

        let mut magic = [0u8; 8];
        magic.copy_from_slice(&bytes[0..8]);

        Ok(ZoneHeader {
            magic,
            version: u16::from_le_bytes([bytes[8], bytes[9]]),
            block_size: u32::from_le_bytes([bytes[12], bytes[13], bytes[14], bytes[15]]),
            block_count: u32::from_le_bytes([bytes[16], bytes[17], bytes[18], bytes[19]]),
            payload_len: u64::from_le_bytes([
                bytes[20], bytes[21], bytes[22], bytes[23], bytes[24], bytes[25], bytes[26],
                bytes[27],
            ]),
            checksum: u32::from_le_bytes([bytes[28], bytes[29], bytes[30], bytes[31]]),
        })
    }
}
