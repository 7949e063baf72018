use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChainFsError {
    #[error("File already exists: {0}")]
    AlreadyExists(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Insufficient space: {needed} blocks needed, {available} free")]
    InsufficientSpace { needed: usize, available: usize },

    #[error("Directory table is full")]
    TableFull,

    #[error("Corrupt chain at block {block}: {reason}")]
    CorruptChain { block: u32, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid block index: {0}")]
    InvalidBlockIndex(u32),

    #[error("Block already free: {0}")]
    BlockAlreadyFree(u32),

    #[error("Invalid filename: names must be non-empty")]
    InvalidFilename,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid magic number in {0} zone header")]
    InvalidMagic(&'static str),

    #[error("Unsupported metadata format version: {0}")]
    UnsupportedVersion(u16),

    #[error("Metadata checksum verification failed for {zone} zone")]
    ChecksumMismatch { zone: &'static str },

    #[error(
        "Container layout mismatch: stored {stored_block_size}x{stored_block_count}, \
         configured {block_size}x{block_count}"
    )]
    LayoutMismatch {
        stored_block_size: u32,
        stored_block_count: u32,
        block_size: u32,
        block_count: u32,
    },

    #[error("Corrupt metadata in {zone} zone: {reason}")]
    CorruptMetadata { zone: &'static str, reason: String },

    #[error("Container file too small: expected {expected} bytes, found {actual}")]
    ContainerSize { expected: u64, actual: u64 },

    #[error("Metadata for {zone} zone needs {needed} bytes (capacity: {capacity})")]
    MetadataOverflow {
        zone: &'static str,
        needed: u64,
        capacity: u64,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

impl ChainFsError {
    pub(crate) fn corrupt(block: u32, reason: impl Into<String>) -> Self {
        ChainFsError::CorruptChain {
            block,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ChainFsError>;
