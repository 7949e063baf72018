//! Container geometry and configuration
//!
//! A container is one fixed-size file split into three zones, in this order:
//!
//! ```text
//! ┌──────────────────────────────┐ offset 0
//! │ Directory zone (1 MiB)       │  serialized directory table
//! ├──────────────────────────────┤
//! │ Free-list zone (1 MiB)       │  serialized free block stack
//! ├──────────────────────────────┤
//! │ Data zone (8 MiB)            │  block_count x block_size
//! │  [payload ... | next: i32]   │
//! └──────────────────────────────┘
//! ```

use crate::error::{ChainFsError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const BLOCK_SIZE: u32 = 1024;
pub const DIR_ZONE_SIZE: u64 = 1024 * 1024;
pub const FREE_ZONE_SIZE: u64 = 1024 * 1024;
pub const DATA_ZONE_SIZE: u64 = 8 * 1024 * 1024;

/// Size of the trailing next-block pointer in every block
pub const POINTER_SIZE: usize = std::mem::size_of::<i32>();

/// User-facing container configuration
///
/// Every field defaults to the standard 10 MiB container geometry, so a TOML
/// file only needs to name what it overrides:
///
/// ```toml
/// block_size = 512
/// data_zone_size = 65536
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ContainerConfig {
    /// Block size in bytes, including the 4-byte next pointer
    pub block_size: u32,

    /// Reserved bytes for the serialized directory
    pub directory_zone_size: u64,

    /// Reserved bytes for the serialized free list
    pub free_list_zone_size: u64,

    /// Bytes of block storage (must be a whole number of blocks)
    pub data_zone_size: u64,

    /// Persist directory and free list into their zones.
    ///
    /// When false the zones are never touched and every open starts with an
    /// empty directory, even if the data zone still holds bytes.
    pub persist_metadata: bool,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        ContainerConfig {
            block_size: BLOCK_SIZE,
            directory_zone_size: DIR_ZONE_SIZE,
            free_list_zone_size: FREE_ZONE_SIZE,
            data_zone_size: DATA_ZONE_SIZE,
            persist_metadata: true,
        }
    }
}

impl ContainerConfig {
    /// Small geometry with `block_count` blocks of `block_size` bytes
    pub fn with_geometry(block_size: u32, block_count: u32) -> Self {
        ContainerConfig {
            block_size,
            data_zone_size: block_size as u64 * block_count as u64,
            ..Default::default()
        }
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: ContainerConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Check that the zone sizes describe a usable container
    pub fn validate(&self) -> Result<()> {
        if self.block_size as usize <= POINTER_SIZE {
            return Err(ChainFsError::InvalidConfig(format!(
                "block_size must exceed {} bytes, got {}",
                POINTER_SIZE, self.block_size
            )));
        }

        if self.data_zone_size % self.block_size as u64 != 0 {
            return Err(ChainFsError::InvalidConfig(format!(
                "data_zone_size {} is not a multiple of block_size {}",
                self.data_zone_size, self.block_size
            )));
        }

        let block_count = self.data_zone_size / self.block_size as u64;
        if block_count == 0 {
            return Err(ChainFsError::InvalidConfig(
                "data zone holds no blocks".to_string(),
            ));
        }

        // Next pointers are signed 32-bit with -1 as terminator
        if block_count > i32::MAX as u64 {
            return Err(ChainFsError::InvalidConfig(format!(
                "{} blocks exceed the addressable maximum {}",
                block_count,
                i32::MAX
            )));
        }

        if self.persist_metadata && (self.directory_zone_size == 0 || self.free_list_zone_size == 0)
        {
            return Err(ChainFsError::InvalidConfig(
                "metadata zones must be non-empty when persist_metadata is set".to_string(),
            ));
        }

        Ok(())
    }

    /// Validate and compute zone offsets
    pub fn layout(&self) -> Result<ContainerLayout> {
        self.validate()?;

        let free_list_offset = self.directory_zone_size;
        let data_offset = free_list_offset + self.free_list_zone_size;

        Ok(ContainerLayout {
            block_size: self.block_size,
            block_count: (self.data_zone_size / self.block_size as u64) as u32,
            directory_offset: 0,
            directory_size: self.directory_zone_size,
            free_list_offset,
            free_list_size: self.free_list_zone_size,
            data_offset,
            data_size: self.data_zone_size,
        })
    }
}

/// Byte-level geometry derived from a validated [`ContainerConfig`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerLayout {
    pub block_size: u32,
    pub block_count: u32,
    pub directory_offset: u64,
    pub directory_size: u64,
    pub free_list_offset: u64,
    pub free_list_size: u64,
    pub data_offset: u64,
    pub data_size: u64,
}

impl ContainerLayout {
    /// Payload bytes per block (block size minus the next pointer)
    pub fn payload_capacity(&self) -> usize {
        self.block_size as usize - POINTER_SIZE
    }

    /// Byte offset of a block slot inside the container
    pub fn block_offset(&self, index: u32) -> u64 {
        self.data_offset + index as u64 * self.block_size as u64
    }

    pub fn total_size(&self) -> u64 {
        self.data_offset + self.data_size
    }
}
