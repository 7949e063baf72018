//! Directory entry structures

use serde::{Deserialize, Serialize};

/// One file's directory record
///
/// `file_size` is the length written at creation time; reads rebuild content
/// from the chain and never consult it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    /// Unique key
    pub filename: String,

    /// First block of the chain, `None` for empty files
    pub start_block: Option<u32>,

    /// Logical byte length (not block-padded)
    pub file_size: u64,
}

impl DirectoryEntry {
    pub fn new(filename: impl Into<String>, start_block: Option<u32>, file_size: u64) -> Self {
        DirectoryEntry {
            filename: filename.into(),
            start_block,
            file_size,
        }
    }

    /// True when the file owns no blocks
    pub fn is_empty(&self) -> bool {
        self.start_block.is_none()
    }
}

/// A directory table slot
///
/// Removed entries leave a tombstone so later probe chains stay intact.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Slot {
    #[default]
    Empty,
    Tombstone,
    Occupied(DirectoryEntry),
}

impl Slot {
    pub fn is_occupied(&self) -> bool {
        matches!(self, Slot::Occupied(_))
    }

    pub fn entry(&self) -> Option<&DirectoryEntry> {
        match self {
            Slot::Occupied(entry) => Some(entry),
            _ => None,
        }
    }
}
