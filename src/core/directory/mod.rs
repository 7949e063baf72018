//! Open-addressing directory table
//!
//! Maps filenames to their chain's start block and logical size. Capacity is
//! fixed at the container's block count, so the table can always hold one
//! entry per block. Collisions resolve by linear probing; removals leave
//! tombstones that lookups skip and inserts reuse.

pub mod entry;

pub use entry::{DirectoryEntry, Slot};

use crate::error::{ChainFsError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Fixed-capacity hash directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "DirectorySnapshot", try_from = "DirectorySnapshot")]
pub struct DirectoryTable {
    slots: Vec<Slot>,

    /// Number of occupied slots
    len: usize,
}

/// Sparse persisted form: only non-empty slots, tombstones as `entry: None`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectorySnapshot {
    pub capacity: u32,
    pub slots: Vec<PersistedSlot>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedSlot {
    pub index: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry: Option<DirectoryEntry>,
}

impl DirectoryTable {
    /// Create an empty table with `capacity` slots
    pub fn new(capacity: u32) -> Self {
        DirectoryTable {
            slots: vec![Slot::Empty; capacity.max(1) as usize],
            len: 0,
        }
    }

    /// Polynomial rolling hash of the filename, reduced mod capacity
    pub fn hash(&self, filename: &str) -> usize {
        let capacity = self.slots.len() as u64;
        filename
            .bytes()
            .fold(0u64, |hash, b| (hash * 31 + b as u64) % capacity) as usize
    }

    /// Insert a new entry, returning the slot it landed in
    ///
    /// Probes past tombstones so a live duplicate further along is still
    /// caught, then claims the first free slot seen.
    pub fn insert(
        &mut self,
        filename: &str,
        start_block: Option<u32>,
        file_size: u64,
    ) -> Result<usize> {
        if filename.is_empty() {
            return Err(ChainFsError::InvalidFilename);
        }

        let capacity = self.slots.len();
        let mut idx = self.hash(filename);
        let mut target = None;

        for _ in 0..capacity {
            match &self.slots[idx] {
                Slot::Occupied(entry) if entry.filename == filename => {
                    return Err(ChainFsError::AlreadyExists(filename.to_string()));
                }
                Slot::Occupied(_) => {}
                Slot::Tombstone => {
                    target.get_or_insert(idx);
                }
                Slot::Empty => {
                    target.get_or_insert(idx);
                    break;
                }
            }
            idx = (idx + 1) % capacity;
        }

        let slot = target.ok_or(ChainFsError::TableFull)?;
        self.slots[slot] = Slot::Occupied(DirectoryEntry::new(filename, start_block, file_size));
        self.len += 1;

        Ok(slot)
    }

    /// Slot index holding `filename`, if present
    pub fn slot_of(&self, filename: &str) -> Option<usize> {
        let capacity = self.slots.len();
        let mut idx = self.hash(filename);

        for _ in 0..capacity {
            match &self.slots[idx] {
                Slot::Empty => return None,
                Slot::Occupied(entry) if entry.filename == filename => return Some(idx),
                _ => {}
            }
            idx = (idx + 1) % capacity;
        }

        None
    }

    /// Look up an entry by filename
    pub fn search(&self, filename: &str) -> Option<&DirectoryEntry> {
        self.slot_of(filename).and_then(|slot| self.slots[slot].entry())
    }

    /// Rewrite an existing entry's location and size in place
    pub fn update(
        &mut self,
        filename: &str,
        start_block: Option<u32>,
        file_size: u64,
    ) -> Result<()> {
        let slot = self
            .slot_of(filename)
            .ok_or_else(|| ChainFsError::NotFound(filename.to_string()))?;

        if let Slot::Occupied(entry) = &mut self.slots[slot] {
            entry.start_block = start_block;
            entry.file_size = file_size;
        }

        Ok(())
    }

    /// Tombstone an entry, returning it
    pub fn remove(&mut self, filename: &str) -> Option<DirectoryEntry> {
        let slot = self.slot_of(filename)?;
        let removed = std::mem::replace(&mut self.slots[slot], Slot::Tombstone);
        self.len -= 1;
        match removed {
            Slot::Occupied(entry) => Some(entry),
            _ => None,
        }
    }

    /// Occupied entries in slot order
    pub fn iter(&self) -> impl Iterator<Item = &DirectoryEntry> {
        self.slots.iter().filter_map(Slot::entry)
    }

    /// Copies of all occupied entries in slot order
    pub fn list_occupied(&self) -> Vec<DirectoryEntry> {
        self.iter().cloned().collect()
    }

    /// Drop every entry and tombstone
    pub fn clear(&mut self) {
        self.slots.iter_mut().for_each(|slot| *slot = Slot::Empty);
        self.len = 0;
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn slot(&self, index: usize) -> Option<&Slot> {
        self.slots.get(index)
    }
}

impl From<DirectoryTable> for DirectorySnapshot {
    fn from(table: DirectoryTable) -> Self {
        let capacity = table.slots.len() as u32;
        let slots = table
            .slots
            .into_iter()
            .enumerate()
            .filter_map(|(index, slot)| {
                let index = index as u32;
                match slot {
                    Slot::Empty => None,
                    Slot::Tombstone => Some(PersistedSlot { index, entry: None }),
                    Slot::Occupied(entry) => Some(PersistedSlot {
                        index,
                        entry: Some(entry),
                    }),
                }
            })
            .collect();

        DirectorySnapshot { capacity, slots }
    }
}

impl TryFrom<DirectorySnapshot> for DirectoryTable {
    type Error = String;

    fn try_from(snapshot: DirectorySnapshot) -> std::result::Result<Self, Self::Error> {
        let mut table = DirectoryTable::new(snapshot.capacity);
        let mut names = HashSet::new();

        for persisted in snapshot.slots {
            let index = persisted.index as usize;
            if index >= table.slots.len() {
                return Err(format!("slot {} out of range", index));
            }
            if table.slots[index] != Slot::Empty {
                return Err(format!("slot {} listed twice", index));
            }

            table.slots[index] = match persisted.entry {
                Some(entry) => {
                    if !names.insert(entry.filename.clone()) {
                        return Err(format!("duplicate filename {}", entry.filename));
                    }
                    table.len += 1;
                    Slot::Occupied(entry)
                }
                None => Slot::Tombstone,
            };
        }

        Ok(table)
    }
}
