//! # ChainFS - Block-Structured File System in a Single Container File
//!
//! `chainfs` emulates a small file system inside one host file acting as a
//! virtual disk:
//!
//! - **Fixed-size blocks** in a data zone, each carrying a payload and a
//!   pointer to the next block of its file
//! - **Free list** allocator handing out single blocks
//! - **Hash directory** with linear probing and tombstones, sized to the
//!   block count
//! - **Online defragmentation** that repacks every live file contiguously
//! - **Persistent metadata**: directory and free list are stored in reserved
//!   zones ahead of the data zone and restored on open
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use chainfs::{ContainerConfig, FileSystem, Result};
//!
//! # fn main() -> Result<()> {
//! // Creates a zero-filled 10 MiB container on first use
//! let mut fs = FileSystem::open_or_create("File_system.bin", ContainerConfig::default())?;
//!
//! fs.create("notes.txt", b"Hello")?;
//! fs.append("notes.txt", b", World!")?;
//! assert_eq!(fs.read("notes.txt")?, b"Hello, World!");
//!
//! for entry in fs.list() {
//!     println!("{} ({} bytes)", entry.filename, entry.file_size);
//! }
//!
//! fs.delete("notes.txt")?;
//! fs.defragment()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Container Layout
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ Directory zone (1 MiB)                      │
//! │  - Zone header + serialized hash table      │
//! ├─────────────────────────────────────────────┤
//! │ Free-list zone (1 MiB)                      │
//! │  - Zone header + serialized free stack      │
//! ├─────────────────────────────────────────────┤
//! │ Data zone (8 MiB = 8192 x 1 KiB blocks)     │
//! │  - [payload: 1020 bytes][next: i32]         │
//! │  - next = -1 ends a chain                   │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Limitations
//!
//! Block payloads are zero-terminated: content read back stops at the first
//! zero byte that was written. The engine is single-writer; share it between
//! threads through [`SharedFileSystem`].

pub mod core;

// Re-export core modules internally so crate:: paths in core still work
#[allow(unused_imports)]
pub(crate) use crate::core::{
    allocator, block, chain, config, directory, engine, error, header, io, metadata,
};

pub use crate::core::{
    allocator::{BlockAllocator, FreeListAllocator},
    block::{BlockFrame, BlockStore, Link, END_OF_CHAIN},
    chain::ChainCodec,
    config::{ContainerConfig, ContainerLayout, BLOCK_SIZE},
    directory::{DirectoryEntry, DirectoryTable},
    engine::{
        DefragReport, FileSystem, FileSystemBuilder, FileSystemStats, SharedFileSystem,
        VerifyReport,
    },
    error::{ChainFsError, Result},
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
